#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for clip production.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Child process supervision with timeout and cancellation
//! - Media probing via FFprobe
//! - Clip extraction, effect chains and thumbnails

pub mod command;
pub mod effects;
pub mod error;
pub mod extract;
pub mod fs_utils;
pub mod probe;
pub mod runner;
pub mod thumbnail;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand};
pub use effects::{apply_effect_chain, ChainOutcome, FailedEffect};
pub use error::{MediaError, MediaResult};
pub use extract::{extract_clip, ClipRange};
pub use fs_utils::remove_dir_best_effort;
pub use probe::{probe_media, MediaInfo};
pub use runner::{CancelSource, CancelToken, ProcessOutput, ProcessRequest, ProcessRunner, SystemRunner};
pub use thumbnail::{generate_thumbnail, thumbnail_offset, ThumbnailOptions};
