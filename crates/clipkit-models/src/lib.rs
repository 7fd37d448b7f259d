//! Shared data models for the clipkit pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs and their state machine
//! - Highlights and transcripts
//! - Clips and their outward-facing records
//! - Effect chain specifications
//! - Encoding configuration

pub mod clip;
pub mod effect;
pub mod encoding;
pub mod highlight;
pub mod job;
pub mod options;
pub mod transcript;

// Re-export common types
pub use clip::{Clip, ClipRecord, ClipStatus, JobRecord};
pub use effect::{EffectSpec, FilterEffect, OverlayPosition, TextOverlayEffect, WatermarkEffect};
pub use encoding::EncodingConfig;
pub use highlight::{Highlight, Platform};
pub use job::{Job, JobId, JobState};
pub use options::JobOptions;
pub use transcript::{Transcript, TranscriptSegment};
