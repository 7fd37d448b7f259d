//! Clip generation worker.
//!
//! This crate provides:
//! - Job executor consuming from the Redis stream queue
//! - The clip generation pipeline (probe, transcribe, detect, extract)
//! - Highlight detection over transcripts
//! - Progress emission over Redis pub/sub
//! - Graceful shutdown

pub mod config;
pub mod error;
pub mod executor;
pub mod highlights;
pub mod logging;
pub mod pipeline;
pub mod progress;
pub mod retry;
pub mod transcript;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use highlights::{HighlightDetector, KeywordScorer};
pub use logging::JobLogger;
pub use pipeline::{Pipeline, PipelineOutcome};
pub use progress::{NullProgress, ProgressSink, RedisProgress};
pub use retry::{retry_with_policy, RetryPolicy};
pub use transcript::{acquire_transcript, HttpTranscriber, SttConfig, TranscriptSource};
