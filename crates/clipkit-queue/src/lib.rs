//! Redis-backed job queue for clip generation.
//!
//! This crate provides:
//! - Job enqueueing via Redis Streams with dedup
//! - Worker consumption with consumer groups, retry counting and a DLQ
//! - Progress events via Redis Pub/Sub

pub mod error;
pub mod message;
pub mod progress;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use message::JobMessage;
pub use progress::{ProgressChannel, ProgressEvent, ProgressUpdate};
pub use queue::{JobQueue, QueueConfig};
