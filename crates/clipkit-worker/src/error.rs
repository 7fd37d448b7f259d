//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("job failed: {0}")]
    JobFailed(String),

    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("no usable clips produced")]
    NoUsableClips,

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("storage error: {0}")]
    Storage(#[from] clipkit_storage::StorageError),

    #[error("media error: {0}")]
    Media(#[from] clipkit_media::MediaError),

    #[error("queue error: {0}")]
    Queue(#[from] clipkit_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn transcription_failed(msg: impl Into<String>) -> Self {
        Self::TranscriptionFailed(msg.into())
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Cancellation and deterministic failures (bad ranges, unreadable
    /// media, missing binaries) are never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Media(e) => e.is_transient(),
            WorkerError::Storage(e) => e.is_transient(),
            WorkerError::Queue(_) => true,
            WorkerError::Io(_) => true,
            WorkerError::TranscriptionFailed(_) => true,
            WorkerError::JobFailed(_)
            | WorkerError::NoUsableClips
            | WorkerError::ConfigError(_) => false,
        }
    }

    /// Whether the job was cancelled rather than failed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WorkerError::Media(clipkit_media::MediaError::Cancelled))
    }
}
