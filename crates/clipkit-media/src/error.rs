//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("ffmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("ffprobe not found in PATH")]
    FfprobeNotFound,

    #[error("{program} exited with status {exit_code:?}")]
    ProcessFailed {
        program: String,
        stderr: String,
        exit_code: Option<i32>,
    },

    #[error("operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid clip range: start {start:.3} end {end:.3}")]
    InvalidRange { start: f64, end: f64 },

    #[error("unreadable media: {0}")]
    UnreadableMedia(String),

    #[error("invalid effect: {0}")]
    InvalidEffect(String),

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    /// Create a process failure error.
    pub fn process_failed(
        program: impl Into<String>,
        stderr: impl Into<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::ProcessFailed {
            program: program.into(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    /// Failures worth retrying at a higher level.
    ///
    /// Missing binaries, bad ranges and unreadable inputs will fail the same
    /// way every time; timeouts and IO hiccups may not.
    pub fn is_transient(&self) -> bool {
        matches!(self, MediaError::Timeout(_) | MediaError::Io(_))
    }
}
