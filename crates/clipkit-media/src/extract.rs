//! Clip extraction.

use std::path::Path;
use std::sync::Arc;

use clipkit_models::EncodingConfig;
use tracing::debug;

use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};
use crate::runner::{CancelToken, ProcessRunner};

/// A validated time window within the source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipRange {
    pub start_seconds: f64,
    pub end_seconds: f64,
}

impl ClipRange {
    /// Validate the window; rejects reversed, empty and negative ranges.
    pub fn new(start_seconds: f64, end_seconds: f64) -> MediaResult<Self> {
        if start_seconds < 0.0 || end_seconds <= start_seconds {
            return Err(MediaError::InvalidRange {
                start: start_seconds,
                end: end_seconds,
            });
        }
        Ok(Self {
            start_seconds,
            end_seconds,
        })
    }

    pub fn duration(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }
}

/// Extract a single clip, re-encoding with the given configuration.
///
/// The range is validated before any process is spawned.
pub async fn extract_clip(
    runner: &Arc<dyn ProcessRunner>,
    source: impl AsRef<Path>,
    output: impl AsRef<Path>,
    range: ClipRange,
    encoding: &EncodingConfig,
    timeout_secs: Option<u64>,
    cancel: &CancelToken,
) -> MediaResult<()> {
    let source = source.as_ref();
    let output = output.as_ref();

    if !source.exists() {
        return Err(MediaError::FileNotFound(source.to_path_buf()));
    }

    debug!(
        source = %source.display(),
        start = range.start_seconds,
        duration = range.duration(),
        "extracting clip"
    );

    let request = FfmpegCommand::new(source, output)
        .seek(range.start_seconds)
        .duration(range.duration())
        .output_args(encoding.to_ffmpeg_args())
        .output_args(["-movflags", "+faststart"])
        .into_request(timeout_secs)?;

    runner.run(request, cancel).await?;

    if !output.exists() {
        return Err(MediaError::process_failed(
            "ffmpeg",
            "output file missing after extraction",
            None,
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_rejects_reversed() {
        assert!(matches!(
            ClipRange::new(10.0, 5.0),
            Err(MediaError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_range_rejects_empty() {
        assert!(ClipRange::new(5.0, 5.0).is_err());
    }

    #[test]
    fn test_range_rejects_negative_start() {
        assert!(ClipRange::new(-1.0, 5.0).is_err());
    }

    #[test]
    fn test_range_duration() {
        let range = ClipRange::new(5.0, 65.0).unwrap();
        assert!((range.duration() - 60.0).abs() < 1e-9);
    }
}
