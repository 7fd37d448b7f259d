//! Thumbnail generation.

use std::path::Path;
use std::sync::Arc;

use clipkit_models::encoding::{THUMBNAIL_HEIGHT, THUMBNAIL_QUALITY, THUMBNAIL_WIDTH};
use tracing::debug;

use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};
use crate::runner::{CancelToken, ProcessRunner};

/// Thumbnail sizing options.
#[derive(Debug, Clone, Copy)]
pub struct ThumbnailOptions {
    pub width: u32,
    pub height: u32,
    /// JPEG quality, 1-100
    pub quality: u8,
}

impl Default for ThumbnailOptions {
    fn default() -> Self {
        Self {
            width: THUMBNAIL_WIDTH,
            height: THUMBNAIL_HEIGHT,
            quality: THUMBNAIL_QUALITY,
        }
    }
}

/// Frame timestamp for a clip of the given length.
///
/// One second in, unless the clip is too short to have one; then the
/// midpoint.
pub fn thumbnail_offset(clip_duration_seconds: f64) -> f64 {
    if clip_duration_seconds < 2.0 {
        clip_duration_seconds / 2.0
    } else {
        1.0
    }
}

/// Extract a single-frame JPEG thumbnail from a clip.
pub async fn generate_thumbnail(
    runner: &Arc<dyn ProcessRunner>,
    clip: impl AsRef<Path>,
    output: impl AsRef<Path>,
    clip_duration_seconds: f64,
    options: ThumbnailOptions,
    timeout_secs: Option<u64>,
    cancel: &CancelToken,
) -> MediaResult<()> {
    let clip = clip.as_ref();
    let output = output.as_ref();

    if !clip.exists() {
        return Err(MediaError::FileNotFound(clip.to_path_buf()));
    }

    let offset = thumbnail_offset(clip_duration_seconds);

    debug!(clip = %clip.display(), offset, "generating thumbnail");

    // mjpeg qscale runs 2 (best) to 31; map from the 1-100 quality scale
    let qscale = (31.0 - (options.quality as f64 / 100.0) * 29.0).round().max(2.0) as u32;

    let request = FfmpegCommand::new(clip, output)
        .seek(offset)
        .single_frame()
        .video_filter(format!(
            "scale={}:{}:force_original_aspect_ratio=decrease",
            options.width, options.height
        ))
        .output_arg("-q:v")
        .output_arg(qscale.to_string())
        .into_request(timeout_secs)?;

    runner.run(request, cancel).await?;
    Ok(())
}
