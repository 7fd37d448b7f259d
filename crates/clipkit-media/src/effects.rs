//! Effect chain application.
//!
//! Each step reads the previous step's output and writes a new file next to
//! it, so a failed step never corrupts earlier work. The chain ships what it
//! has: a mid-chain failure yields the last good intermediate instead of an
//! error.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clipkit_models::{EffectSpec, FilterEffect, OverlayPosition, TextOverlayEffect, WatermarkEffect};
use tracing::{debug, warn};

use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};
use crate::runner::{CancelToken, ProcessRunner};

/// Result of running an effect chain over one clip.
#[derive(Debug)]
pub struct ChainOutcome {
    /// Final output, or the last good intermediate if a step failed
    pub output: PathBuf,
    /// Labels of successfully applied effects, in order
    pub applied: Vec<String>,
    /// The step that broke the chain, if any
    pub failed: Option<FailedEffect>,
}

/// A failed effect step.
#[derive(Debug)]
pub struct FailedEffect {
    pub label: String,
    pub error: MediaError,
}

/// Build the eq/hue/boxblur filter expression for a frame filter.
fn filter_expression(filter: &FilterEffect) -> String {
    match filter {
        FilterEffect::Brightness { level } => {
            format!("eq=brightness={:.3}", (*level as f64 - 100.0) / 100.0)
        }
        FilterEffect::Contrast { level } => {
            format!("eq=contrast={:.3}", *level as f64 / 100.0)
        }
        FilterEffect::Saturation { level } => {
            format!("eq=saturation={:.3}", *level as f64 / 100.0)
        }
        FilterEffect::Hue { degrees } => format!("hue=h={degrees}"),
        FilterEffect::Blur { radius } => format!("boxblur={radius}"),
        FilterEffect::Sepia => {
            "colorchannelmixer=.393:.769:.189:0:.349:.686:.168:0:.272:.534:.131:0".to_string()
        }
    }
}

/// Escape a value for use inside a drawtext or movie filter argument.
fn escape_filter_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// Build the drawtext expression for a text overlay.
fn drawtext_expression(overlay: &TextOverlayEffect) -> String {
    format!(
        "drawtext=text='{}':fontsize={}:fontcolor={}:x=(w-text_w)*{}/100:y=(h-text_h)*{}/100:borderw=2:bordercolor=black",
        escape_filter_value(&overlay.text),
        overlay.font_size,
        overlay.color,
        overlay.x_percent,
        overlay.y_percent,
    )
}

/// Overlay position expression for a watermark corner.
fn overlay_position(position: OverlayPosition, offset: u32) -> String {
    match position {
        OverlayPosition::TopLeft => format!("{offset}:{offset}"),
        OverlayPosition::TopRight => format!("main_w-overlay_w-{offset}:{offset}"),
        OverlayPosition::BottomLeft => format!("{offset}:main_h-overlay_h-{offset}"),
        OverlayPosition::BottomRight => {
            format!("main_w-overlay_w-{offset}:main_h-overlay_h-{offset}")
        }
    }
}

/// Build the filter_complex expression for a watermark overlay.
fn watermark_expression(watermark: &WatermarkEffect) -> String {
    format!(
        "movie='{}',format=rgba,colorchannelmixer=aa={:.2}[wm];[0:v][wm]overlay={}",
        escape_filter_value(&watermark.image_path),
        watermark.opacity,
        overlay_position(watermark.position, watermark.offset),
    )
}

/// Apply one effect, writing `output` from `input`.
async fn apply_effect(
    runner: &Arc<dyn ProcessRunner>,
    input: &Path,
    output: &Path,
    effect: &EffectSpec,
    timeout_secs: Option<u64>,
    cancel: &CancelToken,
) -> MediaResult<()> {
    effect
        .validate()
        .map_err(|e| MediaError::InvalidEffect(e.to_string()))?;

    let cmd = FfmpegCommand::new(input, output);
    let cmd = match effect {
        EffectSpec::Filter(filter) => cmd.video_filter(filter_expression(filter)),
        EffectSpec::TextOverlay(overlay) => cmd.video_filter(drawtext_expression(overlay)),
        EffectSpec::Watermark(watermark) => {
            // The image must exist on this host before we spawn anything
            if !Path::new(&watermark.image_path).exists() {
                return Err(MediaError::FileNotFound(PathBuf::from(
                    &watermark.image_path,
                )));
            }
            cmd.filter_complex(watermark_expression(watermark))
        }
    };

    let cmd = cmd.output_args(["-c:a", "copy"]);
    runner.run(cmd.into_request(timeout_secs)?, cancel).await?;
    Ok(())
}

/// Run the full effect chain over a clip.
///
/// Returns the chain outcome on any per-step failure; only cancellation
/// aborts the whole operation as an error.
pub async fn apply_effect_chain(
    runner: &Arc<dyn ProcessRunner>,
    source: impl AsRef<Path>,
    effects: &[EffectSpec],
    timeout_secs: Option<u64>,
    cancel: &CancelToken,
) -> MediaResult<ChainOutcome> {
    let source = source.as_ref();
    let mut current = source.to_path_buf();
    let mut applied = Vec::new();

    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "clip".to_string());
    let ext = source
        .extension()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "mp4".to_string());
    let dir = source.parent().unwrap_or_else(|| Path::new("."));

    for (index, effect) in effects.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(MediaError::Cancelled);
        }

        let label = effect.label();
        let output = dir.join(format!("{stem}_{index}_{label}.{ext}"));

        debug!(effect = label, step = index, "applying effect");

        match apply_effect(runner, &current, &output, effect, timeout_secs, cancel).await {
            Ok(()) => {
                current = output;
                applied.push(label.to_string());
            }
            Err(MediaError::Cancelled) => return Err(MediaError::Cancelled),
            Err(error) => {
                warn!(effect = label, step = index, %error, "effect failed, keeping last good output");
                return Ok(ChainOutcome {
                    output: current,
                    applied,
                    failed: Some(FailedEffect {
                        label: label.to_string(),
                        error,
                    }),
                });
            }
        }
    }

    Ok(ChainOutcome {
        output: current,
        applied,
        failed: None,
    })
}
