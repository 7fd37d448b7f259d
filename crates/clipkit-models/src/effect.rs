//! Effect chain specifications.
//!
//! Effects form a closed tagged union with per-kind parameter structs so
//! invalid parameters are rejected at construction time, not mid-transcode.
//! The FFmpeg filter strings themselves live in `clipkit-media`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Error produced by effect parameter validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EffectValidationError {
    #[error("text overlay requires non-empty text")]
    EmptyOverlayText,

    #[error("watermark requires an overlay image path")]
    MissingWatermarkImage,

    #[error("opacity must be within 0.0..=1.0, got {0}")]
    OpacityOutOfRange(String),

    #[error("blur radius must be greater than zero")]
    ZeroBlurRadius,
}

/// A color/tone filter applied to the whole frame.
///
/// Levels use the 100-is-neutral percent scale of the original editor UI.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "filter", rename_all = "snake_case")]
pub enum FilterEffect {
    /// Brightness, 100 = unchanged
    Brightness { level: i32 },
    /// Contrast, 100 = unchanged
    Contrast { level: u32 },
    /// Saturation, 100 = unchanged
    Saturation { level: u32 },
    /// Hue rotation in degrees
    Hue { degrees: i32 },
    /// Box blur radius in pixels
    Blur { radius: u32 },
    /// Sepia tone
    Sepia,
}

impl FilterEffect {
    pub fn label(&self) -> &'static str {
        match self {
            FilterEffect::Brightness { .. } => "brightness",
            FilterEffect::Contrast { .. } => "contrast",
            FilterEffect::Saturation { .. } => "saturation",
            FilterEffect::Hue { .. } => "hue",
            FilterEffect::Blur { .. } => "blur",
            FilterEffect::Sepia => "sepia",
        }
    }
}

/// Anchor corner for overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverlayPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
}

/// Text drawn over the clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TextOverlayEffect {
    /// Overlay text (must be non-empty)
    pub text: String,
    /// Font size in points
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    /// Font color (hex or FFmpeg color name)
    #[serde(default = "default_font_color")]
    pub color: String,
    /// Horizontal position as percent of frame width
    #[serde(default = "default_position_pct")]
    pub x_percent: u32,
    /// Vertical position as percent of frame height
    #[serde(default = "default_position_pct")]
    pub y_percent: u32,
}

fn default_font_size() -> u32 {
    24
}
fn default_font_color() -> String {
    "#ffffff".to_string()
}
fn default_position_pct() -> u32 {
    50
}

impl TextOverlayEffect {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_size: default_font_size(),
            color: default_font_color(),
            x_percent: default_position_pct(),
            y_percent: default_position_pct(),
        }
    }
}

/// Image watermark overlaid in a corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WatermarkEffect {
    /// Path to the watermark image (PNG with transparency)
    pub image_path: String,
    /// Anchor corner
    #[serde(default)]
    pub position: OverlayPosition,
    /// Offset from the anchor edges in pixels
    #[serde(default = "default_watermark_offset")]
    pub offset: u32,
    /// Opacity, 0.0..=1.0
    #[serde(default = "default_watermark_opacity")]
    pub opacity: f32,
}

fn default_watermark_offset() -> u32 {
    20
}
fn default_watermark_opacity() -> f32 {
    0.7
}

impl WatermarkEffect {
    pub fn new(image_path: impl Into<String>) -> Self {
        Self {
            image_path: image_path.into(),
            position: OverlayPosition::default(),
            offset: default_watermark_offset(),
            opacity: default_watermark_opacity(),
        }
    }
}

/// One step in an effect chain.
///
/// Effects apply strictly in list order; each step's output becomes the
/// next step's input and is never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EffectSpec {
    /// Full-frame filter
    Filter(FilterEffect),
    /// Text overlay
    TextOverlay(TextOverlayEffect),
    /// Image watermark
    Watermark(WatermarkEffect),
}

impl EffectSpec {
    /// Short label used in file suffixes and `effects_applied`.
    pub fn label(&self) -> &'static str {
        match self {
            EffectSpec::Filter(f) => f.label(),
            EffectSpec::TextOverlay(_) => "text-overlay",
            EffectSpec::Watermark(_) => "watermark",
        }
    }

    /// Validate kind-specific parameters.
    ///
    /// Filesystem checks (e.g. watermark image existence) are re-done by the
    /// processor immediately before spawning, since the worker host may
    /// differ from wherever the spec was built.
    pub fn validate(&self) -> Result<(), EffectValidationError> {
        match self {
            EffectSpec::Filter(FilterEffect::Blur { radius }) => {
                if *radius == 0 {
                    return Err(EffectValidationError::ZeroBlurRadius);
                }
                Ok(())
            }
            EffectSpec::Filter(_) => Ok(()),
            EffectSpec::TextOverlay(t) => {
                if t.text.trim().is_empty() {
                    return Err(EffectValidationError::EmptyOverlayText);
                }
                Ok(())
            }
            EffectSpec::Watermark(w) => {
                if w.image_path.trim().is_empty() {
                    return Err(EffectValidationError::MissingWatermarkImage);
                }
                if !(0.0..=1.0).contains(&w.opacity) {
                    return Err(EffectValidationError::OpacityOutOfRange(format!(
                        "{:.2}",
                        w.opacity
                    )));
                }
                Ok(())
            }
        }
    }
}
