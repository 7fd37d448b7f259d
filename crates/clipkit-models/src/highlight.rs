//! Highlight models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Target platform hint for a highlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    #[default]
    TikTok,
    Instagram,
    YouTube,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::TikTok => "tiktok",
            Platform::Instagram => "instagram",
            Platform::YouTube => "youtube",
        }
    }
}

/// A scored time range in the source video judged worth clipping.
///
/// Produced in bulk by the highlight detector and immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Highlight {
    /// Start of the clip window in seconds (lead-in already applied)
    pub start_seconds: f64,

    /// End of the clip window in seconds
    pub end_seconds: f64,

    /// Confidence score, 0.0..=1.0
    pub score: f64,

    /// Transcript excerpt this highlight was scored from
    pub source_text: String,

    /// Optional platform hint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_platform: Option<Platform>,
}

impl Highlight {
    /// Create a new highlight.
    pub fn new(start_seconds: f64, end_seconds: f64, score: f64, source_text: impl Into<String>) -> Self {
        Self {
            start_seconds,
            end_seconds,
            score: score.clamp(0.0, 1.0),
            source_text: source_text.into(),
            target_platform: None,
        }
    }

    /// Set the platform hint.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.target_platform = Some(platform);
        self
    }

    /// Window length in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }

    /// Whether the window is a valid sub-range of a source of `duration` seconds.
    pub fn is_within(&self, duration: f64) -> bool {
        self.start_seconds >= 0.0
            && self.start_seconds < self.end_seconds
            && self.end_seconds <= duration
    }

    /// Whether two windows overlap in time.
    pub fn overlaps(&self, other: &Highlight) -> bool {
        self.start_seconds < other.end_seconds && other.start_seconds < self.end_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_check() {
        let h = Highlight::new(35.0, 95.0, 0.9, "key moment");
        assert!(h.is_within(120.0));
        assert!(!h.is_within(90.0));

        let inverted = Highlight::new(50.0, 40.0, 0.5, "bad");
        assert!(!inverted.is_within(120.0));
    }

    #[test]
    fn test_overlap() {
        let a = Highlight::new(0.0, 30.0, 0.8, "a");
        let b = Highlight::new(25.0, 60.0, 0.7, "b");
        let c = Highlight::new(30.0, 60.0, 0.6, "c");
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c)); // touching edges do not overlap
    }

    #[test]
    fn test_score_is_clamped() {
        assert!((Highlight::new(0.0, 1.0, 1.7, "x").score - 1.0).abs() < f64::EPSILON);
    }
}
