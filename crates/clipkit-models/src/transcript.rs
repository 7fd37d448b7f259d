//! Transcript models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Placeholder text used when transcription is unavailable.
pub const DEGRADED_TRANSCRIPT_TEXT: &str =
    "Transcript unavailable; highlights fall back to uniform time slicing.";

/// One time-coded transcript segment.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptSegment {
    /// Segment start in seconds
    pub start_seconds: f64,
    /// Segment end in seconds
    pub end_seconds: f64,
    /// Spoken text
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(start_seconds: f64, end_seconds: f64, text: impl Into<String>) -> Self {
        Self {
            start_seconds,
            end_seconds,
            text: text.into(),
        }
    }
}

/// A time-coded transcript, possibly degraded.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Transcript {
    /// Ordered segments (possibly empty)
    pub segments: Vec<TranscriptSegment>,
    /// True when this is a placeholder produced because the speech-to-text
    /// backend was unavailable or failed
    #[serde(default)]
    pub degraded: bool,
}

impl Transcript {
    /// Create a real transcript from segments.
    pub fn new(segments: Vec<TranscriptSegment>) -> Self {
        Self {
            segments,
            degraded: false,
        }
    }

    /// Create the degraded single-segment placeholder covering the whole source.
    pub fn degraded(duration_seconds: f64) -> Self {
        Self {
            segments: vec![TranscriptSegment::new(
                0.0,
                duration_seconds.max(0.0),
                DEGRADED_TRANSCRIPT_TEXT,
            )],
            degraded: true,
        }
    }

    /// Full transcript text, segments joined by spaces.
    pub fn full_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degraded_transcript_shape() {
        let t = Transcript::degraded(120.0);
        assert!(t.degraded);
        assert_eq!(t.segments.len(), 1);
        assert!((t.segments[0].end_seconds - 120.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_full_text_joins_segments() {
        let t = Transcript::new(vec![
            TranscriptSegment::new(0.0, 2.0, "hello"),
            TranscriptSegment::new(2.0, 4.0, "world"),
        ]);
        assert_eq!(t.full_text(), "hello world");
        assert!(!t.degraded);
    }
}
