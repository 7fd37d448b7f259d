//! Highlight detection.
//!
//! Finds the moments worth clipping. The primary detector scores transcript
//! segments with an engagement heuristic; when the transcript is degraded or
//! nothing scores, detection falls back to evenly spaced windows so a job
//! always has something to extract.

use clipkit_models::{Highlight, JobOptions, Transcript};
use tracing::debug;

/// Words that correlate with clip-worthy moments.
const ENGAGEMENT_KEYWORDS: &[&str] = &[
    "amazing", "incredible", "unbelievable", "insane", "crazy", "epic", "hilarious", "shocking",
    "secret", "revealed", "never", "best", "worst", "huge", "massive", "wow", "finally",
    "mistake", "warning", "truth",
];

/// Minimum score for a segment to count as a highlight candidate.
const SCORE_THRESHOLD: f64 = 0.4;

/// Picks highlight moments from a transcript.
pub trait HighlightDetector: Send + Sync {
    /// Detect up to `options.desired_clip_count` highlights, sorted by
    /// score descending. Never returns an empty list for a positive
    /// duration.
    ///
    /// Each highlight is a final extraction window: lead-in and the clip
    /// duration target are already applied, and windows never overlap or
    /// leave `[0, duration_seconds]`.
    fn detect(&self, transcript: &Transcript, duration_seconds: f64, options: &JobOptions)
        -> Vec<Highlight>;
}

/// Keyword and punctuation based scorer.
#[derive(Debug, Clone, Default)]
pub struct KeywordScorer;

impl KeywordScorer {
    pub fn new() -> Self {
        Self
    }

    fn score_text(text: &str) -> f64 {
        let lower = text.to_lowercase();
        let mut score: f64 = 0.3;

        let keyword_hits = ENGAGEMENT_KEYWORDS
            .iter()
            .filter(|k| lower.contains(*k))
            .count();
        score += (keyword_hits as f64 * 0.15).min(0.45);

        if text.contains('!') {
            score += 0.1;
        }
        if text.contains('?') {
            score += 0.05;
        }

        score.clamp(0.0, 1.0)
    }
}

impl HighlightDetector for KeywordScorer {
    fn detect(
        &self,
        transcript: &Transcript,
        duration_seconds: f64,
        options: &JobOptions,
    ) -> Vec<Highlight> {
        if transcript.degraded || transcript.is_empty() {
            debug!("transcript degraded or empty, using uniform windows");
            return uniform_windows(duration_seconds, options);
        }

        let mut candidates: Vec<Highlight> = transcript
            .segments
            .iter()
            .filter(|s| s.start_seconds < duration_seconds)
            .map(|s| {
                Highlight::new(
                    s.start_seconds,
                    s.end_seconds.min(duration_seconds),
                    Self::score_text(&s.text),
                    &s.text,
                )
            })
            .filter(|h| h.score >= SCORE_THRESHOLD)
            .collect();

        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        // Greedily keep the highest scorers whose windows don't collide
        let mut selected: Vec<Highlight> = Vec::new();
        for candidate in candidates {
            if selected.len() >= options.desired_clip_count {
                break;
            }
            let window = clip_window(&candidate, duration_seconds, options);
            let collides = selected.iter().any(|s| {
                let other = clip_window(s, duration_seconds, options);
                window.0 < other.1 && other.0 < window.1
            });
            if !collides {
                selected.push(candidate);
            }
        }

        if selected.is_empty() {
            debug!("no segments scored above threshold, using uniform windows");
            return uniform_windows(duration_seconds, options);
        }

        // Scored moments become extraction windows here, so both detection
        // paths hand the extractor final ranges.
        selected
            .into_iter()
            .map(|h| {
                let (start, end) = clip_window(&h, duration_seconds, options);
                Highlight::new(start, end, h.score, h.source_text)
            })
            .collect()
    }
}

/// Evenly spaced fallback highlights across the whole video.
///
/// The duration is partitioned into `desired_clip_count` slots, each window
/// starting at its slot boundary and capped at the clip duration target, so
/// windows never overlap and never leave the video bounds.
pub fn uniform_windows(duration_seconds: f64, options: &JobOptions) -> Vec<Highlight> {
    if duration_seconds <= 0.0 {
        return Vec::new();
    }

    let count = options.desired_clip_count.max(1);
    let interval = duration_seconds / count as f64;
    let span = interval.min(options.clip_duration_target);

    (0..count)
        .map(|i| {
            let start = interval * i as f64;
            let end = (start + span).min(duration_seconds);
            Highlight::new(start, end, 0.5, "")
        })
        .collect()
}

/// The extraction window for a highlight: lead-in before the moment, capped
/// to the target length and the video bounds.
pub fn clip_window(highlight: &Highlight, duration_seconds: f64, options: &JobOptions) -> (f64, f64) {
    let start = (highlight.start_seconds - options.lead_in_seconds).max(0.0);
    let end = (start + options.clip_duration_target).min(duration_seconds);
    (start, end)
}
