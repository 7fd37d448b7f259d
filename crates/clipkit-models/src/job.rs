//! Job definitions and the pipeline state machine.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pipeline stage a job is currently in.
///
/// Transitions are strictly forward; once a terminal state is reached
/// the job is immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Job is waiting in queue
    #[default]
    Queued,
    /// Probing source metadata
    Probing,
    /// Acquiring transcript
    Transcribing,
    /// Detecting highlights
    DetectingHighlights,
    /// Extracting and post-processing clips
    ExtractingClips,
    /// Job completed successfully (possibly with partial clip failures)
    Completed,
    /// Job failed fatally
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Probing => "probing",
            JobState::Transcribing => "transcribing",
            JobState::DetectingHighlights => "detecting_highlights",
            JobState::ExtractingClips => "extracting_clips",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    /// Ordinal position in the forward progression (terminal states excluded).
    fn ordinal(&self) -> u8 {
        match self {
            JobState::Queued => 0,
            JobState::Probing => 1,
            JobState::Transcribing => 2,
            JobState::DetectingHighlights => 3,
            JobState::ExtractingClips => 4,
            JobState::Completed => 5,
            JobState::Failed => 5,
        }
    }

    /// Whether a transition from `self` to `next` is legal.
    ///
    /// Legal moves are one step forward, or a jump to `Failed` from any
    /// non-terminal state. Terminal states accept no transitions.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == JobState::Failed {
            return true;
        }
        next.ordinal() == self.ordinal() + 1
    }

    /// Progress contribution when this stage completes.
    ///
    /// Probing=10, Transcribing=25, DetectingHighlights=35; the remaining
    /// 35..100 range is filled proportionally while extracting clips.
    pub fn base_progress(&self) -> u8 {
        match self {
            JobState::Queued => 0,
            JobState::Probing => 10,
            JobState::Transcribing => 25,
            JobState::DetectingHighlights => 35,
            JobState::ExtractingClips => 35,
            JobState::Completed => 100,
            JobState::Failed => 100,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One end-to-end processing run for a single source video.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Storage key (or local path) of the source video
    pub source_key: String,

    /// Owning user ID
    pub owner_id: String,

    /// Current pipeline state
    #[serde(default)]
    pub state: JobState,

    /// Source duration in seconds, set after probing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,

    /// Last fatal error (set when state is Failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new queued job.
    pub fn new(source_key: impl Into<String>, owner_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            source_key: source_key.into(),
            owner_id: owner_id.into(),
            state: JobState::Queued,
            duration_seconds: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a queued job with a pre-assigned ID (e.g. from a queue message).
    pub fn with_id(id: JobId, source_key: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            id,
            ..Self::new(source_key, owner_id)
        }
    }

    /// Advance to the next stage.
    ///
    /// Returns `false` (leaving the job untouched) if the transition would
    /// violate the forward-only invariant.
    pub fn advance_to(&mut self, next: JobState) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        self.state = next;
        self.updated_at = Utc::now();
        true
    }

    /// Mark the job failed with a short human-readable error.
    ///
    /// No-op if the job is already terminal.
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if !self.advance_to(JobState::Failed) {
            return false;
        }
        self.error = Some(error.into());
        true
    }

    /// Record the probed duration.
    pub fn set_duration(&mut self, seconds: f64) {
        self.duration_seconds = Some(seconds);
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        let mut job = Job::new("videos/abc.mp4", "user123");
        assert_eq!(job.state, JobState::Queued);

        assert!(job.advance_to(JobState::Probing));
        assert!(job.advance_to(JobState::Transcribing));
        assert!(job.advance_to(JobState::DetectingHighlights));
        assert!(job.advance_to(JobState::ExtractingClips));
        assert!(job.advance_to(JobState::Completed));
        assert!(job.state.is_terminal());
    }

    #[test]
    fn test_no_skipping_stages() {
        let mut job = Job::new("videos/abc.mp4", "user123");
        assert!(!job.advance_to(JobState::ExtractingClips));
        assert_eq!(job.state, JobState::Queued);
    }

    #[test]
    fn test_any_stage_can_fail() {
        let mut job = Job::new("videos/abc.mp4", "user123");
        job.advance_to(JobState::Probing);
        assert!(job.fail("unreadable media"));
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.error.as_deref(), Some("unreadable media"));
    }

    #[test]
    fn test_terminal_states_are_immutable() {
        let mut job = Job::new("videos/abc.mp4", "user123");
        job.advance_to(JobState::Probing);
        job.fail("boom");

        assert!(!job.advance_to(JobState::Transcribing));
        assert!(!job.fail("again"));
        assert_eq!(job.error.as_deref(), Some("boom"));

        let mut done = Job::new("videos/def.mp4", "user123");
        done.advance_to(JobState::Probing);
        done.advance_to(JobState::Transcribing);
        done.advance_to(JobState::DetectingHighlights);
        done.advance_to(JobState::ExtractingClips);
        done.advance_to(JobState::Completed);
        assert!(!done.fail("too late"));
        assert_eq!(done.state, JobState::Completed);
    }

    #[test]
    fn test_stage_progress_weights() {
        assert_eq!(JobState::Probing.base_progress(), 10);
        assert_eq!(JobState::Transcribing.base_progress(), 25);
        assert_eq!(JobState::DetectingHighlights.base_progress(), 35);
        assert_eq!(JobState::Completed.base_progress(), 100);
    }
}
