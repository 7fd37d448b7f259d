//! Clip models and outward-facing record shapes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Highlight, JobId, JobState, Platform};

/// Processing status of a single clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClipStatus {
    /// Not yet extracted
    #[default]
    Pending,
    /// Base clip cut from the source
    Extracted,
    /// Effect chain applied (possibly partially)
    EffectsApplied,
    /// Thumbnail generated
    ThumbnailReady,
    /// Clip failed and produced no usable output
    Failed,
}

impl ClipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClipStatus::Pending => "pending",
            ClipStatus::Extracted => "extracted",
            ClipStatus::EffectsApplied => "effects_applied",
            ClipStatus::ThumbnailReady => "thumbnail_ready",
            ClipStatus::Failed => "failed",
        }
    }

    /// A clip is usable once its base extraction succeeded.
    pub fn is_usable(&self) -> bool {
        !matches!(self, ClipStatus::Pending | ClipStatus::Failed)
    }
}

/// One output artifact derived from a highlight.
///
/// Owned exclusively by its job; deleted with the job's artifacts on
/// failure cleanup.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Clip {
    /// Unique clip ID
    pub id: String,

    /// Owning job
    pub job_id: JobId,

    /// Index of the source highlight in ranking order (0 = highest score)
    pub highlight_index: usize,

    /// Storage key of the final clip file (set after upload)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<String>,

    /// Public URL of the final clip file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Clip duration in seconds
    pub duration_seconds: f64,

    /// Caption derived from the highlight text
    pub caption: String,

    /// Labels of effects actually applied, in order
    #[serde(default)]
    pub effects_applied: Vec<String>,

    /// Thumbnail URL, None when generation failed (non-fatal)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,

    /// Platform hint carried over from the highlight
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_hint: Option<Platform>,

    /// Processing status
    #[serde(default)]
    pub status: ClipStatus,

    /// Short error string when status is Failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Clip {
    /// Create a pending clip for a ranked highlight.
    pub fn pending(job_id: &JobId, highlight_index: usize, highlight: &Highlight) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            job_id: job_id.clone(),
            highlight_index,
            storage_key: None,
            url: None,
            duration_seconds: highlight.duration_seconds(),
            caption: highlight.source_text.clone(),
            effects_applied: Vec::new(),
            thumbnail_url: None,
            platform_hint: highlight.target_platform,
            status: ClipStatus::Pending,
            error: None,
        }
    }

    /// Mark the clip failed with a short reason.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = ClipStatus::Failed;
        self.error = Some(error.into());
    }

    /// Outward record shape, None for failed clips.
    pub fn to_record(&self) -> Option<ClipRecord> {
        let url = self.url.clone()?;
        Some(ClipRecord {
            url,
            thumbnail_url: self.thumbnail_url.clone(),
            duration: self.duration_seconds,
            caption: self.caption.clone(),
            platform_hint: self.platform_hint.unwrap_or_default(),
        })
    }
}

/// Clip shape surfaced outside the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClipRecord {
    /// Durable clip URL
    pub url: String,
    /// Durable thumbnail URL, if one was generated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Duration in seconds
    pub duration: f64,
    /// Caption text
    pub caption: String,
    /// Platform hint
    pub platform_hint: Platform,
}

/// Job shape surfaced outside the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobRecord {
    /// Terminal status of the job
    pub status: JobState,
    /// Probed duration in seconds, if probing succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Short human-readable error, set on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Usable clips in highlight ranking order
    pub clips: Vec<ClipRecord>,
}
