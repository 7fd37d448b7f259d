//! Per-job processing options carried on the queue message.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::effect::EffectSpec;
use crate::encoding::EncodingConfig;
use crate::highlight::Platform;

/// Default number of clips to aim for per job
pub const DEFAULT_CLIP_COUNT: usize = 5;
/// Default clip length in seconds
pub const DEFAULT_CLIP_DURATION: f64 = 60.0;
/// Seconds of lead-in context before each highlight
pub const DEFAULT_LEAD_IN: f64 = 5.0;

/// Options attached to a job when it is enqueued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobOptions {
    /// How many clips to produce (best effort)
    #[serde(default = "default_clip_count")]
    pub desired_clip_count: usize,

    /// Target clip length in seconds
    #[serde(default = "default_clip_duration")]
    pub clip_duration_target: f64,

    /// Context included before the highlight start
    #[serde(default = "default_lead_in")]
    pub lead_in_seconds: f64,

    /// Platform the clips are being cut for
    #[serde(default)]
    pub target_platform: Platform,

    /// Effect chain applied to every clip, in order
    #[serde(default)]
    pub effects: Vec<EffectSpec>,

    /// Encoding overrides; defaults when absent
    #[serde(default)]
    pub encoding: EncodingConfig,

    /// Skip thumbnail generation
    #[serde(default)]
    pub skip_thumbnails: bool,
}

fn default_clip_count() -> usize {
    DEFAULT_CLIP_COUNT
}
fn default_clip_duration() -> f64 {
    DEFAULT_CLIP_DURATION
}
fn default_lead_in() -> f64 {
    DEFAULT_LEAD_IN
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            desired_clip_count: DEFAULT_CLIP_COUNT,
            clip_duration_target: DEFAULT_CLIP_DURATION,
            lead_in_seconds: DEFAULT_LEAD_IN,
            target_platform: Platform::default(),
            effects: Vec::new(),
            encoding: EncodingConfig::default(),
            skip_thumbnails: false,
        }
    }
}

impl JobOptions {
    /// Validate every effect in the chain, returning the first failure.
    pub fn validate_effects(&self) -> Result<(), crate::effect::EffectValidationError> {
        for effect in &self.effects {
            effect.validate()?;
        }
        Ok(())
    }
}
