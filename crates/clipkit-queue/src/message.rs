//! Queue message payloads.

use serde::{Deserialize, Serialize};

use clipkit_models::{JobId, JobOptions};

/// A clip-generation job as carried on the stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMessage {
    /// Job identifier, assigned at enqueue time
    pub job_id: JobId,
    /// Storage key of the source video
    pub source_key: String,
    /// Owner of the job, used for artifact namespacing
    pub owner_id: String,
    /// Processing options
    #[serde(default)]
    pub options: JobOptions,
}

impl JobMessage {
    pub fn new(source_key: impl Into<String>, owner_id: impl Into<String>, options: JobOptions) -> Self {
        Self {
            job_id: JobId::new(),
            source_key: source_key.into(),
            owner_id: owner_id.into(),
            options,
        }
    }

    /// Key used to reject duplicate submissions of the same source.
    ///
    /// Options are deliberately excluded: two submissions of one video by
    /// one owner within the dedup window are treated as the same job.
    pub fn idempotency_key(&self) -> String {
        format!("{}:{}", self.owner_id, self.source_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idempotency_key_ignores_options() {
        let mut options = JobOptions::default();
        options.desired_clip_count = 3;

        let a = JobMessage::new("uploads/v1.mp4", "user-1", JobOptions::default());
        let b = JobMessage::new("uploads/v1.mp4", "user-1", options);
        assert_eq!(a.idempotency_key(), b.idempotency_key());
    }

    #[test]
    fn test_roundtrip() {
        let msg = JobMessage::new("uploads/v1.mp4", "user-1", JobOptions::default());
        let json = serde_json::to_string(&msg).unwrap();
        let back: JobMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.job_id, msg.job_id);
        assert_eq!(back.source_key, "uploads/v1.mp4");
    }
}
