//! Progress emission seam.
//!
//! The pipeline reports through this trait; production wires it to the
//! Redis pub/sub channel. Emission is fire-and-forget: a progress failure
//! never fails a job.

use async_trait::async_trait;
use tracing::warn;

use clipkit_models::{JobId, JobState};
use clipkit_queue::ProgressChannel;

/// Receives job progress as it happens.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn stage(&self, job_id: &JobId, state: JobState, progress: u8);
    async fn clip_ready(&self, job_id: &JobId, clip_index: usize, total: usize);
    async fn done(&self, job_id: &JobId);
    async fn error(&self, job_id: &JobId, message: &str);
}

/// Redis-backed sink.
pub struct RedisProgress {
    channel: ProgressChannel,
}

impl RedisProgress {
    pub fn new(channel: ProgressChannel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl ProgressSink for RedisProgress {
    async fn stage(&self, job_id: &JobId, state: JobState, progress: u8) {
        if let Err(e) = self.channel.stage(job_id, state, progress).await {
            warn!(%job_id, %e, "failed to publish stage event");
        }
    }

    async fn clip_ready(&self, job_id: &JobId, clip_index: usize, total: usize) {
        if let Err(e) = self.channel.clip_ready(job_id, clip_index, total).await {
            warn!(%job_id, %e, "failed to publish clip event");
        }
    }

    async fn done(&self, job_id: &JobId) {
        if let Err(e) = self.channel.done(job_id).await {
            warn!(%job_id, %e, "failed to publish done event");
        }
    }

    async fn error(&self, job_id: &JobId, message: &str) {
        if let Err(e) = self.channel.error(job_id, message).await {
            warn!(%job_id, %e, "failed to publish error event");
        }
    }
}

/// Sink that drops everything; for tools that don't care about progress.
pub struct NullProgress;

#[async_trait]
impl ProgressSink for NullProgress {
    async fn stage(&self, _: &JobId, _: JobState, _: u8) {}
    async fn clip_ready(&self, _: &JobId, _: usize, _: usize) {}
    async fn done(&self, _: &JobId) {}
    async fn error(&self, _: &JobId, _: &str) {}
}
