//! Progress events via Redis Pub/Sub.

use serde::{Deserialize, Serialize};
use tracing::debug;

use clipkit_models::{JobId, JobState};

use crate::error::QueueResult;

/// The payload of a progress event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressUpdate {
    /// Job entered a new stage
    Stage { state: JobState, progress: u8 },
    /// One clip finished uploading
    ClipReady { clip_index: usize, total: usize },
    /// Free-form log line for the job activity feed
    Log { message: String },
    /// Terminal success
    Done { progress: u8 },
    /// Terminal failure
    Error { message: String },
}

/// Progress event published to Redis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Job ID
    pub job_id: JobId,
    /// What happened
    pub update: ProgressUpdate,
}

/// Channel for publishing/subscribing to progress events.
pub struct ProgressChannel {
    client: redis::Client,
}

impl ProgressChannel {
    /// Create a new progress channel.
    pub fn new(redis_url: &str) -> QueueResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    /// Get the channel name for a job.
    pub fn channel_name(job_id: &JobId) -> String {
        format!("progress:{}", job_id)
    }

    /// Publish a progress event.
    pub async fn publish(&self, event: &ProgressEvent) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let channel = Self::channel_name(&event.job_id);
        let payload = serde_json::to_string(event)?;

        debug!(%channel, "publishing progress event");
        // Explicit command: the generic `AsyncCommands::publish` future is
        // not `Send` when awaited from a spawned task.
        redis::cmd("PUBLISH")
            .arg(&channel)
            .arg(&payload)
            .query_async::<()>(&mut conn)
            .await?;

        Ok(())
    }

    /// Publish a stage transition.
    pub async fn stage(&self, job_id: &JobId, state: JobState, progress: u8) -> QueueResult<()> {
        self.publish(&ProgressEvent {
            job_id: job_id.clone(),
            update: ProgressUpdate::Stage { state, progress },
        })
        .await
    }

    /// Publish a clip uploaded notification.
    pub async fn clip_ready(&self, job_id: &JobId, clip_index: usize, total: usize) -> QueueResult<()> {
        self.publish(&ProgressEvent {
            job_id: job_id.clone(),
            update: ProgressUpdate::ClipReady { clip_index, total },
        })
        .await
    }

    /// Publish a log message.
    pub async fn log(&self, job_id: &JobId, message: impl Into<String>) -> QueueResult<()> {
        self.publish(&ProgressEvent {
            job_id: job_id.clone(),
            update: ProgressUpdate::Log {
                message: message.into(),
            },
        })
        .await
    }

    /// Publish done message.
    pub async fn done(&self, job_id: &JobId) -> QueueResult<()> {
        self.publish(&ProgressEvent {
            job_id: job_id.clone(),
            update: ProgressUpdate::Done { progress: 100 },
        })
        .await
    }

    /// Publish error message.
    pub async fn error(&self, job_id: &JobId, message: impl Into<String>) -> QueueResult<()> {
        self.publish(&ProgressEvent {
            job_id: job_id.clone(),
            update: ProgressUpdate::Error {
                message: message.into(),
            },
        })
        .await
    }

    /// Subscribe to progress events for a job.
    pub async fn subscribe(
        &self,
        job_id: &JobId,
    ) -> QueueResult<std::pin::Pin<Box<dyn futures_util::Stream<Item = ProgressEvent> + Send>>> {
        use futures_util::StreamExt;

        let mut pubsub = self.client.get_async_pubsub().await?;
        let channel = Self::channel_name(job_id);

        pubsub.subscribe(&channel).await?;

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            let payload: String = msg.get_payload().ok()?;
            serde_json::from_str(&payload).ok()
        });

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_future_is_send() {
        fn require_send<T: Send>(_: T) {}

        let channel = ProgressChannel::new("redis://localhost:6379").unwrap();
        let id = JobId::from_string("j1".to_string());
        require_send(channel.stage(&id, JobState::Probing, 10));
        require_send(channel.done(&id));
    }

    #[test]
    fn test_channel_name() {
        let id = JobId::from_string("abc123".to_string());
        assert_eq!(ProgressChannel::channel_name(&id), "progress:abc123");
    }

    #[test]
    fn test_event_serialization() {
        let event = ProgressEvent {
            job_id: JobId::from_string("j1".to_string()),
            update: ProgressUpdate::Stage {
                state: JobState::Probing,
                progress: 10,
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"stage\""));
        assert!(json.contains("\"progress\":10"));

        let back: ProgressEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            back.update,
            ProgressUpdate::Stage { progress: 10, .. }
        ));
    }
}
