//! Job queue using Redis Streams.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::message::JobMessage;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Stream name for jobs
    pub stream_name: String,
    /// Consumer group name
    pub consumer_group: String,
    /// Dead letter queue stream name
    pub dlq_stream_name: String,
    /// Max redeliveries before DLQ
    pub max_retries: u32,
    /// Idle time before a pending message may be claimed
    pub visibility_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "clipkit:jobs".to_string(),
            consumer_group: "clipkit:workers".to_string(),
            dlq_stream_name: "clipkit:dlq".to_string(),
            max_retries: 3,
            visibility_timeout: Duration::from_secs(600),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            stream_name: std::env::var("QUEUE_STREAM")
                .unwrap_or_else(|_| "clipkit:jobs".to_string()),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or_else(|_| "clipkit:workers".to_string()),
            dlq_stream_name: std::env::var("QUEUE_DLQ_STREAM")
                .unwrap_or_else(|_| "clipkit:dlq".to_string()),
            max_retries: std::env::var("QUEUE_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            visibility_timeout: Duration::from_secs(
                std::env::var("QUEUE_VISIBILITY_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
        }
    }
}

/// Job queue client.
pub struct JobQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl JobQueue {
    /// Create a new job queue.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    /// Initialize the queue (create consumer group if not exists).
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!(group = %self.config.consumer_group, "created consumer group"),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(group = %self.config.consumer_group, "consumer group already exists");
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Enqueue a job, rejecting duplicates within the dedup window.
    pub async fn enqueue(&self, message: &JobMessage) -> QueueResult<String> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let payload = serde_json::to_string(message)?;
        let idempotency_key = message.idempotency_key();

        // Explicit commands throughout this module: the generic
        // `AsyncCommands` futures are not `Send` when awaited from a
        // spawned task.
        let dedup_key = format!("clipkit:dedup:{}", idempotency_key);
        let exists: bool = redis::cmd("EXISTS")
            .arg(&dedup_key)
            .query_async(&mut conn)
            .await?;
        if exists {
            warn!(key = %idempotency_key, "duplicate job rejected");
            return Err(QueueError::DuplicateJob(idempotency_key));
        }

        let message_id: String = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("key")
            .arg(&idempotency_key)
            .query_async(&mut conn)
            .await?;

        // Dedup window: 1 hour
        redis::cmd("SET")
            .arg(&dedup_key)
            .arg("1")
            .arg("EX")
            .arg(3600)
            .query_async::<()>(&mut conn)
            .await?;

        info!(job_id = %message.job_id, %message_id, "enqueued job");
        Ok(message_id)
    }

    /// Acknowledge a job (mark as completed).
    pub async fn ack(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        debug!(%message_id, "acknowledged job");
        Ok(())
    }

    /// Move a job to the dead letter queue.
    pub async fn dlq(&self, message_id: &str, message: &JobMessage, error: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let payload = serde_json::to_string(message)?;

        redis::cmd("XADD")
            .arg(&self.config.dlq_stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("error")
            .arg(error)
            .arg("original_id")
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        self.ack(message_id).await?;

        warn!(job_id = %message.job_id, %error, "moved job to DLQ");
        Ok(())
    }

    /// Get queue length.
    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = redis::cmd("XLEN")
            .arg(&self.config.stream_name)
            .query_async(&mut conn)
            .await?;
        Ok(len)
    }

    /// Get DLQ length.
    pub async fn dlq_len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = redis::cmd("XLEN")
            .arg(&self.config.dlq_stream_name)
            .query_async(&mut conn)
            .await?;
        Ok(len)
    }

    /// Consume new jobs, blocking up to `block_ms`.
    pub async fn consume(
        &self,
        consumer_name: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, JobMessage)>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">")
            .query_async(&mut conn)
            .await?;

        let mut jobs = Vec::new();

        for stream_key in result.keys {
            for entry in stream_key.ids {
                let message_id = entry.id.clone();

                if let Some(redis::Value::BulkString(payload)) = entry.map.get("job") {
                    let payload_str = String::from_utf8_lossy(payload);
                    match serde_json::from_str::<JobMessage>(&payload_str) {
                        Ok(message) => {
                            debug!(job_id = %message.job_id, "consumed job");
                            jobs.push((message_id, message));
                        }
                        Err(e) => {
                            warn!(%message_id, %e, "failed to parse job payload");
                            // Ack malformed messages to prevent redelivery loops
                            self.ack(&message_id).await.ok();
                        }
                    }
                }
            }
        }

        Ok(jobs)
    }

    /// Claim pending jobs idle longer than `min_idle_ms`.
    ///
    /// This recovers jobs held by crashed workers.
    pub async fn claim_pending(
        &self,
        consumer_name: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, JobMessage)>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let pending: redis::streams::StreamPendingReply = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .query_async(&mut conn)
            .await?;

        if pending.count() == 0 {
            return Ok(Vec::new());
        }

        let result: redis::streams::StreamClaimReply = redis::cmd("XCLAIM")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg(min_idle_ms)
            .arg("0-0")
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        let mut jobs = Vec::new();

        for entry in result.ids {
            let message_id = entry.id.clone();

            if let Some(redis::Value::BulkString(payload)) = entry.map.get("job") {
                let payload_str = String::from_utf8_lossy(payload);
                match serde_json::from_str::<JobMessage>(&payload_str) {
                    Ok(message) => {
                        info!(job_id = %message.job_id, "claimed pending job");
                        jobs.push((message_id, message));
                    }
                    Err(e) => {
                        warn!(%message_id, %e, "failed to parse claimed job payload");
                        self.ack(&message_id).await.ok();
                    }
                }
            }
        }

        Ok(jobs)
    }

    /// Clear the dedup key so the same source can be resubmitted.
    pub async fn clear_dedup(&self, message: &JobMessage) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let dedup_key = format!("clipkit:dedup:{}", message.idempotency_key());
        redis::cmd("DEL")
            .arg(&dedup_key)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    /// Increment redelivery count for a message.
    pub async fn increment_retry(&self, message_id: &str) -> QueueResult<u32> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let key = format!("clipkit:retry:{}", message_id);
        let count: u32 = redis::cmd("INCR")
            .arg(&key)
            .query_async(&mut conn)
            .await?;
        redis::cmd("EXPIRE")
            .arg(&key)
            .arg(86400)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(count)
    }

    /// Max redeliveries from config.
    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Visibility timeout from config.
    pub fn visibility_timeout(&self) -> Duration {
        self.config.visibility_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipkit_models::JobOptions;

    #[test]
    fn test_config_from_defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.stream_name, "clipkit:jobs");
        assert_eq!(config.max_retries, 3);
    }

    // Compile-time check: every future the executor awaits inside a spawned
    // job task must be Send.
    #[test]
    fn test_queue_futures_are_send() {
        fn require_send<T: Send>(_: T) {}

        let queue = JobQueue::new(QueueConfig::default()).unwrap();
        let message = JobMessage::new("uploads/v1.mp4", "user-1", JobOptions::default());

        require_send(queue.consume("worker-1", 0, 1));
        require_send(queue.claim_pending("worker-1", 1000, 5));
        require_send(queue.ack("1-0"));
        require_send(queue.dlq("1-0", &message, "boom"));
        require_send(queue.increment_retry("1-0"));
        require_send(queue.clear_dedup(&message));
        require_send(queue.enqueue(&message));
    }
}
