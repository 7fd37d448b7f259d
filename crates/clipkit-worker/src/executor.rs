//! Job executor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use clipkit_media::{CancelSource, CancelToken};
use clipkit_queue::{JobMessage, JobQueue};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::pipeline::Pipeline;

/// Pulls jobs off the queue and runs them through the pipeline.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<JobQueue>,
    pipeline: Arc<Pipeline>,
    job_semaphore: Arc<Semaphore>,
    shutdown: tokio::sync::watch::Sender<bool>,
    cancel: Arc<CancelSource>,
    cancel_token: CancelToken,
    consumer_name: String,
}

impl JobExecutor {
    /// Create a new job executor.
    pub fn new(config: WorkerConfig, queue: JobQueue, pipeline: Pipeline) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = tokio::sync::watch::channel(false);
        let (cancel, cancel_token) = CancelSource::new();
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            queue: Arc::new(queue),
            pipeline: Arc::new(pipeline),
            job_semaphore,
            shutdown,
            cancel: Arc::new(cancel),
            cancel_token,
            consumer_name,
        }
    }

    /// Start the executor.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            consumer = %self.consumer_name,
            max_jobs = self.config.max_concurrent_jobs,
            "starting job executor"
        );

        self.queue.init().await?;

        let mut shutdown_rx = self.shutdown.subscribe();

        // Periodically reclaim jobs orphaned by crashed workers
        let queue_clone = Arc::clone(&self.queue);
        let pipeline_clone = Arc::clone(&self.pipeline);
        let consumer_name = self.consumer_name.clone();
        let semaphore_clone = Arc::clone(&self.job_semaphore);
        let cancel_token = self.cancel_token.clone();
        let claim_interval = self.config.claim_interval;
        // A message idle past the visibility timeout belongs to a dead worker
        let claim_min_idle = self.queue.visibility_timeout().as_millis() as u64;
        let mut shutdown_rx_claim = self.shutdown.subscribe();

        let claim_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(claim_interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx_claim.changed() => {
                        if *shutdown_rx_claim.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        match queue_clone.claim_pending(&consumer_name, claim_min_idle, 5).await {
                            Ok(jobs) if !jobs.is_empty() => {
                                info!(count = jobs.len(), "claimed pending jobs");
                                for (message_id, message) in jobs {
                                    let pipeline = Arc::clone(&pipeline_clone);
                                    let queue = Arc::clone(&queue_clone);
                                    let cancel = cancel_token.clone();
                                    let Ok(permit) = semaphore_clone.clone().acquire_owned().await else {
                                        return;
                                    };
                                    tokio::spawn(async move {
                                        let _permit = permit;
                                        Self::execute_job(pipeline, queue, message_id, message, cancel).await;
                                    });
                                }
                            }
                            Ok(_) => {}
                            Err(e) => {
                                warn!(%e, "failed to claim pending jobs");
                            }
                        }
                    }
                }
            }
        });

        // Main consumption loop
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume_jobs() => {
                    if let Err(e) = result {
                        error!(%e, "error consuming jobs");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();

        info!("waiting for in-flight jobs to complete");
        if tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs())
            .await
            .is_err()
        {
            warn!("shutdown timeout reached, cancelling in-flight jobs");
            self.cancel.cancel();
            let _ = tokio::time::timeout(Duration::from_secs(10), self.wait_for_jobs()).await;
        }

        info!("job executor stopped");
        Ok(())
    }

    /// Consume and dispatch jobs from the queue.
    async fn consume_jobs(&self) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let jobs = self
            .queue
            .consume(&self.consumer_name, 1000, available.min(5))
            .await?;

        if jobs.is_empty() {
            return Ok(());
        }

        debug!(count = jobs.len(), "consumed jobs from queue");

        for (message_id, message) in jobs {
            let pipeline = Arc::clone(&self.pipeline);
            let queue = Arc::clone(&self.queue);
            let cancel = self.cancel_token.clone();
            let permit = self
                .job_semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::job_failed("semaphore closed"))?;

            tokio::spawn(async move {
                let _permit = permit;
                Self::execute_job(pipeline, queue, message_id, message, cancel).await;
            });
        }

        Ok(())
    }

    /// Execute a single job with retry counting and DLQ handling.
    async fn execute_job(
        pipeline: Arc<Pipeline>,
        queue: Arc<JobQueue>,
        message_id: String,
        message: JobMessage,
        cancel: CancelToken,
    ) {
        let job_id = message.job_id.clone();
        info!(%job_id, "executing job");

        match pipeline.run(&message, &cancel).await {
            Ok(outcome) => {
                info!(%job_id, clips = outcome.record.clips.len(), "job completed");
                if let Err(e) = queue.ack(&message_id).await {
                    error!(%job_id, %e, "failed to ack job");
                }
                if let Err(e) = queue.clear_dedup(&message).await {
                    warn!(%job_id, %e, "failed to clear dedup key");
                }
            }
            Err(e) if e.is_cancelled() => {
                // Leave the message pending so another worker picks it up
                warn!(%job_id, "job cancelled mid-flight, leaving for redelivery");
            }
            Err(e) => {
                error!(%job_id, %e, "job failed");

                let retry_count = queue.increment_retry(&message_id).await.unwrap_or(u32::MAX);
                let max_retries = queue.max_retries();

                if retry_count >= max_retries || !e.is_retryable() {
                    warn!(%job_id, retry_count, "moving job to DLQ");
                    if let Err(dlq_err) = queue.dlq(&message_id, &message, &e.to_string()).await {
                        error!(%job_id, %dlq_err, "failed to move job to DLQ");
                    }
                    if let Err(e) = queue.clear_dedup(&message).await {
                        warn!(%job_id, %e, "failed to clear dedup key");
                    }
                } else {
                    info!(%job_id, attempt = retry_count, max_retries, "job will be redelivered");
                }
            }
        }
    }

    /// Wait for all in-flight jobs to complete.
    async fn wait_for_jobs(&self) {
        loop {
            if self.job_semaphore.available_permits() == self.config.max_concurrent_jobs {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}
