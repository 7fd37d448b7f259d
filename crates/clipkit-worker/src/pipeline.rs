//! The clip generation pipeline.
//!
//! Drives one job through probe, transcript, detection and extraction,
//! advancing the job state machine and reporting progress at each stage
//! boundary. Cancellation is honored between stages and kills any running
//! children mid-stage.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use tracing::{info, warn};

use clipkit_media::{
    apply_effect_chain, extract_clip, generate_thumbnail, probe_media, remove_dir_best_effort,
    CancelToken, ClipRange, MediaError, ProcessRunner, ThumbnailOptions,
};
use clipkit_models::{Clip, ClipStatus, Highlight, Job, JobRecord, JobState};
use clipkit_queue::JobMessage;
use clipkit_storage::{content_type_for, ArtifactStore};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::highlights::HighlightDetector;
use crate::logging::JobLogger;
use crate::progress::ProgressSink;
use crate::retry::{retry_with_policy, RetryPolicy};
use crate::transcript::{acquire_transcript, TranscriptSource};

/// Everything one pipeline run produced.
#[derive(Debug)]
pub struct PipelineOutcome {
    /// The job in its terminal state
    pub job: Job,
    /// All clips, usable and failed, in highlight ranking order
    pub clips: Vec<Clip>,
    /// The uploaded result manifest
    pub record: JobRecord,
}

/// The pipeline with its collaborators injected.
pub struct Pipeline {
    config: WorkerConfig,
    runner: Arc<dyn ProcessRunner>,
    store: Arc<dyn ArtifactStore>,
    transcriber: Arc<dyn TranscriptSource>,
    detector: Arc<dyn HighlightDetector>,
    progress: Arc<dyn ProgressSink>,
    retry: RetryPolicy,
}

impl Pipeline {
    pub fn new(
        config: WorkerConfig,
        runner: Arc<dyn ProcessRunner>,
        store: Arc<dyn ArtifactStore>,
        transcriber: Arc<dyn TranscriptSource>,
        detector: Arc<dyn HighlightDetector>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            config,
            runner,
            store,
            transcriber,
            detector,
            progress,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Storage prefix every artifact of this job lives under.
    fn artifact_prefix(message: &JobMessage) -> String {
        format!("jobs/{}/{}", message.owner_id, message.job_id)
    }

    /// Run one job to a terminal state.
    ///
    /// On failure the job is marked `Failed`, its error event is published
    /// and its artifacts are cleaned up before the error is returned.
    pub async fn run(&self, message: &JobMessage, cancel: &CancelToken) -> WorkerResult<PipelineOutcome> {
        let mut job = Job::with_id(
            message.job_id.clone(),
            message.source_key.clone(),
            message.owner_id.clone(),
        );
        let logger = JobLogger::new(&job.id, "pipeline");
        logger.log_start(&format!("source {}", message.source_key));

        let work_dir = PathBuf::from(&self.config.work_dir).join(job.id.as_str());

        let result = match tokio::time::timeout(
            self.config.job_timeout,
            self.run_stages(&mut job, message, &work_dir, cancel),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(WorkerError::job_failed(format!(
                "job exceeded {}s time limit",
                self.config.job_timeout.as_secs()
            ))),
        };

        // The work dir is scratch space either way
        remove_dir_best_effort(&work_dir).await;

        match result {
            Ok((clips, record)) => {
                logger.log_completion(&format!("{} usable clips", record.clips.len()));
                self.progress.stage(&job.id, JobState::Completed, 100).await;
                self.progress.done(&job.id).await;
                Ok(PipelineOutcome { job, clips, record })
            }
            Err(e) => {
                logger.log_error(&e.to_string());
                job.fail(e.to_string());
                self.progress.error(&job.id, &e.to_string()).await;
                // Remove any half-uploaded artifacts
                if let Err(cleanup_err) = self
                    .store
                    .delete_prefix(&Self::artifact_prefix(message))
                    .await
                {
                    warn!(job_id = %job.id, %cleanup_err, "failed to clean up artifacts");
                }
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        job: &mut Job,
        message: &JobMessage,
        work_dir: &Path,
        cancel: &CancelToken,
    ) -> WorkerResult<(Vec<Clip>, JobRecord)> {
        message
            .options
            .validate_effects()
            .map_err(|e| WorkerError::job_failed(e.to_string()))?;

        tokio::fs::create_dir_all(work_dir).await?;

        // Probing
        self.advance(job, JobState::Probing, cancel).await?;

        let source_path = work_dir.join("source.mp4");
        retry_with_policy(
            &self.retry,
            "fetch_source",
            |e: &clipkit_storage::StorageError| e.is_transient(),
            || self.store.fetch(&message.source_key, &source_path),
        )
        .await?;

        let info = retry_with_policy(
            &self.retry,
            "probe",
            |e: &MediaError| e.is_transient(),
            || probe_media(&self.runner, &source_path, cancel),
        )
        .await?;
        job.set_duration(info.duration_seconds);
        let duration = info.duration_seconds;
        info!(job_id = %job.id, duration, "probed source");

        // Transcribing
        self.advance(job, JobState::Transcribing, cancel).await?;
        let transcript = acquire_transcript(self.transcriber.as_ref(), &source_path, duration).await;

        // Detection
        self.advance(job, JobState::DetectingHighlights, cancel).await?;
        let highlights = self.detector.detect(&transcript, duration, &message.options);
        if highlights.is_empty() {
            return Err(WorkerError::NoUsableClips);
        }
        info!(job_id = %job.id, count = highlights.len(), "detected highlights");

        // Extraction
        self.advance(job, JobState::ExtractingClips, cancel).await?;
        let clips = self
            .extract_all(job, message, &highlights, &source_path, work_dir, cancel)
            .await?;

        if cancel.is_cancelled() {
            return Err(MediaError::Cancelled.into());
        }

        let records: Vec<_> = clips.iter().filter_map(Clip::to_record).collect();
        if records.is_empty() {
            return Err(WorkerError::NoUsableClips);
        }

        let record = JobRecord {
            status: JobState::Completed,
            duration: Some(duration),
            error: None,
            clips: records,
        };

        let manifest = serde_json::to_vec_pretty(&record)
            .map_err(|e| WorkerError::job_failed(e.to_string()))?;
        self.store
            .store_bytes(
                manifest,
                &format!("{}/results.json", Self::artifact_prefix(message)),
                "application/json",
            )
            .await?;

        job.advance_to(JobState::Completed);
        Ok((clips, record))
    }

    /// Extract, post-process and upload every clip, bounded by
    /// `max_clip_parallel`. Results come back in highlight ranking order
    /// regardless of completion order.
    async fn extract_all(
        &self,
        job: &Job,
        message: &JobMessage,
        highlights: &[Highlight],
        source_path: &Path,
        work_dir: &Path,
        cancel: &CancelToken,
    ) -> WorkerResult<Vec<Clip>> {
        let total = highlights.len();
        let completed = AtomicUsize::new(0);
        let duration = job.duration_seconds.unwrap_or(0.0);

        // The futures are built ahead of the stream: a `.map` closure inside
        // the stream is checked under a higher-ranked lifetime and fails the
        // `Send` bound (rust-lang/rust#102211). They only do work once polled,
        // which `buffer_unordered` still bounds.
        let clip_futures: Vec<_> = highlights
            .iter()
            .enumerate()
            .map(|(index, highlight)| {
                let completed = &completed;
                async move {
                    let mut clip = Clip::pending(&job.id, index, highlight);
                    match self
                        .process_one_clip(message, highlight, index, duration, source_path, work_dir, cancel)
                        .await
                    {
                        Ok(done) => clip = done,
                        Err(e) if e.is_cancelled() => clip.mark_failed("cancelled"),
                        Err(e) => {
                            warn!(job_id = %job.id, clip = index, error = %e, "clip failed");
                            clip.mark_failed(e.to_string());
                        }
                    }

                    let done_count = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    let progress = 35 + ((65 * done_count) / total) as u8;
                    self.progress
                        .stage(&job.id, JobState::ExtractingClips, progress)
                        .await;
                    if clip.status.is_usable() {
                        self.progress.clip_ready(&job.id, index, total).await;
                    }
                    clip
                }
            })
            .collect();

        let mut clips: Vec<Clip> = stream::iter(clip_futures)
            .buffer_unordered(self.config.max_clip_parallel.max(1))
            .collect()
            .await;

        clips.sort_by_key(|c| c.highlight_index);
        Ok(clips)
    }

    async fn process_one_clip(
        &self,
        message: &JobMessage,
        highlight: &Highlight,
        index: usize,
        duration: f64,
        source_path: &Path,
        work_dir: &Path,
        cancel: &CancelToken,
    ) -> WorkerResult<Clip> {
        let options = &message.options;
        // Detector output is already a final extraction window; degenerate
        // ranges are rejected here before any process is spawned.
        let range = ClipRange::new(highlight.start_seconds, highlight.end_seconds.min(duration))?;

        let mut clip = Clip::pending(&message.job_id, index, highlight);
        clip.duration_seconds = range.duration();

        let clip_path = work_dir.join(format!("clips/clip_{index}.mp4"));
        if let Some(parent) = clip_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        retry_with_policy(
            &self.retry,
            "extract_clip",
            |e: &MediaError| e.is_transient(),
            || {
                extract_clip(
                    &self.runner,
                    source_path,
                    &clip_path,
                    range,
                    &options.encoding,
                    Some(self.config.process_timeout_secs),
                    cancel,
                )
            },
        )
        .await?;
        clip.status = ClipStatus::Extracted;

        // Effects: a broken step ships the last good intermediate
        let mut final_path = clip_path.clone();
        if !options.effects.is_empty() {
            let outcome = apply_effect_chain(
                &self.runner,
                &clip_path,
                &options.effects,
                Some(self.config.process_timeout_secs),
                cancel,
            )
            .await?;
            if let Some(failed) = &outcome.failed {
                warn!(
                    job_id = %message.job_id,
                    clip = index,
                    effect = %failed.label,
                    error = %failed.error,
                    "effect chain truncated"
                );
            }
            clip.effects_applied = outcome.applied;
            final_path = outcome.output;
            clip.status = ClipStatus::EffectsApplied;
        }

        let prefix = Self::artifact_prefix(message);
        let stored = self
            .store
            .store_file(
                &final_path,
                &format!("{prefix}/clips/clip_{index}.mp4"),
                content_type_for(&final_path),
            )
            .await?;
        clip.storage_key = Some(stored.key);
        clip.url = Some(stored.url);

        // Thumbnails are best effort; absence is recorded, not fatal
        if !options.skip_thumbnails {
            match self.make_thumbnail(&final_path, work_dir, index, clip.duration_seconds, cancel).await {
                Ok(thumb_path) => {
                    match self
                        .store
                        .store_file(
                            &thumb_path,
                            &format!("{prefix}/thumbs/clip_{index}.jpg"),
                            "image/jpeg",
                        )
                        .await
                    {
                        Ok(stored) => {
                            clip.thumbnail_url = Some(stored.url);
                            clip.status = ClipStatus::ThumbnailReady;
                        }
                        Err(e) => {
                            warn!(clip = index, error = %e, "thumbnail upload failed")
                        }
                    }
                }
                Err(e) if matches!(e, WorkerError::Media(MediaError::Cancelled)) => {
                    return Err(e);
                }
                Err(e) => warn!(clip = index, error = %e, "thumbnail generation failed"),
            }
        }

        Ok(clip)
    }

    async fn make_thumbnail(
        &self,
        clip_path: &Path,
        work_dir: &Path,
        index: usize,
        clip_duration: f64,
        cancel: &CancelToken,
    ) -> WorkerResult<PathBuf> {
        let thumb_path = work_dir.join(format!("thumbs/clip_{index}.jpg"));
        if let Some(parent) = thumb_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        generate_thumbnail(
            &self.runner,
            clip_path,
            &thumb_path,
            clip_duration,
            ThumbnailOptions::default(),
            Some(self.config.process_timeout_secs),
            cancel,
        )
        .await?;
        Ok(thumb_path)
    }

    /// Advance the state machine at a stage boundary.
    ///
    /// Cancellation is checked here, so a cancelled job stops before the
    /// next stage spawns anything.
    async fn advance(&self, job: &mut Job, next: JobState, cancel: &CancelToken) -> WorkerResult<()> {
        if cancel.is_cancelled() {
            return Err(MediaError::Cancelled.into());
        }
        if !job.advance_to(next) {
            return Err(WorkerError::job_failed(format!(
                "illegal transition {} -> {}",
                job.state, next
            )));
        }
        self.progress.stage(&job.id, next, next.base_progress()).await;
        Ok(())
    }
}

