//! End-to-end pipeline tests over fake collaborators.
//!
//! Every external seam (process spawning, storage, transcription, progress)
//! is replaced with a recording fake, so these exercise the full job flow
//! without ffmpeg, Redis or the network.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use clipkit_media::{
    CancelSource, CancelToken, MediaError, MediaResult, ProcessOutput, ProcessRequest,
    ProcessRunner,
};
use clipkit_models::{
    ClipStatus, EffectSpec, FilterEffect, Highlight, JobOptions, JobState, Transcript,
    TranscriptSegment,
};
use clipkit_queue::JobMessage;
use clipkit_storage::LocalDiskStore;
use clipkit_worker::{
    HighlightDetector, KeywordScorer, Pipeline, ProgressSink, RetryPolicy, TranscriptSource,
    WorkerConfig, WorkerError, WorkerResult,
};

fn probe_json(duration: f64) -> String {
    format!(
        r#"{{"format":{{"duration":"{duration}"}},"streams":[
            {{"codec_type":"video","codec_name":"h264","width":1920,"height":1080,"r_frame_rate":"30/1"}},
            {{"codec_type":"audio","codec_name":"aac"}}]}}"#
    )
}

/// Records every spawn request and fabricates outputs instead of running
/// anything.
#[derive(Default)]
struct FakeRunner {
    calls: Mutex<Vec<ProcessRequest>>,
    probe_json: Option<String>,
    fail_extract: bool,
    // Number of leading extract attempts that time out before succeeding
    flaky_extracts: AtomicUsize,
    fail_effect_step: Option<usize>,
    fail_thumbnail: bool,
}

impl FakeRunner {
    fn with_duration(duration: f64) -> Self {
        Self {
            probe_json: Some(probe_json(duration)),
            ..Default::default()
        }
    }

    fn count(&self, program: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.program == program)
            .count()
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(&self, request: ProcessRequest, cancel: &CancelToken) -> MediaResult<ProcessOutput> {
        if cancel.is_cancelled() {
            return Err(MediaError::Cancelled);
        }
        self.calls.lock().unwrap().push(request.clone());

        if request.program == "ffprobe" {
            return match &self.probe_json {
                Some(json) => Ok(ProcessOutput {
                    stdout: json.clone(),
                    stderr: String::new(),
                }),
                None => Err(MediaError::process_failed(
                    "ffprobe",
                    "moov atom not found",
                    Some(1),
                )),
            };
        }

        let output = request.args.last().cloned().unwrap_or_default();
        let is_thumbnail = request.args.iter().any(|a| a == "-q:v");
        let is_extract = request.args.iter().any(|a| a == "-movflags");

        if is_extract && self.fail_extract {
            return Err(MediaError::process_failed("ffmpeg", "encoder failed", Some(1)));
        }
        if is_extract && self.flaky_extracts.load(Ordering::SeqCst) > 0 {
            self.flaky_extracts.fetch_sub(1, Ordering::SeqCst);
            return Err(MediaError::Timeout(300));
        }
        if is_thumbnail && self.fail_thumbnail {
            return Err(MediaError::process_failed("ffmpeg", "no frame decoded", Some(1)));
        }
        if let Some(step) = self.fail_effect_step {
            if !is_thumbnail && !is_extract && output.contains(&format!("_{step}_")) {
                return Err(MediaError::process_failed("ffmpeg", "filter error", Some(1)));
            }
        }

        std::fs::write(&output, b"fake media")?;
        Ok(ProcessOutput::default())
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Event {
    Stage(JobState, u8),
    ClipReady(usize),
    Done,
    Error(String),
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProgressSink for RecordingSink {
    async fn stage(&self, _job_id: &clipkit_models::JobId, state: JobState, progress: u8) {
        self.events.lock().unwrap().push(Event::Stage(state, progress));
    }

    async fn clip_ready(&self, _job_id: &clipkit_models::JobId, clip_index: usize, _total: usize) {
        self.events.lock().unwrap().push(Event::ClipReady(clip_index));
    }

    async fn done(&self, _job_id: &clipkit_models::JobId) {
        self.events.lock().unwrap().push(Event::Done);
    }

    async fn error(&self, _job_id: &clipkit_models::JobId, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Error(message.to_string()));
    }
}

struct FixedTranscriber(Vec<TranscriptSegment>);

#[async_trait]
impl TranscriptSource for FixedTranscriber {
    async fn transcribe(&self, _path: &Path, _duration: f64) -> WorkerResult<Transcript> {
        Ok(Transcript::new(self.0.clone()))
    }
}

struct FailingTranscriber;

#[async_trait]
impl TranscriptSource for FailingTranscriber {
    async fn transcribe(&self, _path: &Path, _duration: f64) -> WorkerResult<Transcript> {
        Err(WorkerError::transcription_failed("stt unavailable"))
    }
}

struct HangingTranscriber;

#[async_trait]
impl TranscriptSource for HangingTranscriber {
    async fn transcribe(&self, _path: &Path, _duration: f64) -> WorkerResult<Transcript> {
        std::future::pending().await
    }
}

struct FixedDetector(Vec<Highlight>);

impl HighlightDetector for FixedDetector {
    fn detect(&self, _t: &Transcript, _d: f64, _o: &JobOptions) -> Vec<Highlight> {
        self.0.clone()
    }
}

/// Everything a pipeline test needs, with handles kept on the fakes.
struct Harness {
    runner: Arc<FakeRunner>,
    sink: Arc<RecordingSink>,
    store_root: TempDir,
    work_root: TempDir,
    pipeline: Pipeline,
}

impl Harness {
    async fn new(
        runner: FakeRunner,
        transcriber: Arc<dyn TranscriptSource>,
        detector: Arc<dyn HighlightDetector>,
    ) -> Self {
        Self::new_with(runner, transcriber, detector, |_| {}).await
    }

    async fn new_with(
        runner: FakeRunner,
        transcriber: Arc<dyn TranscriptSource>,
        detector: Arc<dyn HighlightDetector>,
        configure: impl FnOnce(&mut WorkerConfig),
    ) -> Self {
        let store_root = TempDir::new().unwrap();
        let work_root = TempDir::new().unwrap();

        let store = LocalDiskStore::new(store_root.path());
        tokio::fs::create_dir_all(store_root.path().join("uploads"))
            .await
            .unwrap();
        tokio::fs::write(store_root.path().join("uploads/video.mp4"), b"source")
            .await
            .unwrap();

        // One clip at a time keeps event ordering deterministic
        let mut config = WorkerConfig {
            work_dir: work_root.path().to_string_lossy().to_string(),
            max_clip_parallel: 1,
            ..WorkerConfig::default()
        };
        configure(&mut config);

        let runner = Arc::new(runner);
        let sink = Arc::new(RecordingSink::default());

        let pipeline = Pipeline::new(
            config,
            runner.clone(),
            Arc::new(store),
            transcriber,
            detector,
            sink.clone(),
        );

        Self {
            runner,
            sink,
            store_root,
            work_root,
            pipeline,
        }
    }

    fn stored(&self, rel: &str) -> bool {
        self.store_root.path().join(rel).exists()
    }
}

fn segment(start: f64, end: f64, text: &str) -> TranscriptSegment {
    TranscriptSegment::new(start, end, text)
}

fn message(options: JobOptions) -> JobMessage {
    JobMessage::new("uploads/video.mp4", "user-1", options)
}

#[tokio::test]
async fn completes_job_from_keyword_highlights() {
    let harness = Harness::new(
        FakeRunner::with_duration(300.0),
        Arc::new(FixedTranscriber(vec![
            segment(10.0, 15.0, "This part is amazing! Unbelievable."),
            segment(150.0, 155.0, "The secret is finally revealed!"),
            segment(250.0, 252.0, "and then we walked home"),
        ])),
        Arc::new(KeywordScorer::new()),
    )
    .await;

    let options = JobOptions {
        desired_clip_count: 2,
        ..JobOptions::default()
    };
    let msg = message(options);

    let outcome = harness
        .pipeline
        .run(&msg, &CancelToken::none())
        .await
        .unwrap();

    assert_eq!(outcome.job.state, JobState::Completed);
    assert_eq!(outcome.clips.len(), 2);
    assert!(outcome.clips.iter().all(|c| c.status == ClipStatus::ThumbnailReady));
    assert_eq!(outcome.record.clips.len(), 2);
    assert_eq!(outcome.record.duration, Some(300.0));

    let prefix = format!("jobs/user-1/{}", msg.job_id);
    assert!(harness.stored(&format!("{prefix}/results.json")));
    assert!(harness.stored(&format!("{prefix}/clips/clip_0.mp4")));
    assert!(harness.stored(&format!("{prefix}/clips/clip_1.mp4")));
    assert!(harness.stored(&format!("{prefix}/thumbs/clip_0.jpg")));

    let events = harness.sink.events();
    assert_eq!(events[0], Event::Stage(JobState::Probing, 10));
    assert!(events.contains(&Event::Stage(JobState::Transcribing, 25)));
    assert!(events.contains(&Event::Stage(JobState::DetectingHighlights, 35)));
    assert!(events.contains(&Event::Stage(JobState::ExtractingClips, 35)));
    assert!(events.contains(&Event::ClipReady(0)));
    assert!(events.contains(&Event::ClipReady(1)));
    assert_eq!(events[events.len() - 2], Event::Stage(JobState::Completed, 100));
    assert_eq!(events[events.len() - 1], Event::Done);

    // Extraction progress interpolates from 35 and never moves backwards
    let extraction: Vec<u8> = events
        .iter()
        .filter_map(|e| match e {
            Event::Stage(JobState::ExtractingClips, p) => Some(*p),
            _ => None,
        })
        .collect();
    assert!(extraction.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(*extraction.last().unwrap(), 100);
}

#[tokio::test]
async fn degraded_transcript_still_completes() {
    let harness = Harness::new(
        FakeRunner::with_duration(300.0),
        Arc::new(FailingTranscriber),
        Arc::new(KeywordScorer::new()),
    )
    .await;

    let options = JobOptions {
        desired_clip_count: 3,
        ..JobOptions::default()
    };
    let msg = message(options);

    let outcome = harness
        .pipeline
        .run(&msg, &CancelToken::none())
        .await
        .unwrap();

    // Evenly spaced fallback windows, one per requested clip
    assert_eq!(outcome.job.state, JobState::Completed);
    assert_eq!(outcome.record.clips.len(), 3);
}

#[tokio::test]
async fn unreadable_source_fails_before_any_extraction() {
    let harness = Harness::new(
        FakeRunner::default(), // ffprobe fails
        Arc::new(FailingTranscriber),
        Arc::new(KeywordScorer::new()),
    )
    .await;

    let msg = message(JobOptions::default());
    let err = harness
        .pipeline
        .run(&msg, &CancelToken::none())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WorkerError::Media(MediaError::UnreadableMedia(_))
    ));
    // An unreadable file is not transient, so the probe ran exactly once
    // and no ffmpeg was ever spawned
    assert_eq!(harness.runner.count("ffprobe"), 1);
    assert_eq!(harness.runner.count("ffmpeg"), 0);

    let events = harness.sink.events();
    assert!(matches!(events.last(), Some(Event::Error(_))));
    assert!(!events.contains(&Event::Done));
}

#[tokio::test]
async fn broken_effect_ships_last_good_intermediate() {
    let runner = FakeRunner {
        fail_effect_step: Some(1),
        ..FakeRunner::with_duration(300.0)
    };
    let harness = Harness::new(
        runner,
        Arc::new(FailingTranscriber),
        Arc::new(FixedDetector(vec![Highlight::new(
            30.0, 40.0, 0.9, "big moment",
        )])),
    )
    .await;

    let options = JobOptions {
        desired_clip_count: 1,
        effects: vec![
            EffectSpec::Filter(FilterEffect::Sepia),
            EffectSpec::Filter(FilterEffect::Brightness { level: 120 }),
        ],
        ..JobOptions::default()
    };
    let msg = message(options);

    let outcome = harness
        .pipeline
        .run(&msg, &CancelToken::none())
        .await
        .unwrap();

    assert_eq!(outcome.job.state, JobState::Completed);
    let clip = &outcome.clips[0];
    assert_eq!(clip.effects_applied, vec!["sepia".to_string()]);
    assert!(clip.status.is_usable());
    assert!(clip.url.is_some());
}

#[tokio::test]
async fn thumbnail_failure_is_not_fatal() {
    let runner = FakeRunner {
        fail_thumbnail: true,
        ..FakeRunner::with_duration(300.0)
    };
    let harness = Harness::new(
        runner,
        Arc::new(FailingTranscriber),
        Arc::new(FixedDetector(vec![Highlight::new(
            30.0, 40.0, 0.8, "moment",
        )])),
    )
    .await;

    let options = JobOptions {
        desired_clip_count: 1,
        ..JobOptions::default()
    };
    let outcome = harness
        .pipeline
        .run(&message(options), &CancelToken::none())
        .await
        .unwrap();

    assert_eq!(outcome.job.state, JobState::Completed);
    let clip = &outcome.clips[0];
    assert!(clip.thumbnail_url.is_none());
    assert_eq!(clip.status, ClipStatus::Extracted);
    assert_eq!(outcome.record.clips.len(), 1);
    assert!(outcome.record.clips[0].thumbnail_url.is_none());
}

#[tokio::test]
async fn skip_thumbnails_spawns_no_thumbnail_process() {
    let harness = Harness::new(
        FakeRunner::with_duration(300.0),
        Arc::new(FailingTranscriber),
        Arc::new(FixedDetector(vec![Highlight::new(
            30.0, 40.0, 0.8, "moment",
        )])),
    )
    .await;

    let options = JobOptions {
        desired_clip_count: 1,
        skip_thumbnails: true,
        ..JobOptions::default()
    };
    let outcome = harness
        .pipeline
        .run(&message(options), &CancelToken::none())
        .await
        .unwrap();

    assert!(outcome.clips[0].thumbnail_url.is_none());
    let thumb_calls = harness
        .runner
        .calls
        .lock()
        .unwrap()
        .iter()
        .filter(|r| r.args.iter().any(|a| a == "-q:v"))
        .count();
    assert_eq!(thumb_calls, 0);
}

#[tokio::test]
async fn transient_extract_timeout_is_retried() {
    let runner = FakeRunner {
        flaky_extracts: AtomicUsize::new(1),
        ..FakeRunner::with_duration(300.0)
    };
    let harness = Harness::new(
        runner,
        Arc::new(FailingTranscriber),
        Arc::new(FixedDetector(vec![Highlight::new(
            30.0, 90.0, 0.9, "moment",
        )])),
    )
    .await;

    let pipeline = harness
        .pipeline
        .with_retry_policy(RetryPolicy::new(2, Duration::ZERO).without_jitter());

    let options = JobOptions {
        desired_clip_count: 1,
        skip_thumbnails: true,
        ..JobOptions::default()
    };
    let outcome = pipeline
        .run(&message(options), &CancelToken::none())
        .await
        .unwrap();

    assert_eq!(outcome.job.state, JobState::Completed);
    assert_eq!(outcome.record.clips.len(), 1);
    // The timed-out attempt plus the successful retry
    assert_eq!(harness.runner.count("ffmpeg"), 2);
}

#[tokio::test]
async fn reversed_window_never_spawns_ffmpeg() {
    let harness = Harness::new(
        FakeRunner::with_duration(300.0),
        Arc::new(FailingTranscriber),
        Arc::new(FixedDetector(vec![Highlight::new(
            50.0, 40.0, 0.9, "reversed",
        )])),
    )
    .await;

    let err = harness
        .pipeline
        .run(&message(JobOptions::default()), &CancelToken::none())
        .await
        .unwrap_err();

    // A degenerate window is rejected before extraction and never retried
    assert!(matches!(err, WorkerError::NoUsableClips));
    assert_eq!(harness.runner.count("ffmpeg"), 0);
}

#[tokio::test(start_paused = true)]
async fn job_exceeding_time_limit_fails() {
    let harness = Harness::new_with(
        FakeRunner::with_duration(300.0),
        Arc::new(HangingTranscriber),
        Arc::new(KeywordScorer::new()),
        |config| config.job_timeout = Duration::from_secs(5),
    )
    .await;

    let err = harness
        .pipeline
        .run(&message(JobOptions::default()), &CancelToken::none())
        .await
        .unwrap_err();

    assert!(matches!(err, WorkerError::JobFailed(_)));
    assert!(err.to_string().contains("time limit"));

    let events = harness.sink.events();
    assert!(matches!(events.last(), Some(Event::Error(_))));
    assert!(!events.contains(&Event::Done));
}

#[tokio::test]
async fn short_source_degraded_windows_do_not_overlap() {
    let harness = Harness::new(
        FakeRunner::with_duration(10.0),
        Arc::new(FailingTranscriber),
        Arc::new(KeywordScorer::new()),
    )
    .await;

    let options = JobOptions {
        desired_clip_count: 3,
        ..JobOptions::default()
    };
    let outcome = harness
        .pipeline
        .run(&message(options), &CancelToken::none())
        .await
        .unwrap();

    // Three even partitions of the 10s source, not three copies of it
    assert_eq!(outcome.clips.len(), 3);
    for clip in &outcome.clips {
        assert!((clip.duration_seconds - 10.0 / 3.0).abs() < 1e-6);
    }
}

#[tokio::test]
async fn all_extractions_failing_fails_the_job() {
    let runner = FakeRunner {
        fail_extract: true,
        ..FakeRunner::with_duration(300.0)
    };
    let harness = Harness::new(
        runner,
        Arc::new(FailingTranscriber),
        Arc::new(KeywordScorer::new()),
    )
    .await;

    let msg = message(JobOptions::default());
    let err = harness
        .pipeline
        .run(&msg, &CancelToken::none())
        .await
        .unwrap_err();

    assert!(matches!(err, WorkerError::NoUsableClips));
    // Failure cleans up anything uploaded under the job prefix and the
    // per-job work directory
    assert!(!harness.stored(&format!("jobs/user-1/{}", msg.job_id)));
    assert!(!harness
        .work_root
        .path()
        .join(msg.job_id.as_str())
        .exists());
    assert!(matches!(harness.sink.events().last(), Some(Event::Error(_))));
}

#[tokio::test]
async fn cancelled_job_spawns_nothing() {
    let harness = Harness::new(
        FakeRunner::with_duration(300.0),
        Arc::new(FailingTranscriber),
        Arc::new(KeywordScorer::new()),
    )
    .await;

    let (source, token) = CancelSource::new();
    source.cancel();

    let err = harness
        .pipeline
        .run(&message(JobOptions::default()), &token)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(harness.runner.calls.lock().unwrap().is_empty());
    assert!(!harness.sink.events().contains(&Event::Done));
}

#[tokio::test]
async fn clips_come_back_in_ranking_order() {
    let harness = Harness::new(
        FakeRunner::with_duration(300.0),
        Arc::new(FailingTranscriber),
        Arc::new(FixedDetector(vec![
            Highlight::new(200.0, 210.0, 0.9, "top"),
            Highlight::new(50.0, 55.0, 0.8, "second"),
            Highlight::new(120.0, 130.0, 0.7, "third"),
        ])),
    )
    .await;

    let options = JobOptions {
        desired_clip_count: 3,
        ..JobOptions::default()
    };
    let outcome = harness
        .pipeline
        .run(&message(options), &CancelToken::none())
        .await
        .unwrap();

    let order: Vec<usize> = outcome.clips.iter().map(|c| c.highlight_index).collect();
    assert_eq!(order, vec![0, 1, 2]);
    // Ranking order, not chronological order
    assert_eq!(outcome.clips[0].caption, "top");
    assert_eq!(outcome.clips[2].caption, "third");
}

#[tokio::test]
async fn invalid_effect_fails_before_any_work() {
    let harness = Harness::new(
        FakeRunner::with_duration(300.0),
        Arc::new(FailingTranscriber),
        Arc::new(KeywordScorer::new()),
    )
    .await;

    let options = JobOptions {
        effects: vec![EffectSpec::TextOverlay(
            clipkit_models::TextOverlayEffect::new(""),
        )],
        ..JobOptions::default()
    };
    let err = harness
        .pipeline
        .run(&message(options), &CancelToken::none())
        .await
        .unwrap_err();

    assert!(matches!(err, WorkerError::JobFailed(_)));
    assert!(harness.runner.calls.lock().unwrap().is_empty());
}
