//! Transcript acquisition.
//!
//! Transcripts come from an HTTP speech-to-text backend. Acquisition is
//! best effort: any failure degrades to a placeholder transcript instead of
//! failing the job, and downstream detection falls back to uniform windows.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use clipkit_models::{Transcript, TranscriptSegment};

use crate::error::{WorkerError, WorkerResult};

/// Where transcripts come from.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Transcribe the media file, returning timestamped segments.
    async fn transcribe(&self, media_path: &Path, duration_seconds: f64)
        -> WorkerResult<Transcript>;
}

/// Speech-to-text configuration.
#[derive(Debug, Clone)]
pub struct SttConfig {
    /// Transcription endpoint URL
    pub api_url: String,
    /// Bearer token
    pub api_key: String,
    /// Model name passed to the backend
    pub model: String,
    /// Request timeout
    pub timeout: Duration,
}

impl SttConfig {
    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        Ok(Self {
            api_url: std::env::var("STT_API_URL").unwrap_or_else(|_| {
                "https://api.openai.com/v1/audio/transcriptions".to_string()
            }),
            api_key: std::env::var("STT_API_KEY")
                .map_err(|_| WorkerError::config_error("STT_API_KEY not set"))?,
            model: std::env::var("STT_MODEL").unwrap_or_else(|_| "whisper-1".to_string()),
            timeout: Duration::from_secs(
                std::env::var("STT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
        })
    }
}

/// Segment shape returned by the backend's verbose JSON format.
#[derive(Debug, Deserialize)]
struct SttSegment {
    start: f64,
    end: f64,
    text: String,
}

#[derive(Debug, Deserialize)]
struct SttResponse {
    #[serde(default)]
    segments: Vec<SttSegment>,
}

/// HTTP speech-to-text client.
pub struct HttpTranscriber {
    client: reqwest::Client,
    config: SttConfig,
}

impl HttpTranscriber {
    pub fn new(config: SttConfig) -> WorkerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| WorkerError::config_error(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> WorkerResult<Self> {
        Self::new(SttConfig::from_env()?)
    }
}

#[async_trait]
impl TranscriptSource for HttpTranscriber {
    async fn transcribe(
        &self,
        media_path: &Path,
        _duration_seconds: f64,
    ) -> WorkerResult<Transcript> {
        let bytes = tokio::fs::read(media_path).await?;
        let file_name = media_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "media.mp4".to_string());

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.config.model.clone())
            .text("response_format", "verbose_json");

        info!(path = %media_path.display(), "requesting transcription");

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| WorkerError::transcription_failed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WorkerError::transcription_failed(format!(
                "backend returned {status}: {body}"
            )));
        }

        let parsed: SttResponse = response
            .json()
            .await
            .map_err(|e| WorkerError::transcription_failed(e.to_string()))?;

        if parsed.segments.is_empty() {
            return Err(WorkerError::transcription_failed("no segments returned"));
        }

        let segments = parsed
            .segments
            .into_iter()
            .map(|s| TranscriptSegment {
                start_seconds: s.start,
                end_seconds: s.end,
                text: s.text.trim().to_string(),
            })
            .collect();

        Ok(Transcript::new(segments))
    }
}

/// Acquire a transcript, degrading to a placeholder on any failure.
///
/// The degraded transcript covers the whole video as one segment so the
/// rest of the pipeline keeps working; it never fails the job.
pub async fn acquire_transcript(
    source: &dyn TranscriptSource,
    media_path: &Path,
    duration_seconds: f64,
) -> Transcript {
    match source.transcribe(media_path, duration_seconds).await {
        Ok(transcript) => transcript,
        Err(e) => {
            warn!(error = %e, "transcription failed, using degraded transcript");
            Transcript::degraded(duration_seconds)
        }
    }
}
