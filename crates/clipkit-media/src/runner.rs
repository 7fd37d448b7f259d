//! Child process execution with timeout and cancellation.
//!
//! All FFmpeg/FFprobe invocations go through the [`ProcessRunner`] trait so
//! higher layers can substitute a recording fake in tests.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// A fully-built command line ready to spawn.
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    /// Binary name, resolved through PATH
    pub program: String,
    /// Arguments, already shell-safe (never joined through a shell)
    pub args: Vec<String>,
    /// Kill the child after this many seconds
    pub timeout_secs: Option<u64>,
}

impl ProcessRequest {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout_secs: None,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

/// Captured output of a completed child.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Sender half of a cancellation signal.
///
/// Dropping the source does not cancel; call [`CancelSource::cancel`].
#[derive(Debug)]
pub struct CancelSource {
    tx: watch::Sender<bool>,
}

/// Receiver half, cheap to clone and pass down the stack.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelSource {
    pub fn new() -> (Self, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, CancelToken { rx: Some(rx) })
    }

    /// Signal cancellation to every token derived from this source.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl CancelToken {
    /// A token that never fires; for one-shot tools and tests.
    pub fn none() -> Self {
        Self { rx: None }
    }

    /// Whether cancellation has already been requested.
    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Resolve when cancellation is requested; pends forever for a
    /// [`CancelToken::none`] token.
    pub async fn cancelled(&self) {
        match &self.rx {
            None => std::future::pending().await,
            Some(rx) => {
                let mut rx = rx.clone();
                if *rx.borrow() {
                    return;
                }
                while rx.changed().await.is_ok() {
                    if *rx.borrow() {
                        return;
                    }
                }
                // Source dropped without cancelling
                std::future::pending().await
            }
        }
    }
}

/// Spawns and supervises child processes.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run to completion, returning captured output.
    ///
    /// A non-zero exit becomes [`MediaError::ProcessFailed`]; timeout and
    /// cancellation kill the child before returning their errors.
    async fn run(&self, request: ProcessRequest, cancel: &CancelToken) -> MediaResult<ProcessOutput>;
}

/// Production runner backed by `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, request: ProcessRequest, cancel: &CancelToken) -> MediaResult<ProcessOutput> {
        if cancel.is_cancelled() {
            return Err(MediaError::Cancelled);
        }

        match request.program.as_str() {
            "ffmpeg" => {
                crate::command::check_ffmpeg()?;
            }
            "ffprobe" => {
                crate::command::check_ffprobe()?;
            }
            _ => {}
        }

        debug!(program = %request.program, args = ?request.args, "spawning child");

        let mut child = Command::new(&request.program)
            .args(&request.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let Some(mut stdout_pipe) = child.stdout.take() else {
            return Err(MediaError::process_failed(&request.program, "stdout not captured", None));
        };
        let Some(mut stderr_pipe) = child.stderr.take() else {
            return Err(MediaError::process_failed(&request.program, "stderr not captured", None));
        };

        let stdout_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stdout_pipe.read_to_string(&mut buf).await;
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr_pipe.read_to_string(&mut buf).await;
            buf
        });

        let timeout = request
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(Duration::MAX);

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = tokio::time::sleep(timeout) => {
                warn!(program = %request.program, timeout_secs = request.timeout_secs, "child timed out, killing");
                let _ = child.kill().await;
                return Err(MediaError::Timeout(request.timeout_secs.unwrap_or(0)));
            }
            _ = cancel.cancelled() => {
                debug!(program = %request.program, "cancelled, killing child");
                let _ = child.kill().await;
                return Err(MediaError::Cancelled);
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        if status.success() {
            Ok(ProcessOutput { stdout, stderr })
        } else {
            Err(MediaError::process_failed(
                request.program,
                stderr,
                status.code(),
            ))
        }
    }
}
