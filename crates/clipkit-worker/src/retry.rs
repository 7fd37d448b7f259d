//! Retry with exponential backoff.
//!
//! Wraps flaky stage operations (storage transfers, probing, speech-to-text)
//! so transient failures get a bounded number of additional attempts while
//! deterministic failures surface immediately.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

/// Backoff policy for retryable stage operations.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retry attempts after the initial one
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Cap on any single delay
    pub max_delay: Duration,
    /// Multiplier applied per attempt
    pub factor: f64,
    /// Random jitter fraction, 0.0 disables
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            factor: 2.0,
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            ..Default::default()
        }
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = 0.0;
        self
    }

    /// Delay before retry number `attempt` (1-based), without jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1);
        let millis = self.base_delay.as_millis() as f64 * self.factor.powi(exp as i32);
        Duration::from_millis(millis as u64).min(self.max_delay)
    }

    fn jittered_delay(&self, attempt: u32) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        if self.jitter <= 0.0 {
            return delay;
        }
        let spread = self.jitter;
        let scale = 1.0 + rand::rng().random_range(-spread..=spread);
        Duration::from_millis((delay.as_millis() as f64 * scale) as u64)
    }
}

/// Run `operation` until it succeeds, a non-retryable error occurs, or the
/// policy is exhausted.
///
/// `is_retryable` classifies errors; anything it rejects is returned on the
/// spot without sleeping.
pub async fn retry_with_policy<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &str,
    is_retryable: impl Fn(&E) -> bool,
    operation: F,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(operation = operation_name, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt < policy.max_retries && is_retryable(&e) => {
                attempt += 1;
                let delay = policy.jittered_delay(attempt);
                warn!(
                    operation = operation_name,
                    attempt,
                    max_retries = policy.max_retries,
                    ?delay,
                    error = %e,
                    "retrying after failure"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy::default().without_jitter();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(4000));
    }

    #[test]
    fn test_delay_caps_at_max() {
        let mut policy = RetryPolicy::default().without_jitter();
        policy.max_delay = Duration::from_millis(2500);
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(2500));
    }

    #[test]
    fn test_jitter_stays_near_schedule() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let d = policy.jittered_delay(1).as_millis();
            assert!((900..=1100).contains(&d), "jittered delay out of band: {d}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_after_max_retries() {
        let policy = RetryPolicy::default().without_jitter();
        let calls = AtomicU32::new(0);

        let result: Result<(), &str> = retry_with_policy(&policy, "test", |_| true, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("always fails") }
        })
        .await;

        assert!(result.is_err());
        // Initial attempt plus three retries
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let policy = RetryPolicy::default().without_jitter();
        let calls = AtomicU32::new(0);

        let result: Result<(), &str> = retry_with_policy(&policy, "test", |_| false, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("fatal") }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eventual_success() {
        let policy = RetryPolicy::default().without_jitter();
        let calls = AtomicU32::new(0);

        let result = retry_with_policy(&policy, "test", |_| true, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("transient")
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
