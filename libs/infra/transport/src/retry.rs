// [libs/infra/transport/src/retry.rs]
//! Exponential backoff with jitter, shared by the SMART Auth Manager
//! and the vendor adapter
//! layer.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
    pub jitter_fraction: f64,
}

impl BackoffPolicy {
    /// The token-endpoint retry policy: three retries,
    /// 250ms/500ms/1s, jittered ±20%.
    pub fn token_refresh() -> Self {
        Self {
            base_delay: Duration::from_millis(250),
            max_attempts: 3,
            jitter_fraction: 0.20,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// `base_delay * 2^attempt`, jittered by ±`jitter_fraction`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponential = self.base_delay.as_millis() as f64 * 2f64.powi(attempt as i32);
        let jitter_span = exponential * self.jitter_fraction;
        let jittered = rand::thread_rng().gen_range(-jitter_span..=jitter_span);
        let millis = (exponential + jittered).max(0.0) as u64;
        Duration::from_millis(millis)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(250),
            max_attempts: 3,
            jitter_fraction: 0.20,
        }
    }
}

/// Marks an error as transient (worth retrying) or terminal, and lets it
/// carry a server-supplied `Retry-After` that preempts the computed
/// backoff: 429 or 503 responses are retried with `Retry-After` respected
/// when present.
pub trait RetryableError {
    fn is_transient(&self) -> bool;

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// A placeholder signal an `attempt` closure can use in tests or simple
/// call sites where only "retry or not" matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Transient,
    Terminal,
}

/// Drives `attempt` up to `policy.max_attempts` times. Stops retrying and
/// returns the error as soon as it is non-transient or the attempt budget is
/// exhausted.
pub async fn retry_with_backoff<T, E, F, Fut>(policy: BackoffPolicy, mut attempt: F) -> Result<T, E>
where
E: RetryableError,
F: FnMut(u32) -> Fut,
Fut: Future<Output = Result<T, E>>,
{
    let mut attempt_number = 0u32;
    loop {
        match attempt(attempt_number).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt_number + 1 < policy.max_attempts => {
                let delay = err
                    .retry_after()
                    .unwrap_or_else(|| policy.delay_for_attempt(attempt_number));
                debug!(attempt = attempt_number, ?delay, "transient failure, backing off");
                tokio::time::sleep(delay).await;
                attempt_number += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TestError {
        transient: bool,
    }

    impl RetryableError for TestError {
        fn is_transient(&self) -> bool {
            self.transient
        }
    }

    fn fast_policy(max_attempts: u32) -> BackoffPolicy {
        BackoffPolicy {
            base_delay: Duration::from_millis(1),
            max_attempts,
            jitter_fraction: 0.0,
        }
    }

    #[tokio::test]
    async fn succeeds_without_retry_on_first_try() {
        let calls = AtomicU32::new(0);
        let result: Result<&str, TestError> = retry_with_backoff(fast_policy(3), |_attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok("ok") }
            })
            .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result: Result<&str, TestError> = retry_with_backoff(fast_policy(3), |_attempt| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(TestError { transient: true })
                    } else {
                        Ok("recovered")
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_immediately_on_non_transient_error() {
        let calls = AtomicU32::new(0);
        let result: Result<&str, TestError> = retry_with_backoff(fast_policy(3), |_attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError { transient: false }) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<&str, TestError> = retry_with_backoff(fast_policy(3), |_attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError { transient: true }) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}



