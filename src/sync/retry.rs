//! Bounded retry with linear backoff.
//!
//! Every remote call the engine makes on a hot path goes through
//! [`retry_with_backoff`]. Attempt `n` that fails is followed by a sleep of
//! `n * base_delay` before attempt `n + 1`; there is no sleep after the last
//! attempt. The loop itself is `backon`; [`RetryPolicy`] is its backoff builder.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{BackoffBuilder, Retryable};
use tracing::{debug, warn};

use crate::error::SyncError;

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy. `max_attempts` is clamped to at least one.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Maximum number of attempts.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    /// Three attempts, waiting 1s then 2s.
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1_000))
    }
}

impl BackoffBuilder for RetryPolicy {
    type Backoff = LinearBackoff;

    fn build(self) -> Self::Backoff {
        LinearBackoff {
            policy: self,
            failed: 0,
        }
    }
}

/// Delays between attempts: one per failure except the last.
#[derive(Debug, Clone, Copy)]
pub struct LinearBackoff {
    policy: RetryPolicy,
    failed: u32,
}

impl Iterator for LinearBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.failed + 1 >= self.policy.max_attempts {
            return None;
        }
        self.failed += 1;
        Some(self.policy.delay_after(self.failed))
    }
}

/// Final failure after every attempt was used.
#[derive(Debug)]
pub struct RetriesExhausted {
    /// Attempts made.
    pub attempts: u32,
    /// Error of the last attempt.
    pub last_error: SyncError,
}

/// Run `operation` until it succeeds or `policy` runs out of attempts.
///
/// `label` names the operation in logs. `operation` receives the 1-based
/// attempt number.
///
/// # Errors
///
/// Returns [`RetriesExhausted`] carrying the last error once every attempt failed.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: F,
) -> Result<T, RetriesExhausted>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, SyncError>>,
{
    let made = AtomicU32::new(0);

    let result = (|| operation(made.fetch_add(1, Ordering::Relaxed) + 1))
        .retry(*policy)
        .sleep(tokio::time::sleep)
        .notify(|e: &SyncError, delay: Duration| {
            warn!(
                label,
                attempt = made.load(Ordering::Relaxed),
                max = policy.max_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %e,
                "Attempt failed, backing off"
            );
        })
        .await;

    let attempts = made.load(Ordering::Relaxed);
    match result {
        Ok(value) => {
            if attempts > 1 {
                debug!(label, attempt = attempts, "Succeeded after retry");
            }
            Ok(value)
        }
        Err(e) => {
            warn!(label, attempts, error = %e, "Giving up");
            Err(RetriesExhausted {
                attempts,
                last_error: e,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[test]
    fn test_linear_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
        assert_eq!(policy.delay_after(3), Duration::from_secs(3));
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }

    #[test]
    fn test_backoff_yields_one_delay_per_retry() {
        let delays: Vec<_> = RetryPolicy::default().build().collect();
        assert_eq!(delays, vec![Duration::from_secs(1), Duration::from_secs(2)]);

        let single = RetryPolicy::new(1, Duration::from_secs(1)).build().count();
        assert_eq!(single, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result: Result<(), _> =
            retry_with_backoff(&RetryPolicy::default(), "always-fails", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(SyncError::rpc("boom", None)) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(RetriesExhausted { attempts: 3, .. })));
        // 1s after the first failure, 2s after the second, nothing after the last.
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_on_second_attempt() {
        let result = retry_with_backoff(&RetryPolicy::default(), "flaky", |attempt| async move {
            if attempt < 2 {
                Err(SyncError::rpc("transient", None))
            } else {
                Ok(attempt)
            }
        })
        .await;

        assert!(matches!(result, Ok(2)));
    }
}
