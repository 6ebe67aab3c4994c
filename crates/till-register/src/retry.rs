//! # Retry Policy
//!
//! Bounded retry with exponential backoff around store calls.
//!
//! ```text
//! attempt 1 ──► Err(Busy) ──► sleep ~initial ──► attempt 2 ──► Err(Busy)
//!           ──► sleep ~2×initial (≤ max) ──► attempt 3 ──► Err(Busy) ──► give up
//! ```
//!
//! Only errors for which [`till_db::DbError::is_retryable`] holds are repeated.
//! Everything else (not found, conflicts, constraint violations) is an
//! answer and is returned on the first attempt.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use till_db::DbResult;
use tracing::{debug, warn};

/// How often and how patiently a store call is repeated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(3, Duration::from_millis(50), Duration::from_secs(1))
    }
}

impl RetryPolicy {
    /// `max_attempts` counts the first call; values below 1 are raised to 1.
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff: max_backoff.max(initial_backoff),
        }
    }

    /// A single attempt, no retries.
    pub fn none() -> Self {
        RetryPolicy::new(1, Duration::ZERO, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        let mut backoff = ExponentialBackoff {
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            // attempts are bounded by count, not by elapsed time
            max_elapsed_time: None,
            ..Default::default()
        };
        backoff.reset();
        backoff
    }

    /// Runs `op` until it succeeds, fails permanently, or the attempts run
    /// out. The last error is returned unchanged.
    pub async fn run<T, F, Fut>(&self, op: &'static str, mut f: F) -> DbResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DbResult<T>>,
    {
        let mut backoff = self.create_backoff();
        let mut attempt = 1u32;

        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(op, attempt, "Store call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = backoff.next_backoff().unwrap_or(self.max_backoff);
                    warn!(op, attempt, ?delay, error = %e, "Transient store failure, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_retryable() {
                        warn!(op, attempts = attempt, error = %e, "Giving up on store call");
                    }
                    return Err(e);
                }
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use till_db::DbError;

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(1), Duration::from_millis(2))
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result = fast_policy(3)
            .run("test", move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(DbError::Busy("locked".into()))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: DbResult<()> = fast_policy(2)
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(DbError::ConnectionFailed("down".into()))
            })
            .await;

        assert!(matches!(result, Err(DbError::ConnectionFailed(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: DbResult<()> = fast_policy(5)
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(DbError::conflict("Product", "1001"))
            })
            .await;

        assert!(matches!(result, Err(DbError::Conflict { .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_policy_bounds() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO, Duration::ZERO).max_attempts(), 1);
        assert_eq!(RetryPolicy::none().max_attempts(), 1);
    }
}
