//! Retry-with-backoff wrapper for cloud calls
//!
//! Every cloud API call in the fleet manager goes through this executor so
//! throttling and transient unavailability are absorbed uniformly. The delay
//! schedule doubles from the base up to the cap, with no jitter.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Backoff policy for retried operations
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first
    pub max_attempts: u32,

    /// Delay before the first retry
    pub base_delay: Duration,

    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(1500),
            max_delay: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    /// Delay before the given retry (attempt is 1-based: the first retry
    /// waits `base`, the second `base * 2`, capped at `max_delay`)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let doubled = self.base_delay.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        doubled.min(self.max_delay)
    }
}

/// Executes operations with transient-error retries
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// Create an executor with the given policy
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Run `op`, retrying while `is_transient` approves the error
    ///
    /// Non-transient errors and retry exhaustion propagate the final error
    /// unchanged.
    pub async fn execute<T, E, Fut, Op, Cl>(&self, label: &str, is_transient: Cl, mut op: Op) -> Result<T, E>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        Cl: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        debug!(label, "execute: called");
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => {
                    debug!(label, attempt, "execute: succeeded");
                    return Ok(value);
                }
                Err(e) if attempt < self.policy.max_attempts && is_transient(&e) => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        label,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    debug!(label, attempt, error = %e, "execute: giving up");
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[test]
    fn test_delay_schedule_doubles_to_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(1500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(3000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(6000));
        assert_eq!(policy.delay_for(4), Duration::from_millis(12000));
        // Capped past the doubling horizon
        assert_eq!(policy.delay_for(5), Duration::from_secs(15));
        assert_eq!(policy.delay_for(10), Duration::from_secs(15));
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let executor = RetryExecutor::new(fast_policy());
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<u32, String> = executor
            .execute("op", |_| true, || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_errors_retried_until_success() {
        let executor = RetryExecutor::new(fast_policy());
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<u32, String> = executor
            .execute("op", |_| true, || {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 { Err("throttled".to_string()) } else { Ok(99) }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_transient_error_propagates_immediately() {
        let executor = RetryExecutor::new(fast_policy());
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<u32, String> = executor
            .execute("op", |_| false, || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("bad request".to_string())
                }
            })
            .await;

        assert_eq!(result.unwrap_err(), "bad request");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_final_error() {
        let executor = RetryExecutor::new(fast_policy());
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<u32, String> = executor
            .execute("op", |_| true, || {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    Err(format!("throttled #{n}"))
                }
            })
            .await;

        // Four attempts total; the last error wins
        assert_eq!(result.unwrap_err(), "throttled #3");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
