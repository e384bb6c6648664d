use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use super::FetchError;

/// Backoff schedule between attempts.
#[derive(Debug, Clone, Copy)]
pub enum Backoff {
    /// Attempt i waits i units.
    Linear { unit: Duration },
    Fixed(Duration),
}

impl Backoff {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Backoff::Linear { unit } => *unit * attempt,
            Backoff::Fixed(d) => *d,
        }
    }
}

/// Retry behavior as data: attempt count, backoff schedule, and which
/// errors are worth retrying.
#[derive(Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
    pub retryable: fn(&FetchError) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Linear {
                unit: Duration::from_secs(1),
            },
            retryable: is_transport_level,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Test-friendly variant with millisecond backoff units.
    pub fn with_backoff(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            backoff,
            retryable: is_transport_level,
        }
    }
}

pub fn is_transport_level(error: &FetchError) -> bool {
    matches!(error, FetchError::Timeout | FetchError::Transport(_))
}

/// Run `operation` up to `policy.max_attempts` times. Non-retryable errors
/// and the last attempt's error are re-raised as-is.
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, operation: F) -> Result<T, FetchError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut last_error = None;

    for attempt in 1..=policy.max_attempts {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if attempt < policy.max_attempts && (policy.retryable)(&e) {
                    let delay = policy.backoff.delay_for_attempt(attempt);
                    tracing::warn!(
                        "attempt {}/{} failed: {}. retrying in {:?}",
                        attempt,
                        policy.max_attempts,
                        e,
                        delay
                    );
                    sleep(delay).await;
                    last_error = Some(e);
                } else {
                    return Err(e);
                }
            }
        }
    }

    Err(last_error.unwrap_or(FetchError::Transport("retry exhausted".to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::with_backoff(
            max_attempts,
            Backoff::Linear {
                unit: Duration::from_millis(1),
            },
        )
    }

    #[test]
    fn linear_backoff_grows_per_attempt() {
        let backoff = Backoff::Linear {
            unit: Duration::from_secs(1),
        };
        assert_eq!(backoff.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(backoff.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(backoff.delay_for_attempt(3), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn succeeds_immediately_without_extra_attempts() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(5), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, FetchError>(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn attempts_exactly_n_times_on_persistent_failure() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FetchError::Transport("connection refused".to_string())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(4), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(FetchError::Timeout)
                } else {
                    Ok("ok")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_errors_surface_at_once() {
        let policy = RetryPolicy {
            max_attempts: 5,
            backoff: Backoff::Fixed(Duration::from_millis(1)),
            retryable: |_| false,
        };
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FetchError::Timeout) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
