use rand::Rng;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use warden_common::LifecycleError;

/// Backoff parameters for operations that may transiently fail against
/// the control plane.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
pub enum RetryError<E> {
    Exhausted { attempts: u32, last_error: E },
    Cancelled,
}

impl<E: fmt::Display> From<RetryError<E>> for LifecycleError {
    fn from(err: RetryError<E>) -> Self {
        match err {
            RetryError::Exhausted {
                attempts,
                last_error,
            } => LifecycleError::ExhaustedRetries {
                attempts,
                last_error: last_error.to_string(),
            },
            RetryError::Cancelled => LifecycleError::Cancelled,
        }
    }
}

/// Delay before attempt `i` (0-indexed, i > 0):
/// `min(base * 2^i + jitter, max_delay + extra_jitter)` with jitter drawn
/// uniformly in `[0, base * 2^i)` and extra jitter in `[0, 5s)`.
fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let mut rng = rand::thread_rng();
    let base = policy.base_delay.saturating_mul(1u32 << attempt.min(31));
    let jitter = if base.is_zero() {
        Duration::ZERO
    } else {
        let bound = base.as_nanos().min(u64::MAX as u128) as u64;
        Duration::from_nanos(rng.gen_range(0..bound))
    };
    let delay = base.saturating_add(jitter);
    if delay > policy.max_delay {
        let extra = Duration::from_millis(rng.gen_range(0..5_000));
        policy.max_delay.saturating_add(extra)
    } else {
        delay
    }
}

/// Run `operation` up to `policy.max_attempts` times, sleeping between
/// attempts (never before the first). A cancellation during the sleep
/// abandons the loop with `RetryError::Cancelled`; exhaustion preserves
/// the final underlying error.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = policy.max_attempts.max(1);

    let mut last_error = match operation().await {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    for attempt in 1..attempts {
        let delay = backoff_delay(policy, attempt);
        tokio::select! {
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            _ = sleep(delay) => {}
        }

        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => last_error = err,
        }
    }

    Err(RetryError::Exhausted {
        attempts,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn always_failing_operation_runs_exactly_max_attempts() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let cancel = CancellationToken::new();

        let result: Result<(), RetryError<String>> =
            retry(&fast_policy(4), &cancel, || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err(format!("boom {n}"))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result {
            Err(RetryError::Exhausted {
                attempts,
                last_error,
            }) => {
                assert_eq!(attempts, 4);
                assert_eq!(last_error, "boom 4");
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn success_on_later_attempt_stops_immediately() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let cancel = CancellationToken::new();

        let result: Result<u32, RetryError<String>> =
            retry(&fast_policy(5), &cancel, || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(String::from("not yet"))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn first_attempt_success_never_sleeps() {
        let cancel = CancellationToken::new();
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(3600),
            max_delay: Duration::from_secs(3600),
        };

        let started = std::time::Instant::now();
        let result: Result<&str, RetryError<String>> =
            retry(&policy, &cancel, || async { Ok("ready") }).await;

        assert_eq!(result.unwrap(), "ready");
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn cancellation_during_sleep_reports_cancelled_not_exhausted() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let cancel = CancellationToken::new();
        // With an hour-long backoff, the pre-cancelled token must win the
        // select before any second attempt happens.
        cancel.cancel();
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(3600),
            max_delay: Duration::from_secs(3600),
        };

        let result: Result<(), RetryError<String>> = retry(&policy, &cancel, || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(String::from("transient"))
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(RetryError::Cancelled)));
    }

    #[test]
    fn backoff_stays_within_policy_bounds() {
        let policy = RetryPolicy {
            max_attempts: 8,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        };
        for attempt in 1..8 {
            let base = policy.base_delay * (1u32 << attempt);
            let delay = backoff_delay(&policy, attempt);
            // Either base + jitter below the clamp, or clamp + extra jitter.
            let unclamped_max = base * 2;
            let clamped_max = policy.max_delay + Duration::from_millis(5_000);
            assert!(delay >= base.min(policy.max_delay));
            assert!(delay < unclamped_max.max(clamped_max) + Duration::from_millis(1));
        }
    }
}
