//! Retry with bounded exponential backoff, wrapped around the circuit
//! breaker (C5).

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;

use ingest_core::ErrorKind;

use crate::circuit_breaker::{Admission, CircuitBreaker};

/// Default policy (§4.C5): 3 attempts, exponential backoff capped at 30s.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            cap: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// `min(base × 2^(n−1), cap)`, jittered ±25%.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.as_secs_f64() * 2f64.powi(attempt.saturating_sub(1) as i32);
        let capped = exp.min(self.cap.as_secs_f64());
        let jitter = rand::thread_rng().gen_range(0.75..=1.25);
        Duration::from_secs_f64((capped * jitter).max(0.0))
    }
}

#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("circuit breaker open")]
    CircuitOpen,
    #[error("operation failed after retries: {0}")]
    Exhausted(E),
    #[error("operation failed non-retryably: {0}")]
    NonRetryable(E),
}

impl<E> RetryError<E> {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RetryError::CircuitOpen => ErrorKind::Unavailable,
            RetryError::Exhausted(_) => ErrorKind::Unavailable,
            RetryError::NonRetryable(_) => ErrorKind::Internal,
        }
    }
}

/// Run `op` up to `policy.max_attempts` times, gated by `breaker`.
/// `classify` maps an application error to one of the five kinds (§7);
/// §4.C5: "refuses to retry on classification failures or constraint
/// violations" — i.e. only `ErrorKind::Unavailable` is retried.
pub async fn retry_with_backoff<F, Fut, T, E>(
    breaker: &CircuitBreaker,
    policy: &RetryPolicy,
    classify: impl Fn(&E) -> ErrorKind,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        if breaker.admit() == Admission::Rejected {
            return Err(RetryError::CircuitOpen);
        }

        match op().await {
            Ok(value) => {
                breaker.on_success();
                return Ok(value);
            }
            Err(err) => {
                breaker.on_failure();
                let kind = classify(&err);
                if !kind.is_retryable() {
                    return Err(RetryError::NonRetryable(err));
                }
                if attempt >= policy.max_attempts {
                    return Err(RetryError::Exhausted(err));
                }
                let delay = policy.backoff_for_attempt(attempt);
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying after backoff");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let breaker = CircuitBreaker::with_defaults("store");
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            cap: Duration::from_millis(5),
        };
        let calls = AtomicU32::new(0);
        let result: Result<&str, RetryError<&str>> = retry_with_backoff(
            &breaker,
            &policy,
            |_e: &&str| ErrorKind::Unavailable,
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("transient")
                    } else {
                        Ok("ok")
                    }
                }
            },
        )
        .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_non_transient() {
        let breaker = CircuitBreaker::with_defaults("store");
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let result: Result<(), RetryError<&str>> = retry_with_backoff(
            &breaker,
            &policy,
            |_e: &&str| ErrorKind::InvalidInput,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err("bad input") }
            },
        )
        .await;
        assert!(matches!(result, Err(RetryError::NonRetryable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1, "non-retryable fails fast");
    }

    #[tokio::test]
    async fn exhaustion_after_max_attempts() {
        let breaker = CircuitBreaker::with_defaults("store");
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            cap: Duration::from_millis(2),
        };
        let calls = AtomicU32::new(0);
        let result: Result<(), RetryError<&str>> = retry_with_backoff(
            &breaker,
            &policy,
            |_e: &&str| ErrorKind::Unavailable,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err("down") }
            },
        )
        .await;
        assert!(matches!(result, Err(RetryError::Exhausted(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
