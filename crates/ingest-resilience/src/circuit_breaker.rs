//! The circuit breaker (C5): one instance per dependency (each storage
//! backend, and the prediction bus), three states, fails fast while open.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Default consecutive-failure threshold before CLOSED → OPEN (§4.C5).
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
/// Default OPEN duration before OPEN → HALF_OPEN (§4.C5).
pub const DEFAULT_OPEN_DURATION: Duration = Duration::from_secs(30);

struct Inner {
    state: BreakerState,
    opened_at: Option<Instant>,
    /// `true` while a HALF_OPEN trial call is in flight — admits exactly one.
    trial_in_flight: bool,
}

pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    open_duration: Duration,
    consecutive_failures: AtomicU32,
    inner: Mutex<Inner>,
}

/// Outcome of `CircuitBreaker::admit`: whether the caller may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    /// Breaker is OPEN; call should fail fast with `kind=unavailable`.
    Rejected,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, failure_threshold: u32, open_duration: Duration) -> Self {
        Self {
            name: name.into(),
            failure_threshold,
            open_duration,
            consecutive_failures: AtomicU32::new(0),
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, DEFAULT_FAILURE_THRESHOLD, DEFAULT_OPEN_DURATION)
    }

    /// Call before attempting the guarded operation. In OPEN state, checks
    /// whether `T_open` has elapsed and transitions to HALF_OPEN, admitting
    /// exactly one trial call; further calls while the trial is outstanding
    /// are rejected.
    pub fn admit(&self) -> Admission {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => Admission::Allowed,
            BreakerState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed >= self.open_duration {
                    inner.state = BreakerState::HalfOpen;
                    inner.trial_in_flight = true;
                    tracing::info!(breaker = %self.name, "circuit half-open, admitting trial call");
                    Admission::Allowed
                } else {
                    Admission::Rejected
                }
            }
            BreakerState::HalfOpen => {
                if inner.trial_in_flight {
                    Admission::Rejected
                } else {
                    inner.trial_in_flight = true;
                    Admission::Allowed
                }
            }
        }
    }

    pub fn on_success(&self) {
        let mut inner = self.inner.lock();
        inner.trial_in_flight = false;
        self.consecutive_failures.store(0, Ordering::Relaxed);
        if inner.state != BreakerState::Closed {
            tracing::info!(breaker = %self.name, "circuit closed after successful trial");
        }
        inner.state = BreakerState::Closed;
        inner.opened_at = None;
    }

    pub fn on_failure(&self) {
        let mut inner = self.inner.lock();
        inner.trial_in_flight = false;
        match inner.state {
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                tracing::warn!(breaker = %self.name, "trial call failed, circuit re-opened");
            }
            BreakerState::Closed => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                if failures >= self.failure_threshold {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                    tracing::warn!(breaker = %self.name, failures, "circuit opened");
                }
            }
            BreakerState::Open => {}
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let cb = CircuitBreaker::new("test", 5, Duration::from_secs(30));
        for _ in 0..4 {
            assert_eq!(cb.admit(), Admission::Allowed);
            cb.on_failure();
        }
        assert_eq!(cb.state(), BreakerState::Closed);
        assert_eq!(cb.admit(), Admission::Allowed);
        cb.on_failure();
        assert_eq!(cb.state(), BreakerState::Open);
        assert_eq!(cb.admit(), Admission::Rejected);
    }

    #[test]
    fn half_open_trial_success_closes() {
        let cb = CircuitBreaker::new("test", 1, Duration::from_millis(0));
        cb.admit();
        cb.on_failure();
        assert_eq!(cb.state(), BreakerState::Open);
        // open_duration is 0, so admit() immediately transitions to half-open
        assert_eq!(cb.admit(), Admission::Allowed);
        assert_eq!(cb.state(), BreakerState::HalfOpen);
        cb.on_success();
        assert_eq!(cb.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_trial_failure_reopens() {
        let cb = CircuitBreaker::new("test", 1, Duration::from_millis(0));
        cb.admit();
        cb.on_failure();
        assert_eq!(cb.admit(), Admission::Allowed);
        cb.on_failure();
        assert_eq!(cb.state(), BreakerState::Open);
    }
}
