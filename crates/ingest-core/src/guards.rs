//! Syntactic guards and the suspicious-value filter (C2).
//!
//! Pure function: rejects non-finite values, bad series ids, and timestamps
//! outside the acceptance window (I1); flags (does not reject) suspicious
//! zeros for later analysis.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::datapoint::DataPoint;
use crate::errors::CoreError;

/// Default acceptance window from spec §3/§4.C2.
pub const MAX_PAST_SKEW_SECONDS: f64 = 24.0 * 3600.0;
pub const MAX_FUTURE_SKEW_SECONDS: f64 = 60.0;
/// Default from §8 B2.
pub const DEFAULT_SUSPICIOUS_ZERO_THRESHOLD: f64 = 5.0;

/// Run the guards against `point`. `now` is the current wall-clock time
/// (seconds since epoch) supplied by the caller so this stays a pure
/// function of its inputs.
pub fn check(point: &DataPoint, now: f64) -> Result<(), CoreError> {
    if !point.value.is_finite() {
        return Err(CoreError::NonFiniteValue);
    }

    if point.domain == crate::datapoint::Domain::Iot {
        if let Ok(n) = point.series_id.parse::<i64>() {
            if n <= 0 {
                return Err(CoreError::InvalidNumericSeriesId);
            }
        }
    }

    let age = now - point.timestamp;
    if age > MAX_PAST_SKEW_SECONDS {
        return Err(CoreError::TimestampOutOfWindow(format!(
            "timestamp {} is {age:.3}s in the past, exceeds {MAX_PAST_SKEW_SECONDS}s",
            point.timestamp
        )));
    }
    if age < -MAX_FUTURE_SKEW_SECONDS {
        return Err(CoreError::TimestampOutOfWindow(format!(
            "timestamp {} is {:.3}s in the future, exceeds {MAX_FUTURE_SKEW_SECONDS}s",
            point.timestamp, -age
        )));
    }

    Ok(())
}

/// `true` if `value` is an exact zero whose previous neighbour was far from
/// zero (B2) — flagged, never rejected.
pub fn is_suspicious_zero(value: f64, prev_value: Option<f64>, threshold: f64) -> bool {
    value == 0.0 && prev_value.is_some_and(|p| p.abs() >= threshold)
}

/// One recorded suspicious-zero sighting, kept for `/resilience/health` and
/// offline analysis (SPEC_FULL.md §2 supplement).
#[derive(Debug, Clone)]
pub struct SuspiciousZeroEvent {
    pub series_id: String,
    pub prev_value: f64,
    pub timestamp: f64,
}

/// Bounded ring buffer of recent suspicious-zero sightings.
pub struct SuspiciousZeroLog {
    capacity: usize,
    events: Mutex<VecDeque<SuspiciousZeroEvent>>,
}

impl SuspiciousZeroLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn record(&self, series_id: &str, prev_value: f64, timestamp: f64) {
        tracing::warn!(
            series_id,
            prev_value,
            timestamp,
            "suspicious zero: exact 0 following a far-from-zero reading"
        );
        let mut events = self.events.lock();
        if events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(SuspiciousZeroEvent {
            series_id: series_id.to_string(),
            prev_value,
            timestamp,
        });
    }

    pub fn recent_count(&self) -> usize {
        self.events.lock().len()
    }
}

impl Default for SuspiciousZeroLog {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datapoint::Domain;

    fn point(value: f64, timestamp: f64) -> DataPoint {
        DataPoint {
            series_id: "s1".to_string(),
            value,
            timestamp,
            ingested_at: None,
            processed_at: None,
            domain: Domain::Generic,
            source_id: None,
            stream_type: None,
            sequence: None,
            metadata: Default::default(),
            msg_id: None,
        }
    }

    #[test]
    fn rejects_non_finite() {
        assert!(check(&point(f64::NAN, 0.0), 0.0).is_err());
        assert!(check(&point(f64::INFINITY, 0.0), 0.0).is_err());
    }

    #[test]
    fn boundary_timestamps_b4() {
        let now = 1_000_000.0;
        let just_inside = point(1.0, now - MAX_PAST_SKEW_SECONDS + 0.000_001);
        assert!(check(&just_inside, now).is_ok());

        let just_outside = point(1.0, now - MAX_PAST_SKEW_SECONDS - 0.000_001);
        assert!(check(&just_outside, now).is_err());
    }

    #[test]
    fn suspicious_zero_is_flagged_not_rejected() {
        assert!(is_suspicious_zero(0.0, Some(10.0), DEFAULT_SUSPICIOUS_ZERO_THRESHOLD));
        assert!(!is_suspicious_zero(0.0, Some(1.0), DEFAULT_SUSPICIOUS_ZERO_THRESHOLD));
        assert!(!is_suspicious_zero(1.0, Some(10.0), DEFAULT_SUSPICIOUS_ZERO_THRESHOLD));

        let p = point(0.0, 0.0);
        assert!(check(&p, 0.0).is_ok(), "suspicious zero must not be rejected by guards");
    }
}
