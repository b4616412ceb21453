//! The classifier (C7): a pure function from `(point, constraints, state)` to
//! a `Classification`, in the precedence order spec.md §4.C7 defines.
//!
//! This crate conflates spec.md's "prev point" argument with the previous
//! value/timestamp already carried on `SeriesState` (`last_value`,
//! `last_timestamp`) rather than threading a fifth parameter — the two are
//! the same data and `SeriesState` is already read-only input here.
//! Recorded as an Open Question resolution in DESIGN.md.

use crate::classification::{Classification, ClassificationKind, Reason};
use crate::constraints::ValueConstraints;
use crate::datapoint::DataPoint;
use crate::state::{OperationalState, SeriesState};

/// Floor used in relative-delta/relative-slope denominators so a previous
/// value of exactly zero never divides by zero.
const EPSILON: f64 = 1e-9;

/// Classify `point` against `constraints`, given the series' current
/// operational `state`. Does not mutate `state`; the caller (the state
/// machine / router) is responsible for committing any resulting counter
/// bumps or transitions.
pub fn classify(point: &DataPoint, constraints: &ValueConstraints, state: &SeriesState) -> Classification {
    classify_with_raw_reason(point, constraints, state).0
}

/// Same as [`classify`], but also returns the *raw* (pre-debounce) reason
/// that fired this time — `Reason::Normal` when nothing violated, or
/// `Reason::Warmup` while INITIALIZING. The router needs this to advance
/// `SeriesState`'s consecutive-violation streak (§4.C7): the returned
/// `Classification`'s own reason is `Normal` whenever debounce suppresses a
/// live violation, which would otherwise hide the reason that actually needs
/// to keep accumulating toward `consecutive_violations_required`.
pub fn classify_with_raw_reason(
    point: &DataPoint,
    constraints: &ValueConstraints,
    state: &SeriesState,
) -> (Classification, Reason) {
    // I3: a series in INITIALIZING only counts readings; it never emits a
    // live alert/warning/prediction classification, regardless of how far
    // out of band the value actually is.
    if state.state == OperationalState::Initializing {
        return (Classification::warmup(), Reason::Warmup);
    }

    let raw = classify_raw(point, constraints, state);
    if raw.kind == ClassificationKind::Normal {
        return (raw.clone(), raw.reason);
    }

    // I4: CRITICAL is never subject to debounce downgrade by a later stage,
    // but the debounce rule itself is part of this same classification step,
    // so it still applies uniformly to whichever reason fired (consistent
    // with spec.md's "per-reason" resolution of the debounce Open Question).
    let required = constraints.consecutive_violations_required.max(1);
    let projected = if state.consecutive_reason == Some(raw.reason) {
        state.consecutive_count + 1
    } else {
        1
    };
    if projected < required {
        (Classification::normal(), raw.reason)
    } else {
        let reason = raw.reason;
        (raw, reason)
    }
}

fn classify_raw(point: &DataPoint, constraints: &ValueConstraints, state: &SeriesState) -> Classification {
    if let Some(critical) = &constraints.critical {
        if critical.violates(point.value) {
            return Classification::critical("critical");
        }
    }

    if let Some(operational) = &constraints.operational {
        if operational.violates(point.value) {
            return Classification::warning(Reason::OperationalRange, "operational");
        }
    }

    if let Some(warning) = &constraints.warning {
        if warning.violates(point.value) {
            return Classification::warning(Reason::WarningZone, "warning");
        }
    }

    if let Some(spike) = detect_delta_spike(point, constraints, state) {
        return spike;
    }

    Classification::normal()
}

/// The delta-spike criterion (§4.C7). `Δt = 0` never fires (B1); requires
/// `min_readings` valid readings in history; fires on any of the four
/// configured absolute/relative delta/slope thresholds.
fn detect_delta_spike(
    point: &DataPoint,
    constraints: &ValueConstraints,
    state: &SeriesState,
) -> Option<Classification> {
    let prev_value = state.last_value?;
    let prev_timestamp = state.last_timestamp?;
    let roc = &constraints.rate_of_change;

    let delta_t = point.timestamp - prev_timestamp;
    if delta_t <= 0.0 || delta_t > roc.spike_window_seconds {
        return None;
    }
    if u64::from(roc.min_readings) > state.valid_readings_count {
        return None;
    }

    let abs_delta = (point.value - prev_value).abs();
    let denom = prev_value.abs().max(EPSILON);
    let rel_delta = abs_delta / denom;

    let fires = roc.abs_delta.is_some_and(|t| abs_delta >= t)
        || roc.rel_delta.is_some_and(|t| rel_delta >= t)
        || roc.abs_slope.is_some_and(|t| abs_delta / delta_t >= t)
        || roc.rel_slope.is_some_and(|t| (rel_delta) / delta_t >= t);

    if !fires {
        return None;
    }

    Some(Classification::delta_spike(abs_delta, rel_delta, delta_t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::{Bound, RateOfChangeBand};
    use crate::datapoint::Domain;

    fn point(series: &str, value: f64, ts: f64) -> DataPoint {
        DataPoint {
            series_id: series.to_string(),
            value,
            timestamp: ts,
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

    fn normal_state(series: &str) -> SeriesState {
        let mut s = SeriesState::new(series, 0.0);
        s.state = OperationalState::Normal;
        s.valid_readings_count = 20;
        s
    }

    #[test]
    fn critical_wins_over_everything() {
        let mut c = ValueConstraints::default();
        c.critical = Some(Bound::new(Some(0.0), Some(100.0)));
        c.operational = Some(Bound::new(Some(10.0), Some(90.0)));
        c.consecutive_violations_required = 1;
        let state = normal_state("s1");
        let p = point("s1", 120.0, 10.0);
        let result = classify(&p, &c, &state);
        assert_eq!(result.kind, ClassificationKind::CriticalViolation);
        assert_eq!(result.reason, Reason::PhysicalRange);
    }

    #[test]
    fn warm_up_suppresses_everything_to_normal() {
        let mut c = ValueConstraints::default();
        c.critical = Some(Bound::new(Some(0.0), Some(100.0)));
        let mut state = normal_state("s1");
        state.state = OperationalState::Initializing;
        let p = point("s1", 999.0, 10.0);
        let result = classify(&p, &c, &state);
        assert_eq!(result.kind, ClassificationKind::Normal);
        assert_eq!(result.reason, Reason::Warmup);
    }

    #[test]
    fn warning_zone_requires_inside_operational() {
        let mut c = ValueConstraints::default();
        c.operational = Some(Bound::new(Some(10.0), Some(90.0)));
        c.warning = Some(Bound::new(Some(20.0), Some(80.0)));
        let state = normal_state("s1");
        let p = point("s1", 15.0, 10.0);
        let result = classify(&p, &c, &state);
        assert_eq!(result.kind, ClassificationKind::WarningViolation);
        assert_eq!(result.reason, Reason::WarningZone);
    }

    #[test]
    fn delta_spike_fires_on_abs_delta() {
        let mut c = ValueConstraints::default();
        c.rate_of_change = RateOfChangeBand {
            abs_delta: Some(3.0),
            rel_delta: None,
            abs_slope: None,
            rel_slope: None,
            spike_window_seconds: 1.0,
            min_readings: 1,
        };
        let mut state = normal_state("s1");
        state.last_value = Some(50.0);
        state.last_timestamp = Some(100.0);
        let p = point("s1", 55.0, 100.2);
        let result = classify(&p, &c, &state);
        assert_eq!(result.kind, ClassificationKind::AnomalyDetected);
        assert_eq!(result.reason, Reason::DeltaSpike);
        assert_eq!(result.metadata.absolute_delta, Some(5.0));
    }

    #[test]
    fn zero_delta_t_never_spikes() {
        let mut c = ValueConstraints::default();
        c.rate_of_change = RateOfChangeBand {
            abs_delta: Some(0.001),
            ..RateOfChangeBand::default()
        };
        let mut state = normal_state("s1");
        state.last_value = Some(50.0);
        state.last_timestamp = Some(100.0);
        let p = point("s1", 80.0, 100.0);
        let result = classify(&p, &c, &state);
        assert_eq!(result.kind, ClassificationKind::Normal);
    }

    #[test]
    fn debounce_suppresses_until_threshold_met() {
        let mut c = ValueConstraints::default();
        c.operational = Some(Bound::new(Some(10.0), Some(90.0)));
        c.consecutive_violations_required = 3;
        let mut state = normal_state("s1");
        let p = point("s1", 5.0, 10.0);

        let r1 = classify(&p, &c, &state);
        assert_eq!(r1.kind, ClassificationKind::Normal, "1st violation debounced");
        state.bump_consecutive(Reason::OperationalRange);

        let r2 = classify(&p, &c, &state);
        assert_eq!(r2.kind, ClassificationKind::Normal, "2nd violation debounced");
        state.bump_consecutive(Reason::OperationalRange);

        let r3 = classify(&p, &c, &state);
        assert_eq!(r3.kind, ClassificationKind::WarningViolation, "3rd violation goes live");
    }
}
