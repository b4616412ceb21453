//! The operational state machine (C8): transition table from spec.md §4.C8.

use crate::classification::{Classification, ClassificationKind};
use crate::state::{OperationalState, SeriesState};

/// Side effects the caller (router/repository) must persist atomically with
/// the state mutation (§4.C8: "Transitions are persisted atomically with the
/// counter increment").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub from: OperationalState,
    pub to: OperationalState,
    pub changed: bool,
}

/// Stateless application of the transition table to a single valid point.
/// Mutates `state` in place and returns the resulting transition.
///
/// ANOMALY_DETECTED (delta spike) is treated the same as WARNING_VIOLATION
/// for state-machine purposes — spec.md's transition table names only
/// WARNING_VIOLATION, but both classes are routed to the same Warning
/// sub-pipeline (C10), so both drive NORMAL → WARNING here too. Recorded as
/// an Open Question resolution in DESIGN.md.
pub struct StateMachine;

impl StateMachine {
    /// Apply a classified, valid point: `value`/`now` are the point's own
    /// value and timestamp, recorded as the new `last_value`/`last_timestamp`
    /// for the next classification's delta-spike computation.
    pub fn apply_point(
        state: &mut SeriesState,
        classification: &Classification,
        value: f64,
        now: f64,
    ) -> TransitionOutcome {
        let from = state.state;

        // STALE -> INITIALIZING on any valid point (warm-up restarts).
        if state.state == OperationalState::Stale {
            state.state = OperationalState::Initializing;
            state.valid_readings_count = 0;
            state.state_changed_at = now;
        }

        state.valid_readings_count += 1;
        state.last_value = Some(value);
        state.last_timestamp = Some(now);

        if state.state == OperationalState::Initializing {
            if state.valid_readings_count >= state.min_readings_for_normal {
                state.state = OperationalState::Normal;
                state.state_changed_at = now;
            }
            return Self::outcome(from, state.state);
        }

        match classification.kind {
            ClassificationKind::CriticalViolation => {
                if matches!(state.state, OperationalState::Normal | OperationalState::Warning) {
                    state.state = OperationalState::Alert;
                    state.state_changed_at = now;
                }
            }
            ClassificationKind::WarningViolation | ClassificationKind::AnomalyDetected => {
                if state.state == OperationalState::Normal {
                    state.state = OperationalState::Warning;
                    state.state_changed_at = now;
                }
            }
            ClassificationKind::Normal => {
                if !state.has_active_alert
                    && !state.has_active_warning
                    && matches!(state.state, OperationalState::Alert | OperationalState::Warning)
                {
                    state.state = OperationalState::Normal;
                    state.state_changed_at = now;
                }
            }
            ClassificationKind::Rejected => {}
        }

        Self::outcome(from, state.state)
    }

    /// Drive a STALE transition for a series that has not reported in
    /// `stale_timeout` seconds. Invoked by the periodic sweeper, not inline
    /// per-point.
    pub fn mark_stale(state: &mut SeriesState, now: f64) -> TransitionOutcome {
        let from = state.state;
        if matches!(
            state.state,
            OperationalState::Normal | OperationalState::Warning | OperationalState::Alert
        ) {
            state.state = OperationalState::Stale;
            state.state_changed_at = now;
        }
        Self::outcome(from, state.state)
    }

    fn outcome(from: OperationalState, to: OperationalState) -> TransitionOutcome {
        TransitionOutcome {
            from,
            to,
            changed: from != to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::Classification;

    #[test]
    fn warm_up_completes_at_threshold() {
        let mut state = SeriesState::new("s1", 0.0);
        state.min_readings_for_normal = 3;
        let c = Classification::warmup();
        StateMachine::apply_point(&mut state, &c, 10.0, 1.0);
        assert_eq!(state.state, OperationalState::Initializing);
        StateMachine::apply_point(&mut state, &c, 10.0, 2.0);
        assert_eq!(state.state, OperationalState::Initializing);
        let outcome = StateMachine::apply_point(&mut state, &c, 10.0, 3.0);
        assert_eq!(state.state, OperationalState::Normal);
        assert!(outcome.changed);
    }

    #[test]
    fn critical_moves_normal_to_alert() {
        let mut state = SeriesState::new("s1", 0.0);
        state.state = OperationalState::Normal;
        let c = Classification::critical("critical");
        let outcome = StateMachine::apply_point(&mut state, &c, 120.0, 10.0);
        assert_eq!(outcome.to, OperationalState::Alert);
    }

    #[test]
    fn normal_point_clears_warning_only_if_no_active_warning() {
        let mut state = SeriesState::new("s1", 0.0);
        state.state = OperationalState::Warning;
        state.has_active_warning = true;
        let c = Classification::normal();
        let outcome = StateMachine::apply_point(&mut state, &c, 50.0, 10.0);
        assert_eq!(outcome.to, OperationalState::Warning, "active warning blocks recovery");

        state.has_active_warning = false;
        let outcome2 = StateMachine::apply_point(&mut state, &c, 50.0, 11.0);
        assert_eq!(outcome2.to, OperationalState::Normal);
    }

    #[test]
    fn stale_then_any_point_reinitializes() {
        let mut state = SeriesState::new("s1", 0.0);
        state.state = OperationalState::Normal;
        state.valid_readings_count = 50;
        StateMachine::mark_stale(&mut state, 100.0);
        assert_eq!(state.state, OperationalState::Stale);

        let c = Classification::warmup();
        StateMachine::apply_point(&mut state, &c, 50.0, 200.0);
        assert_eq!(state.valid_readings_count, 1, "warm-up counter restarts");
    }
}
