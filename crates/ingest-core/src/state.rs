//! Per-series operational state (spec §3 "Operational state", §4.C8).

use serde::{Deserialize, Serialize};

use crate::classification::Reason;

/// The five operational states a series can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationalState {
    Initializing,
    Normal,
    Warning,
    Alert,
    Stale,
}

impl Default for OperationalState {
    fn default() -> Self {
        OperationalState::Initializing
    }
}

/// Full per-series operational state, including the bookkeeping the
/// classifier (C7) and state machine (C8) need: the consecutive-violation
/// debounce counter (per-reason, reset on any intervening NORMAL) and the
/// cooldown timestamps for the last resolved alert/warning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesState {
    pub series_id: String,
    pub state: OperationalState,
    pub valid_readings_count: u64,
    /// Default 10 — readings required before INITIALIZING → NORMAL.
    pub min_readings_for_normal: u64,
    pub state_changed_at: f64,
    pub last_value: Option<f64>,
    pub last_timestamp: Option<f64>,

    /// Debounce state for the consecutive-violation rule (§4.C7): the reason
    /// under live evaluation and how many times it has fired back-to-back.
    pub consecutive_reason: Option<Reason>,
    pub consecutive_count: u32,

    /// Cooldown bookkeeping (§4.C7): timestamp an active alert/warning last
    /// resolved, used to suppress a new one of the same kind for
    /// `cooldown_seconds`.
    pub last_alert_resolved_at: Option<f64>,
    pub last_warning_resolved_at: Option<f64>,

    pub has_active_alert: bool,
    pub has_active_warning: bool,
}

impl SeriesState {
    pub fn new(series_id: impl Into<String>, now: f64) -> Self {
        Self {
            series_id: series_id.into(),
            state: OperationalState::Initializing,
            valid_readings_count: 0,
            min_readings_for_normal: 10,
            state_changed_at: now,
            last_value: None,
            last_timestamp: None,
            consecutive_reason: None,
            consecutive_count: 0,
            last_alert_resolved_at: None,
            last_warning_resolved_at: None,
            has_active_alert: false,
            has_active_warning: false,
        }
    }

    /// Record that `reason` just fired again; returns the updated streak
    /// length. Any other reason (including `Normal`) resets the streak.
    pub fn bump_consecutive(&mut self, reason: Reason) -> u32 {
        if reason == Reason::Normal {
            self.consecutive_reason = None;
            self.consecutive_count = 0;
            return 0;
        }
        if self.consecutive_reason == Some(reason) {
            self.consecutive_count += 1;
        } else {
            self.consecutive_reason = Some(reason);
            self.consecutive_count = 1;
        }
        self.consecutive_count
    }

    /// Whether a new alert/warning of this cooldown timestamp is still
    /// suppressed at `now`.
    pub fn in_cooldown(resolved_at: Option<f64>, cooldown_seconds: f64, now: f64) -> bool {
        match resolved_at {
            Some(t) => now - t < cooldown_seconds,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_counter_resets_on_normal() {
        let mut s = SeriesState::new("s1", 0.0);
        assert_eq!(s.bump_consecutive(Reason::WarningZone), 1);
        assert_eq!(s.bump_consecutive(Reason::WarningZone), 2);
        assert_eq!(s.bump_consecutive(Reason::Normal), 0);
        assert_eq!(s.bump_consecutive(Reason::WarningZone), 1);
    }

    #[test]
    fn consecutive_counter_resets_on_reason_change() {
        let mut s = SeriesState::new("s1", 0.0);
        assert_eq!(s.bump_consecutive(Reason::OperationalRange), 1);
        assert_eq!(s.bump_consecutive(Reason::WarningZone), 1);
    }

    #[test]
    fn cooldown_window() {
        assert!(SeriesState::in_cooldown(Some(100.0), 300.0, 200.0));
        assert!(!SeriesState::in_cooldown(Some(100.0), 300.0, 401.0));
        assert!(!SeriesState::in_cooldown(None, 300.0, 1_000.0));
    }
}
