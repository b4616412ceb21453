//! Per-series configuration and numeric constraint bands (spec §3).

use serde::{Deserialize, Serialize};

use crate::datapoint::Domain;

/// A closed numeric interval; either side may be absent (unbounded).
/// Boundary values are in-band (B3: "closed intervals on the safe side").
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Bound {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    /// `true` if `value` falls strictly outside this bound.
    pub fn violates(&self, value: f64) -> bool {
        if let Some(min) = self.min {
            if value < min {
                return true;
            }
        }
        if let Some(max) = self.max {
            if value > max {
                return true;
            }
        }
        false
    }

    pub fn contains(&self, value: f64) -> bool {
        !self.violates(value)
    }
}

/// Rate-of-change band feeding delta-spike detection (§4.C7).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateOfChangeBand {
    pub abs_delta: Option<f64>,
    pub rel_delta: Option<f64>,
    pub abs_slope: Option<f64>,
    pub rel_slope: Option<f64>,
    /// Default 10s — `Δt` must be within this window for a spike to fire.
    pub spike_window_seconds: f64,
    /// Default 5 — minimum valid readings in recent history before spikes
    /// are considered at all.
    pub min_readings: u32,
}

impl Default for RateOfChangeBand {
    fn default() -> Self {
        Self {
            abs_delta: None,
            rel_delta: None,
            abs_slope: None,
            rel_slope: None,
            spike_window_seconds: 10.0,
            min_readings: 5,
        }
    }
}

/// Four optional bands, tightest innermost: a `warning` zone nested inside
/// `operational`, nested inside `critical` (spec §3). Plus the rate-of-change
/// band used for delta-spike detection, independent of the others.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueConstraints {
    /// Hard physical limits. Outside this band → CRITICAL_VIOLATION (I4: not
    /// downgradable afterwards).
    pub critical: Option<Bound>,
    /// Outside this band (but inside critical) → WARNING_VIOLATION
    /// (`operational_range`).
    pub operational: Option<Bound>,
    /// The inner "comfortable" zone. A value inside `operational` but outside
    /// `warning` → WARNING_VIOLATION (`warning_zone`).
    pub warning: Option<Bound>,
    pub rate_of_change: RateOfChangeBand,
    /// Default 1 — number of back-to-back same-reason violations required
    /// before a violation is treated as "live" (debounce, §4.C7).
    pub consecutive_violations_required: u32,
    /// Default 300 — suppression window after a resolved alert/warning
    /// before a new one of the same kind may open.
    pub cooldown_seconds: f64,
}

impl ValueConstraints {
    pub fn domain_default(domain: Domain) -> Self {
        let mut c = ValueConstraints {
            consecutive_violations_required: 1,
            cooldown_seconds: 300.0,
            ..Default::default()
        };
        // Conservative, permissive defaults per domain; real constraints are
        // expected to be configured per series via the constraint repository
        // (C6). These exist only so an unconfigured series still classifies.
        c.rate_of_change = RateOfChangeBand::default();
        match domain {
            Domain::Health => {
                c.critical = Some(Bound::new(Some(-1000.0), Some(1000.0)));
            }
            _ => {
                c.critical = Some(Bound::new(Some(f64::MIN), Some(f64::MAX)));
            }
        }
        c
    }
}

/// Per-series configuration. Identity = `(series_id, domain)` (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    pub series_id: String,
    pub domain: Domain,
    pub display_name: String,
    pub alerting_enabled: bool,
    pub prediction_enabled: bool,
    pub constraints: ValueConstraints,
}

impl StreamConfig {
    pub fn new_default(series_id: impl Into<String>, domain: Domain) -> Self {
        let series_id = series_id.into();
        Self {
            display_name: series_id.clone(),
            series_id,
            domain,
            alerting_enabled: true,
            prediction_enabled: true,
            constraints: ValueConstraints::domain_default(domain),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bound_boundary_is_in_band() {
        let b = Bound::new(Some(10.0), Some(90.0));
        assert!(!b.violates(10.0));
        assert!(!b.violates(90.0));
        assert!(b.violates(9.999));
        assert!(b.violates(90.001));
    }

    #[test]
    fn unbounded_side_never_violates() {
        let b = Bound::new(None, Some(100.0));
        assert!(!b.violates(-1_000_000.0));
        assert!(b.violates(100.1));
    }
}
