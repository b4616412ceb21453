//! The unified reading contract (C1).
//!
//! `DataPoint` is the single in-memory shape every transport parser produces
//! and everything downstream of it consumes. `UnifiedReading` wraps a
//! `DataPoint` together with its classification once C7 has run; only a
//! `UnifiedReading` is handed to a sub-pipeline (C10).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::classification::Classification;

/// Coarse domain tag; drives storage routing (I7) and default constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Iot,
    Infrastructure,
    Finance,
    Health,
    Generic,
}

impl Domain {
    /// I7: legacy IoT series persist to the legacy backend; everything else
    /// goes to the generic time-series backend.
    pub fn is_legacy(self) -> bool {
        matches!(self, Domain::Iot)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Domain::Iot => "iot",
            Domain::Infrastructure => "infrastructure",
            Domain::Finance => "finance",
            Domain::Health => "health",
            Domain::Generic => "generic",
        }
    }
}

/// The universal unit flowing through the core (spec §3, C1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPoint {
    /// Stable identifier, unique per series: `{domain}/{source_id}/{stream_id}`
    /// or, for legacy IoT, the integer sensor id rendered as a string.
    pub series_id: String,
    pub value: f64,
    /// Seconds since epoch, fractional — instant the producer observed the value.
    pub timestamp: f64,
    pub ingested_at: Option<f64>,
    pub processed_at: Option<f64>,
    pub domain: Domain,
    pub source_id: Option<String>,
    pub stream_type: Option<String>,
    pub sequence: Option<u64>,
    pub metadata: HashMap<String, serde_json::Value>,
    /// Producer-supplied idempotency key; derived if absent (§4.C3).
    pub msg_id: Option<String>,
}

impl DataPoint {
    /// Derive a `msg_id` from `(series_id, timestamp_rounded_us, value_rounded)`
    /// per §4.C3, used whenever the producer did not supply one.
    pub fn derived_msg_id(&self) -> String {
        derive_msg_id(&self.series_id, self.timestamp, self.value)
    }

    /// The id used for deduplication: the producer's if present, else derived.
    pub fn effective_msg_id(&self) -> String {
        self.msg_id
            .clone()
            .unwrap_or_else(|| self.derived_msg_id())
    }
}

/// Derive a stable idempotency key from the triple spec.md names in §4.C3.
/// Timestamp is rounded to microseconds, value to 6 decimal places, so two
/// floating point representations of "the same" reading collide on purpose.
pub fn derive_msg_id(series_id: &str, timestamp: f64, value: f64) -> String {
    let ts_us = (timestamp * 1_000_000.0).round() as i64;
    let value_rounded = (value * 1_000_000.0).round() as i64;
    format!("{series_id}:{ts_us}:{value_rounded}")
}

/// A `DataPoint` plus the classifier's verdict (C7) — the only shape handed
/// to a sub-pipeline (C10/C11).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedReading {
    pub point: DataPoint,
    pub classification: Classification,
}

impl UnifiedReading {
    pub fn new(point: DataPoint, classification: Classification) -> Self {
        Self {
            point,
            classification,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_msg_id_is_stable() {
        let a = derive_msg_id("s1", 12.000_001, 7.0);
        let b = derive_msg_id("s1", 12.0000012, 7.0);
        assert_eq!(a, b, "sub-microsecond jitter must not change the key");
    }

    #[test]
    fn derived_msg_id_differs_on_value() {
        let a = derive_msg_id("s1", 12.0, 7.0);
        let b = derive_msg_id("s1", 12.0, 7.1);
        assert_ne!(a, b);
    }

    #[test]
    fn domain_legacy_routing() {
        assert!(Domain::Iot.is_legacy());
        assert!(!Domain::Generic.is_legacy());
        assert!(!Domain::Finance.is_legacy());
    }
}
