//! Classification result types (spec §3 "Classification").

use serde::{Deserialize, Serialize};

/// The tagged kind a `Classification` carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassificationKind {
    Normal,
    WarningViolation,
    CriticalViolation,
    AnomalyDetected,
    Rejected,
}

/// Machine-readable reason code, matched exactly against spec.md's literal
/// reason strings (`physical_range`, `operational_range`, `warning_zone`,
/// `delta_spike`, `warmup`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    PhysicalRange,
    OperationalRange,
    WarningZone,
    DeltaSpike,
    Warmup,
    Normal,
}

impl Reason {
    pub fn as_str(self) -> &'static str {
        match self {
            Reason::PhysicalRange => "physical_range",
            Reason::OperationalRange => "operational_range",
            Reason::WarningZone => "warning_zone",
            Reason::DeltaSpike => "delta_spike",
            Reason::Warmup => "warmup",
            Reason::Normal => "normal",
        }
    }
}

/// Extra, reason-dependent context the classifier computed. Carried so
/// sub-pipelines can persist the triggering values without recomputing them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetadata {
    pub violated_band: Option<String>,
    pub absolute_delta: Option<f64>,
    pub relative_delta: Option<f64>,
    pub elapsed_seconds: Option<f64>,
}

/// A tagged classification result (C7 output).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub kind: ClassificationKind,
    pub reason: Reason,
    pub metadata: ClassificationMetadata,
}

impl Classification {
    pub fn normal() -> Self {
        Self {
            kind: ClassificationKind::Normal,
            reason: Reason::Normal,
            metadata: ClassificationMetadata::default(),
        }
    }

    pub fn warmup() -> Self {
        Self {
            kind: ClassificationKind::Normal,
            reason: Reason::Warmup,
            metadata: ClassificationMetadata::default(),
        }
    }

    pub fn critical(band: impl Into<String>) -> Self {
        Self {
            kind: ClassificationKind::CriticalViolation,
            reason: Reason::PhysicalRange,
            metadata: ClassificationMetadata {
                violated_band: Some(band.into()),
                ..Default::default()
            },
        }
    }

    pub fn warning(reason: Reason, band: impl Into<String>) -> Self {
        debug_assert!(matches!(
            reason,
            Reason::OperationalRange | Reason::WarningZone
        ));
        Self {
            kind: ClassificationKind::WarningViolation,
            reason,
            metadata: ClassificationMetadata {
                violated_band: Some(band.into()),
                ..Default::default()
            },
        }
    }

    pub fn delta_spike(absolute_delta: f64, relative_delta: f64, elapsed_seconds: f64) -> Self {
        Self {
            kind: ClassificationKind::AnomalyDetected,
            reason: Reason::DeltaSpike,
            metadata: ClassificationMetadata {
                absolute_delta: Some(absolute_delta),
                relative_delta: Some(relative_delta),
                elapsed_seconds: Some(elapsed_seconds),
                ..Default::default()
            },
        }
    }

    pub fn rejected() -> Self {
        Self {
            kind: ClassificationKind::Rejected,
            reason: Reason::Normal,
            metadata: ClassificationMetadata::default(),
        }
    }

    /// I4: a CRITICAL classification can never be downgraded by a later
    /// stage. Callers that might otherwise rewrite a classification (e.g.
    /// warm-up suppression) must check this first.
    pub fn is_critical(&self) -> bool {
        self.kind == ClassificationKind::CriticalViolation
    }
}
