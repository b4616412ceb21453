//! Shared record and sink types for the alert/warning/prediction
//! sub-pipelines (C10).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ingest_core::{ClassificationMetadata, Reason};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("event store unavailable: {0}")]
    Unavailable(String),
    #[error("notification delivery failed: {0}")]
    NotificationFailed(String),
}

impl PipelineError {
    pub fn kind(&self) -> ingest_core::ErrorKind {
        match self {
            PipelineError::Unavailable(_) => ingest_core::ErrorKind::Unavailable,
            PipelineError::NotificationFailed(_) => ingest_core::ErrorKind::Internal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Active,
    Superseded,
}

/// A persisted alert (C10 Alert sub-pipeline). Only CRITICAL_VIOLATION
/// points reach this stage (§4.C10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: String,
    pub series_id: String,
    pub value: f64,
    pub timestamp: f64,
    pub violated_band: Option<String>,
    pub status: RecordStatus,
    pub created_at: f64,
    pub resolved_at: Option<f64>,
}

/// A persisted warning (C10 Warning sub-pipeline). Covers both
/// ANOMALY_DETECTED/delta_spike and WARNING_VIOLATION/{operational_range,
/// warning_zone} — `event_type` records which (§4.C10: "event_type recorded
/// from the triggering reason").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarningRecord {
    pub id: String,
    pub series_id: String,
    pub value: f64,
    pub timestamp: f64,
    pub event_type: Reason,
    pub metadata: ClassificationMetadata,
    pub status: RecordStatus,
    pub created_at: f64,
    pub resolved_at: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Notification {
    Alert(AlertRecord),
}

/// Durable store for alerts; the "resolve prior active, create new active"
/// sequence is the sub-pipeline's job, not this trait's — implementations
/// only need to persist whatever the sub-pipeline tells them to.
#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn active(&self, series_id: &str) -> Result<Option<AlertRecord>, PipelineError>;
    async fn resolve(&self, id: &str, resolved_at: f64) -> Result<(), PipelineError>;
    async fn create(&self, record: AlertRecord) -> Result<(), PipelineError>;
}

#[async_trait]
pub trait WarningStore: Send + Sync {
    async fn active(&self, series_id: &str) -> Result<Option<WarningRecord>, PipelineError>;
    async fn resolve(&self, id: &str, resolved_at: f64) -> Result<(), PipelineError>;
    async fn create(&self, record: WarningRecord) -> Result<(), PipelineError>;
}

/// Latest-value upsert target for the Prediction sub-pipeline (§4.C10: "only
/// ever upserts the latest value for the series, never an append-only log").
#[async_trait]
pub trait LatestValueStore: Send + Sync {
    async fn upsert(&self, series_id: &str, value: f64, timestamp: f64) -> Result<(), PipelineError>;
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), PipelineError>;
}

#[async_trait]
impl AlertStore for Box<dyn AlertStore> {
    async fn active(&self, series_id: &str) -> Result<Option<AlertRecord>, PipelineError> {
        (**self).active(series_id).await
    }
    async fn resolve(&self, id: &str, resolved_at: f64) -> Result<(), PipelineError> {
        (**self).resolve(id, resolved_at).await
    }
    async fn create(&self, record: AlertRecord) -> Result<(), PipelineError> {
        (**self).create(record).await
    }
}

#[async_trait]
impl WarningStore for Box<dyn WarningStore> {
    async fn active(&self, series_id: &str) -> Result<Option<WarningRecord>, PipelineError> {
        (**self).active(series_id).await
    }
    async fn resolve(&self, id: &str, resolved_at: f64) -> Result<(), PipelineError> {
        (**self).resolve(id, resolved_at).await
    }
    async fn create(&self, record: WarningRecord) -> Result<(), PipelineError> {
        (**self).create(record).await
    }
}

#[async_trait]
impl LatestValueStore for Box<dyn LatestValueStore> {
    async fn upsert(&self, series_id: &str, value: f64, timestamp: f64) -> Result<(), PipelineError> {
        (**self).upsert(series_id, value, timestamp).await
    }
}

#[async_trait]
impl NotificationSink for Box<dyn NotificationSink> {
    async fn notify(&self, notification: Notification) -> Result<(), PipelineError> {
        (**self).notify(notification).await
    }
}
