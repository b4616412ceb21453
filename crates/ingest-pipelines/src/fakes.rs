//! In-memory implementations of the pipeline's event-store/notification
//! seams, used by tests and as the development default until real ones are
//! wired in.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::events::{
    AlertRecord, AlertStore, LatestValueStore, Notification, NotificationSink, PipelineError, WarningRecord,
    WarningStore,
};

#[derive(Default)]
pub struct InMemoryAlertStore {
    by_series: DashMap<String, AlertRecord>,
    by_id: DashMap<String, AlertRecord>,
}

impl InMemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AlertStore for InMemoryAlertStore {
    async fn active(&self, series_id: &str) -> Result<Option<AlertRecord>, PipelineError> {
        Ok(self.by_series.get(series_id).map(|r| r.clone()))
    }

    async fn resolve(&self, id: &str, resolved_at: f64) -> Result<(), PipelineError> {
        if let Some(mut record) = self.by_id.get_mut(id) {
            record.resolved_at = Some(resolved_at);
            record.status = crate::events::RecordStatus::Superseded;
            self.by_series.remove(&record.series_id.clone());
        }
        Ok(())
    }

    async fn create(&self, record: AlertRecord) -> Result<(), PipelineError> {
        self.by_id.insert(record.id.clone(), record.clone());
        self.by_series.insert(record.series_id.clone(), record);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryWarningStore {
    by_series: DashMap<String, WarningRecord>,
    by_id: DashMap<String, WarningRecord>,
}

impl InMemoryWarningStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WarningStore for InMemoryWarningStore {
    async fn active(&self, series_id: &str) -> Result<Option<WarningRecord>, PipelineError> {
        Ok(self.by_series.get(series_id).map(|r| r.clone()))
    }

    async fn resolve(&self, id: &str, resolved_at: f64) -> Result<(), PipelineError> {
        if let Some(mut record) = self.by_id.get_mut(id) {
            record.resolved_at = Some(resolved_at);
            record.status = crate::events::RecordStatus::Superseded;
            self.by_series.remove(&record.series_id.clone());
        }
        Ok(())
    }

    async fn create(&self, record: WarningRecord) -> Result<(), PipelineError> {
        self.by_id.insert(record.id.clone(), record.clone());
        self.by_series.insert(record.series_id.clone(), record);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryLatestValueStore {
    values: DashMap<String, (f64, f64)>,
}

impl InMemoryLatestValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, series_id: &str) -> Option<(f64, f64)> {
        self.values.get(series_id).map(|v| *v)
    }
}

#[async_trait]
impl LatestValueStore for InMemoryLatestValueStore {
    async fn upsert(&self, series_id: &str, value: f64, timestamp: f64) -> Result<(), PipelineError> {
        self.values.insert(series_id.to_string(), (value, timestamp));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotificationSink {
    pub sent: Mutex<Vec<Notification>>,
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn notify(&self, notification: Notification) -> Result<(), PipelineError> {
        self.sent.lock().push(notification);
        Ok(())
    }
}
