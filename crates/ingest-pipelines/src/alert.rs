//! The Alert sub-pipeline (C10): the only consumer of CRITICAL_VIOLATION
//! classifications. Resolves any prior active alert for the series as
//! superseded, persists the new one as active, and emits a notification.
//! Never publishes to the prediction bus (§4.C10).

use ingest_core::{ClassificationKind, UnifiedReading};

use crate::events::{AlertRecord, AlertStore, Notification, NotificationSink, PipelineError, RecordStatus};

pub struct AlertPipeline<A: AlertStore, N: NotificationSink> {
    store: A,
    notifier: N,
}

impl<A: AlertStore, N: NotificationSink> AlertPipeline<A, N> {
    pub fn new(store: A, notifier: N) -> Self {
        Self { store, notifier }
    }

    pub fn store(&self) -> &A {
        &self.store
    }

    /// `reading.classification.kind` must be `CriticalViolation`; callers
    /// (the router) are responsible for only dispatching here on that kind.
    pub async fn handle(&self, reading: &UnifiedReading, alert_id: impl Into<String>, now: f64) -> Result<(), PipelineError> {
        debug_assert_eq!(reading.classification.kind, ClassificationKind::CriticalViolation);
        let point = &reading.point;

        if let Some(prior) = self.store.active(&point.series_id).await? {
            self.store.resolve(&prior.id, now).await?;
        }

        let record = AlertRecord {
            id: alert_id.into(),
            series_id: point.series_id.clone(),
            value: point.value,
            timestamp: point.timestamp,
            violated_band: reading.classification.metadata.violated_band.clone(),
            status: RecordStatus::Active,
            created_at: now,
            resolved_at: None,
        };
        self.store.create(record.clone()).await?;

        self.notifier.notify(Notification::Alert(record)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{InMemoryAlertStore, RecordingNotificationSink};
    use ingest_core::Classification;
    use std::collections::HashMap;

    fn reading(series_id: &str, value: f64) -> UnifiedReading {
        UnifiedReading::new(
            DataPoint {
                series_id: series_id.to_string(),
                value,
                timestamp: 10.0,
                ingested_at: None,
                processed_at: None,
                domain: ingest_core::Domain::Generic,
                source_id: None,
                stream_type: None,
                sequence: None,
                metadata: HashMap::new(),
                msg_id: None,
            },
            Classification::critical("critical"),
        )
    }

    #[tokio::test]
    async fn creates_active_alert_and_notifies() {
        let pipeline = AlertPipeline::new(InMemoryAlertStore::new(), RecordingNotificationSink::default());
        pipeline.handle(&reading("s1", 999.0), "a1", 100.0).await.unwrap();
        assert_eq!(pipeline.notifier.sent.lock().len(), 1);
        let active = pipeline.store.active("s1").await.unwrap();
        assert!(active.is_some());
    }

    #[tokio::test]
    async fn second_alert_supersedes_first() {
        let pipeline = AlertPipeline::new(InMemoryAlertStore::new(), RecordingNotificationSink::default());
        pipeline.handle(&reading("s1", 999.0), "a1", 100.0).await.unwrap();
        pipeline.handle(&reading("s1", 1000.0), "a2", 200.0).await.unwrap();
        let active = pipeline.store.active("s1").await.unwrap().unwrap();
        assert_eq!(active.id, "a2");
    }
}
