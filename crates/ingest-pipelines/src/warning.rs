//! The Warning sub-pipeline (C10): consumes both ANOMALY_DETECTED/delta_spike
//! and WARNING_VIOLATION/{operational_range,warning_zone}. Resolves any
//! prior active warning for the series as superseded, persists the new one
//! with `event_type` set from the triggering reason. Never publishes to the
//! prediction bus (§4.C10).

use ingest_core::{ClassificationKind, UnifiedReading};

use crate::events::{PipelineError, RecordStatus, WarningRecord, WarningStore};

pub struct WarningPipeline<W: WarningStore> {
    store: W,
}

impl<W: WarningStore> WarningPipeline<W> {
    pub fn new(store: W) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &W {
        &self.store
    }

    /// `reading.classification.kind` must be `WarningViolation` or
    /// `AnomalyDetected`; the router is responsible for only dispatching
    /// here on those kinds.
    pub async fn handle(&self, reading: &UnifiedReading, warning_id: impl Into<String>, now: f64) -> Result<(), PipelineError> {
        debug_assert!(matches!(
            reading.classification.kind,
            ClassificationKind::WarningViolation | ClassificationKind::AnomalyDetected
        ));
        let point = &reading.point;

        if let Some(prior) = self.store.active(&point.series_id).await? {
            self.store.resolve(&prior.id, now).await?;
        }

        let record = WarningRecord {
            id: warning_id.into(),
            series_id: point.series_id.clone(),
            value: point.value,
            timestamp: point.timestamp,
            event_type: reading.classification.reason,
            metadata: reading.classification.metadata.clone(),
            status: RecordStatus::Active,
            created_at: now,
            resolved_at: None,
        };
        self.store.create(record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::InMemoryWarningStore;
    use ingest_core::{Classification, DataPoint, Domain, Reason};
    use std::collections::HashMap;

    fn reading(series_id: &str, classification: Classification) -> UnifiedReading {
        UnifiedReading::new(
            DataPoint {
                series_id: series_id.to_string(),
                value: 15.0,
                timestamp: 10.0,
                ingested_at: None,
                processed_at: None,
                domain: Domain::Generic,
                source_id: None,
                stream_type: None,
                sequence: None,
                metadata: HashMap::new(),
                msg_id: None,
            },
            classification,
        )
    }

    #[tokio::test]
    async fn delta_spike_persists_with_event_type() {
        let pipeline = WarningPipeline::new(InMemoryWarningStore::new());
        let reading = reading("s1", Classification::delta_spike(5.0, 0.1, 1.0));
        pipeline.handle(&reading, "w1", 100.0).await.unwrap();
        let active = pipeline.store.active("s1").await.unwrap().unwrap();
        assert_eq!(active.event_type, Reason::DeltaSpike);
    }

    #[tokio::test]
    async fn new_warning_supersedes_prior() {
        let pipeline = WarningPipeline::new(InMemoryWarningStore::new());
        let r1 = reading("s1", Classification::warning(Reason::WarningZone, "warning"));
        pipeline.handle(&r1, "w1", 100.0).await.unwrap();
        let r2 = reading("s1", Classification::warning(Reason::OperationalRange, "operational"));
        pipeline.handle(&r2, "w2", 200.0).await.unwrap();
        let active = pipeline.store.active("s1").await.unwrap().unwrap();
        assert_eq!(active.id, "w2");
        assert_eq!(active.event_type, Reason::OperationalRange);
    }
}
