//! The Prediction sub-pipeline (C10): the only consumer of NORMAL
//! classifications, including `warmup`. Upserts the series' latest-value
//! record unconditionally, but only publishes to the throttled prediction
//! bus (C9) when the series has left `INITIALIZING` and the stream has
//! `prediction_enabled` — warm-up points are counted but never predicted on
//! (Open Question resolution, recorded in DESIGN.md).

use std::collections::HashMap;

use ingest_core::{ClassificationKind, Reason, UnifiedReading};
use ingest_resilience::{PredictionMessage, PredictionPublisher, ThrottledBus};

use crate::events::{LatestValueStore, PipelineError};

pub struct PredictionPipeline<S: LatestValueStore, P: PredictionPublisher> {
    store: S,
    bus: ThrottledBus<P>,
}

impl<S: LatestValueStore, P: PredictionPublisher> PredictionPipeline<S, P> {
    pub fn new(store: S, bus: ThrottledBus<P>) -> Self {
        Self { store, bus }
    }

    pub fn bus(&self) -> &ThrottledBus<P> {
        &self.bus
    }

    /// `reading.classification.kind` must be `Normal`; the router is
    /// responsible for only dispatching here on that kind.
    ///
    /// Gates the publish on the reading's own `reason` rather than the
    /// series' (possibly post-transition) operational state: the point that
    /// *completes* warm-up is still classified `Reason::Warmup` even though
    /// the state machine has already flipped INITIALIZING → NORMAL for it
    /// (§4.C7 warm-up suppression, §8 scenario 1, I3/P3) — reading state
    /// here would publish on that point, which spec.md's Open Questions
    /// resolution explicitly rules out.
    pub async fn handle(&self, reading: &UnifiedReading, prediction_enabled: bool) -> Result<(), PipelineError> {
        debug_assert_eq!(reading.classification.kind, ClassificationKind::Normal);
        let point = &reading.point;

        self.store.upsert(&point.series_id, point.value, point.timestamp).await?;

        if reading.classification.reason == Reason::Warmup || !prediction_enabled {
            return Ok(());
        }

        self.bus
            .publish(PredictionMessage {
                series_id: point.series_id.clone(),
                value: point.value,
                timestamp: point.timestamp,
                ingested_at: point.ingested_at,
                metadata: HashMap::new(),
            })
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::InMemoryLatestValueStore;
    use ingest_core::{Classification, DataPoint, Domain};
    use ingest_resilience::RecordingPublisher;
    use std::time::Duration;

    fn reading(series_id: &str, value: f64, classification: Classification) -> UnifiedReading {
        UnifiedReading::new(
            DataPoint {
                series_id: series_id.to_string(),
                value,
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
    async fn warmup_is_counted_but_never_published() {
        let pipeline = PredictionPipeline::new(
            InMemoryLatestValueStore::new(),
            ThrottledBus::new(RecordingPublisher::default(), Duration::from_secs(1)),
        );
        let reading = reading("s1", 50.0, Classification::warmup());
        pipeline.handle(&reading, true).await.unwrap();
        assert_eq!(pipeline.store.get("s1"), Some((50.0, 10.0)));
        assert_eq!(pipeline.bus.published_count(), 0);
    }

    /// The point that *completes* warm-up is still classified
    /// `Reason::Warmup` (the classifier rewrites it before the state
    /// machine ever runs), so it must not publish even though by the time
    /// this handler runs the series' persisted state has already flipped to
    /// NORMAL (§8 scenario 1).
    #[tokio::test]
    async fn warmup_completing_point_is_still_suppressed() {
        let pipeline = PredictionPipeline::new(
            InMemoryLatestValueStore::new(),
            ThrottledBus::new(RecordingPublisher::default(), Duration::from_secs(1)),
        );
        let reading = reading("s1", 50.0, Classification::warmup());
        pipeline.handle(&reading, true).await.unwrap();
        assert_eq!(pipeline.bus.published_count(), 0);
    }

    #[tokio::test]
    async fn normal_point_after_warmup_publishes() {
        let pipeline = PredictionPipeline::new(
            InMemoryLatestValueStore::new(),
            ThrottledBus::new(RecordingPublisher::default(), Duration::from_secs(1)),
        );
        let reading = reading("s1", 50.0, Classification::normal());
        pipeline.handle(&reading, true).await.unwrap();
        assert_eq!(pipeline.bus.published_count(), 1);
    }

    #[tokio::test]
    async fn disabled_prediction_is_silently_skipped() {
        let pipeline = PredictionPipeline::new(
            InMemoryLatestValueStore::new(),
            ThrottledBus::new(RecordingPublisher::default(), Duration::from_secs(1)),
        );
        let reading = reading("s1", 50.0, Classification::normal());
        pipeline.handle(&reading, false).await.unwrap();
        assert_eq!(pipeline.bus.published_count(), 0);
    }
}
