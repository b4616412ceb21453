//! Shared application state: the fully in-memory [`GatewayRouter`] type
//! alias and everything the HTTP/MQTT/WebSocket handlers need a handle to.
//!
//! Every backend here is the in-memory fake from its owning crate.
//! `ingest-storage`/`ingest-resilience` document this as the seam a real
//! deployment plugs `sqlx`/Redis-backed implementations into; this binary
//! wires the seam shut with the fakes so the whole pipeline runs standalone.

use std::sync::Arc;
use std::time::Duration;

use ingest_config::GatewayConfig;
use ingest_pipelines::fakes::{InMemoryAlertStore, InMemoryLatestValueStore, InMemoryWarningStore, RecordingNotificationSink};
use ingest_pipelines::{AlertPipeline, IngestRouter, PredictionPipeline, WarningPipeline};
use ingest_resilience::{DeadLetterQueue, Deduplicator, InMemoryStore, RecordingPublisher, ThrottledBus};
use ingest_storage::{
    ConstraintStateRepository, DomainStorageRouter, InMemoryConfigLoader, InMemoryGenericStore, InMemoryLegacyStore,
    InMemoryStateStore,
};
use ingest_transport::{InMemorySensorLookup, JobRegistry, SensorDirectory};

pub type GatewayRouter = IngestRouter<
    InMemoryConfigLoader,
    InMemoryStateStore,
    InMemoryLegacyStore,
    InMemoryGenericStore,
    InMemoryStore,
    RecordingPublisher,
    InMemoryAlertStore,
    InMemoryWarningStore,
    InMemoryLatestValueStore,
    RecordingNotificationSink,
>;

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<GatewayRouter>,
    pub jobs: Arc<JobRegistry>,
    pub sensors: Arc<SensorDirectory<InMemorySensorLookup>>,
    pub features: ingest_config::FeatureToggles,
}

impl AppState {
    pub fn build(config: &GatewayConfig) -> Self {
        let repository = ConstraintStateRepository::new(InMemoryConfigLoader::new(), InMemoryStateStore::new());
        let storage = DomainStorageRouter::new(InMemoryLegacyStore::new(), InMemoryGenericStore::new());
        let dlq = Arc::new(DeadLetterQueue::new(config.tuning.dlq_max_length));
        let dedup = Deduplicator::new(InMemoryStore::default(), Duration::from_secs(config.tuning.dedup_ttl_seconds));
        let alert_pipeline = AlertPipeline::new(InMemoryAlertStore::new(), RecordingNotificationSink::default());
        let warning_pipeline = WarningPipeline::new(InMemoryWarningStore::new());
        let bus = ThrottledBus::new(
            RecordingPublisher::default(),
            Duration::from_secs(config.tuning.bus_min_interval_seconds),
        );
        let prediction_pipeline = PredictionPipeline::new(InMemoryLatestValueStore::new(), bus);

        let router = Arc::new(IngestRouter::with_breaker_config(
            repository,
            storage,
            dlq,
            dedup,
            alert_pipeline,
            warning_pipeline,
            prediction_pipeline,
            config.tuning.circuit_breaker_threshold,
            Duration::from_secs(config.tuning.circuit_breaker_open_duration_seconds),
        ));

        Self {
            router,
            jobs: Arc::new(JobRegistry::new()),
            sensors: Arc::new(SensorDirectory::new(InMemorySensorLookup::new())),
            features: config.features.clone(),
        }
    }
}

/// Named so `/resilience/health` can report per-dependency breaker state
/// without the router exposing its private breakers directly.
pub fn breaker_names() -> [&'static str; 2] {
    ["storage.legacy", "storage.generic"]
}
