//! The router (C11): the single orchestration point every transport
//! ultimately calls into. Runs guards → dedup → constraint/state load →
//! classify → dispatch to exactly one sub-pipeline (C10) → persist the raw
//! point with retry + circuit breaker (C5) → DLQ on exhaustion (C4) →
//! atomic state machine transition (C8), serialized per series.

use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use uuid::Uuid;

use ingest_core::{classify_with_raw_reason, guards, Classification, DataPoint, ErrorKind, StateMachine, UnifiedReading};
use ingest_resilience::{
    retry_with_backoff, CircuitBreaker, DeadLetterQueue, Deduplicator, DlqCategory, DlqEntry, IdempotencyStore,
    PredictionPublisher, RetryError, RetryPolicy,
};
use ingest_storage::{ConfigLoader, ConstraintStateRepository, DomainStorageRouter, GenericStore, LegacyStore, StateStore};

use crate::alert::AlertPipeline;
use crate::events::{AlertStore, LatestValueStore, NotificationSink, PipelineError, WarningStore};
use crate::prediction::PredictionPipeline;
use crate::warning::WarningPipeline;

#[derive(Debug)]
pub struct IngestError {
    pub kind: ErrorKind,
    pub message: String,
}

impl IngestError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for IngestError {}

#[derive(Debug)]
pub enum IngestOutcome {
    Stored { classification: Classification },
    Duplicate,
}

pub struct IngestRouter<C, St, L, G, D, P, A, W, Lv, N>
where
    C: ConfigLoader,
    St: StateStore,
    L: LegacyStore,
    G: GenericStore,
    D: IdempotencyStore,
    P: PredictionPublisher,
    A: AlertStore,
    W: WarningStore,
    Lv: LatestValueStore,
    N: NotificationSink,
{
    repository: ConstraintStateRepository<C, St>,
    storage: DomainStorageRouter<L, G>,
    legacy_breaker: CircuitBreaker,
    generic_breaker: CircuitBreaker,
    retry_policy: RetryPolicy,
    dlq: Arc<DeadLetterQueue>,
    dedup: Deduplicator<D>,
    alert_pipeline: AlertPipeline<A, N>,
    warning_pipeline: WarningPipeline<W>,
    prediction_pipeline: PredictionPipeline<Lv, P>,
    suspicious_zero_log: guards::SuspiciousZeroLog,
    transition_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    known_series: DashSet<String>,
}

impl<C, St, L, G, D, P, A, W, Lv, N> IngestRouter<C, St, L, G, D, P, A, W, Lv, N>
where
    C: ConfigLoader,
    St: StateStore,
    L: LegacyStore,
    G: GenericStore,
    D: IdempotencyStore,
    P: PredictionPublisher,
    A: AlertStore,
    W: WarningStore,
    Lv: LatestValueStore,
    N: NotificationSink,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repository: ConstraintStateRepository<C, St>,
        storage: DomainStorageRouter<L, G>,
        dlq: Arc<DeadLetterQueue>,
        dedup: Deduplicator<D>,
        alert_pipeline: AlertPipeline<A, N>,
        warning_pipeline: WarningPipeline<W>,
        prediction_pipeline: PredictionPipeline<Lv, P>,
    ) -> Self {
        Self::with_breaker_config(
            repository,
            storage,
            dlq,
            dedup,
            alert_pipeline,
            warning_pipeline,
            prediction_pipeline,
            ingest_resilience::DEFAULT_FAILURE_THRESHOLD,
            ingest_resilience::DEFAULT_OPEN_DURATION,
        )
    }

    /// Same as [`Self::new`] but with the storage breakers' failure
    /// threshold and open duration taken from config instead of the
    /// resilience crate's defaults (§6.6 `TUNING_CIRCUIT_BREAKER_*`).
    #[allow(clippy::too_many_arguments)]
    pub fn with_breaker_config(
        repository: ConstraintStateRepository<C, St>,
        storage: DomainStorageRouter<L, G>,
        dlq: Arc<DeadLetterQueue>,
        dedup: Deduplicator<D>,
        alert_pipeline: AlertPipeline<A, N>,
        warning_pipeline: WarningPipeline<W>,
        prediction_pipeline: PredictionPipeline<Lv, P>,
        breaker_failure_threshold: u32,
        breaker_open_duration: std::time::Duration,
    ) -> Self {
        Self {
            repository,
            storage,
            legacy_breaker: CircuitBreaker::new("storage.legacy", breaker_failure_threshold, breaker_open_duration),
            generic_breaker: CircuitBreaker::new("storage.generic", breaker_failure_threshold, breaker_open_duration),
            retry_policy: RetryPolicy::default(),
            dlq,
            dedup,
            alert_pipeline,
            warning_pipeline,
            prediction_pipeline,
            suspicious_zero_log: guards::SuspiciousZeroLog::default(),
            transition_locks: DashMap::new(),
            known_series: DashSet::new(),
        }
    }

    pub fn known_series(&self) -> Vec<String> {
        self.known_series.iter().map(|s| s.clone()).collect()
    }

    /// One stale-timeout sweep pass (C8) over every series the router has
    /// ever seen. Intended to be driven by a periodic task (default cadence
    /// 60s, §4.C8), not called inline per-point.
    pub async fn sweep_stale(&self, stale_timeout: f64, now: f64) -> Vec<String> {
        let sweeper = crate::stale_sweeper::StaleSweeper::new(&self.repository, stale_timeout);
        sweeper.sweep_once(&self.known_series(), now).await
    }

    pub fn dlq(&self) -> &DeadLetterQueue {
        &self.dlq
    }

    pub async fn storage_health(&self) -> ingest_storage::StorageHealthReport {
        self.storage.health().await
    }

    pub async fn backend_health(&self, domain: ingest_core::Domain) -> ingest_storage::BackendHealth {
        self.storage.backend_health(domain).await
    }

    pub fn legacy_breaker_state(&self) -> ingest_resilience::BreakerState {
        self.legacy_breaker.state()
    }

    pub fn generic_breaker_state(&self) -> ingest_resilience::BreakerState {
        self.generic_breaker.state()
    }

    pub fn dedup_is_passthrough(&self) -> bool {
        self.dedup.is_passthrough()
    }

    /// Ingest one point. `transport` names the calling adapter (`"mqtt"`,
    /// `"http"`, `"websocket"`, `"csv"`) for DLQ bookkeeping (§6.5).
    pub async fn ingest(&self, point: DataPoint, transport: &str, now: f64) -> Result<IngestOutcome, IngestError> {
        if let Err(err) = guards::check(&point, now) {
            self.dlq.push(DlqEntry {
                ts_first_failed: now,
                transport: transport.to_string(),
                raw: serialize(&point),
                category: DlqCategory::Guards,
                detail: err.to_string(),
                attempts: 1,
                msg_id: point.msg_id.clone(),
            });
            return Err(IngestError::new(err.kind(), err.to_string()));
        }

        let msg_id = point.effective_msg_id();
        if self.dedup.is_duplicate(&msg_id).await {
            return Ok(IngestOutcome::Duplicate);
        }

        let lock = self
            .transition_locks
            .entry(point.series_id.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        self.known_series.insert(point.series_id.clone());

        let config = self.repository.get_config(&point.series_id, point.domain).await;
        let mut state = self.repository.get_state(&point.series_id, now).await;

        if guards::is_suspicious_zero(point.value, state.last_value, guards::DEFAULT_SUSPICIOUS_ZERO_THRESHOLD) {
            self.suspicious_zero_log.record(
                &point.series_id,
                state.last_value.unwrap_or(0.0),
                point.timestamp,
            );
        }

        let (classification, raw_reason) = classify_with_raw_reason(&point, &config.constraints, &state);
        // §4.C7 consecutive-violation debounce: advance the persisted streak
        // by the *raw* reason this point produced, not the (possibly
        // debounce-suppressed) final classification's reason — otherwise the
        // streak required to ever go live never accumulates (it would read
        // back as `Reason::Normal` every time debounce itself is what
        // suppressed it).
        state.bump_consecutive(raw_reason);

        let breaker = if point.domain.is_legacy() {
            &self.legacy_breaker
        } else {
            &self.generic_breaker
        };
        let persist_result = retry_with_backoff(
            breaker,
            &self.retry_policy,
            |e: &ingest_storage::StorageError| e.kind(),
            || self.storage.insert(&point, &classification),
        )
        .await;

        if let Err(err) = persist_result {
            let detail = err.to_string();
            self.dlq.push(DlqEntry {
                ts_first_failed: now,
                transport: transport.to_string(),
                raw: serialize(&point),
                category: DlqCategory::Persist,
                detail: detail.clone(),
                attempts: self.retry_policy.max_attempts,
                msg_id: Some(msg_id),
            });
            return Err(IngestError::new(retry_err_kind(&err), detail));
        }

        // The state machine's NORMAL-recovery branch needs to know whether an
        // alert/warning is still active for this series (§4.C8: "NORMAL
        // point, and no active alert/warning"); refresh from the stores the
        // sub-pipelines actually own rather than trusting a cached flag.
        state.has_active_alert = self
            .alert_pipeline
            .store()
            .active(&point.series_id)
            .await
            .unwrap_or(None)
            .is_some();
        state.has_active_warning = self
            .warning_pipeline
            .store()
            .active(&point.series_id)
            .await
            .unwrap_or(None)
            .is_some();

        StateMachine::apply_point(&mut state, &classification, point.value, point.timestamp);

        // §4.C11 step 6 / §7: the sub-pipeline's own persistence is wrapped
        // in the same retry + circuit-breaker treatment as the raw point
        // insert above, and DLQ'd with category `persist` on exhaustion
        // rather than silently dropping a lost alert/warning/latest-value
        // write.
        let reading = UnifiedReading::new(point, classification.clone());
        let dispatch_outcome: Result<(), RetryError<PipelineError>> = match classification.kind {
            ingest_core::ClassificationKind::CriticalViolation => {
                let alert_id = Uuid::new_v4().to_string();
                retry_with_backoff(
                    breaker,
                    &self.retry_policy,
                    |e: &PipelineError| e.kind(),
                    || self.alert_pipeline.handle(&reading, alert_id.clone(), now),
                )
                .await
            }
            ingest_core::ClassificationKind::WarningViolation | ingest_core::ClassificationKind::AnomalyDetected => {
                let warning_id = Uuid::new_v4().to_string();
                retry_with_backoff(
                    breaker,
                    &self.retry_policy,
                    |e: &PipelineError| e.kind(),
                    || self.warning_pipeline.handle(&reading, warning_id.clone(), now),
                )
                .await
            }
            ingest_core::ClassificationKind::Normal => {
                retry_with_backoff(
                    breaker,
                    &self.retry_policy,
                    |e: &PipelineError| e.kind(),
                    || self.prediction_pipeline.handle(&reading, config.prediction_enabled),
                )
                .await
            }
            ingest_core::ClassificationKind::Rejected => Ok(()),
        };

        if let Err(err) = &dispatch_outcome {
            self.dlq.push(DlqEntry {
                ts_first_failed: now,
                transport: transport.to_string(),
                raw: serialize(&reading.point),
                category: DlqCategory::Persist,
                detail: err.to_string(),
                attempts: self.retry_policy.max_attempts,
                msg_id: Some(msg_id.clone()),
            });
        }

        if let Err(err) = self.repository.save_state(&state).await {
            tracing::error!(series_id = %reading.point.series_id, error = %err, "failed to persist series state");
        }

        let classification = reading.classification;
        dispatch_outcome.map_err(|e| IngestError::new(e.kind(), e.to_string()))?;

        Ok(IngestOutcome::Stored { classification })
    }
}

fn serialize(point: &DataPoint) -> Vec<u8> {
    serde_json::to_vec(point).unwrap_or_default()
}

fn retry_err_kind(err: &RetryError<ingest_storage::StorageError>) -> ErrorKind {
    err.kind()
}
