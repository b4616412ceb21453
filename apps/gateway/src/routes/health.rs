//! `/health`, `/health/{backend}`, `/resilience/health` (§6.1).

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use ingest_core::Domain;
use ingest_resilience::BreakerState;
use ingest_storage::BackendHealth;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum HealthStatus {
    Ok,
    Degraded,
    Down,
}

impl From<BackendHealth> for HealthStatus {
    fn from(h: BackendHealth) -> Self {
        match h {
            BackendHealth::Up => HealthStatus::Ok,
            BackendHealth::Degraded => HealthStatus::Degraded,
            BackendHealth::Down => HealthStatus::Down,
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: HealthStatus,
    details: HashMap<String, HealthStatus>,
}

/// `GET /health`: aggregate status is the worst of the two backends.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let report = state.router.storage_health().await;
    let mut details = HashMap::new();
    details.insert("legacy".to_string(), HealthStatus::from(report.legacy));
    details.insert("generic".to_string(), HealthStatus::from(report.generic));

    let status = if report.legacy == BackendHealth::Down || report.generic == BackendHealth::Down {
        HealthStatus::Down
    } else if report.legacy == BackendHealth::Degraded || report.generic == BackendHealth::Degraded {
        HealthStatus::Degraded
    } else {
        HealthStatus::Ok
    };

    Json(HealthResponse { status, details })
}

/// `GET /health/:backend`
async fn health_backend(
    State(state): State<AppState>,
    Path(backend): Path<String>,
) -> Result<Json<HealthResponse>, StatusCode> {
    let domain = match backend.as_str() {
        "legacy" | "iot" => Domain::Iot,
        "generic" => Domain::Generic,
        _ => return Err(StatusCode::NOT_FOUND),
    };
    let health = state.router.backend_health(domain).await;
    Ok(Json(HealthResponse {
        status: HealthStatus::from(health),
        details: HashMap::from([(backend, HealthStatus::from(health))]),
    }))
}

#[derive(Serialize)]
struct BreakerReport {
    state: &'static str,
    opened_at: Option<f64>,
}

fn breaker_report(state: BreakerState) -> BreakerReport {
    BreakerReport {
        state: match state {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        },
        // `CircuitBreaker` tracks open-since on a monotonic clock, not a
        // wall-clock timestamp, so there's nothing meaningful to report here.
        opened_at: None,
    }
}

#[derive(Serialize)]
struct DedupReport {
    available: bool,
}

#[derive(Serialize)]
struct DlqReport {
    depth: usize,
}

#[derive(Serialize)]
struct ResilienceHealthResponse {
    dedup: DedupReport,
    dlq: DlqReport,
    breakers: HashMap<String, BreakerReport>,
}

/// `GET /resilience/health`
async fn resilience_health(State(state): State<AppState>) -> Json<ResilienceHealthResponse> {
    let mut breakers = HashMap::new();
    breakers.insert("storage.legacy".to_string(), breaker_report(state.router.legacy_breaker_state()));
    breakers.insert("storage.generic".to_string(), breaker_report(state.router.generic_breaker_state()));

    Json(ResilienceHealthResponse {
        dedup: DedupReport {
            available: !state.router.dedup_is_passthrough(),
        },
        dlq: DlqReport {
            depth: state.router.dlq().depth(),
        },
        breakers,
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/:backend", get(health_backend))
        .route("/resilience/health", get(resilience_health))
        .with_state(state)
}
