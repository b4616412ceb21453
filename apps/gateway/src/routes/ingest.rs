//! `/ingest/*` HTTP handlers (§6.1): legacy packets, legacy readings
//! (single + bulk), generic data points, and CSV upload + job status.

use std::collections::HashMap;

use axum::extract::{Multipart, Path, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use ingest_pipelines::IngestOutcome;
use ingest_transport::{
    legacy_packets_to_points, legacy_readings_to_points, CsvUploadSpec, LegacyPacketRequest, LegacyPacketResponse,
    LegacyReadingsRequest, LegacyReadingsResponse,
};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::ApiError;
use crate::state::AppState;

fn now_unix() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// `POST /ingest/packets`
async fn ingest_packets(
    State(state): State<AppState>,
    Json(request): Json<LegacyPacketRequest>,
) -> Result<Json<LegacyPacketResponse>, ApiError> {
    let now = now_unix();
    let sensors = state.sensors.clone();
    let device_uuid = request.device_uuid.clone();
    let mut resolved = HashMap::new();
    for reading in &request.readings {
        if !resolved.contains_key(&reading.sensor_uuid) {
            let id = sensors.resolve(&device_uuid, &reading.sensor_uuid).await;
            resolved.insert(reading.sensor_uuid.clone(), id);
        }
    }

    let (points, unknown_sensors) =
        legacy_packets_to_points(&request, now, |_device, sensor| resolved.get(sensor).copied().flatten());

    let mut inserted = 0usize;
    for point in points {
        if matches!(
            state.router.ingest(point, "http", now).await,
            Ok(IngestOutcome::Stored { .. }) | Ok(IngestOutcome::Duplicate)
        ) {
            inserted += 1;
        }
    }

    Ok(Json(LegacyPacketResponse { inserted, unknown_sensors }))
}

/// `POST /ingest/readings` and `POST /ingest/readings/bulk` share one body
/// shape (§6.1); bulk is just more rows in the same map.
async fn ingest_readings(
    State(state): State<AppState>,
    Json(request): Json<LegacyReadingsRequest>,
) -> Result<Json<LegacyReadingsResponse>, ApiError> {
    let now = now_unix();
    let points = legacy_readings_to_points(&request, now);
    let mut inserted = 0usize;
    for point in points {
        if matches!(
            state.router.ingest(point, "http", now).await,
            Ok(IngestOutcome::Stored { .. }) | Ok(IngestOutcome::Duplicate)
        ) {
            inserted += 1;
        }
    }
    Ok(Json(LegacyReadingsResponse { inserted }))
}

#[derive(Serialize)]
struct PointResult {
    series_id: String,
    result: PointResultKind,
}

#[derive(Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum PointResultKind {
    Stored { classification: ingest_core::Classification },
    Duplicate,
    Rejected { error: String },
}

/// `POST /ingest/data`: returns one classification (or rejection) per point,
/// in request order, instead of a single aggregate count.
async fn ingest_data(
    State(state): State<AppState>,
    Json(request): Json<ingest_transport::GenericDataRequest>,
) -> Result<Json<Vec<PointResult>>, ApiError> {
    let now = now_unix();
    let points = ingest_transport::generic_data_to_points(&request, now).map_err(|e| {
        ApiError(ingest_core::ErrorKind::InvalidInput, e.to_string())
    })?;

    let mut results = Vec::with_capacity(points.len());
    for point in points {
        let series_id = point.series_id.clone();
        let result = match state.router.ingest(point, "http", now).await {
            Ok(IngestOutcome::Stored { classification }) => PointResultKind::Stored { classification },
            Ok(IngestOutcome::Duplicate) => PointResultKind::Duplicate,
            Err(err) => PointResultKind::Rejected { error: err.message },
        };
        results.push(PointResult { series_id, result });
    }
    Ok(Json(results))
}

#[derive(Serialize)]
struct CsvUploadResponse {
    job_id: String,
    status: &'static str,
    rows: usize,
}

/// `POST /ingest/csv`: reads the whole multipart body into memory (CSV
/// uploads are expected to be modest batch files, not streamed firehoses),
/// then spawns the job so the response returns immediately with a `job_id`.
async fn ingest_csv(State(state): State<AppState>, mut multipart: Multipart) -> Result<Json<CsvUploadResponse>, ApiError> {
    let mut domain = None;
    let mut source_id = None;
    let mut timestamp_column = None;
    let mut value_columns = Vec::new();
    let mut file_bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError(ingest_core::ErrorKind::InvalidInput, e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "domain" => domain = Some(field.text().await.unwrap_or_default()),
            "source_id" => source_id = Some(field.text().await.unwrap_or_default()),
            "timestamp_column" => timestamp_column = Some(field.text().await.unwrap_or_default()),
            "value_columns[]" | "value_columns" => {
                value_columns.push(field.text().await.unwrap_or_default());
            }
            "file" => {
                file_bytes = Some(field.bytes().await.unwrap_or_default().to_vec());
            }
            _ => {}
        }
    }

    let domain = domain.ok_or_else(|| ApiError(ingest_core::ErrorKind::InvalidInput, "missing domain field".to_string()))?;
    let source_id =
        source_id.ok_or_else(|| ApiError(ingest_core::ErrorKind::InvalidInput, "missing source_id field".to_string()))?;
    let timestamp_column = timestamp_column
        .ok_or_else(|| ApiError(ingest_core::ErrorKind::InvalidInput, "missing timestamp_column field".to_string()))?;
    let file_bytes =
        file_bytes.ok_or_else(|| ApiError(ingest_core::ErrorKind::InvalidInput, "missing file field".to_string()))?;

    let domain = match domain.as_str() {
        "iot" => ingest_core::Domain::Iot,
        "infrastructure" => ingest_core::Domain::Infrastructure,
        "finance" => ingest_core::Domain::Finance,
        "health" => ingest_core::Domain::Health,
        "generic" => ingest_core::Domain::Generic,
        other => {
            return Err(ApiError(
                ingest_core::ErrorKind::InvalidInput,
                format!("unknown domain: {other}"),
            ))
        }
    };

    let spec = CsvUploadSpec {
        domain,
        source_id,
        timestamp_column,
        value_columns,
    };

    let job_id = Uuid::new_v4().to_string();
    state.jobs.create(job_id.clone());

    let router = state.router.clone();
    let jobs = state.jobs.clone();
    let job_id_for_task = job_id.clone();
    tokio::spawn(async move {
        ingest_transport::run_csv_job(job_id_for_task, std::io::Cursor::new(file_bytes), spec, router, jobs).await;
    });

    Ok(Json(CsvUploadResponse {
        job_id,
        status: "pending",
        rows: 0,
    }))
}

/// `GET /ingest/csv/jobs/:job_id`
async fn csv_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<ingest_transport::JobStatus>, axum::http::StatusCode> {
    state
        .jobs
        .get(&job_id)
        .map(Json)
        .ok_or(axum::http::StatusCode::NOT_FOUND)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ingest/packets", post(ingest_packets))
        .route("/ingest/readings", post(ingest_readings))
        .route("/ingest/readings/bulk", post(ingest_readings))
        .route("/ingest/data", post(ingest_data))
        .route("/ingest/csv", post(ingest_csv))
        .route("/ingest/csv/jobs/:job_id", get(csv_job_status))
        .with_state(state)
}
