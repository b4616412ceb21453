//! CSV adapter (§6.1 `POST /ingest/csv`): turns an uploaded file plus
//! `domain`, `source_id`, `timestamp_column`, `value_columns` form fields
//! into one [`DataPoint`] per row per value column, routes each through the
//! [`IngestRouter`], and records progress on a [`JobRegistry`].

use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use chrono::DateTime;

use ingest_core::{DataPoint, Domain};
use ingest_pipelines::IngestRouter;
use ingest_resilience::{IdempotencyStore, PredictionPublisher};
use ingest_storage::{ConfigLoader, GenericStore, LegacyStore, StateStore};

use crate::errors::TransportError;
use crate::job_registry::JobRegistry;

pub struct CsvUploadSpec {
    pub domain: Domain,
    pub source_id: String,
    pub timestamp_column: String,
    pub value_columns: Vec<String>,
}

fn parse_timestamp(raw: &str) -> Result<f64, TransportError> {
    if let Ok(unix) = raw.parse::<f64>() {
        return Ok(unix);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.timestamp_millis() as f64 / 1000.0)
        .map_err(|e| TransportError::Parse(format!("invalid timestamp {raw:?}: {e}")))
}

/// Parses a single CSV row into zero-or-more points, one per configured
/// value column. A row missing the timestamp column or a requested value
/// column is rejected in full rather than partially ingested.
fn row_to_points(
    row: &csv::StringRecord,
    headers: &csv::StringRecord,
    spec: &CsvUploadSpec,
    now: f64,
) -> Result<Vec<DataPoint>, TransportError> {
    let column_index = |name: &str| -> Result<usize, TransportError> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| TransportError::Parse(format!("missing column {name:?}")))
    };

    let ts_index = column_index(&spec.timestamp_column)?;
    let raw_ts = row
        .get(ts_index)
        .ok_or_else(|| TransportError::Parse("row missing timestamp cell".to_string()))?;
    let timestamp = parse_timestamp(raw_ts)?;

    let mut points = Vec::with_capacity(spec.value_columns.len());
    for column in &spec.value_columns {
        let index = column_index(column)?;
        let raw_value = row
            .get(index)
            .ok_or_else(|| TransportError::Parse(format!("row missing cell for {column:?}")))?;
        let value: f64 = raw_value
            .parse()
            .map_err(|_| TransportError::Parse(format!("non-numeric value {raw_value:?} in {column:?}")))?;

        points.push(DataPoint {
            series_id: format!("{}/{}/{}", spec.domain.as_str(), spec.source_id, column),
            value,
            timestamp,
            ingested_at: Some(now),
            processed_at: None,
            domain: spec.domain,
            source_id: Some(spec.source_id.clone()),
            stream_type: None,
            sequence: None,
            metadata: HashMap::new(),
            msg_id: None,
        });
    }
    Ok(points)
}

/// Streams `reader` row by row (never buffering the whole file), routing
/// every point through `router` and updating `job_id`'s status in
/// `registry` as it goes. Intended to run on a spawned task so the upload
/// handler can return `{job_id, status:"pending", rows:0}` immediately.
#[allow(clippy::too_many_arguments)]
pub async fn run_csv_job<R, C, St, L, G, D, P, A, W, Lv, N>(
    job_id: String,
    reader: R,
    spec: CsvUploadSpec,
    router: Arc<IngestRouter<C, St, L, G, D, P, A, W, Lv, N>>,
    registry: Arc<JobRegistry>,
) where
    R: Read + Send + 'static,
    C: ConfigLoader,
    St: StateStore,
    L: LegacyStore,
    G: GenericStore,
    D: IdempotencyStore,
    P: PredictionPublisher,
    A: ingest_pipelines::AlertStore,
    W: ingest_pipelines::WarningStore,
    Lv: ingest_pipelines::LatestValueStore,
    N: ingest_pipelines::NotificationSink,
{
    registry.mark_running(&job_id);

    let mut rdr = csv::Reader::from_reader(reader);
    let headers = match rdr.headers() {
        Ok(h) => h.clone(),
        Err(e) => {
            registry.mark_failed(&job_id, format!("failed to read header row: {e}"));
            return;
        }
    };

    for record in rdr.records() {
        let now = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                registry.record_row(&job_id, false);
                tracing::warn!(job_id = %job_id, error = %e, "failed to parse csv row");
                continue;
            }
        };

        match row_to_points(&record, &headers, &spec, now) {
            Ok(points) => {
                let mut row_ok = true;
                for point in points {
                    if router.ingest(point, "csv", now).await.is_err() {
                        row_ok = false;
                    }
                }
                registry.record_row(&job_id, row_ok);
            }
            Err(e) => {
                registry.record_row(&job_id, false);
                tracing::warn!(job_id = %job_id, error = %e, "rejected csv row");
            }
        }
    }

    registry.mark_completed(&job_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> csv::StringRecord {
        csv::StringRecord::from(vec!["ts", "temp", "humidity"])
    }

    #[test]
    fn row_produces_one_point_per_value_column() {
        let spec = CsvUploadSpec {
            domain: Domain::Infrastructure,
            source_id: "plantA".to_string(),
            timestamp_column: "ts".to_string(),
            value_columns: vec!["temp".to_string(), "humidity".to_string()],
        };
        let row = csv::StringRecord::from(vec!["100.0", "21.5", "0.40"]);
        let points = row_to_points(&row, &headers(), &spec, 0.0).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].series_id, "infrastructure/plantA/temp");
        assert_eq!(points[1].series_id, "infrastructure/plantA/humidity");
        assert_eq!(points[0].timestamp, 100.0);
    }

    #[test]
    fn missing_value_column_rejects_whole_row() {
        let spec = CsvUploadSpec {
            domain: Domain::Infrastructure,
            source_id: "plantA".to_string(),
            timestamp_column: "ts".to_string(),
            value_columns: vec!["pressure".to_string()],
        };
        let row = csv::StringRecord::from(vec!["100.0", "21.5", "0.40"]);
        assert!(row_to_points(&row, &headers(), &spec, 0.0).is_err());
    }

    #[test]
    fn non_numeric_value_is_rejected() {
        let spec = CsvUploadSpec {
            domain: Domain::Infrastructure,
            source_id: "plantA".to_string(),
            timestamp_column: "ts".to_string(),
            value_columns: vec!["temp".to_string()],
        };
        let row = csv::StringRecord::from(vec!["100.0", "warm", "0.40"]);
        assert!(row_to_points(&row, &headers(), &spec, 0.0).is_err());
    }
}
