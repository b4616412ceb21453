//! Wire-format shapes for every external interface (§6.1–§6.5) and the pure
//! conversion functions from each into the unified [`DataPoint`] contract
//! (C1). Parsing lives here so every transport (HTTP, MQTT, WebSocket, CSV)
//! shares one definition of what a valid payload looks like.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ingest_core::{DataPoint, Domain};

use crate::errors::TransportError;

fn parse_domain(raw: &str) -> Result<Domain, TransportError> {
    match raw {
        "iot" => Ok(Domain::Iot),
        "infrastructure" => Ok(Domain::Infrastructure),
        "finance" => Ok(Domain::Finance),
        "health" => Ok(Domain::Health),
        "generic" => Ok(Domain::Generic),
        other => Err(TransportError::Parse(format!("unknown domain: {other}"))),
    }
}

fn parse_iso8601(raw: &str) -> Result<f64, TransportError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc).timestamp_millis() as f64 / 1000.0)
        .map_err(|e| TransportError::Parse(format!("invalid ISO8601 timestamp {raw:?}: {e}")))
}

// ---- POST /ingest/packets (legacy, §6.1) ----

#[derive(Debug, Deserialize)]
pub struct LegacyPacketReading {
    pub sensor_uuid: String,
    pub value: f64,
    pub ts: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct LegacyPacketRequest {
    pub device_uuid: String,
    pub readings: Vec<LegacyPacketReading>,
}

#[derive(Debug, Serialize)]
pub struct LegacyPacketResponse {
    pub inserted: usize,
    pub unknown_sensors: Vec<String>,
}

/// Resolves `(device_uuid, sensor_uuid) → sensor_id` via a caller-supplied
/// lookup (the TTL-300s cached membership check named in §6.1); unresolved
/// readings are reported in `unknown_sensors`, not rejected outright.
pub fn legacy_packets_to_points(
    request: &LegacyPacketRequest,
    now: f64,
    mut resolve_sensor_id: impl FnMut(&str, &str) -> Option<i64>,
) -> (Vec<DataPoint>, Vec<String>) {
    let mut points = Vec::new();
    let mut unknown = Vec::new();
    for reading in &request.readings {
        match resolve_sensor_id(&request.device_uuid, &reading.sensor_uuid) {
            Some(sensor_id) => points.push(DataPoint {
                series_id: sensor_id.to_string(),
                value: reading.value,
                timestamp: reading.ts.unwrap_or(now),
                ingested_at: Some(now),
                processed_at: None,
                domain: Domain::Iot,
                source_id: Some(request.device_uuid.clone()),
                stream_type: None,
                sequence: None,
                metadata: HashMap::new(),
                msg_id: None,
            }),
            None => unknown.push(reading.sensor_uuid.clone()),
        }
    }
    (points, unknown)
}

// ---- POST /ingest/readings, /ingest/readings/bulk (legacy, §6.1) ----

#[derive(Debug, Deserialize)]
pub struct LegacyReadingValue {
    pub value: f64,
    pub timestamp: Option<f64>,
}

/// Keyed by integer `sensor_id` per §6.1.
pub type LegacyReadingsRequest = HashMap<u64, LegacyReadingValue>;

#[derive(Debug, Serialize)]
pub struct LegacyReadingsResponse {
    pub inserted: usize,
}

pub fn legacy_readings_to_points(request: &LegacyReadingsRequest, now: f64) -> Vec<DataPoint> {
    request
        .iter()
        .map(|(sensor_id, reading)| DataPoint {
            series_id: sensor_id.to_string(),
            value: reading.value,
            timestamp: reading.timestamp.unwrap_or(now),
            ingested_at: Some(now),
            processed_at: None,
            domain: Domain::Iot,
            source_id: None,
            stream_type: None,
            sequence: None,
            metadata: HashMap::new(),
            msg_id: None,
        })
        .collect()
}

// ---- POST /ingest/data (generic, §6.1) ----

#[derive(Debug, Deserialize)]
pub struct GenericDataPointWire {
    pub stream_id: String,
    pub value: f64,
    pub timestamp: f64,
    pub stream_type: Option<String>,
    pub sequence: Option<u64>,
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
pub struct GenericDataRequest {
    pub source_id: String,
    pub domain: String,
    pub data_points: Vec<GenericDataPointWire>,
}

/// Refuses `domain="iot"` (§6.1: generic endpoint never accepts legacy IoT
/// traffic — that is what `/ingest/packets` and `/ingest/readings` are for).
pub fn generic_data_to_points(request: &GenericDataRequest, now: f64) -> Result<Vec<DataPoint>, TransportError> {
    let domain = parse_domain(&request.domain)?;
    if domain == Domain::Iot {
        return Err(TransportError::Parse(
            "domain=\"iot\" is not accepted on /ingest/data".to_string(),
        ));
    }

    Ok(request
        .data_points
        .iter()
        .map(|dp| DataPoint {
            series_id: format!("{}/{}/{}", domain.as_str(), request.source_id, dp.stream_id),
            value: dp.value,
            timestamp: dp.timestamp,
            ingested_at: Some(now),
            processed_at: None,
            domain,
            source_id: Some(request.source_id.clone()),
            stream_type: dp.stream_type.clone(),
            sequence: dp.sequence,
            metadata: dp.metadata.clone().unwrap_or_default(),
            msg_id: None,
        })
        .collect())
}

// ---- MQTT payloads (§6.2) ----

#[derive(Debug, Deserialize)]
pub struct MqttIotPayload {
    pub sensor_id: i64,
    pub value: f64,
    pub timestamp: String,
    pub device_uuid: Option<String>,
}

pub fn mqtt_iot_payload_to_point(payload: &MqttIotPayload, now: f64) -> Result<DataPoint, TransportError> {
    Ok(DataPoint {
        series_id: payload.sensor_id.to_string(),
        value: payload.value,
        timestamp: parse_iso8601(&payload.timestamp)?,
        ingested_at: Some(now),
        processed_at: None,
        domain: Domain::Iot,
        source_id: payload.device_uuid.clone(),
        stream_type: None,
        sequence: None,
        metadata: HashMap::new(),
        msg_id: None,
    })
}

#[derive(Debug, Deserialize)]
pub struct MqttGenericPayload {
    pub value: f64,
    pub timestamp: String,
    pub metadata: Option<HashMap<String, serde_json::Value>>,
    pub sequence: Option<u64>,
}

/// `domain`, `source_id`, `stream_id` come from the topic
/// `{domain}/{source_id}/{stream_id}/data` (§6.2), parsed by
/// [`crate::mqtt::parse_generic_topic`].
pub fn mqtt_generic_payload_to_point(
    payload: &MqttGenericPayload,
    domain: Domain,
    source_id: &str,
    stream_id: &str,
    now: f64,
) -> Result<DataPoint, TransportError> {
    if domain == Domain::Iot {
        return Err(TransportError::Parse(
            "domain=\"iot\" is not accepted on the generic MQTT topic".to_string(),
        ));
    }
    Ok(DataPoint {
        series_id: format!("{}/{source_id}/{stream_id}", domain.as_str()),
        value: payload.value,
        timestamp: parse_iso8601(&payload.timestamp)?,
        ingested_at: Some(now),
        processed_at: None,
        domain,
        source_id: Some(source_id.to_string()),
        stream_type: None,
        sequence: payload.sequence,
        metadata: payload.metadata.clone().unwrap_or_default(),
        msg_id: None,
    })
}

// ---- WebSocket frames (§6.3) ----

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsClientFrame {
    Connect {
        source_id: String,
        domain: String,
        api_key: String,
    },
    Data {
        batch: Vec<GenericDataPointWire>,
    },
}

#[derive(Debug, Serialize)]
pub struct WsRejection {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsServerFrame {
    Connected { session_id: String },
    Ack { sequence_up_to: u64, rejected: Vec<WsRejection> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_packets_report_unknown_sensors_without_failing_the_batch() {
        let request = LegacyPacketRequest {
            device_uuid: "dev-1".to_string(),
            readings: vec![
                LegacyPacketReading {
                    sensor_uuid: "known".to_string(),
                    value: 1.0,
                    ts: Some(5.0),
                },
                LegacyPacketReading {
                    sensor_uuid: "missing".to_string(),
                    value: 2.0,
                    ts: None,
                },
            ],
        };
        let (points, unknown) = legacy_packets_to_points(&request, 100.0, |_, sensor| {
            if sensor == "known" {
                Some(42)
            } else {
                None
            }
        });
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].series_id, "42");
        assert_eq!(unknown, vec!["missing".to_string()]);
    }

    #[test]
    fn generic_data_refuses_iot_domain() {
        let request = GenericDataRequest {
            source_id: "s".to_string(),
            domain: "iot".to_string(),
            data_points: vec![],
        };
        assert!(generic_data_to_points(&request, 0.0).is_err());
    }

    #[test]
    fn generic_data_builds_composite_series_id() {
        let request = GenericDataRequest {
            source_id: "plantA".to_string(),
            domain: "infrastructure".to_string(),
            data_points: vec![GenericDataPointWire {
                stream_id: "pump1".to_string(),
                value: 3.3,
                timestamp: 10.0,
                stream_type: None,
                sequence: None,
                metadata: None,
            }],
        };
        let points = generic_data_to_points(&request, 0.0).unwrap();
        assert_eq!(points[0].series_id, "infrastructure/plantA/pump1");
    }
}
