//! Transport adapters (C12): wire-format parsing plus the MQTT, WebSocket,
//! and CSV adapters that turn external protocols into calls against
//! [`ingest_pipelines::IngestRouter::ingest`].

mod csv_ingest;
mod errors;
mod job_registry;
mod mqtt;
mod sensor_directory;
mod transport;
mod websocket;
mod wire;

pub use csv_ingest::{run_csv_job, CsvUploadSpec};
pub use errors::TransportError;
pub use job_registry::{JobRegistry, JobState, JobStatus};
pub use mqtt::{parse_generic_topic, parse_iot_topic, MqttTransport, RawMessage, DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKER_COUNT};
pub use sensor_directory::{InMemorySensorLookup, SensorDirectory, SensorLookup};
pub use transport::{Transport, TransportCounters, TransportStats};
pub use websocket::{handle_connection, WsSession, BACKPRESSURE_CLOSE_CODE, MAX_IN_FLIGHT, POLICY_VIOLATION_CLOSE_CODE};
pub use wire::{
    generic_data_to_points, legacy_packets_to_points, legacy_readings_to_points, mqtt_generic_payload_to_point,
    mqtt_iot_payload_to_point, GenericDataPointWire, GenericDataRequest, LegacyPacketReading, LegacyPacketRequest,
    LegacyPacketResponse, LegacyReadingValue, LegacyReadingsRequest, LegacyReadingsResponse, MqttGenericPayload,
    MqttIotPayload, WsClientFrame, WsRejection, WsServerFrame,
};
