//! MQTT adapter (§6.2). The network-loop callback only parses and enqueues
//! onto a bounded channel; a fixed worker pool drains it and calls into the
//! router — the audit finding in spec.md §9 ("synchronous SQL in network
//! callbacks") is why persistence never happens on the `rumqttc` event-loop
//! task.

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;

use ingest_core::{DataPoint, Domain};
use ingest_pipelines::IngestRouter;
use ingest_resilience::{DlqCategory, DlqEntry, IdempotencyStore, PredictionPublisher};
use ingest_storage::{ConfigLoader, GenericStore, LegacyStore, StateStore};

use crate::errors::TransportError;
use crate::wire::{mqtt_generic_payload_to_point, mqtt_iot_payload_to_point, MqttGenericPayload, MqttIotPayload};

/// Default bounded channel capacity between the network loop and the worker
/// pool (SPEC_FULL.md ambient-stack decision, matching the DLQ's default
/// order of magnitude).
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;
/// Default worker pool size draining the queue.
pub const DEFAULT_WORKER_COUNT: usize = 8;

/// `iot/sensors/{sensor_id}/readings`.
pub fn parse_iot_topic(topic: &str) -> Option<i64> {
    let parts: Vec<&str> = topic.split('/').collect();
    if parts.len() == 4 && parts[0] == "iot" && parts[1] == "sensors" && parts[3] == "readings" {
        parts[2].parse().ok()
    } else {
        None
    }
}

/// `{domain}/{source}/{stream}/data`.
pub fn parse_generic_topic(topic: &str) -> Option<(Domain, String, String)> {
    let parts: Vec<&str> = topic.split('/').collect();
    if parts.len() != 4 || parts[3] != "data" {
        return None;
    }
    let domain = match parts[0] {
        "infrastructure" => Domain::Infrastructure,
        "finance" => Domain::Finance,
        "health" => Domain::Health,
        "generic" => Domain::Generic,
        _ => return None,
    };
    Some((domain, parts[1].to_string(), parts[2].to_string()))
}

/// One enqueued unit of work: the raw bytes plus the topic they arrived on,
/// so a worker can parse them off the network-loop thread.
pub struct RawMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

fn parse_message(msg: &RawMessage, now: f64) -> Result<DataPoint, TransportError> {
    if let Some(sensor_id) = parse_iot_topic(&msg.topic) {
        let payload: MqttIotPayload =
            serde_json::from_slice(&msg.payload).map_err(|e| TransportError::Parse(e.to_string()))?;
        if payload.sensor_id != sensor_id {
            return Err(TransportError::Parse(format!(
                "topic sensor_id {sensor_id} does not match payload sensor_id {}",
                payload.sensor_id
            )));
        }
        return mqtt_iot_payload_to_point(&payload, now);
    }

    if let Some((domain, source_id, stream_id)) = parse_generic_topic(&msg.topic) {
        let payload: MqttGenericPayload =
            serde_json::from_slice(&msg.payload).map_err(|e| TransportError::Parse(e.to_string()))?;
        return mqtt_generic_payload_to_point(&payload, domain, &source_id, &stream_id, now);
    }

    Err(TransportError::Parse(format!("unrecognized topic: {}", msg.topic)))
}

/// Owns the `rumqttc` client/event loop and the worker pool draining the
/// queue it feeds. Constructed once per process; `run` drives both halves
/// until cancelled.
pub struct MqttTransport {
    pub client: AsyncClient,
    queue_capacity: usize,
    worker_count: usize,
}

impl MqttTransport {
    pub fn new(options: MqttOptions, queue_capacity: usize, worker_count: usize) -> (Self, EventLoop) {
        let (client, event_loop) = AsyncClient::new(options, queue_capacity);
        (
            Self {
                client,
                queue_capacity,
                worker_count,
            },
            event_loop,
        )
    }

    pub async fn subscribe_defaults(&self) -> Result<(), rumqttc::ClientError> {
        self.client.subscribe("iot/sensors/+/readings", QoS::AtLeastOnce).await?;
        self.client.subscribe("+/+/+/data", QoS::AtLeastOnce).await?;
        Ok(())
    }

    /// Drives `event_loop`, forwarding every publish onto a bounded channel,
    /// and spawns `worker_count` tasks that parse + `router.ingest` each
    /// message. Runs until `event_loop.poll()` errors (connection lost) or
    /// the process shuts down; reconnection is `rumqttc`'s own concern.
    pub async fn run<C, St, L, G, D, P, A, W, Lv, N>(
        &self,
        mut event_loop: EventLoop,
        router: Arc<IngestRouter<C, St, L, G, D, P, A, W, Lv, N>>,
    ) where
        C: ConfigLoader + 'static,
        St: StateStore + 'static,
        L: LegacyStore + 'static,
        G: GenericStore + 'static,
        D: IdempotencyStore + 'static,
        P: PredictionPublisher + 'static,
        A: ingest_pipelines::AlertStore + 'static,
        W: ingest_pipelines::WarningStore + 'static,
        Lv: ingest_pipelines::LatestValueStore + 'static,
        N: ingest_pipelines::NotificationSink + 'static,
    {
        let (tx, rx) = mpsc::channel::<RawMessage>(self.queue_capacity);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        for _ in 0..self.worker_count {
            let rx = rx.clone();
            let router = router.clone();
            tokio::spawn(async move {
                loop {
                    let msg = { rx.lock().await.recv().await };
                    let Some(msg) = msg else { break };
                    let now = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
                    match parse_message(&msg, now) {
                        Ok(point) => {
                            if let Err(err) = router.ingest(point, "mqtt", now).await {
                                tracing::debug!(error = %err, "mqtt message rejected by router");
                            }
                        }
                        Err(err) => {
                            tracing::warn!(topic = %msg.topic, error = %err, "failed to parse mqtt message");
                            router.dlq().push(DlqEntry {
                                ts_first_failed: now,
                                transport: "mqtt".to_string(),
                                raw: msg.payload.clone(),
                                category: DlqCategory::Parse,
                                detail: err.to_string(),
                                attempts: 1,
                                msg_id: None,
                            });
                        }
                    }
                }
            });
        }

        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let msg = RawMessage {
                        topic: publish.topic.clone(),
                        payload: publish.payload.to_vec(),
                    };
                    if tx.send(msg).await.is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::error!(error = %err, "mqtt event loop error");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iot_topic() {
        assert_eq!(parse_iot_topic("iot/sensors/42/readings"), Some(42));
        assert_eq!(parse_iot_topic("iot/sensors/readings"), None);
    }

    #[test]
    fn parses_generic_topic() {
        let (domain, source, stream) = parse_generic_topic("finance/acct1/balance/data").unwrap();
        assert_eq!(domain, Domain::Finance);
        assert_eq!(source, "acct1");
        assert_eq!(stream, "balance");
    }

    #[test]
    fn rejects_malformed_topics() {
        assert!(parse_generic_topic("finance/acct1/data").is_none());
        assert!(parse_generic_topic("iot/acct1/balance/data").is_none());
    }
}
