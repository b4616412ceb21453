//! The throttled prediction bus (C9): per-series rate-limited, fire-and-forget
//! publisher to the downstream prediction channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default per-series minimum inter-publish interval (§4.C9).
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Wire shape published downstream (§6.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionMessage {
    pub series_id: String,
    pub value: f64,
    pub timestamp: f64,
    pub ingested_at: Option<f64>,
    pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("prediction bus unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PredictionPublisher: Send + Sync {
    async fn publish(&self, message: PredictionMessage) -> Result<(), PublishError>;
}

struct LogGate {
    last_logged: DashMap<String, Instant>,
}

impl LogGate {
    fn new() -> Self {
        Self {
            last_logged: DashMap::new(),
        }
    }

    /// At most once per minute per series (§4.C9).
    fn should_log(&self, series_id: &str) -> bool {
        let now = Instant::now();
        let mut allow = false;
        self.last_logged
            .entry(series_id.to_string())
            .and_modify(|last| {
                if now.duration_since(*last) >= Duration::from_secs(60) {
                    *last = now;
                    allow = true;
                }
            })
            .or_insert_with(|| {
                allow = true;
                now
            });
        allow
    }
}

/// Per-`series_id` token-bucket-style rate limiter wrapping a fire-and-forget
/// publisher. Additional publishes for the same series within
/// `min_interval` are dropped silently (counted, not logged as an error).
pub struct ThrottledBus<P: PredictionPublisher> {
    publisher: P,
    min_interval: Duration,
    last_publish: DashMap<String, Instant>,
    error_log_gate: LogGate,
    dropped: AtomicU64,
    published: AtomicU64,
}

impl<P: PredictionPublisher> ThrottledBus<P> {
    pub fn new(publisher: P, min_interval: Duration) -> Self {
        Self {
            publisher,
            min_interval,
            last_publish: DashMap::new(),
            error_log_gate: LogGate::new(),
            dropped: AtomicU64::new(0),
            published: AtomicU64::new(0),
        }
    }

    /// Attempt to publish `message`. Drops silently if the series was
    /// published within `min_interval`; otherwise calls the underlying
    /// publisher and never retries or escalates on failure (§4.C9).
    pub async fn publish(&self, message: PredictionMessage) {
        let now = Instant::now();
        let series_id = message.series_id.clone();

        let mut allowed = false;
        self.last_publish
            .entry(series_id.clone())
            .and_modify(|last| {
                if now.duration_since(*last) >= self.min_interval {
                    *last = now;
                    allowed = true;
                }
            })
            .or_insert_with(|| {
                allowed = true;
                now
            });

        if !allowed {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(series_id = %series_id, "prediction publish dropped by throttle");
            return;
        }

        match self.publisher.publish(message).await {
            Ok(()) => {
                self.published.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                if self.error_log_gate.should_log(&series_id) {
                    tracing::error!(series_id = %series_id, error = %err, "prediction bus publish failed");
                }
            }
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PredictionPublisher for Box<dyn PredictionPublisher> {
    async fn publish(&self, message: PredictionMessage) -> Result<(), PublishError> {
        (**self).publish(message).await
    }
}

/// In-memory publisher used by tests and as a stand-in until a real
/// downstream bus client is wired.
#[derive(Default)]
pub struct RecordingPublisher {
    pub sent: parking_lot::Mutex<Vec<PredictionMessage>>,
}

#[async_trait]
impl PredictionPublisher for RecordingPublisher {
    async fn publish(&self, message: PredictionMessage) -> Result<(), PublishError> {
        self.sent.lock().push(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(series: &str, v: f64) -> PredictionMessage {
        PredictionMessage {
            series_id: series.to_string(),
            value: v,
            timestamp: 0.0,
            ingested_at: None,
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn second_publish_within_window_is_dropped() {
        let bus = ThrottledBus::new(RecordingPublisher::default(), Duration::from_secs(60));
        bus.publish(msg("s1", 1.0)).await;
        bus.publish(msg("s1", 2.0)).await;
        assert_eq!(bus.published_count(), 1);
        assert_eq!(bus.dropped_count(), 1);
    }

    #[tokio::test]
    async fn different_series_are_independent() {
        let bus = ThrottledBus::new(RecordingPublisher::default(), Duration::from_secs(60));
        bus.publish(msg("s1", 1.0)).await;
        bus.publish(msg("s2", 1.0)).await;
        assert_eq!(bus.published_count(), 2);
        assert_eq!(bus.dropped_count(), 0);
    }
}
