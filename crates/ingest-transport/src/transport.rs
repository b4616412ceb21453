//! Common shape shared by every adapter (MQTT, WebSocket, CSV): a name for
//! `/health`, a running counter pair for `/resilience/health`, and a
//! lifecycle the gateway can start/stop without caring which wire format is
//! underneath.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::errors::TransportError;

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct TransportStats {
    pub received: u64,
    pub accepted: u64,
    pub rejected: u64,
}

/// Lock-free counters an adapter updates as it parses messages; cheap to
/// clone (it's an `Arc` internally via `Default`/`Clone` on the atomics'
/// owning struct) and cheap to snapshot for `/resilience/health`.
#[derive(Default)]
pub struct TransportCounters {
    received: AtomicU64,
    accepted: AtomicU64,
    rejected: AtomicU64,
}

impl TransportCounters {
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TransportStats {
        TransportStats {
            received: self.received.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Unifies adapter lifecycle for the gateway's startup/shutdown sequence.
/// MQTT's `EventLoop` and the HTTP-bound WebSocket/CSV adapters all satisfy
/// this differently underneath; the gateway only needs `start`/`stop`/`stats`.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &'static str;
    async fn start(&self) -> Result<(), TransportError>;
    async fn stop(&self) -> Result<(), TransportError>;
    fn stats(&self) -> TransportStats;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_snapshot_independently() {
        let counters = TransportCounters::default();
        counters.record_received();
        counters.record_received();
        counters.record_accepted();
        counters.record_rejected();

        let stats = counters.snapshot();
        assert_eq!(stats.received, 2);
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.rejected, 1);
    }
}
