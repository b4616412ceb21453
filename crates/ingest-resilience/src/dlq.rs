//! The dead-letter queue (C4): an append-only, bounded ring of messages that
//! failed permanently or exhausted retries, plus a replay consumer
//! (SPEC_FULL.md §2 supplement).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Error category a DLQ entry carries (§6.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DlqCategory {
    Parse,
    Guards,
    Persist,
    Cancelled,
    ClassifierBug,
}

impl DlqCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            DlqCategory::Parse => "parse",
            DlqCategory::Guards => "guards",
            DlqCategory::Persist => "persist",
            DlqCategory::Cancelled => "cancelled",
            DlqCategory::ClassifierBug => "classifier_bug",
        }
    }
}

/// One dead-letter entry (§6.5 wire format).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEntry {
    pub ts_first_failed: f64,
    pub transport: String,
    pub raw: Vec<u8>,
    pub category: DlqCategory,
    pub detail: String,
    pub attempts: u32,
    /// Carried so a replayed entry dedups correctly against the same key
    /// (§4.C4: "replayed entries carry their original msg_id").
    pub msg_id: Option<String>,
}

/// Default capacity (§4.C4).
pub const DEFAULT_DLQ_CAPACITY: usize = 10_000;

#[derive(Default)]
struct Counters {
    dropped: AtomicU64,
    total_pushed: AtomicU64,
}

/// Append-only ordered log, bounded at `capacity`; oldest entry is dropped
/// (and counted) when full.
pub struct DeadLetterQueue {
    capacity: usize,
    entries: Mutex<VecDeque<DlqEntry>>,
    counters: Counters,
}

impl DeadLetterQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            counters: Counters::default(),
        }
    }

    pub fn push(&self, entry: DlqEntry) {
        tracing::warn!(
            transport = %entry.transport,
            category = entry.category.as_str(),
            attempts = entry.attempts,
            "message sent to dead-letter queue"
        );
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            entries.pop_front();
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        }
        entries.push_back(entry);
        self.counters.total_pushed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn depth(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn dropped_count(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }

    pub fn total_pushed(&self) -> u64 {
        self.counters.total_pushed.load(Ordering::Relaxed)
    }

    /// Pop the oldest entry (FIFO), used by the replay consumer.
    pub fn pop_oldest(&self) -> Option<DlqEntry> {
        self.entries.lock().pop_front()
    }

    /// Snapshot the current contents without removing them.
    pub fn snapshot(&self) -> Vec<DlqEntry> {
        self.entries.lock().iter().cloned().collect()
    }
}

/// Re-submits DLQ entries through a caller-supplied `route` closure at a
/// configurable cadence (SPEC_FULL.md §2 supplement — spec.md names this
/// consumer but leaves its implementation external).
pub struct DlqReplayer<'a> {
    dlq: &'a DeadLetterQueue,
    interval: Duration,
}

impl<'a> DlqReplayer<'a> {
    pub fn new(dlq: &'a DeadLetterQueue, interval: Duration) -> Self {
        Self { dlq, interval }
    }

    /// Run one replay pass over everything currently queued, invoking
    /// `route` for each entry. Entries `route` re-queues (by returning
    /// `Err`) are pushed back onto the DLQ with `attempts` left unchanged.
    pub async fn replay_once<F, Fut>(&self, mut route: F)
    where
        F: FnMut(DlqEntry) -> Fut,
        Fut: std::future::Future<Output = Result<(), DlqEntry>>,
    {
        let pending: Vec<DlqEntry> = std::iter::from_fn(|| self.dlq.pop_oldest()).collect();
        for entry in pending {
            if let Err(entry) = route(entry).await {
                self.dlq.push(entry);
            }
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(attempts: u32) -> DlqEntry {
        DlqEntry {
            ts_first_failed: 0.0,
            transport: "http".to_string(),
            raw: vec![],
            category: DlqCategory::Persist,
            detail: "boom".to_string(),
            attempts,
            msg_id: Some("m1".to_string()),
        }
    }

    #[test]
    fn bounded_ring_drops_oldest() {
        let dlq = DeadLetterQueue::new(2);
        dlq.push(entry(1));
        dlq.push(entry(2));
        dlq.push(entry(3));
        assert_eq!(dlq.depth(), 2);
        assert_eq!(dlq.dropped_count(), 1);
    }

    #[tokio::test]
    async fn replay_requeues_on_failure() {
        let dlq = DeadLetterQueue::new(10);
        dlq.push(entry(1));
        let replayer = DlqReplayer::new(&dlq, Duration::from_secs(1));
        replayer.replay_once(|e| async move { Err(e) }).await;
        assert_eq!(dlq.depth(), 1, "failed replay goes back on the queue");
    }

    #[tokio::test]
    async fn replay_drains_on_success() {
        let dlq = DeadLetterQueue::new(10);
        dlq.push(entry(1));
        let replayer = DlqReplayer::new(&dlq, Duration::from_secs(1));
        replayer.replay_once(|_| async move { Ok(()) }).await;
        assert_eq!(dlq.depth(), 0);
    }
}
