//! The deduplicator (C3): idempotency window keyed by `msg_id`.
//!
//! Backed by an external key-value store with atomic set-if-absent-with-TTL.
//! When that store is unreachable, the deduplicator enters passthrough mode
//! (every call reports "not a duplicate") rather than blocking ingestion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backing store unreachable: {0}")]
    Unreachable(String),
}

/// The atomic set-if-absent-with-expiry contract the deduplicator needs from
/// its backing key-value store.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Returns `true` if `key` was newly inserted (i.e. not a duplicate),
    /// `false` if it already existed and was still live.
    async fn set_if_absent(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;
}

/// Default dedup TTL (§4.C3).
pub const DEFAULT_DEDUP_TTL: Duration = Duration::from_secs(60);

pub struct Deduplicator<S: IdempotencyStore> {
    store: S,
    ttl: Duration,
    passthrough: AtomicBool,
    dedup_hits: std::sync::atomic::AtomicU64,
}

impl<S: IdempotencyStore> Deduplicator<S> {
    pub fn new(store: S, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            passthrough: AtomicBool::new(false),
            dedup_hits: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// `false` atomically records `msg_id`; `true` means this is a duplicate
    /// within the TTL window. Never errors: a backing-store failure degrades
    /// to passthrough mode instead of blocking ingestion.
    pub async fn is_duplicate(&self, msg_id: &str) -> bool {
        match self.store.set_if_absent(msg_id, self.ttl).await {
            Ok(inserted) => {
                self.passthrough.store(false, Ordering::Relaxed);
                let duplicate = !inserted;
                if duplicate {
                    self.dedup_hits.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(msg_id, "dedup_hit");
                }
                duplicate
            }
            Err(err) => {
                tracing::warn!(msg_id, error = %err, "dedup store unreachable, entering passthrough");
                self.passthrough.store(true, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn is_passthrough(&self) -> bool {
        self.passthrough.load(Ordering::Relaxed)
    }

    pub fn dedup_hit_count(&self) -> u64 {
        self.dedup_hits.load(Ordering::Relaxed)
    }
}

/// In-process `IdempotencyStore` used by tests and as a default for
/// single-process deployments. A real deployment points `Deduplicator` at a
/// shared store (e.g. Redis) via its own `IdempotencyStore` impl instead.
#[derive(Default)]
pub struct InMemoryStore {
    entries: DashMap<String, Instant>,
}

#[async_trait]
impl IdempotencyStore for InMemoryStore {
    async fn set_if_absent(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut inserted = false;
        self.entries
            .entry(key.to_string())
            .and_modify(|expires_at| {
                if *expires_at <= now {
                    *expires_at = now + ttl;
                    inserted = true;
                }
            })
            .or_insert_with(|| {
                inserted = true;
                now + ttl
            });
        Ok(inserted)
    }
}

#[async_trait]
impl IdempotencyStore for Box<dyn IdempotencyStore> {
    async fn set_if_absent(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        (**self).set_if_absent(key, ttl).await
    }
}

/// A store that always fails, used to exercise passthrough-mode behavior.
pub struct AlwaysUnreachableStore;

#[async_trait]
impl IdempotencyStore for AlwaysUnreachableStore {
    async fn set_if_absent(&self, _key: &str, _ttl: Duration) -> Result<bool, StoreError> {
        Err(StoreError::Unreachable("simulated outage".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_call_within_ttl_is_duplicate() {
        let dedup = Deduplicator::new(InMemoryStore::default(), Duration::from_secs(60));
        assert!(!dedup.is_duplicate("m1").await);
        assert!(dedup.is_duplicate("m1").await);
        assert_eq!(dedup.dedup_hit_count(), 1);
    }

    #[tokio::test]
    async fn unreachable_store_enters_passthrough() {
        let dedup = Deduplicator::new(AlwaysUnreachableStore, Duration::from_secs(60));
        assert!(!dedup.is_duplicate("m1").await);
        assert!(!dedup.is_duplicate("m1").await, "passthrough never reports duplicate");
        assert!(dedup.is_passthrough());
    }

    #[tokio::test]
    async fn different_keys_are_independent() {
        let dedup = Deduplicator::new(InMemoryStore::default(), Duration::from_secs(60));
        assert!(!dedup.is_duplicate("a").await);
        assert!(!dedup.is_duplicate("b").await);
    }
}
