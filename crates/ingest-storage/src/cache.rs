//! Read-through cache backing the constraint & state repository (C6):
//! bounded by an LRU policy, entries expire after a TTL, and concurrent
//! misses on the same key coalesce into a single load.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;

struct Entry<V> {
    value: V,
    loaded_at: Instant,
}

/// A read-through, write-through cache with TTL expiry, LRU eviction, and
/// per-key load coalescing. Used for both the per-series `StreamConfig` and
/// `SeriesState` caches in [`crate::repository::ConstraintStateRepository`].
pub struct ReadThroughCache<K, V> {
    ttl: Duration,
    entries: Mutex<LruCache<K, Entry<V>>>,
    load_locks: DashMap<K, Arc<AsyncMutex<()>>>,
}

impl<K, V> ReadThroughCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            ttl,
            entries: Mutex::new(LruCache::new(capacity)),
            load_locks: DashMap::new(),
        }
    }

    fn fresh(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock();
        let hit = entries.get(key)?;
        if hit.loaded_at.elapsed() < self.ttl {
            Some(hit.value.clone())
        } else {
            None
        }
    }

    /// Return the cached value if present and unexpired; otherwise run
    /// `loader` exactly once even under concurrent callers for the same key,
    /// and populate the cache with its result on success.
    pub async fn get_or_load<F, Fut, E>(&self, key: &K, loader: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<V, E>>,
    {
        if let Some(v) = self.fresh(key) {
            return Ok(v);
        }

        let lock = self
            .load_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Another caller may have populated the cache while we waited.
        if let Some(v) = self.fresh(key) {
            return Ok(v);
        }

        let value = loader().await?;
        self.put(key.clone(), value.clone());
        Ok(value)
    }

    pub fn put(&self, key: K, value: V) {
        self.entries.lock().put(
            key,
            Entry {
                value,
                loaded_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.lock().pop(key);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn concurrent_misses_coalesce_into_one_load() {
        let cache: Arc<ReadThroughCache<String, i32>> =
            Arc::new(ReadThroughCache::new(16, Duration::from_secs(60)));
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_load(&"s1".to_string(), || {
                        let calls = calls.clone();
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                            Ok::<i32, ()>(42)
                        }
                    })
                    .await
            }));
        }
        for h in handles {
            assert_eq!(h.await.unwrap().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entry_is_reloaded() {
        let cache: ReadThroughCache<String, i32> =
            ReadThroughCache::new(16, Duration::from_millis(5));
        cache.put("s1".to_string(), 1);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let v = cache
            .get_or_load(&"s1".to_string(), || async { Ok::<i32, ()>(2) })
            .await
            .unwrap();
        assert_eq!(v, 2);
    }

    #[tokio::test]
    async fn lru_evicts_least_recently_used() {
        let cache: ReadThroughCache<String, i32> = ReadThroughCache::new(2, Duration::from_secs(60));
        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);
        cache.put("c".to_string(), 3);
        assert_eq!(cache.len(), 2);
        assert!(cache.fresh(&"a".to_string()).is_none());
    }
}
