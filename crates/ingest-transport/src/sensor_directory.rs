//! Resolves `(device_uuid, sensor_uuid) -> sensor_id` for `/ingest/packets`
//! (§6.1: "a cached lookup (TTL 300s) that validates membership"), fronting
//! whatever directory a deployment keeps that mapping in with the same
//! read-through cache C6 uses.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use ingest_storage::ReadThroughCache;

use crate::errors::TransportError;

const DIRECTORY_CACHE_CAPACITY: usize = 10_000;
const DIRECTORY_CACHE_TTL: Duration = Duration::from_secs(300);

#[async_trait]
pub trait SensorLookup: Send + Sync {
    async fn resolve(&self, device_uuid: &str, sensor_uuid: &str) -> Result<Option<i64>, TransportError>;
}

pub struct SensorDirectory<L: SensorLookup> {
    lookup: L,
    cache: ReadThroughCache<(String, String), Option<i64>>,
}

impl<L: SensorLookup> SensorDirectory<L> {
    pub fn new(lookup: L) -> Self {
        Self {
            lookup,
            cache: ReadThroughCache::new(DIRECTORY_CACHE_CAPACITY, DIRECTORY_CACHE_TTL),
        }
    }

    /// Returns `None` for an unknown or unresolvable pair rather than
    /// erroring, matching `/ingest/packets`' per-reading `unknown_sensors`
    /// reporting instead of a whole-batch failure.
    pub async fn resolve(&self, device_uuid: &str, sensor_uuid: &str) -> Option<i64> {
        let key = (device_uuid.to_string(), sensor_uuid.to_string());
        self.cache
            .get_or_load(&key, || self.lookup.resolve(device_uuid, sensor_uuid))
            .await
            .ok()
            .flatten()
    }
}

/// Static membership table for deployments without a live device registry.
#[derive(Default)]
pub struct InMemorySensorLookup {
    table: DashMap<(String, String), i64>,
}

impl InMemorySensorLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, device_uuid: impl Into<String>, sensor_uuid: impl Into<String>, sensor_id: i64) {
        self.table.insert((device_uuid.into(), sensor_uuid.into()), sensor_id);
    }
}

#[async_trait]
impl SensorLookup for InMemorySensorLookup {
    async fn resolve(&self, device_uuid: &str, sensor_uuid: &str) -> Result<Option<i64>, TransportError> {
        Ok(self.table.get(&(device_uuid.to_string(), sensor_uuid.to_string())).map(|v| *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_registered_pair_and_caches_it() {
        let lookup = InMemorySensorLookup::new();
        lookup.register("dev-1", "sensor-a", 42);
        let directory = SensorDirectory::new(lookup);

        assert_eq!(directory.resolve("dev-1", "sensor-a").await, Some(42));
        assert_eq!(directory.resolve("dev-1", "unknown").await, None);
    }
}
