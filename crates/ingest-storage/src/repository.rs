//! The constraint & state repository (C6): read-through caching in front of
//! whatever durable store holds per-series `StreamConfig` and `SeriesState`.
//!
//! The durable side is expressed as two trait seams, [`ConfigLoader`] and
//! [`StateStore`] — nothing here wires a live database driver; a deployment
//! plugs those in the same way the gateway plugs in [`crate::backends`].

use std::time::Duration;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};

use ingest_core::{Domain, SeriesState, StreamConfig};

use crate::cache::ReadThroughCache;
use crate::errors::StorageError;

/// Default cache capacity (per cache) and TTL for C6 (§4.C6).
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

#[async_trait]
pub trait ConfigLoader: Send + Sync {
    async fn load(&self, series_id: &str) -> Result<Option<StreamConfig>, StorageError>;
}

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self, series_id: &str) -> Result<Option<SeriesState>, StorageError>;
    async fn save(&self, state: &SeriesState) -> Result<(), StorageError>;
}

/// Read-through front for C6. Missing configuration falls back to
/// `StreamConfig::new_default` for the point's domain, logged once per
/// series (spec §4.C6: "applies domain defaults and logs once"). Missing
/// state is equivalent to a brand-new series at `INITIALIZING`.
pub struct ConstraintStateRepository<C: ConfigLoader, S: StateStore> {
    config_loader: C,
    state_store: S,
    config_cache: ReadThroughCache<String, StreamConfig>,
    state_cache: ReadThroughCache<String, SeriesState>,
    logged_missing_config: DashSet<String>,
}

impl<C: ConfigLoader, S: StateStore> ConstraintStateRepository<C, S> {
    pub fn new(config_loader: C, state_store: S) -> Self {
        Self {
            config_loader,
            state_store,
            config_cache: ReadThroughCache::new(DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL),
            state_cache: ReadThroughCache::new(DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL),
            logged_missing_config: DashSet::new(),
        }
    }

    pub async fn get_config(&self, series_id: &str, domain: Domain) -> StreamConfig {
        let loaded = self
            .config_cache
            .get_or_load(&series_id.to_string(), || self.config_loader.load(series_id))
            .await;

        match loaded {
            Ok(Some(cfg)) => cfg,
            Ok(None) => {
                if self.logged_missing_config.insert(series_id.to_string()) {
                    tracing::warn!(series_id, ?domain, "no stream config configured, applying domain defaults");
                }
                StreamConfig::new_default(series_id, domain)
            }
            Err(err) => {
                tracing::error!(series_id, error = %err, "config load failed, applying domain defaults");
                StreamConfig::new_default(series_id, domain)
            }
        }
    }

    pub async fn get_state(&self, series_id: &str, now: f64) -> SeriesState {
        let loaded = self
            .state_cache
            .get_or_load(&series_id.to_string(), || self.state_store.load(series_id))
            .await;

        match loaded {
            Ok(Some(state)) => state,
            Ok(None) => SeriesState::new(series_id, now),
            Err(err) => {
                tracing::error!(series_id, error = %err, "state load failed, treating series as new");
                SeriesState::new(series_id, now)
            }
        }
    }

    /// Persists `state` then updates the cache, so a subsequent `get_state`
    /// by the same router observes it without a round-trip (I6: state
    /// transitions are immediately visible to the next reading on the
    /// series).
    pub async fn save_state(&self, state: &SeriesState) -> Result<(), StorageError> {
        self.state_store.save(state).await?;
        self.state_cache.put(state.series_id.clone(), state.clone());
        Ok(())
    }

    pub fn invalidate_config(&self, series_id: &str) {
        self.config_cache.invalidate(&series_id.to_string());
    }
}

#[async_trait]
impl ConfigLoader for Box<dyn ConfigLoader> {
    async fn load(&self, series_id: &str) -> Result<Option<StreamConfig>, StorageError> {
        (**self).load(series_id).await
    }
}

#[async_trait]
impl StateStore for Box<dyn StateStore> {
    async fn load(&self, series_id: &str) -> Result<Option<SeriesState>, StorageError> {
        (**self).load(series_id).await
    }

    async fn save(&self, state: &SeriesState) -> Result<(), StorageError> {
        (**self).save(state).await
    }
}

/// In-memory [`ConfigLoader`], used by tests and wired as the default until
/// a real configuration source is plugged in.
#[derive(Default)]
pub struct InMemoryConfigLoader {
    configs: DashMap<String, StreamConfig>,
}

impl InMemoryConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, config: StreamConfig) {
        self.configs.insert(config.series_id.clone(), config);
    }
}

#[async_trait]
impl ConfigLoader for InMemoryConfigLoader {
    async fn load(&self, series_id: &str) -> Result<Option<StreamConfig>, StorageError> {
        Ok(self.configs.get(series_id).map(|c| c.clone()))
    }
}

/// In-memory [`StateStore`], used by tests and wired as the default until a
/// real durable store is plugged in.
#[derive(Default)]
pub struct InMemoryStateStore {
    states: DashMap<String, SeriesState>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load(&self, series_id: &str) -> Result<Option<SeriesState>, StorageError> {
        Ok(self.states.get(series_id).map(|s| s.clone()))
    }

    async fn save(&self, state: &SeriesState) -> Result<(), StorageError> {
        self.states.insert(state.series_id.clone(), state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_config_falls_back_to_domain_default() {
        let repo = ConstraintStateRepository::new(InMemoryConfigLoader::new(), InMemoryStateStore::new());
        let cfg = repo.get_config("s1", Domain::Iot).await;
        assert_eq!(cfg.series_id, "s1");
        assert_eq!(cfg.domain, Domain::Iot);
    }

    #[tokio::test]
    async fn missing_state_is_a_fresh_series() {
        let repo = ConstraintStateRepository::new(InMemoryConfigLoader::new(), InMemoryStateStore::new());
        let state = repo.get_state("s1", 100.0).await;
        assert_eq!(state.valid_readings_count, 0);
        assert_eq!(state.state_changed_at, 100.0);
    }

    #[tokio::test]
    async fn save_state_is_visible_to_next_read() {
        let repo = ConstraintStateRepository::new(InMemoryConfigLoader::new(), InMemoryStateStore::new());
        let mut state = repo.get_state("s1", 0.0).await;
        state.valid_readings_count = 5;
        repo.save_state(&state).await.unwrap();
        let reread = repo.get_state("s1", 0.0).await;
        assert_eq!(reread.valid_readings_count, 5);
    }
}
