//! Storage backend seams (C13): the legacy IoT time-series store and the
//! generic multi-domain store. Each is a trait so a deployment can plug in a
//! real driver the way the gateway plugs in its database module; only
//! in-memory implementations live here, for tests and as a development
//! default.

use async_trait::async_trait;
use dashmap::DashMap;

use ingest_core::{Classification, DataPoint};

use crate::errors::StorageError;

/// Reported by `GET /health` and `GET /health/{backend}` (§6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendHealth {
    Up,
    Degraded,
    Down,
}

/// The legacy IoT backend (I7: the only backend legacy IoT series ever
/// reach). Persists the classification alongside the raw point, since the
/// legacy schema predates the unified classification pipeline and callers
/// still query by classification kind.
#[async_trait]
pub trait LegacyStore: Send + Sync {
    async fn insert(&self, point: &DataPoint, classification: &Classification) -> Result<(), StorageError>;
    async fn health(&self) -> BackendHealth;
}

/// The generic multi-domain backend (I7: every non-IoT domain, exclusively).
#[async_trait]
pub trait GenericStore: Send + Sync {
    async fn insert(&self, point: &DataPoint) -> Result<(), StorageError>;
    async fn health(&self) -> BackendHealth;
}

#[async_trait]
impl LegacyStore for Box<dyn LegacyStore> {
    async fn insert(&self, point: &DataPoint, classification: &Classification) -> Result<(), StorageError> {
        (**self).insert(point, classification).await
    }

    async fn health(&self) -> BackendHealth {
        (**self).health().await
    }
}

#[async_trait]
impl GenericStore for Box<dyn GenericStore> {
    async fn insert(&self, point: &DataPoint) -> Result<(), StorageError> {
        (**self).insert(point).await
    }

    async fn health(&self) -> BackendHealth {
        (**self).health().await
    }
}

/// In-memory `LegacyStore`, keyed by `series_id` holding the most recent
/// insert — enough to exercise routing and retry behavior in tests.
#[derive(Default)]
pub struct InMemoryLegacyStore {
    rows: DashMap<String, (DataPoint, Classification)>,
    healthy: std::sync::atomic::AtomicBool,
}

impl InMemoryLegacyStore {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
            healthy: std::sync::atomic::AtomicBool::new(true),
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn get(&self, series_id: &str) -> Option<(DataPoint, Classification)> {
        self.rows.get(series_id).map(|r| r.clone())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

#[async_trait]
impl LegacyStore for InMemoryLegacyStore {
    async fn insert(&self, point: &DataPoint, classification: &Classification) -> Result<(), StorageError> {
        if !self.healthy.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StorageError::Unavailable("legacy store".into()));
        }
        self.rows
            .insert(point.series_id.clone(), (point.clone(), classification.clone()));
        Ok(())
    }

    async fn health(&self) -> BackendHealth {
        if self.healthy.load(std::sync::atomic::Ordering::SeqCst) {
            BackendHealth::Up
        } else {
            BackendHealth::Down
        }
    }
}

/// In-memory `GenericStore`, same shape without the classification column.
#[derive(Default)]
pub struct InMemoryGenericStore {
    rows: DashMap<String, DataPoint>,
    healthy: std::sync::atomic::AtomicBool,
}

impl InMemoryGenericStore {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
            healthy: std::sync::atomic::AtomicBool::new(true),
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn get(&self, series_id: &str) -> Option<DataPoint> {
        self.rows.get(series_id).map(|r| r.clone())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

#[async_trait]
impl GenericStore for InMemoryGenericStore {
    async fn insert(&self, point: &DataPoint) -> Result<(), StorageError> {
        if !self.healthy.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StorageError::Unavailable("generic store".into()));
        }
        self.rows.insert(point.series_id.clone(), point.clone());
        Ok(())
    }

    async fn health(&self) -> BackendHealth {
        if self.healthy.load(std::sync::atomic::Ordering::SeqCst) {
            BackendHealth::Up
        } else {
            BackendHealth::Down
        }
    }
}
