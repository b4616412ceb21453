//! The domain storage router (C13): dispatches every insert to exactly one
//! backend by domain (I7), never both, and reports each backend's health
//! independently.

use ingest_core::{Classification, DataPoint, Domain};

use crate::backends::{BackendHealth, GenericStore, LegacyStore};
use crate::errors::StorageError;

#[derive(Debug, Clone, Copy)]
pub struct StorageHealthReport {
    pub legacy: BackendHealth,
    pub generic: BackendHealth,
}

pub struct DomainStorageRouter<L: LegacyStore, G: GenericStore> {
    legacy: L,
    generic: G,
}

impl<L: LegacyStore, G: GenericStore> DomainStorageRouter<L, G> {
    pub fn new(legacy: L, generic: G) -> Self {
        Self { legacy, generic }
    }

    /// I7: `point.domain.is_legacy()` selects the backend exclusively; the
    /// other backend is never touched for this point.
    pub async fn insert(&self, point: &DataPoint, classification: &Classification) -> Result<(), StorageError> {
        if point.domain.is_legacy() {
            self.legacy.insert(point, classification).await
        } else {
            self.generic.insert(point).await
        }
    }

    pub async fn health(&self) -> StorageHealthReport {
        StorageHealthReport {
            legacy: self.legacy.health().await,
            generic: self.generic.health().await,
        }
    }

    pub async fn backend_health(&self, domain: Domain) -> BackendHealth {
        if domain.is_legacy() {
            self.legacy.health().await
        } else {
            self.generic.health().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{InMemoryGenericStore, InMemoryLegacyStore};
    use ingest_core::Classification;
    use std::collections::HashMap;

    fn point(series_id: &str, domain: Domain) -> DataPoint {
        DataPoint {
            series_id: series_id.to_string(),
            value: 1.0,
            timestamp: 0.0,
            ingested_at: None,
            processed_at: None,
            domain,
            source_id: None,
            stream_type: None,
            sequence: None,
            metadata: HashMap::new(),
            msg_id: None,
        }
    }

    #[tokio::test]
    async fn iot_point_goes_to_legacy_only() {
        let legacy = InMemoryLegacyStore::new();
        let generic = InMemoryGenericStore::new();
        let router = DomainStorageRouter::new(legacy, generic);
        router
            .insert(&point("s1", Domain::Iot), &Classification::normal())
            .await
            .unwrap();
        assert_eq!(router.legacy.len(), 1);
        assert_eq!(router.generic.len(), 0);
    }

    #[tokio::test]
    async fn finance_point_goes_to_generic_only() {
        let legacy = InMemoryLegacyStore::new();
        let generic = InMemoryGenericStore::new();
        let router = DomainStorageRouter::new(legacy, generic);
        router
            .insert(&point("s1", Domain::Finance), &Classification::normal())
            .await
            .unwrap();
        assert_eq!(router.legacy.len(), 0);
        assert_eq!(router.generic.len(), 1);
    }

    #[tokio::test]
    async fn backend_health_is_independent() {
        let legacy = InMemoryLegacyStore::new();
        let generic = InMemoryGenericStore::new();
        legacy.set_healthy(false);
        let router = DomainStorageRouter::new(legacy, generic);
        let report = router.health().await;
        assert_eq!(report.legacy, BackendHealth::Down);
        assert_eq!(report.generic, BackendHealth::Up);
    }
}
