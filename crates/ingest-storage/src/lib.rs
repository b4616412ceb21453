//! Storage layer: the constraint & state repository (C6) and the domain
//! storage router over the legacy/generic backend seam (C13).

pub mod backends;
pub mod cache;
pub mod errors;
pub mod repository;
pub mod router;

pub use backends::{BackendHealth, GenericStore, InMemoryGenericStore, InMemoryLegacyStore, LegacyStore};
pub use cache::ReadThroughCache;
pub use errors::StorageError;
pub use repository::{
    ConfigLoader, ConstraintStateRepository, InMemoryConfigLoader, InMemoryStateStore, StateStore,
};
pub use router::{DomainStorageRouter, StorageHealthReport};
