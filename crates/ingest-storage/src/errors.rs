//! Storage-layer error taxonomy, folding into the shared `ErrorKind` (§7).

use thiserror::Error;

use ingest_core::ErrorKind;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("series not found: {0}")]
    NotFound(String),

    #[error("internal storage error: {0}")]
    Internal(String),
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::Unavailable(_) => ErrorKind::Unavailable,
            StorageError::NotFound(_) => ErrorKind::Internal,
            StorageError::Internal(_) => ErrorKind::Internal,
        }
    }
}
