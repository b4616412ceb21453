//! Transport-layer error taxonomy, folding into the shared `ErrorKind` (§7).

use thiserror::Error;

use ingest_core::ErrorKind;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("malformed payload: {0}")]
    Parse(String),

    #[error("backpressure: {0}")]
    Throttled(String),

    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

impl TransportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::Parse(_) => ErrorKind::InvalidInput,
            TransportError::Throttled(_) => ErrorKind::Throttled,
            TransportError::Unavailable(_) => ErrorKind::Unavailable,
        }
    }
}
