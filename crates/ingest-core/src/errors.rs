//! Error taxonomy shared across the core crates (spec §7).

use thiserror::Error;

/// The five error kinds the core surfaces and discriminates on.
///
/// Propagation rules (§7): `InvalidInput`/`Duplicate` are terminal at the
/// router, `Unavailable` is retried then sinks to the DLQ, `Throttled`
/// propagates to the transport/producer, `Internal` isolates the affected
/// point without blocking others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    Duplicate,
    Unavailable,
    Throttled,
    Internal,
}

impl ErrorKind {
    /// HTTP status mapping from §7: 1→400, 2→200, 3→503, 4→429, 5→500.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::InvalidInput => 400,
            ErrorKind::Duplicate => 200,
            ErrorKind::Unavailable => 503,
            ErrorKind::Throttled => 429,
            ErrorKind::Internal => 500,
        }
    }

    /// Whether a dependency call that failed with this kind may be retried
    /// (§4.C5: "refuses to retry on classification failures or constraint
    /// violations").
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Unavailable)
    }
}

/// Error type for the pure core (guards, classifier, state machine).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("non-finite value")]
    NonFiniteValue,

    #[error("timestamp out of acceptable window: {0}")]
    TimestampOutOfWindow(String),

    #[error("series_id must be a positive integer for legacy iot series")]
    InvalidNumericSeriesId,

    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::NonFiniteValue
            | CoreError::TimestampOutOfWindow(_)
            | CoreError::InvalidNumericSeriesId => ErrorKind::InvalidInput,
            CoreError::Invariant(_) => ErrorKind::Internal,
        }
    }
}
