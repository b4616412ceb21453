//! Resilience layer: idempotency (C3), dead-letter queue (C4), retry +
//! circuit breaker (C5), and the throttled prediction bus (C9).

pub mod circuit_breaker;
pub mod dedup;
pub mod dlq;
pub mod retry;
pub mod throttle;

pub use circuit_breaker::{Admission, BreakerState, CircuitBreaker, DEFAULT_FAILURE_THRESHOLD, DEFAULT_OPEN_DURATION};
pub use dedup::{Deduplicator, IdempotencyStore, InMemoryStore};
pub use dlq::{DeadLetterQueue, DlqCategory, DlqEntry, DlqReplayer};
pub use retry::{retry_with_backoff, RetryError, RetryPolicy};
pub use throttle::{PredictionMessage, PredictionPublisher, ThrottledBus};
