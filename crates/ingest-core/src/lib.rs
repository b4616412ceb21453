//! Pure, I/O-free core of the ingestion gateway.
//!
//! Holds the unified reading contract, per-series configuration and
//! operational-state types, the classifier, the operational state machine,
//! and the syntactic guards applied before any of that runs. Nothing in this
//! crate talks to a network, a database, or a clock other than through values
//! passed in by the caller.

pub mod classification;
pub mod classifier;
pub mod constraints;
pub mod datapoint;
pub mod errors;
pub mod guards;
pub mod state;
pub mod state_machine;

pub use classification::{Classification, ClassificationKind, Reason};
pub use classifier::{classify, classify_with_raw_reason};
pub use constraints::{StreamConfig, ValueConstraints};
pub use datapoint::{DataPoint, Domain, UnifiedReading};
pub use errors::{CoreError, ErrorKind};
pub use state::{OperationalState, SeriesState};
pub use state_machine::StateMachine;
