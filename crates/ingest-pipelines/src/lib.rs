//! The sub-pipelines (C10) and router (C11): the classification outputs'
//! exactly-one-pipeline dispatch, and the orchestration that gets a point
//! there.

pub mod alert;
pub mod events;
pub mod fakes;
pub mod prediction;
pub mod router;
pub mod stale_sweeper;
pub mod warning;

pub use alert::AlertPipeline;
pub use events::{
    AlertRecord, AlertStore, LatestValueStore, Notification, NotificationSink, PipelineError, RecordStatus,
    WarningRecord, WarningStore,
};
pub use prediction::PredictionPipeline;
pub use router::{IngestError, IngestOutcome, IngestRouter};
pub use stale_sweeper::{StaleSweeper, DEFAULT_STALE_TIMEOUT_SECONDS};
pub use warning::WarningPipeline;
