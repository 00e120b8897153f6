pub mod error;
pub mod queue;
pub mod storage;
pub mod telemetry;
pub mod tracker;

pub use error::{AppError, AppResult};
pub use queue::QueueConsumer;
pub use storage::{ArtifactStore, S3ArtifactStorage};
pub use telemetry::Telemetry;
pub use tracker::StatusTracker;
