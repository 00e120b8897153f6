// lib.rs
// Modules principaux
pub mod core;
pub mod domain;
pub mod infrastructure;
pub mod utils;
pub mod workers;

// Ré-exports pour faciliter l'utilisation
pub use self::core::{DiffusionPipeline, ImageGenerator};
pub use domain::{GenerationParams, JobRequest, JobStatus};
pub use infrastructure::{
    AppError, AppResult, ArtifactStore, QueueConsumer, S3ArtifactStorage, StatusTracker, Telemetry,
};
pub use utils::Config;
pub use workers::{AckDecision, InferenceWorker};

// Version de l'application
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = "Inference Worker";
