//! Training: configuration, metrics, and the run orchestrator

mod config;
mod metrics;
mod orchestrator;

pub use config::{ProblemType, TrainingConfig};
pub use metrics::Metrics;
pub use orchestrator::{ModelArtifact, TrainOutcome, TrainedModel, TrainingOrchestrator};
