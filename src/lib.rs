//! Autotab - Stateful tabular training and prediction engine
//!
//! This crate provides the core of a tabular supervised-learning service:
//! - Dataset store with schema summaries for uploaded tables
//! - Preprocessing with imputation and stable label encoding
//! - Gradient-boosted tree training with fixed hyperparameters
//! - Ordered progress narration of each training run
//! - Single and batch prediction against a published model artifact
//!
//! Transport concerns (HTTP, WebSocket, CSV parsing) live outside the
//! crate: a collaborator hands in parsed `polars` DataFrames and JSON
//! records and streams progress events out through a [`progress::ProgressSink`].
//!
//! # Modules
//!
//! - [`dataset`] - Raw table store and schema summary
//! - [`preprocessing`] - Imputation and label encoding, fit/apply split
//! - [`model`] - Gradient-boosted decision trees
//! - [`training`] - Run configuration, metrics, orchestrator
//! - [`progress`] - Ordered progress event channel
//! - [`inference`] - Prediction service and response envelopes
//! - [`session`] - Per-session state and concurrency control

pub mod error;

pub mod dataset;
pub mod inference;
pub mod model;
pub mod preprocessing;
pub mod progress;
pub mod session;
pub mod training;

pub use error::{AutotabError, Result};

/// Common imports for crate consumers
pub mod prelude {
    pub use crate::dataset::{DataSummary, DatasetStore};
    pub use crate::error::{AutotabError, Result};
    pub use crate::inference::{
        BatchPredictionResponse, PredictionResponse, PredictionValue, Record,
    };
    pub use crate::preprocessing::{EncodingState, InferenceFill, LabelMap, Preprocessor};
    pub use crate::progress::{
        ChannelSink, FeatureImportance, MemorySink, NullSink, ProgressEvent, ProgressSink,
    };
    pub use crate::session::Session;
    pub use crate::training::{
        Metrics, ModelArtifact, ProblemType, TrainOutcome, TrainingConfig, TrainingOrchestrator,
    };
}
