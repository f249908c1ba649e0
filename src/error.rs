//! Error types for the autotab engine

use thiserror::Error;

/// Result type alias for autotab operations
pub type Result<T> = std::result::Result<T, AutotabError>;

/// Main error type for the autotab engine
///
/// Every failure is surfaced at a component boundary as a
/// `{success: false, error}` envelope rather than propagated as a panic.
#[derive(Error, Debug)]
pub enum AutotabError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing required features: {}", .0.join(", "))]
    MissingFeatures(Vec<String>),

    #[error("No trained model available")]
    NotTrained,

    #[error("Conversion error: {0}")]
    ConversionError(String),

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<polars::error::PolarsError> for AutotabError {
    fn from(err: polars::error::PolarsError) -> Self {
        AutotabError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for AutotabError {
    fn from(err: serde_json::Error) -> Self {
        AutotabError::InvalidInput(err.to_string())
    }
}
