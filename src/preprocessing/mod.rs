//! Data preprocessing
//!
//! Fits and applies missing-value imputation and categorical encoding.
//! The encoding state produced by a fit is owned by the model artifact it
//! trained and is read-only at inference time, so the train and inference
//! paths cannot drift apart.

mod label_map;
mod pipeline;

pub use label_map::{LabelMap, UnseenPolicy};
pub use pipeline::{EncodingState, FitOutput, InferenceFill, Preprocessor};
