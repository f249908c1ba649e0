//! Prediction service
//!
//! Scores JSON records against a published model artifact. Errors are
//! surfaced as structured `{success: false, error}` envelopes at the
//! session boundary, never as panics.

use crate::error::{AutotabError, Result};
use crate::preprocessing::Preprocessor;
use crate::training::ModelArtifact;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// One inference record: feature name -> JSON scalar
pub type Record = serde_json::Map<String, Value>;

/// A scored output: raw number for regression, decoded label for
/// classification with an encoded target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictionValue {
    Number(f64),
    Label(String),
}

/// Single-prediction envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction: Option<PredictionValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PredictionResponse {
    pub fn from_result(result: Result<PredictionValue>) -> Self {
        match result {
            Ok(prediction) => Self {
                success: true,
                prediction: Some(prediction),
                error: None,
            },
            Err(err) => Self {
                success: false,
                prediction: None,
                error: Some(err.to_string()),
            },
        }
    }
}

/// Batch-prediction envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPredictionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predictions: Option<Vec<PredictionValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchPredictionResponse {
    pub fn from_result(result: Result<Vec<PredictionValue>>) -> Self {
        match result {
            Ok(predictions) => {
                let count = predictions.len();
                Self {
                    success: true,
                    predictions: Some(predictions),
                    count: Some(count),
                    error: None,
                }
            }
            Err(err) => Self {
                success: false,
                predictions: None,
                count: None,
                error: Some(err.to_string()),
            },
        }
    }
}

/// Score a single record
pub fn predict_one(artifact: &ModelArtifact, record: &Record) -> Result<PredictionValue> {
    check_missing_features(artifact, std::iter::once(record))?;

    let records = [record];
    let x = Preprocessor::apply(
        &records,
        &artifact.encoding,
        &artifact.feature_columns,
        &artifact.fill,
    )?;
    let predictions = artifact.model.predict(&x)?;
    decode_value(artifact, predictions[0])
}

/// Score a batch of records with one model call.
///
/// Rejects empty batches up front, and names every required feature
/// column absent from the union of record keys before any scoring.
pub fn predict_batch(
    artifact: &ModelArtifact,
    records: &[Value],
) -> Result<Vec<PredictionValue>> {
    if records.is_empty() {
        return Err(AutotabError::InvalidInput(
            "batch contains no records".to_string(),
        ));
    }

    let maps: Vec<&Record> = records
        .iter()
        .map(|value| {
            value.as_object().ok_or_else(|| {
                AutotabError::InvalidInput(
                    "batch elements must be JSON objects".to_string(),
                )
            })
        })
        .collect::<Result<_>>()?;

    check_missing_features(artifact, maps.iter().copied())?;

    let x = Preprocessor::apply(
        &maps,
        &artifact.encoding,
        &artifact.feature_columns,
        &artifact.fill,
    )?;
    let predictions = artifact.model.predict(&x)?;
    predictions
        .iter()
        .map(|&value| decode_value(artifact, value))
        .collect()
}

/// A required column counts as present when any record in the batch
/// carries the key, matching column-oriented table semantics.
fn check_missing_features<'a>(
    artifact: &ModelArtifact,
    records: impl Iterator<Item = &'a Record>,
) -> Result<()> {
    let mut present: HashSet<&str> = HashSet::new();
    for record in records {
        present.extend(record.keys().map(String::as_str));
    }

    let missing: Vec<String> = artifact
        .feature_columns
        .iter()
        .filter(|column| !present.contains(column.as_str()))
        .cloned()
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AutotabError::MissingFeatures(missing))
    }
}

fn decode_value(artifact: &ModelArtifact, value: f64) -> Result<PredictionValue> {
    match artifact.encoding.target_encoder() {
        Some(encoder) => {
            let code = value.round();
            if code < 0.0 {
                return Err(AutotabError::ConversionError(format!(
                    "predicted label code {} is negative",
                    value
                )));
            }
            let label = encoder.decode(code as usize)?;
            Ok(PredictionValue::Label(label.to_string()))
        }
        None => Ok(PredictionValue::Number(value)),
    }
}
