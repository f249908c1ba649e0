//! Preprocessing pipeline: fit at train time, apply at inference time

use super::label_map::{LabelMap, UnseenPolicy};
use crate::error::{AutotabError, Result};
use crate::training::ProblemType;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Sentinel used when a categorical column has no mode (all missing)
/// and as the default inference-time categorical fill.
const UNKNOWN_LABEL: &str = "unknown";

/// Encoding state fit exactly once per training run.
///
/// Read-only after fit; inference resolves unseen values through each
/// encoder's policy instead of mutating the tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingState {
    feature_encoders: HashMap<String, LabelMap>,
    target_encoder: Option<LabelMap>,
}

impl EncodingState {
    pub fn encoder_for(&self, column: &str) -> Option<&LabelMap> {
        self.feature_encoders.get(column)
    }

    pub fn is_categorical(&self, column: &str) -> bool {
        self.feature_encoders.contains_key(column)
    }

    pub fn target_encoder(&self) -> Option<&LabelMap> {
        self.target_encoder.as_ref()
    }
}

/// Inference-time fill values.
///
/// Training imputes with column mean/mode but those statistics are not
/// retained on the artifact, so inference fills with constants instead.
/// The asymmetry is kept configurable rather than silently unified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceFill {
    pub categorical: String,
    pub numeric: f64,
}

impl Default for InferenceFill {
    fn default() -> Self {
        Self {
            categorical: UNKNOWN_LABEL.to_string(),
            numeric: 0.0,
        }
    }
}

/// Output of a successful preprocessing fit
#[derive(Debug, Clone)]
pub struct FitOutput {
    pub features: Array2<f64>,
    pub target: Array1<f64>,
    pub encoding: EncodingState,
}

/// Stateless entry points for the two preprocessing code paths
pub struct Preprocessor;

impl Preprocessor {
    /// Fit imputation and encoding on the training table.
    ///
    /// Categorical features: missing values filled with the column mode
    /// (or "unknown" when no mode exists), then label-encoded in
    /// first-seen order. Numeric features: missing values filled with the
    /// column mean. A categorical target is label-encoded for
    /// classification and rejected for regression. The returned tensors
    /// are fully numeric with no missing values.
    pub fn fit(
        df: &DataFrame,
        feature_columns: &[String],
        target_column: &str,
        problem_type: ProblemType,
    ) -> Result<FitOutput> {
        let n_rows = df.height();
        if n_rows == 0 {
            return Err(AutotabError::InvalidInput(
                "dataset has no rows".to_string(),
            ));
        }

        let mut feature_encoders = HashMap::new();
        let mut col_data: Vec<Vec<f64>> = Vec::with_capacity(feature_columns.len());

        for col_name in feature_columns {
            let column = df
                .column(col_name)
                .map_err(|_| AutotabError::FeatureNotFound(col_name.clone()))?;
            let series = column.as_materialized_series();

            if is_numeric_dtype(series.dtype()) {
                col_data.push(numeric_fit_column(series)?);
            } else {
                let (values, encoder) = categorical_fit_column(series)?;
                feature_encoders.insert(col_name.clone(), encoder);
                col_data.push(values);
            }
        }

        let target_series = df
            .column(target_column)
            .map_err(|_| AutotabError::FeatureNotFound(target_column.to_string()))?
            .as_materialized_series();

        let (target_values, target_encoder) = if is_numeric_dtype(target_series.dtype()) {
            (numeric_fit_column(target_series)?, None)
        } else {
            match problem_type {
                ProblemType::Classification => {
                    let (values, encoder) = categorical_fit_target(target_series)?;
                    (values, Some(encoder))
                }
                ProblemType::Regression => {
                    return Err(AutotabError::ConversionError(format!(
                        "target column '{}' must be numeric for regression",
                        target_column
                    )));
                }
            }
        };

        let col_refs: Vec<&[f64]> = col_data.iter().map(|c| c.as_slice()).collect();
        let features =
            Array2::from_shape_fn((n_rows, feature_columns.len()), |(r, c)| col_refs[c][r]);

        Ok(FitOutput {
            features,
            target: Array1::from_vec(target_values),
            encoding: EncodingState {
                feature_encoders,
                target_encoder,
            },
        })
    }

    /// Encode inference records against a fitted encoding state.
    ///
    /// Never refits. Missing categorical values take `fill.categorical`,
    /// missing or non-numeric values in numeric columns take
    /// `fill.numeric`, and unseen categories resolve through the
    /// encoder's fallback policy. Fails with a conversion error when a
    /// cell holds a non-scalar value that cannot be coerced to a number.
    pub fn apply(
        records: &[&serde_json::Map<String, Value>],
        encoding: &EncodingState,
        feature_columns: &[String],
        fill: &InferenceFill,
    ) -> Result<Array2<f64>> {
        let n_rows = records.len();
        let mut data = Array2::<f64>::zeros((n_rows, feature_columns.len()));

        for (col_idx, col_name) in feature_columns.iter().enumerate() {
            if let Some(encoder) = encoding.encoder_for(col_name) {
                for (row_idx, record) in records.iter().enumerate() {
                    let label = match record.get(col_name) {
                        None | Some(Value::Null) => fill.categorical.clone(),
                        Some(value) => scalar_to_label(col_name, value)?,
                    };
                    data[[row_idx, col_idx]] = encoder.encode(&label)? as f64;
                }
            } else {
                for (row_idx, record) in records.iter().enumerate() {
                    data[[row_idx, col_idx]] =
                        scalar_to_number(col_name, record.get(col_name), fill.numeric)?;
                }
            }
        }

        Ok(data)
    }
}

fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Mean-filled numeric column as f64 values
fn numeric_fit_column(series: &Series) -> Result<Vec<f64>> {
    let casted = series
        .cast(&DataType::Float64)
        .map_err(|e| AutotabError::DataError(e.to_string()))?;
    let ca = casted
        .f64()
        .map_err(|e| AutotabError::DataError(e.to_string()))?;
    let mean = ca.mean().unwrap_or(0.0);
    Ok(ca.into_iter().map(|v| v.unwrap_or(mean)).collect())
}

/// Mode-filled, label-encoded categorical column
fn categorical_fit_column(series: &Series) -> Result<(Vec<f64>, LabelMap)> {
    encode_string_series(series, UnseenPolicy::FallbackToFirst)
}

fn categorical_fit_target(series: &Series) -> Result<(Vec<f64>, LabelMap)> {
    encode_string_series(series, UnseenPolicy::Reject)
}

fn encode_string_series(series: &Series, policy: UnseenPolicy) -> Result<(Vec<f64>, LabelMap)> {
    let as_string = if series.dtype() == &DataType::String {
        series.clone()
    } else {
        series
            .cast(&DataType::String)
            .map_err(|e| AutotabError::ConversionError(e.to_string()))?
    };
    let ca = as_string
        .str()
        .map_err(|e| AutotabError::DataError(e.to_string()))?;

    let fill = string_mode(ca).unwrap_or_else(|| UNKNOWN_LABEL.to_string());

    let mut encoder = LabelMap::new(policy);
    let values: Vec<f64> = ca
        .into_iter()
        .map(|opt| encoder.insert(opt.unwrap_or(&fill)) as f64)
        .collect();

    Ok((values, encoder))
}

/// Most frequent non-null value; ties break toward the smaller string
fn string_mode(ca: &StringChunked) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in ca.into_iter().flatten() {
        *counts.entry(value).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(value, _)| value.to_string())
}

fn scalar_to_label(column: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(AutotabError::ConversionError(format!(
            "column '{}': value {} is not a scalar",
            column, other
        ))),
    }
}

fn scalar_to_number(column: &str, value: Option<&Value>, fill: f64) -> Result<f64> {
    match value {
        None | Some(Value::Null) => Ok(fill),
        Some(Value::Number(n)) => Ok(n.as_f64().unwrap_or(fill)),
        Some(Value::String(s)) => Ok(s.trim().parse::<f64>().unwrap_or(fill)),
        Some(Value::Bool(b)) => Ok(if *b { 1.0 } else { 0.0 }),
        Some(other) => Err(AutotabError::ConversionError(format!(
            "column '{}': value {} cannot be coerced to a number",
            column, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feature_names(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn record(value: Value) -> serde_json::Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_fit_mean_fills_numeric() {
        let df = df!(
            "x" => &[Some(1.0), None, Some(3.0), Some(4.0)],
            "y" => &[10.0, 20.0, 30.0, 40.0],
        )
        .unwrap();

        let out = Preprocessor::fit(&df, &feature_names(&["x"]), "y", ProblemType::Regression)
            .unwrap();

        // Mean of [1, 3, 4] = 8/3
        assert!((out.features[[1, 0]] - 8.0 / 3.0).abs() < 1e-9);
        assert!(!out.encoding.is_categorical("x"));
    }

    #[test]
    fn test_fit_mode_fills_categorical() {
        let df = df!(
            "city" => &[Some("paris"), Some("tokyo"), None, Some("paris")],
            "y" => &[1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();

        let out = Preprocessor::fit(&df, &feature_names(&["city"]), "y", ProblemType::Regression)
            .unwrap();

        let encoder = out.encoding.encoder_for("city").unwrap();
        // First-seen order: paris=0, tokyo=1; mode fill keeps row 2 at "paris"
        assert_eq!(encoder.code_of("paris"), Some(0));
        assert_eq!(encoder.code_of("tokyo"), Some(1));
        assert_eq!(out.features[[2, 0]], 0.0);
    }

    #[test]
    fn test_fit_all_missing_categorical_uses_unknown() {
        let df = df!(
            "c" => &[None::<&str>, None, None],
            "y" => &[1.0, 2.0, 3.0],
        )
        .unwrap();

        let out =
            Preprocessor::fit(&df, &feature_names(&["c"]), "y", ProblemType::Regression).unwrap();
        let encoder = out.encoding.encoder_for("c").unwrap();
        assert_eq!(encoder.code_of("unknown"), Some(0));
    }

    #[test]
    fn test_fit_encodes_classification_target() {
        let df = df!(
            "x" => &[1.0, 2.0, 3.0, 4.0],
            "bought" => &["yes", "no", "yes", "no"],
        )
        .unwrap();

        let out = Preprocessor::fit(
            &df,
            &feature_names(&["x"]),
            "bought",
            ProblemType::Classification,
        )
        .unwrap();

        let target_encoder = out.encoding.target_encoder().unwrap();
        assert_eq!(target_encoder.code_of("yes"), Some(0));
        assert_eq!(target_encoder.code_of("no"), Some(1));
        assert_eq!(out.target.to_vec(), vec![0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_fit_rejects_string_target_for_regression() {
        let df = df!(
            "x" => &[1.0, 2.0],
            "label" => &["a", "b"],
        )
        .unwrap();

        let err = Preprocessor::fit(
            &df,
            &feature_names(&["x"]),
            "label",
            ProblemType::Regression,
        )
        .unwrap_err();
        assert!(matches!(err, AutotabError::ConversionError(_)));
    }

    #[test]
    fn test_fit_output_has_no_missing_values() {
        let df = df!(
            "a" => &[Some(1.0), None, Some(3.0)],
            "b" => &[Some("x"), None, Some("x")],
            "y" => &[Some(1.0), Some(2.0), None],
        )
        .unwrap();

        let out = Preprocessor::fit(
            &df,
            &feature_names(&["a", "b"]),
            "y",
            ProblemType::Regression,
        )
        .unwrap();

        assert!(out.features.iter().all(|v| v.is_finite()));
        assert!(out.target.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_apply_fills_and_falls_back() {
        let df = df!(
            "age" => &[20.0, 30.0, 40.0],
            "city" => &["paris", "tokyo", "paris"],
            "y" => &[1.0, 2.0, 3.0],
        )
        .unwrap();
        let out = Preprocessor::fit(
            &df,
            &feature_names(&["age", "city"]),
            "y",
            ProblemType::Regression,
        )
        .unwrap();

        let records = [
            record(json!({"age": 25, "city": "osaka"})),
            record(json!({"city": "tokyo"})),
        ];
        let refs: Vec<_> = records.iter().collect();
        let x = Preprocessor::apply(
            &refs,
            &out.encoding,
            &feature_names(&["age", "city"]),
            &InferenceFill::default(),
        )
        .unwrap();

        assert_eq!(x[[0, 0]], 25.0);
        // Unseen "osaka" falls back to the first assigned code
        assert_eq!(x[[0, 1]], 0.0);
        // Missing numeric -> 0, known "tokyo" -> 1
        assert_eq!(x[[1, 0]], 0.0);
        assert_eq!(x[[1, 1]], 1.0);
    }

    #[test]
    fn test_apply_is_stable_across_calls() {
        let df = df!(
            "c" => &["a", "b", "c", "a"],
            "y" => &[1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();
        let out =
            Preprocessor::fit(&df, &feature_names(&["c"]), "y", ProblemType::Regression).unwrap();

        let records = [record(json!({"c": "b"}))];
        let refs: Vec<_> = records.iter().collect();
        let fill = InferenceFill::default();
        let cols = feature_names(&["c"]);

        let first = Preprocessor::apply(&refs, &out.encoding, &cols, &fill).unwrap();
        let second = Preprocessor::apply(&refs, &out.encoding, &cols, &fill).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_apply_rejects_non_scalar_numeric() {
        let df = df!(
            "x" => &[1.0, 2.0],
            "y" => &[1.0, 2.0],
        )
        .unwrap();
        let out =
            Preprocessor::fit(&df, &feature_names(&["x"]), "y", ProblemType::Regression).unwrap();

        let records = [record(json!({"x": [1, 2, 3]}))];
        let refs: Vec<_> = records.iter().collect();
        let err = Preprocessor::apply(
            &refs,
            &out.encoding,
            &feature_names(&["x"]),
            &InferenceFill::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AutotabError::ConversionError(_)));
    }

    #[test]
    fn test_apply_parses_numeric_strings() {
        let df = df!(
            "x" => &[1.0, 2.0],
            "y" => &[1.0, 2.0],
        )
        .unwrap();
        let out =
            Preprocessor::fit(&df, &feature_names(&["x"]), "y", ProblemType::Regression).unwrap();

        let records = [record(json!({"x": "3.5"})), record(json!({"x": "oops"}))];
        let refs: Vec<_> = records.iter().collect();
        let x = Preprocessor::apply(
            &refs,
            &out.encoding,
            &feature_names(&["x"]),
            &InferenceFill::default(),
        )
        .unwrap();

        assert_eq!(x[[0, 0]], 3.5);
        // Unparseable strings in numeric columns take the numeric fill
        assert_eq!(x[[1, 0]], 0.0);
    }
}
