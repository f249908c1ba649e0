//! Dataset store and schema summary
//!
//! Holds the currently loaded raw table for a session. The table is replaced
//! wholesale on each upload; the store reports a schema summary the upload
//! collaborator returns to the client.

use crate::error::Result;
use polars::prelude::*;
use serde::Serialize;
use std::collections::HashMap;

/// Number of rows included in the schema summary preview
const SAMPLE_ROWS: usize = 5;

/// Schema summary for an uploaded table
#[derive(Debug, Clone, Serialize)]
pub struct DataSummary {
    pub filename: String,
    pub shape: [usize; 2],
    pub columns: Vec<String>,
    pub dtypes: HashMap<String, String>,
    pub missing_values: HashMap<String, usize>,
    pub sample_data: Vec<serde_json::Map<String, serde_json::Value>>,
}

/// Store for the currently loaded raw table
#[derive(Debug, Default)]
pub struct DatasetStore {
    frame: Option<DataFrame>,
    filename: Option<String>,
}

impl DatasetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored table and return its schema summary
    pub fn load(&mut self, df: DataFrame, filename: &str) -> Result<DataSummary> {
        let summary = Self::summarize(&df, filename)?;
        self.frame = Some(df);
        self.filename = Some(filename.to_string());
        Ok(summary)
    }

    /// Current table, if one has been loaded
    pub fn frame(&self) -> Option<&DataFrame> {
        self.frame.as_ref()
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    fn summarize(df: &DataFrame, filename: &str) -> Result<DataSummary> {
        let columns: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        let mut dtypes = HashMap::new();
        let mut missing_values = HashMap::new();
        for col in df.get_columns() {
            let name = col.name().to_string();
            dtypes.insert(name.clone(), dtype_name(col.dtype()).to_string());
            missing_values.insert(name, col.null_count());
        }

        let n_preview = df.height().min(SAMPLE_ROWS);
        let mut sample_data = Vec::with_capacity(n_preview);
        for row_idx in 0..n_preview {
            let mut record = serde_json::Map::new();
            for col in df.get_columns() {
                let value = col.as_materialized_series().get(row_idx)?;
                record.insert(col.name().to_string(), any_value_to_json(&value));
            }
            sample_data.push(record);
        }

        Ok(DataSummary {
            filename: filename.to_string(),
            shape: [df.height(), df.width()],
            columns,
            dtypes,
            missing_values,
            sample_data,
        })
    }
}

fn dtype_name(dtype: &DataType) -> &'static str {
    match dtype {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => "int",
        DataType::Float32 | DataType::Float64 => "float",
        DataType::String | DataType::Categorical(_, _) => "string",
        DataType::Boolean => "bool",
        _ => "other",
    }
}

fn any_value_to_json(value: &AnyValue) -> serde_json::Value {
    match value {
        AnyValue::Null => serde_json::Value::Null,
        AnyValue::Boolean(b) => serde_json::Value::Bool(*b),
        AnyValue::Int8(v) => serde_json::json!(*v),
        AnyValue::Int16(v) => serde_json::json!(*v),
        AnyValue::Int32(v) => serde_json::json!(*v),
        AnyValue::Int64(v) => serde_json::json!(*v),
        AnyValue::UInt8(v) => serde_json::json!(*v),
        AnyValue::UInt16(v) => serde_json::json!(*v),
        AnyValue::UInt32(v) => serde_json::json!(*v),
        AnyValue::UInt64(v) => serde_json::json!(*v),
        AnyValue::Float32(v) if v.is_finite() => serde_json::json!(*v),
        AnyValue::Float64(v) if v.is_finite() => serde_json::json!(*v),
        AnyValue::Float32(_) | AnyValue::Float64(_) => serde_json::Value::Null,
        AnyValue::String(s) => serde_json::Value::String(s.to_string()),
        AnyValue::StringOwned(s) => serde_json::Value::String(s.to_string()),
        other => serde_json::Value::String(format!("{}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> DataFrame {
        df!(
            "age" => &[Some(25i64), Some(30), None, Some(40), Some(45), Some(50)],
            "city" => &[Some("NYC"), None, Some("LA"), Some("SF"), Some("NYC"), Some("LA")],
            "income" => &[50_000.0, 60_000.0, 70_000.0, 80_000.0, 90_000.0, 100_000.0],
        )
        .unwrap()
    }

    #[test]
    fn test_summary_shape_and_columns() {
        let mut store = DatasetStore::new();
        let summary = store.load(sample_frame(), "people.csv").unwrap();

        assert_eq!(summary.filename, "people.csv");
        assert_eq!(summary.shape, [6, 3]);
        assert_eq!(summary.columns, vec!["age", "city", "income"]);
        assert!(store.frame().is_some());
    }

    #[test]
    fn test_summary_dtypes_and_missing() {
        let mut store = DatasetStore::new();
        let summary = store.load(sample_frame(), "people.csv").unwrap();

        assert_eq!(summary.dtypes["age"], "int");
        assert_eq!(summary.dtypes["city"], "string");
        assert_eq!(summary.dtypes["income"], "float");
        assert_eq!(summary.missing_values["age"], 1);
        assert_eq!(summary.missing_values["city"], 1);
        assert_eq!(summary.missing_values["income"], 0);
    }

    #[test]
    fn test_summary_sample_rows() {
        let mut store = DatasetStore::new();
        let summary = store.load(sample_frame(), "people.csv").unwrap();

        assert_eq!(summary.sample_data.len(), 5);
        assert_eq!(summary.sample_data[0]["age"], serde_json::json!(25));
        assert_eq!(summary.sample_data[0]["city"], serde_json::json!("NYC"));
        assert!(summary.sample_data[2]["age"].is_null());
    }

    #[test]
    fn test_reload_replaces_table() {
        let mut store = DatasetStore::new();
        store.load(sample_frame(), "a.csv").unwrap();

        let smaller = df!("x" => &[1.0, 2.0]).unwrap();
        let summary = store.load(smaller, "b.csv").unwrap();

        assert_eq!(summary.shape, [2, 1]);
        assert_eq!(store.filename(), Some("b.csv"));
        assert_eq!(store.frame().unwrap().width(), 1);
    }
}
