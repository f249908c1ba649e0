//! Training run configuration

use crate::error::{AutotabError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Supervised problem type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemType {
    Regression,
    Classification,
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProblemType::Regression => write!(f, "regression"),
            ProblemType::Classification => write!(f, "classification"),
        }
    }
}

/// Parameters of one training run, matching the external JSON request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingConfig {
    pub target_column: String,
    pub feature_columns: Vec<String>,
    pub problem_type: ProblemType,
    #[serde(rename = "trainTestSplit")]
    pub train_ratio: f64,
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.train_ratio > 0.0 && self.train_ratio < 1.0) {
            return Err(AutotabError::InvalidInput(format!(
                "trainTestSplit must be in (0, 1), got {}",
                self.train_ratio
            )));
        }
        if self.target_column.is_empty() {
            return Err(AutotabError::InvalidInput(
                "targetColumn must not be empty".to_string(),
            ));
        }
        if self.feature_columns.is_empty() {
            return Err(AutotabError::InvalidInput(
                "featureColumns must not be empty".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for column in &self.feature_columns {
            if !seen.insert(column.as_str()) {
                return Err(AutotabError::InvalidInput(format!(
                    "duplicate feature column '{}'",
                    column
                )));
            }
            if column == &self.target_column {
                return Err(AutotabError::InvalidInput(format!(
                    "target column '{}' cannot also be a feature",
                    column
                )));
            }
        }
        Ok(())
    }
}
