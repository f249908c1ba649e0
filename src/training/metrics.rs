//! Holdout evaluation metrics

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Metrics for one evaluated run; the variant follows the problem type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Metrics {
    Regression { rmse: f64, r2: f64, mse: f64 },
    Classification { accuracy: f64 },
}

impl Metrics {
    pub fn regression(actual: &Array1<f64>, predicted: &Array1<f64>) -> Self {
        let n = actual.len() as f64;
        let mse = actual
            .iter()
            .zip(predicted.iter())
            .map(|(a, p)| (a - p).powi(2))
            .sum::<f64>()
            / n;

        let mean = actual.mean().unwrap_or(0.0);
        let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
        let ss_res: f64 = actual
            .iter()
            .zip(predicted.iter())
            .map(|(a, p)| (a - p).powi(2))
            .sum();
        let r2 = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

        Metrics::Regression {
            rmse: mse.sqrt(),
            r2,
            mse,
        }
    }

    pub fn classification(actual: &Array1<f64>, predicted: &Array1<f64>) -> Self {
        let correct = actual
            .iter()
            .zip(predicted.iter())
            .filter(|(a, p)| (*a - *p).abs() < 0.5)
            .count();
        let accuracy = if actual.is_empty() {
            0.0
        } else {
            correct as f64 / actual.len() as f64
        };
        Metrics::Classification { accuracy }
    }
}
