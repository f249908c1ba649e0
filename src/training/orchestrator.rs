//! End-to-end training run
//!
//! Drives preprocess -> split -> fit -> evaluate -> publish for one run,
//! narrating each stage on the progress sink. Any failure aborts the run
//! and is reported once, as the terminal event and in the outcome; a
//! failed run never produces an artifact.

use crate::error::{AutotabError, Result};
use crate::model::{GbmClassifier, GbmConfig, GbmRegressor};
use crate::preprocessing::{EncodingState, InferenceFill, Preprocessor};
use crate::progress::{FeatureImportance, ProgressEvent, ProgressSink};
use crate::training::{Metrics, ProblemType, TrainingConfig};
use ndarray::{Array1, Array2, Axis};
use polars::prelude::DataFrame;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{error, info};

/// Fixed seed for the holdout shuffle; keeps repeated runs identical
const SPLIT_SEED: u64 = 42;

/// Number of (actual, predicted) holdout pairs narrated per run
const SAMPLE_PREDICTIONS: usize = 5;

/// Number of features in the importance summary
const TOP_FEATURES: usize = 5;

/// The fitted model, regressor or classifier by problem type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    Regressor(GbmRegressor),
    Classifier(GbmClassifier),
}

impl TrainedModel {
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            TrainedModel::Regressor(model) => model.predict(x),
            TrainedModel::Classifier(model) => model.predict(x),
        }
    }

    fn feature_importances(&self) -> &[f64] {
        match self {
            TrainedModel::Regressor(model) => model.feature_importances(),
            TrainedModel::Classifier(model) => model.feature_importances(),
        }
    }
}

/// Everything prediction needs, published atomically after a
/// successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model: TrainedModel,
    pub feature_columns: Vec<String>,
    pub problem_type: ProblemType,
    pub encoding: EncodingState,
    pub feature_importance: HashMap<String, f64>,
    pub fill: InferenceFill,
}

/// Structured result of a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Metrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_importance: Option<HashMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct TrainingOrchestrator;

impl TrainingOrchestrator {
    /// Run one training pass over `df`.
    ///
    /// Returns the outcome plus the artifact to publish on success. The
    /// terminal `Finished` event fires on both paths.
    pub fn run(
        df: &DataFrame,
        config: &TrainingConfig,
        sink: &dyn ProgressSink,
    ) -> (TrainOutcome, Option<ModelArtifact>) {
        match Self::run_inner(df, config, sink) {
            Ok((metrics, artifact)) => {
                info!(problem_type = %config.problem_type, "training run succeeded");
                sink.publish(ProgressEvent::Finished {
                    success: true,
                    error: None,
                });
                let outcome = TrainOutcome {
                    success: true,
                    metrics: Some(metrics),
                    feature_importance: Some(artifact.feature_importance.clone()),
                    error: None,
                };
                (outcome, Some(artifact))
            }
            Err(err) => {
                let message = err.to_string();
                error!(error = %message, "training run failed");
                sink.publish(ProgressEvent::Finished {
                    success: false,
                    error: Some(message.clone()),
                });
                let outcome = TrainOutcome {
                    success: false,
                    metrics: None,
                    feature_importance: None,
                    error: Some(message),
                };
                (outcome, None)
            }
        }
    }

    fn run_inner(
        df: &DataFrame,
        config: &TrainingConfig,
        sink: &dyn ProgressSink,
    ) -> Result<(Metrics, ModelArtifact)> {
        config.validate()?;

        sink.publish(ProgressEvent::ParamsReceived);
        sink.publish(ProgressEvent::TargetColumn {
            name: config.target_column.clone(),
        });
        sink.publish(ProgressEvent::FeatureCount {
            count: config.feature_columns.len(),
        });
        sink.publish(ProgressEvent::ProblemTypeSelected {
            problem_type: config.problem_type.to_string(),
        });
        sink.publish(ProgressEvent::DataSize { rows: df.height() });
        sink.publish(ProgressEvent::SplitRatio {
            train_ratio: config.train_ratio,
        });

        sink.publish(ProgressEvent::PreprocessingStarted);
        let fit = Preprocessor::fit(
            df,
            &config.feature_columns,
            &config.target_column,
            config.problem_type,
        )?;
        sink.publish(ProgressEvent::PreprocessingComplete {
            feature_count: fit.features.ncols(),
            sample_count: fit.features.nrows(),
        });

        let (x_train, x_test, y_train, y_test) =
            holdout_split(&fit.features, &fit.target, config.train_ratio)?;
        sink.publish(ProgressEvent::SplitComplete {
            train_count: x_train.nrows(),
            test_count: x_test.nrows(),
        });

        let model_name = match config.problem_type {
            ProblemType::Regression => "gradient boosting regressor",
            ProblemType::Classification => "gradient boosting classifier",
        };
        sink.publish(ProgressEvent::ModelSelected {
            model: model_name.to_string(),
        });

        sink.publish(ProgressEvent::TrainingStarted);
        let model = match config.problem_type {
            ProblemType::Regression => {
                let mut model = GbmRegressor::new(GbmConfig::default());
                model.fit(&x_train, &y_train)?;
                TrainedModel::Regressor(model)
            }
            ProblemType::Classification => {
                let mut model = GbmClassifier::new(GbmConfig::default());
                model.fit(&x_train, &y_train)?;
                TrainedModel::Classifier(model)
            }
        };
        sink.publish(ProgressEvent::TrainingComplete);

        sink.publish(ProgressEvent::EvaluationStarted);
        let predictions = model.predict(&x_test)?;
        let metrics = match config.problem_type {
            ProblemType::Regression => Metrics::regression(&y_test, &predictions),
            ProblemType::Classification => Metrics::classification(&y_test, &predictions),
        };
        sink.publish(ProgressEvent::MetricsReport {
            metrics: metrics.clone(),
        });

        for i in 0..y_test.len().min(SAMPLE_PREDICTIONS) {
            sink.publish(ProgressEvent::SamplePrediction {
                actual: y_test[i],
                predicted: predictions[i],
            });
        }

        let feature_importance: HashMap<String, f64> = config
            .feature_columns
            .iter()
            .cloned()
            .zip(model.feature_importances().iter().copied())
            .collect();
        sink.publish(ProgressEvent::TopFeatures {
            importances: top_features(&feature_importance),
        });

        let artifact = ModelArtifact {
            model,
            feature_columns: config.feature_columns.clone(),
            problem_type: config.problem_type,
            encoding: fit.encoding,
            feature_importance,
            fill: InferenceFill::default(),
        };

        Ok((metrics, artifact))
    }
}

/// Seeded shuffled holdout split. Test size is the ceiling of
/// `(1 - train_ratio) * rows`; both partitions must be non-empty.
fn holdout_split(
    x: &Array2<f64>,
    y: &Array1<f64>,
    train_ratio: f64,
) -> Result<(Array2<f64>, Array2<f64>, Array1<f64>, Array1<f64>)> {
    let n = x.nrows();
    let test_size = ((1.0 - train_ratio) * n as f64).ceil() as usize;
    if test_size == 0 || test_size >= n {
        return Err(AutotabError::InvalidInput(format!(
            "dataset with {} rows cannot be split with ratio {}",
            n, train_ratio
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(SPLIT_SEED);
    indices.shuffle(&mut rng);

    let (test_idx, train_idx) = indices.split_at(test_size);

    let x_train = x.select(Axis(0), train_idx);
    let x_test = x.select(Axis(0), test_idx);
    let y_train = y.select(Axis(0), train_idx);
    let y_test = y.select(Axis(0), test_idx);

    Ok((x_train, x_test, y_train, y_test))
}

/// Highest-importance features first, at most five
fn top_features(importance: &HashMap<String, f64>) -> Vec<FeatureImportance> {
    let mut ranked: Vec<FeatureImportance> = importance
        .iter()
        .map(|(feature, &value)| FeatureImportance {
            feature: feature.clone(),
            importance: value,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.importance
            .partial_cmp(&a.importance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.feature.cmp(&b.feature))
    });
    ranked.truncate(TOP_FEATURES);
    ranked
}
