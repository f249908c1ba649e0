//! Gradient boosting over regression trees
//!
//! Regressor boosts on squared-error residuals; the classifier boosts
//! log-odds with one booster per class (a single booster for the binary
//! case). Hyperparameters are fixed by the training contract.

use super::decision_tree::RegressionTree;
use crate::error::{AutotabError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Gradient boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GbmConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
}

impl Default for GbmConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 6,
            min_samples_leaf: 1,
        }
    }
}

/// Gradient boosting regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GbmRegressor {
    config: GbmConfig,
    trees: Vec<RegressionTree>,
    initial_prediction: f64,
    feature_importances: Vec<f64>,
}

impl GbmRegressor {
    pub fn new(config: GbmConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_prediction: 0.0,
            feature_importances: Vec::new(),
        }
    }

    /// Fit on squared-error residuals
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();
        if n_samples == 0 || n_samples != y.len() {
            return Err(AutotabError::TrainingError(format!(
                "invalid training shape: {} rows, {} targets",
                n_samples,
                y.len()
            )));
        }

        self.initial_prediction = y.mean().unwrap_or(0.0);
        self.feature_importances = vec![0.0; n_features];

        let mut predictions = Array1::from_elem(n_samples, self.initial_prediction);

        for _ in 0..self.config.n_estimators {
            let residuals: Array1<f64> = y
                .iter()
                .zip(predictions.iter())
                .map(|(yi, pi)| yi - pi)
                .collect();

            let mut tree = RegressionTree::new()
                .with_max_depth(self.config.max_depth)
                .with_min_samples_leaf(self.config.min_samples_leaf);
            tree.fit(x, &residuals)?;

            let tree_pred = tree.predict(x)?;
            for i in 0..n_samples {
                predictions[i] += self.config.learning_rate * tree_pred[i];
            }

            accumulate_importances(&mut self.feature_importances, &tree);
            self.trees.push(tree);
        }

        normalize(&mut self.feature_importances);
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(AutotabError::NotTrained);
        }
        let n = x.nrows();
        let mut predictions = Array1::from_elem(n, self.initial_prediction);
        for tree in &self.trees {
            let tree_pred = tree.predict(x)?;
            for i in 0..n {
                predictions[i] += self.config.learning_rate * tree_pred[i];
            }
        }
        Ok(predictions)
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }
}

/// One log-odds boosting chain for a single class-vs-rest problem
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BinaryBooster {
    trees: Vec<RegressionTree>,
    initial_log_odds: f64,
}

impl BinaryBooster {
    /// Fit on a 0/1 indicator target
    fn fit(x: &Array2<f64>, y01: &Array1<f64>, config: &GbmConfig) -> Result<(Self, Vec<f64>)> {
        let n_samples = x.nrows();
        let p = y01.mean().unwrap_or(0.5);
        let initial_log_odds = (p / (1.0 - p + 1e-10)).ln();

        let mut log_odds = Array1::from_elem(n_samples, initial_log_odds);
        let mut trees = Vec::with_capacity(config.n_estimators);
        let mut importances = vec![0.0; x.ncols()];

        for _ in 0..config.n_estimators {
            // Gradient of log loss: y - sigmoid(log_odds)
            let residuals: Array1<f64> = y01
                .iter()
                .zip(log_odds.iter())
                .map(|(yi, lo)| yi - sigmoid(*lo))
                .collect();

            let mut tree = RegressionTree::new()
                .with_max_depth(config.max_depth)
                .with_min_samples_leaf(config.min_samples_leaf);
            tree.fit(x, &residuals)?;

            let tree_pred = tree.predict(x)?;
            for i in 0..n_samples {
                log_odds[i] += config.learning_rate * tree_pred[i];
            }

            accumulate_importances(&mut importances, &tree);
            trees.push(tree);
        }

        Ok((
            Self {
                trees,
                initial_log_odds,
            },
            importances,
        ))
    }

    fn predict_proba(&self, x: &Array2<f64>, learning_rate: f64) -> Result<Array1<f64>> {
        let n = x.nrows();
        let mut log_odds = Array1::from_elem(n, self.initial_log_odds);
        for tree in &self.trees {
            let tree_pred = tree.predict(x)?;
            for i in 0..n {
                log_odds[i] += learning_rate * tree_pred[i];
            }
        }
        Ok(log_odds.iter().map(|&lo| sigmoid(lo)).collect())
    }
}

/// Gradient boosting classifier: binary log-odds boosting, extended to
/// multiclass with one booster per class (one-vs-rest).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GbmClassifier {
    config: GbmConfig,
    classes: Vec<i64>,
    boosters: Vec<BinaryBooster>,
    feature_importances: Vec<f64>,
}

impl GbmClassifier {
    pub fn new(config: GbmConfig) -> Self {
        Self {
            config,
            classes: Vec::new(),
            boosters: Vec::new(),
            feature_importances: Vec::new(),
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples == 0 || n_samples != y.len() {
            return Err(AutotabError::TrainingError(format!(
                "invalid training shape: {} rows, {} targets",
                n_samples,
                y.len()
            )));
        }

        let mut classes: Vec<i64> = y.iter().map(|v| v.round() as i64).collect();
        classes.sort_unstable();
        classes.dedup();
        if classes.len() < 2 {
            return Err(AutotabError::TrainingError(
                "classification target has fewer than 2 classes".to_string(),
            ));
        }
        self.classes = classes;

        self.boosters.clear();
        self.feature_importances = vec![0.0; x.ncols()];

        if self.classes.len() == 2 {
            let positive = self.classes[1];
            let y01 = indicator(y, positive);
            let (booster, importances) = BinaryBooster::fit(x, &y01, &self.config)?;
            merge(&mut self.feature_importances, &importances);
            self.boosters.push(booster);
        } else {
            for &class in &self.classes {
                let y01 = indicator(y, class);
                let (booster, importances) = BinaryBooster::fit(x, &y01, &self.config)?;
                merge(&mut self.feature_importances, &importances);
                self.boosters.push(booster);
            }
        }

        normalize(&mut self.feature_importances);
        Ok(())
    }

    /// Predict class values
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.boosters.is_empty() {
            return Err(AutotabError::NotTrained);
        }

        if self.classes.len() == 2 {
            let probs = self.boosters[0].predict_proba(x, self.config.learning_rate)?;
            return Ok(probs
                .iter()
                .map(|&p| {
                    if p >= 0.5 {
                        self.classes[1] as f64
                    } else {
                        self.classes[0] as f64
                    }
                })
                .collect());
        }

        // One-vs-rest: argmax over per-class probabilities
        let per_class: Vec<Array1<f64>> = self
            .boosters
            .iter()
            .map(|b| b.predict_proba(x, self.config.learning_rate))
            .collect::<Result<_>>()?;

        let predictions: Vec<f64> = (0..x.nrows())
            .map(|i| {
                let mut best = 0usize;
                for k in 1..per_class.len() {
                    if per_class[k][i] > per_class[best][i] {
                        best = k;
                    }
                }
                self.classes[best] as f64
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn classes(&self) -> &[i64] {
        &self.classes
    }
}

fn sigmoid(log_odds: f64) -> f64 {
    1.0 / (1.0 + (-log_odds).exp())
}

fn indicator(y: &Array1<f64>, class: i64) -> Array1<f64> {
    y.iter()
        .map(|v| if v.round() as i64 == class { 1.0 } else { 0.0 })
        .collect()
}

fn accumulate_importances(total: &mut [f64], tree: &RegressionTree) {
    if let Some(tree_importances) = tree.feature_importances() {
        merge(total, tree_importances);
    }
}

fn merge(total: &mut [f64], addend: &[f64]) {
    for (t, a) in total.iter_mut().zip(addend.iter()) {
        *t += a;
    }
}

fn normalize(importances: &mut [f64]) {
    let total: f64 = importances.iter().sum();
    if total > 0.0 {
        for imp in importances.iter_mut() {
            *imp /= total;
        }
    }
}
