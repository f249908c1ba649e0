//! Regression tree base learner
//!
//! Variance-reduction splits over continuous features. Gradient boosting
//! fits trees on residuals for both problem types, so only the regression
//! criterion is needed.

use crate::error::{AutotabError, Result};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

/// Regression tree with depth and leaf-size limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    root: Option<TreeNode>,
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
    n_features: usize,
    feature_importances: Option<Vec<f64>>,
}

impl Default for RegressionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl RegressionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            n_features: 0,
            feature_importances: None,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(AutotabError::TrainingError(format!(
                "x has {} rows but y has {} values",
                n_samples,
                y.len()
            )));
        }
        if n_samples == 0 {
            return Err(AutotabError::TrainingError(
                "cannot fit a tree on zero samples".to_string(),
            ));
        }

        self.n_features = x.ncols();
        let mut importances = vec![0.0; self.n_features];
        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_node(x, y, &indices, 0, &mut importances));

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(importances);

        Ok(self)
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(AutotabError::NotTrained)?;

        let predictions: Vec<f64> = (0..x.nrows())
            .map(|i| {
                let sample: Vec<f64> = x.row(i).to_vec();
                Self::predict_sample(root, &sample)
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    /// Normalized split-gain importance per feature
    pub fn feature_importances(&self) -> Option<&[f64]> {
        self.feature_importances.as_deref()
    }

    fn build_node(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
    ) -> TreeNode {
        let n_samples = indices.len();
        let y_subset: Vec<f64> = indices.iter().map(|&i| y[i]).collect();

        let should_stop = n_samples < self.min_samples_split
            || n_samples <= self.min_samples_leaf
            || self.max_depth.is_some_and(|d| depth >= d)
            || is_constant(&y_subset);

        if should_stop {
            return TreeNode::Leaf {
                value: mean(&y_subset),
                n_samples,
            };
        }

        let Some((feature_idx, threshold, gain)) = self.find_best_split(x, y, indices) else {
            return TreeNode::Leaf {
                value: mean(&y_subset),
                n_samples,
            };
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, feature_idx]] <= threshold);

        if left_indices.len() < self.min_samples_leaf
            || right_indices.len() < self.min_samples_leaf
        {
            return TreeNode::Leaf {
                value: mean(&y_subset),
                n_samples,
            };
        }

        importances[feature_idx] += n_samples as f64 * gain;

        let left = Box::new(self.build_node(x, y, &left_indices, depth + 1, importances));
        let right = Box::new(self.build_node(x, y, &right_indices, depth + 1, importances));

        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            n_samples,
        }
    }

    /// Best (feature, threshold, variance gain) over all features.
    /// Features are scanned in parallel; each scan is deterministic and the
    /// reduction picks a fixed winner on ties, so fits are reproducible.
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
    ) -> Option<(usize, f64, f64)> {
        let y_subset: Vec<f64> = indices.iter().map(|&i| y[i]).collect();
        let parent_impurity = variance(&y_subset);
        if parent_impurity <= 0.0 {
            return None;
        }
        let n = indices.len() as f64;

        let per_feature: Vec<Option<(usize, f64, f64)>> = (0..x.ncols())
            .into_par_iter()
            .map(|feature_idx| {
                let mut values: Vec<f64> =
                    indices.iter().map(|&i| x[[i, feature_idx]]).collect();
                values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                values.dedup();

                let mut best_gain = 0.0f64;
                let mut best_threshold = 0.0f64;

                for window in values.windows(2) {
                    let threshold = (window[0] + window[1]) / 2.0;

                    let mut left_count = 0usize;
                    let mut left_sum = 0.0f64;
                    let mut left_sq_sum = 0.0f64;
                    let mut right_count = 0usize;
                    let mut right_sum = 0.0f64;
                    let mut right_sq_sum = 0.0f64;

                    for &idx in indices {
                        let yi = y[idx];
                        if x[[idx, feature_idx]] <= threshold {
                            left_count += 1;
                            left_sum += yi;
                            left_sq_sum += yi * yi;
                        } else {
                            right_count += 1;
                            right_sum += yi;
                            right_sq_sum += yi * yi;
                        }
                    }

                    if left_count < self.min_samples_leaf || right_count < self.min_samples_leaf {
                        continue;
                    }

                    let left_var = variance_from_sums(left_count, left_sum, left_sq_sum);
                    let right_var = variance_from_sums(right_count, right_sum, right_sq_sum);
                    let weighted =
                        (left_count as f64 * left_var + right_count as f64 * right_var) / n;

                    let gain = parent_impurity - weighted;
                    if gain > best_gain {
                        best_gain = gain;
                        best_threshold = threshold;
                    }
                }

                (best_gain > 0.0).then_some((feature_idx, best_threshold, best_gain))
            })
            .collect();

        per_feature
            .into_iter()
            .flatten()
            .max_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal))
    }

    fn predict_sample(node: &TreeNode, sample: &[f64]) -> f64 {
        match node {
            TreeNode::Leaf { value, .. } => *value,
            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
                ..
            } => {
                if sample[*feature_idx] <= *threshold {
                    Self::predict_sample(left, sample)
                } else {
                    Self::predict_sample(right, sample)
                }
            }
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|&v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

// Var = E[X^2] - E[X]^2, clamped against rounding below zero
fn variance_from_sums(count: usize, sum: f64, sq_sum: f64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    let n = count as f64;
    (sq_sum / n - (sum / n).powi(2)).max(0.0)
}

fn is_constant(values: &[f64]) -> bool {
    match values.first() {
        None => true,
        Some(&first) => values.iter().all(|&v| (v - first).abs() < 1e-10),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fits_linear_target() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];

        let mut tree = RegressionTree::new();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        let mse: f64 = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / y.len() as f64;
        assert!(mse < 1.0, "mse too high: {}", mse);
    }

    #[test]
    fn test_max_depth_limits_tree() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0], [8.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];

        let mut stump = RegressionTree::new().with_max_depth(1);
        stump.fit(&x, &y).unwrap();

        let predictions = stump.predict(&x).unwrap();
        let distinct = {
            let mut v: Vec<f64> = predictions.to_vec();
            v.sort_by(|a, b| a.partial_cmp(b).unwrap());
            v.dedup_by(|a, b| (*a - *b).abs() < 1e-12);
            v.len()
        };
        // Depth 1 allows at most one split, so at most two leaf values
        assert!(distinct <= 2);
    }

    #[test]
    fn test_feature_importance_prefers_informative_feature() {
        let x = array![
            [1.0, 0.0],
            [2.0, 0.0],
            [3.0, 0.0],
            [4.0, 0.0],
            [5.0, 0.0],
            [6.0, 0.0],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut tree = RegressionTree::new();
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert!(importances[0] > importances[1]);
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let tree = RegressionTree::new();
        let x = array![[1.0]];
        assert!(matches!(
            tree.predict(&x),
            Err(AutotabError::NotTrained)
        ));
    }

    #[test]
    fn test_shape_mismatch_fails() {
        let x = array![[1.0], [2.0]];
        let y = array![1.0];
        let mut tree = RegressionTree::new();
        assert!(tree.fit(&x, &y).is_err());
    }
}
