//! Gradient-boosted decision tree models
//!
//! Native implementations of the regressor and classifier used by the
//! training orchestrator. Hyperparameters are fixed by the training
//! contract; there is no search.

mod decision_tree;
mod gradient_boosting;

pub use decision_tree::RegressionTree;
pub use gradient_boosting::{GbmClassifier, GbmConfig, GbmRegressor};
