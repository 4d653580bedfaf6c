//! Gradient boosting with least-squares loss
//!
//! Starts from the target mean and adds shallow regression trees fitted to
//! the current residuals, each scaled by the learning rate.

use crate::error::{ForecastError, Result};
use crate::models::tree::{FittedTree, RegressionTree, TreeConfig};
use crate::models::{
    check_prediction_input, check_training_input, normalize_importances, FittedRegressor,
    RegressionModel, DEFAULT_SEED,
};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Boosting hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostingParams {
    /// Number of boosting stages (trees)
    pub n_estimators: usize,
    /// Shrinkage applied to every tree
    pub learning_rate: f64,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Minimum samples required to split a node
    pub min_samples_split: usize,
    /// Minimum samples required in a leaf node
    pub min_samples_leaf: usize,
    /// Seed for the per-tree feature visiting order
    pub seed: u64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: DEFAULT_SEED,
        }
    }
}

/// Gradient boosting regressor
#[derive(Debug, Clone, Default)]
pub struct GradientBoosting {
    params: BoostingParams,
}

/// Fitted gradient boosting ensemble
#[derive(Debug, Clone)]
pub struct FittedBoosting {
    init: f64,
    learning_rate: f64,
    stages: Vec<FittedTree>,
    n_features: usize,
    feature_importances: Vec<f64>,
}

impl GradientBoosting {
    /// Create a new booster
    pub fn new(params: BoostingParams) -> Result<Self> {
        if params.n_estimators == 0 {
            return Err(ForecastError::InvalidParameter(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if !(params.learning_rate > 0.0 && params.learning_rate <= 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "learning_rate must be in (0, 1], got {}",
                params.learning_rate
            )));
        }
        Ok(Self { params })
    }

    /// Default booster with the given seed
    pub fn with_seed(seed: u64) -> Self {
        Self {
            params: BoostingParams {
                seed,
                ..Default::default()
            },
        }
    }
}

impl RegressionModel for GradientBoosting {
    type Fitted = FittedBoosting;

    fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<Self::Fitted> {
        check_training_input(x, y)?;
        let n_samples = x.nrows();
        let init = y.sum() / n_samples as f64;

        let tree = RegressionTree::new(TreeConfig {
            max_depth: Some(self.params.max_depth),
            min_samples_split: self.params.min_samples_split,
            min_samples_leaf: self.params.min_samples_leaf,
            max_features: None,
            seed: self.params.seed,
        })?;

        let mut current = Array1::from_elem(n_samples, init);
        let mut stages = Vec::with_capacity(self.params.n_estimators);
        let mut feature_importances = vec![0.0; x.ncols()];

        for _ in 0..self.params.n_estimators {
            let residuals: Vec<f64> = y.iter().zip(current.iter()).map(|(t, f)| t - f).collect();
            let stage = tree.fit_rows(x, &residuals, (0..n_samples).collect());

            for (i, row) in x.rows().into_iter().enumerate() {
                current[i] += self.params.learning_rate * stage.predict_one(row);
            }
            for (total, imp) in feature_importances.iter_mut().zip(stage.importances()) {
                *total += imp;
            }
            stages.push(stage);
        }
        normalize_importances(&mut feature_importances);

        Ok(FittedBoosting {
            init,
            learning_rate: self.params.learning_rate,
            stages,
            n_features: x.ncols(),
            feature_importances,
        })
    }

    fn name(&self) -> &str {
        "Gradient Boosting"
    }
}

impl FittedBoosting {
    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        self.init
            + self.learning_rate
                * self
                    .stages
                    .iter()
                    .map(|stage| stage.predict_one(row))
                    .sum::<f64>()
    }
}

impl FittedRegressor for FittedBoosting {
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        check_prediction_input(x, self.n_features)?;
        Ok(x.rows().into_iter().map(|row| self.predict_row(row)).collect())
    }

    fn feature_importances(&self) -> Option<&[f64]> {
        Some(&self.feature_importances)
    }

    fn name(&self) -> &str {
        "Gradient Boosting"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn training_error(params: BoostingParams) -> f64 {
        let x = Array2::from_shape_fn((40, 1), |(i, _)| i as f64);
        let y: Array1<f64> = (0..40).map(|i| ((i as f64) / 4.0).sin() * 10.0).collect();
        let fitted = GradientBoosting::new(params).unwrap().fit(&x, &y).unwrap();
        let predictions = fitted.predict(&x).unwrap();
        predictions
            .iter()
            .zip(y.iter())
            .map(|(p, t)| (p - t).powi(2))
            .sum::<f64>()
            / y.len() as f64
    }

    #[test]
    fn test_more_stages_reduce_training_error() {
        let few = training_error(BoostingParams {
            n_estimators: 5,
            ..Default::default()
        });
        let many = training_error(BoostingParams::default());
        assert!(many < few);
    }

    #[test]
    fn test_constant_target_predicts_mean() {
        let x = Array2::from_shape_fn((4, 1), |(i, _)| i as f64);
        let y = Array1::from(vec![2.0, 2.0, 2.0, 2.0]);
        let fitted = GradientBoosting::default().fit(&x, &y).unwrap();
        let predictions = fitted.predict(&x).unwrap();
        assert!(predictions.iter().all(|p| (p - 2.0).abs() < 1e-12));
    }

    #[test]
    fn test_invalid_params() {
        assert!(GradientBoosting::new(BoostingParams {
            n_estimators: 0,
            ..Default::default()
        })
        .is_err());
        assert!(GradientBoosting::new(BoostingParams {
            learning_rate: 0.0,
            ..Default::default()
        })
        .is_err());
    }
}
