//! Random Forest implementation
//!
//! Bootstrap-aggregated regression trees. Each tree gets its own bootstrap
//! sample and visiting-order seed derived from the forest seed, so a fixed
//! seed reproduces the forest exactly regardless of thread scheduling.

use crate::error::{ForecastError, Result};
use crate::models::tree::{FittedTree, RegressionTree, TreeConfig};
use crate::models::{
    check_prediction_input, check_training_input, normalize_importances, FittedRegressor,
    RegressionModel, DEFAULT_SEED,
};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Random Forest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees in the forest
    pub n_trees: usize,
    /// Maximum depth of each tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Max features per split (None = all)
    pub max_features: Option<usize>,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Random seed
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            seed: DEFAULT_SEED,
        }
    }
}

/// Random Forest model
#[derive(Debug, Clone, Default)]
pub struct RandomForest {
    config: ForestConfig,
}

/// Fitted Random Forest
#[derive(Debug, Clone)]
pub struct FittedForest {
    trees: Vec<FittedTree>,
    n_features: usize,
    feature_importances: Vec<f64>,
}

impl RandomForest {
    /// Create a new random forest
    pub fn new(config: ForestConfig) -> Result<Self> {
        if config.n_trees == 0 {
            return Err(ForecastError::InvalidParameter(
                "A forest needs at least one tree".to_string(),
            ));
        }
        Ok(Self { config })
    }

    /// Default forest with the given seed
    pub fn with_seed(seed: u64) -> Self {
        Self {
            config: ForestConfig {
                seed,
                ..Default::default()
            },
        }
    }

    fn bootstrap_indices(n_samples: usize, seed: u64) -> Vec<usize> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
    }
}

impl RegressionModel for RandomForest {
    type Fitted = FittedForest;

    fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<Self::Fitted> {
        check_training_input(x, y)?;
        let n_samples = x.nrows();
        let targets = y.to_vec();

        // Build trees in parallel
        let trees = (0..self.config.n_trees)
            .into_par_iter()
            .map(|i| -> Result<FittedTree> {
                let tree_seed = self.config.seed.wrapping_add(i as u64);
                let tree = RegressionTree::new(TreeConfig {
                    max_depth: self.config.max_depth,
                    min_samples_split: self.config.min_samples_split,
                    min_samples_leaf: self.config.min_samples_leaf,
                    max_features: self.config.max_features,
                    seed: tree_seed,
                })?;

                let indices = if self.config.bootstrap {
                    Self::bootstrap_indices(n_samples, tree_seed)
                } else {
                    (0..n_samples).collect()
                };

                Ok(tree.fit_rows(x, &targets, indices))
            })
            .collect::<Result<Vec<FittedTree>>>()?;

        // Aggregate feature importances
        let mut feature_importances = vec![0.0; x.ncols()];
        for tree in &trees {
            for (total, imp) in feature_importances.iter_mut().zip(tree.importances()) {
                *total += imp;
            }
        }
        normalize_importances(&mut feature_importances);

        Ok(FittedForest {
            trees,
            n_features: x.ncols(),
            feature_importances,
        })
    }

    fn name(&self) -> &str {
        "Random Forest"
    }
}

impl FittedForest {
    /// Number of fitted trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl FittedRegressor for FittedForest {
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        check_prediction_input(x, self.n_features)?;
        let n_trees = self.trees.len() as f64;

        Ok(x
            .rows()
            .into_iter()
            .map(|row| self.trees.iter().map(|t| t.predict_one(row)).sum::<f64>() / n_trees)
            .collect())
    }

    fn feature_importances(&self) -> Option<&[f64]> {
        Some(&self.feature_importances)
    }

    fn name(&self) -> &str {
        "Random Forest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn seasonal_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((48, 2), |(i, j)| {
            if j == 0 {
                (i % 12) as f64
            } else {
                i as f64
            }
        });
        let y: Array1<f64> = (0..48)
            .map(|i| 100.0 + 10.0 * ((i % 12) as f64) + 0.5 * i as f64)
            .collect();
        (x, y)
    }

    #[test]
    fn test_forest_fits_training_data_closely() {
        let (x, y) = seasonal_data();
        let fitted = RandomForest::default().fit(&x, &y).unwrap();
        assert_eq!(fitted.n_trees(), 100);

        let predictions = fitted.predict(&x).unwrap();
        let mae = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, t)| (p - t).abs())
            .sum::<f64>()
            / y.len() as f64;
        assert!(mae < 10.0, "mae was {}", mae);
    }

    #[test]
    fn test_forest_is_deterministic() {
        let (x, y) = seasonal_data();
        let first = RandomForest::with_seed(7).fit(&x, &y).unwrap();
        let second = RandomForest::with_seed(7).fit(&x, &y).unwrap();

        assert_eq!(first.predict(&x).unwrap(), second.predict(&x).unwrap());
        assert_eq!(first.feature_importances(), second.feature_importances());
    }

    #[test]
    fn test_importances_sum_to_one() {
        let (x, y) = seasonal_data();
        let fitted = RandomForest::default().fit(&x, &y).unwrap();
        let total: f64 = fitted.feature_importances().unwrap().iter().sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_trees_rejected() {
        let config = ForestConfig {
            n_trees: 0,
            ..Default::default()
        };
        assert!(RandomForest::new(config).is_err());
    }
}
