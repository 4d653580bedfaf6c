//! CART regression tree
//!
//! Greedy binary splits minimising the summed squared error of the children.
//! The tree is the base learner for both the bagged forest and the boosted
//! ensemble; on its own it is not part of the model catalog.

use crate::error::{ForecastError, Result};
use crate::models::{
    check_prediction_input, check_training_input, normalize_importances, FittedRegressor,
    RegressionModel, DEFAULT_SEED,
};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Decision tree configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Maximum depth of tree (None = grow until leaves are pure)
    pub max_depth: Option<usize>,
    /// Minimum samples required to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf node
    pub min_samples_leaf: usize,
    /// Maximum features to consider for split (None = all)
    pub max_features: Option<usize>,
    /// Random seed for the feature visiting order
    pub seed: u64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: DEFAULT_SEED,
        }
    }
}

/// Tree node
#[derive(Debug, Clone)]
enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn n_leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

/// Regression tree model
#[derive(Debug, Clone, Default)]
pub struct RegressionTree {
    config: TreeConfig,
}

/// Fitted regression tree
#[derive(Debug, Clone)]
pub struct FittedTree {
    root: TreeNode,
    n_features: usize,
    feature_importances: Vec<f64>,
}

impl RegressionTree {
    /// Create a new regression tree with config
    pub fn new(config: TreeConfig) -> Result<Self> {
        if config.min_samples_split < 2 {
            return Err(ForecastError::InvalidParameter(
                "min_samples_split must be at least 2".to_string(),
            ));
        }
        if config.min_samples_leaf == 0 {
            return Err(ForecastError::InvalidParameter(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        if config.max_features == Some(0) {
            return Err(ForecastError::InvalidParameter(
                "max_features must be at least 1".to_string(),
            ));
        }
        Ok(Self { config })
    }

    /// Fit on the rows listed in `indices`; repeated indices weigh a row more
    pub(crate) fn fit_rows(&self, x: &Array2<f64>, y: &[f64], indices: Vec<usize>) -> FittedTree {
        let mut builder = TreeBuilder {
            x,
            y,
            config: &self.config,
            rng: ChaCha8Rng::seed_from_u64(self.config.seed),
            importances: vec![0.0; x.ncols()],
        };
        let root = builder.build(indices, 0);
        let mut feature_importances = builder.importances;
        normalize_importances(&mut feature_importances);

        FittedTree {
            root,
            n_features: x.ncols(),
            feature_importances,
        }
    }
}

impl RegressionModel for RegressionTree {
    type Fitted = FittedTree;

    fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<Self::Fitted> {
        check_training_input(x, y)?;
        Ok(self.fit_rows(x, &y.to_vec(), (0..x.nrows()).collect()))
    }

    fn name(&self) -> &str {
        "Regression Tree"
    }
}

impl FittedTree {
    /// Predict for a single sample
    pub fn predict_one(&self, features: ArrayView1<f64>) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if features[*feature] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    /// Depth of the deepest leaf (a lone leaf has depth 1)
    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    /// Number of leaves
    pub fn n_leaves(&self) -> usize {
        self.root.n_leaves()
    }

    /// Normalised impurity decrease per feature
    pub fn importances(&self) -> &[f64] {
        &self.feature_importances
    }
}

impl FittedRegressor for FittedTree {
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        check_prediction_input(x, self.n_features)?;
        Ok(x.rows().into_iter().map(|row| self.predict_one(row)).collect())
    }

    fn feature_importances(&self) -> Option<&[f64]> {
        Some(&self.feature_importances)
    }

    fn name(&self) -> &str {
        "Regression Tree"
    }
}

/// Best split found for one node
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct TreeBuilder<'a> {
    x: &'a Array2<f64>,
    y: &'a [f64],
    config: &'a TreeConfig,
    rng: ChaCha8Rng,
    importances: Vec<f64>,
}

impl TreeBuilder<'_> {
    fn build(&mut self, indices: Vec<usize>, depth: usize) -> TreeNode {
        let n = indices.len();
        let sum: f64 = indices.iter().map(|&i| self.y[i]).sum();
        let mean = if n > 0 { sum / n as f64 } else { 0.0 };
        let sse: f64 = indices.iter().map(|&i| (self.y[i] - mean).powi(2)).sum();

        let depth_reached = self.config.max_depth.map_or(false, |max| depth >= max);
        if depth_reached
            || n < self.config.min_samples_split
            || n < 2 * self.config.min_samples_leaf
            || sse / (n.max(1) as f64) < 1e-10
        {
            return TreeNode::Leaf { value: mean };
        }

        let Some(split) = self.find_best_split(&indices, sse) else {
            return TreeNode::Leaf { value: mean };
        };

        self.importances[split.feature] += split.gain;

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.x[[i, split.feature]] <= split.threshold);

        let left = self.build(left_idx, depth + 1);
        let right = self.build(right_idx, depth + 1);

        TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Sweep every candidate feature in sorted order using prefix sums
    fn find_best_split(&mut self, indices: &[usize], parent_sse: f64) -> Option<SplitCandidate> {
        let n_features = self.x.ncols();
        let max_features = self
            .config
            .max_features
            .unwrap_or(n_features)
            .min(n_features);

        let mut feature_order: Vec<usize> = (0..n_features).collect();
        feature_order.shuffle(&mut self.rng);
        feature_order.truncate(max_features);

        let min_leaf = self.config.min_samples_leaf;
        let n = indices.len();
        let total_sum: f64 = indices.iter().map(|&i| self.y[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| self.y[i] * self.y[i]).sum();

        let mut best: Option<SplitCandidate> = None;
        let mut sorted = indices.to_vec();

        for feature in feature_order {
            sorted.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for k in 1..n {
                let prev = sorted[k - 1];
                left_sum += self.y[prev];
                left_sq += self.y[prev] * self.y[prev];

                if k < min_leaf || n - k < min_leaf {
                    continue;
                }
                let lo = self.x[[prev, feature]];
                let hi = self.x[[sorted[k], feature]];
                if lo >= hi {
                    continue;
                }

                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let left_sse = left_sq - left_sum * left_sum / k as f64;
                let right_sse = right_sq - right_sum * right_sum / (n - k) as f64;
                let gain = parent_sse - left_sse - right_sse;

                if gain > 0.0 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    let mut threshold = (lo + hi) / 2.0;
                    if threshold >= hi {
                        threshold = lo;
                    }
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        gain,
                    });
                }
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_step_function_is_learned_exactly() {
        let x = Array2::from_shape_fn((20, 1), |(i, _)| i as f64);
        let y: Array1<f64> = (0..20).map(|i| if i < 10 { 1.0 } else { 5.0 }).collect();

        let fitted = RegressionTree::default().fit(&x, &y).unwrap();
        let predictions = fitted.predict(&x).unwrap();

        for (p, t) in predictions.iter().zip(y.iter()) {
            assert_relative_eq!(*p, *t);
        }
        assert_eq!(fitted.n_leaves(), 2);
        assert_relative_eq!(fitted.importances()[0], 1.0);
    }

    #[test]
    fn test_depth_limit() {
        let x = Array2::from_shape_fn((64, 1), |(i, _)| i as f64);
        let y: Array1<f64> = (0..64).map(|i| (i * i) as f64).collect();

        let config = TreeConfig {
            max_depth: Some(2),
            ..Default::default()
        };
        let fitted = RegressionTree::new(config).unwrap().fit(&x, &y).unwrap();
        assert!(fitted.depth() <= 3);
        assert!(fitted.n_leaves() <= 4);
    }

    #[test]
    fn test_irrelevant_feature_gets_no_importance() {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| if j == 0 { i as f64 } else { 1.0 });
        let y: Array1<f64> = (0..30).map(|i| (i / 10) as f64).collect();

        let fitted = RegressionTree::default().fit(&x, &y).unwrap();
        let importances = fitted.feature_importances().unwrap();
        assert_relative_eq!(importances[0], 1.0);
        assert_relative_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_constant_target_is_single_leaf() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![7.0, 7.0, 7.0];
        let fitted = RegressionTree::default().fit(&x, &y).unwrap();
        assert_eq!(fitted.n_leaves(), 1);
        assert_relative_eq!(fitted.predict_one(array![10.0].view()), 7.0);
    }

    #[test]
    fn test_invalid_config() {
        let config = TreeConfig {
            min_samples_split: 1,
            ..Default::default()
        };
        assert!(RegressionTree::new(config).is_err());
    }
}
