//! Regression models for the feature matrix
//!
//! Every model family implements [`RegressionModel`], whose `fit` produces a
//! [`FittedRegressor`]. The fixed catalog of families is [`ModelKind`]; the
//! ensemble only ever dispatches through it.

use crate::error::{ForecastError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};

pub mod boosting;
pub mod forest;
pub mod gbdt_model;
pub mod linear;
pub mod tree;

use boosting::GradientBoosting;
use forest::RandomForest;
use gbdt_model::ExternalGbdt;
use linear::{LassoRegression, LinearRegression, RidgeRegression};

/// Seed shared by every randomised model unless configured otherwise
pub const DEFAULT_SEED: u64 = 42;

/// A model that has been fitted and can predict
pub trait FittedRegressor: Debug + Send + Sync {
    /// Predict one value per row of `x`
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Native importance vector, one entry per feature column, if the family has one
    fn feature_importances(&self) -> Option<&[f64]> {
        None
    }

    /// Name of the model
    fn name(&self) -> &str;
}

/// Model family that can be fitted on a feature matrix
pub trait RegressionModel: Debug + Clone {
    /// The type of fitted model produced
    type Fitted: FittedRegressor + 'static;

    /// Fit the model on rows of `x` against targets `y`
    fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<Self::Fitted>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

/// The fixed model catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Ordinary least squares
    LinearRegression,
    /// L2-regularised linear model
    RidgeRegression,
    /// L1-regularised linear model
    LassoRegression,
    /// Bagged regression trees
    RandomForest,
    /// Boosted regression trees
    GradientBoosting,
    /// Gradient-boosted trees from the `gbdt` library
    #[serde(rename = "xgboost")]
    XGBoost,
}

impl ModelKind {
    /// Every family in registration order
    pub const ALL: [ModelKind; 6] = [
        ModelKind::LinearRegression,
        ModelKind::RidgeRegression,
        ModelKind::LassoRegression,
        ModelKind::RandomForest,
        ModelKind::GradientBoosting,
        ModelKind::XGBoost,
    ];

    /// Display name of the family
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::LinearRegression => "Linear Regression",
            ModelKind::RidgeRegression => "Ridge Regression",
            ModelKind::LassoRegression => "Lasso Regression",
            ModelKind::RandomForest => "Random Forest",
            ModelKind::GradientBoosting => "Gradient Boosting",
            ModelKind::XGBoost => "XGBoost",
        }
    }

    /// Whether the family reports native feature importances
    pub fn has_importances(&self) -> bool {
        matches!(self, ModelKind::RandomForest | ModelKind::GradientBoosting)
    }

    /// Fit this family with its default hyperparameters
    pub fn fit(
        self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        seed: u64,
    ) -> Result<Box<dyn FittedRegressor>> {
        match self {
            ModelKind::LinearRegression => boxed(LinearRegression::default().fit(x, y)),
            ModelKind::RidgeRegression => boxed(RidgeRegression::default().fit(x, y)),
            ModelKind::LassoRegression => boxed(LassoRegression::default().fit(x, y)),
            ModelKind::RandomForest => boxed(RandomForest::with_seed(seed).fit(x, y)),
            ModelKind::GradientBoosting => boxed(GradientBoosting::with_seed(seed).fit(x, y)),
            ModelKind::XGBoost => boxed(ExternalGbdt::default().fit(x, y)),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn boxed<F: FittedRegressor + 'static>(fitted: Result<F>) -> Result<Box<dyn FittedRegressor>> {
    fitted.map(|model| Box::new(model) as Box<dyn FittedRegressor>)
}

/// Reject empty, ragged or non-finite training input
pub(crate) fn check_training_input(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(ForecastError::ModelError(
            "Training matrix is empty".to_string(),
        ));
    }
    if x.nrows() != y.len() {
        return Err(ForecastError::ModelError(format!(
            "Training rows ({}) don't match targets ({})",
            x.nrows(),
            y.len()
        )));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(ForecastError::ModelError(
            "Training data contains non-finite values".to_string(),
        ));
    }
    Ok(())
}

/// Reject prediction input whose width differs from the training width
pub(crate) fn check_prediction_input(x: &Array2<f64>, n_features: usize) -> Result<()> {
    if x.ncols() != n_features {
        return Err(ForecastError::ModelError(format!(
            "Dimension mismatch: expected {} features, got {}",
            n_features,
            x.ncols()
        )));
    }
    Ok(())
}

/// Scale raw importance scores so they sum to one
pub(crate) fn normalize_importances(importances: &mut [f64]) {
    let sum: f64 = importances.iter().sum();
    if sum > 0.0 {
        for importance in importances.iter_mut() {
            *importance /= sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_catalog_order_and_names() {
        assert_eq!(ModelKind::ALL.len(), 6);
        assert_eq!(ModelKind::ALL[0].name(), "Linear Regression");
        assert_eq!(ModelKind::XGBoost.to_string(), "XGBoost");
    }

    #[test]
    fn test_serde_names() {
        let kinds: Vec<ModelKind> =
            serde_json::from_str(r#"["linear_regression", "random_forest", "xgboost"]"#).unwrap();
        assert_eq!(
            kinds,
            vec![
                ModelKind::LinearRegression,
                ModelKind::RandomForest,
                ModelKind::XGBoost
            ]
        );
    }

    #[test]
    fn test_training_input_checks() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        assert!(check_training_input(&x, &array![1.0, 2.0]).is_ok());
        assert!(check_training_input(&x, &array![1.0]).is_err());
        assert!(check_training_input(&array![[f64::NAN, 1.0]], &array![1.0]).is_err());
        assert!(check_prediction_input(&x, 3).is_err());
    }
}
