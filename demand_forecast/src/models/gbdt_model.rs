//! Extreme-gradient-boosted trees backed by the `gbdt` crate
//!
//! The library works in `f32` and panics on some degenerate inputs, so fitting
//! converts the matrix and runs behind `catch_unwind`. No importance vector is
//! exposed.

use crate::error::{ForecastError, Result};
use crate::models::{check_prediction_input, check_training_input, FittedRegressor, RegressionModel};
use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Hyperparameters passed through to the library
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GbdtParams {
    /// Number of boosting rounds
    pub iterations: usize,
    /// Learning rate (`eta`)
    pub shrinkage: f32,
    /// Maximum depth of each tree
    pub max_depth: u32,
}

impl Default for GbdtParams {
    fn default() -> Self {
        Self {
            iterations: 100,
            shrinkage: 0.3,
            max_depth: 6,
        }
    }
}

/// Gradient-boosted trees from the `gbdt` library
#[derive(Debug, Clone, Default)]
pub struct ExternalGbdt {
    params: GbdtParams,
}

/// Fitted `gbdt` ensemble
pub struct FittedGbdt {
    booster: GBDT,
    n_features: usize,
}

impl ExternalGbdt {
    /// Create a booster with explicit parameters
    pub fn new(params: GbdtParams) -> Result<Self> {
        if params.iterations == 0 {
            return Err(ForecastError::InvalidParameter(
                "iterations must be at least 1".to_string(),
            ));
        }
        if params.max_depth == 0 {
            return Err(ForecastError::InvalidParameter(
                "max_depth must be at least 1".to_string(),
            ));
        }
        if !(params.shrinkage > 0.0 && params.shrinkage <= 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "shrinkage must be in (0, 1], got {}",
                params.shrinkage
            )));
        }
        Ok(Self { params })
    }

    fn config(&self, n_features: usize) -> Config {
        let mut cfg = Config::new();
        cfg.set_feature_size(n_features);
        cfg.set_max_depth(self.params.max_depth);
        cfg.set_iterations(self.params.iterations);
        cfg.set_shrinkage(self.params.shrinkage);
        cfg.set_loss("SquaredError");
        cfg.set_debug(false);
        cfg.set_data_sample_ratio(1.0);
        cfg.set_feature_sample_ratio(1.0);
        cfg.set_training_optimization_level(2);
        cfg
    }
}

fn row_features(x: &Array2<f64>, row: usize) -> Vec<f32> {
    x.row(row).iter().map(|&v| v as f32).collect()
}

impl RegressionModel for ExternalGbdt {
    type Fitted = FittedGbdt;

    fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<Self::Fitted> {
        check_training_input(x, y)?;

        let mut training: DataVec = (0..x.nrows())
            .map(|i| Data::new_training_data(row_features(x, i), 1.0, y[i] as f32, None))
            .collect();

        let cfg = self.config(x.ncols());
        let booster = panic::catch_unwind(AssertUnwindSafe(move || {
            let mut booster = GBDT::new(&cfg);
            booster.fit(&mut training);
            booster
        }))
        .map_err(|_| ForecastError::ModelError("gbdt training panicked".to_string()))?;

        Ok(FittedGbdt {
            booster,
            n_features: x.ncols(),
        })
    }

    fn name(&self) -> &str {
        "XGBoost"
    }
}

impl fmt::Debug for FittedGbdt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FittedGbdt")
            .field("n_features", &self.n_features)
            .finish_non_exhaustive()
    }
}

impl FittedRegressor for FittedGbdt {
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        check_prediction_input(x, self.n_features)?;
        let rows: DataVec = (0..x.nrows())
            .map(|i| Data::new_test_data(row_features(x, i), None))
            .collect();

        let predictions = panic::catch_unwind(AssertUnwindSafe(|| self.booster.predict(&rows)))
            .map_err(|_| ForecastError::ModelError("gbdt prediction panicked".to_string()))?;

        let values: Array1<f64> = predictions.into_iter().map(f64::from).collect();
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::ModelError(
                "gbdt produced a non-finite prediction".to_string(),
            ));
        }
        Ok(values)
    }

    fn name(&self) -> &str {
        "XGBoost"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fits_a_linear_signal() {
        let x = Array2::from_shape_fn((60, 2), |(i, j)| (i + j) as f64);
        let y: Array1<f64> = (0..60).map(|i| 100.0 + 3.0 * i as f64).collect();

        let fitted = ExternalGbdt::default().fit(&x, &y).unwrap();
        let predictions = fitted.predict(&x).unwrap();
        assert_eq!(predictions.len(), 60);

        let mae = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, t)| (p - t).abs())
            .sum::<f64>()
            / 60.0;
        assert!(mae < 20.0, "mae was {}", mae);
        assert!(fitted.feature_importances().is_none());
    }

    #[test]
    fn test_width_mismatch() {
        let x = Array2::from_shape_fn((10, 2), |(i, _)| i as f64);
        let y: Array1<f64> = (0..10).map(|i| i as f64).collect();
        let fitted = ExternalGbdt::default().fit(&x, &y).unwrap();
        assert!(fitted.predict(&Array2::zeros((1, 3))).is_err());
    }

    #[test]
    fn test_invalid_params() {
        let params = GbdtParams {
            iterations: 0,
            ..Default::default()
        };
        assert!(ExternalGbdt::new(params).is_err());
    }
}
