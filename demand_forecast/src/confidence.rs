//! Static symmetric prediction intervals from held-out residual dispersion

use crate::error::{ForecastError, Result};
use crate::metrics;

/// z-score of a two-sided 95% normal interval
pub const Z_95: f64 = 1.96;

/// Interval `point ± z·σ`, with the lower bound floored at zero
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceEstimator {
    residual_std: f64,
    z: f64,
}

impl ConfidenceEstimator {
    /// Estimator for residual dispersion `residual_std` and quantile `z`
    pub fn new(residual_std: f64, z: f64) -> Result<Self> {
        if !(residual_std >= 0.0 && residual_std.is_finite()) {
            return Err(ForecastError::InvalidParameter(format!(
                "Residual standard deviation must be finite and non-negative, got {}",
                residual_std
            )));
        }
        if !(z > 0.0 && z.is_finite()) {
            return Err(ForecastError::InvalidParameter(format!(
                "z must be positive, got {}",
                z
            )));
        }
        Ok(Self { residual_std, z })
    }

    /// Estimator from test actuals and predictions (population σ)
    pub fn from_residuals(actual: &[f64], predicted: &[f64], z: f64) -> Result<Self> {
        Self::new(metrics::residual_std(actual, predicted)?, z)
    }

    /// Residual standard deviation
    pub fn residual_std(&self) -> f64 {
        self.residual_std
    }

    /// Half-width of every interval
    pub fn margin(&self) -> f64 {
        self.z * self.residual_std
    }

    /// `(lower, upper)` around a single point estimate
    pub fn bounds(&self, point: f64) -> (f64, f64) {
        let margin = self.margin();
        ((point - margin).max(0.0), point + margin)
    }

    /// `(lower, upper)` for each point estimate
    pub fn interval(&self, points: &[f64]) -> Vec<(f64, f64)> {
        points.iter().map(|&p| self.bounds(p)).collect()
    }
}
