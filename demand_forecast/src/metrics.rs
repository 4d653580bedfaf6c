//! Metrics for evaluating regression performance

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};

fn check_lengths(actual: &[f64], predicted: &[f64]) -> Result<()> {
    if actual.len() != predicted.len() || actual.is_empty() {
        return Err(ForecastError::ModelError(
            "Actual and predicted values must have the same non-zero length".to_string(),
        ));
    }
    Ok(())
}

/// Mean absolute error
pub fn mae(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_lengths(actual, predicted)?;
    Ok(actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / actual.len() as f64)
}

/// Mean squared error
pub fn mse(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_lengths(actual, predicted)?;
    Ok(actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / actual.len() as f64)
}

/// Root mean squared error
pub fn rmse(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    Ok(mse(actual, predicted)?.sqrt())
}

/// Mean absolute percentage error, in percent
///
/// Zero actuals are guarded with `f64::EPSILON` in the denominator, so they
/// produce a very large error rather than an infinite one.
pub fn mape(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_lengths(actual, predicted)?;
    Ok(actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs() / a.abs().max(f64::EPSILON))
        .sum::<f64>()
        / actual.len() as f64
        * 100.0)
}

/// Coefficient of determination
///
/// A constant `actual` scores 1.0 when predicted exactly and 0.0 otherwise.
pub fn r2(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_lengths(actual, predicted)?;
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_res: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}

/// Residuals `actual - predicted`
pub fn residuals(actual: &[f64], predicted: &[f64]) -> Result<Vec<f64>> {
    check_lengths(actual, predicted)?;
    Ok(actual.iter().zip(predicted).map(|(a, p)| a - p).collect())
}

/// Population standard deviation of the residuals
pub fn residual_std(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    Ok(series_math::stats::population_std(&residuals(actual, predicted)?)?)
}

/// Regression accuracy on one partition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Mean Absolute Error
    pub mae: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error
    pub mape: f64,
    /// Coefficient of determination
    pub r2: f64,
}

impl RegressionMetrics {
    /// Score `predicted` against `actual`
    pub fn evaluate(actual: &[f64], predicted: &[f64]) -> Result<Self> {
        Ok(Self {
            mae: mae(actual, predicted)?,
            rmse: rmse(actual, predicted)?,
            mape: mape(actual, predicted)?,
            r2: r2(actual, predicted)?,
        })
    }
}

impl std::fmt::Display for RegressionMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Regression Metrics:")?;
        writeln!(f, "  MAE:   {:.4}", self.mae)?;
        writeln!(f, "  RMSE:  {:.4}", self.rmse)?;
        writeln!(f, "  MAPE:  {:.4}%", self.mape)?;
        writeln!(f, "  R2:    {:.4}", self.r2)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_basic_metrics() {
        let actual = [100.0, 200.0, 300.0];
        let predicted = [110.0, 190.0, 300.0];

        assert_relative_eq!(mae(&actual, &predicted).unwrap(), 20.0 / 3.0);
        assert_relative_eq!(rmse(&actual, &predicted).unwrap(), (200.0f64 / 3.0).sqrt());
        assert_relative_eq!(mape(&actual, &predicted).unwrap(), (10.0 + 5.0) / 3.0);
        assert_relative_eq!(r2(&actual, &predicted).unwrap(), 1.0 - 200.0 / 20000.0);
    }

    #[test]
    fn test_r2_constant_target() {
        assert_eq!(r2(&[5.0, 5.0], &[5.0, 5.0]).unwrap(), 1.0);
        assert_eq!(r2(&[5.0, 5.0], &[4.0, 5.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_mape_zero_actual_is_finite() {
        let value = mape(&[0.0, 10.0], &[1.0, 10.0]).unwrap();
        assert!(value.is_finite());
        assert!(value > 1e10);
    }

    #[test]
    fn test_residual_std_is_population() {
        // residuals 1, -1
        assert_relative_eq!(residual_std(&[2.0, 0.0], &[1.0, 1.0]).unwrap(), 1.0);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(mae(&[1.0], &[1.0, 2.0]).is_err());
        assert!(RegressionMetrics::evaluate(&[], &[]).is_err());
    }
}
