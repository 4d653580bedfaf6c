//! Forecasting run configuration

use crate::error::{ForecastError, Result};
use crate::models::{ModelKind, DEFAULT_SEED};
use crate::split::validate_fractions;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

/// Settings for one training and forecasting run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Share of engineered rows held out for testing
    pub test_fraction: f64,
    /// Share of engineered rows held out for model selection
    pub val_fraction: f64,
    /// Models to train, in registration order
    pub models: Vec<ModelKind>,
    /// Default number of months to forecast
    pub horizon: usize,
    /// Normal quantile used for the interval half-width
    pub confidence_z: f64,
    /// Worker threads for training (`None` = one per model)
    pub max_workers: Option<usize>,
    /// Seed for the randomised models
    pub seed: u64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            val_fraction: 0.1,
            models: ModelKind::ALL.to_vec(),
            horizon: 6,
            confidence_z: 1.96,
            max_workers: None,
            seed: DEFAULT_SEED,
        }
    }
}

impl ForecastConfig {
    /// Parse a JSON document; missing keys take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ForecastError::InvalidParameter(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values for consistency
    pub fn validate(&self) -> Result<()> {
        validate_fractions(self.test_fraction, self.val_fraction)?;
        if !(self.confidence_z > 0.0 && self.confidence_z.is_finite()) {
            return Err(ForecastError::InvalidParameter(format!(
                "confidence_z must be positive, got {}",
                self.confidence_z
            )));
        }
        if self.models.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "At least one model must be selected".to_string(),
            ));
        }
        if self.max_workers == Some(0) {
            return Err(ForecastError::InvalidParameter(
                "max_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Replace `confidence_z` with the two-sided normal quantile for `level`
    pub fn with_confidence_level(mut self, level: f64) -> Result<Self> {
        if !(level > 0.0 && level < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "Confidence level must be in (0, 1), got {}",
                level
            )));
        }
        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| ForecastError::InvalidParameter(e.to_string()))?;
        self.confidence_z = normal.inverse_cdf(0.5 + level / 2.0);
        Ok(self)
    }

    /// Nominal two-sided coverage of `confidence_z`
    pub fn confidence_level(&self) -> f64 {
        match Normal::new(0.0, 1.0) {
            Ok(normal) => 2.0 * normal.cdf(self.confidence_z) - 1.0,
            Err(_) => f64::NAN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = ForecastConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.models.len(), 6);
        assert_relative_eq!(config.confidence_level(), 0.95, epsilon = 1e-3);
    }

    #[test]
    fn test_partial_json() {
        let config = ForecastConfig::from_json_str(
            r#"{"models": ["linear_regression", "random_forest"], "horizon": 12}"#,
        )
        .unwrap();
        assert_eq!(
            config.models,
            vec![ModelKind::LinearRegression, ModelKind::RandomForest]
        );
        assert_eq!(config.horizon, 12);
        assert_eq!(config.test_fraction, 0.2);
    }

    #[test]
    fn test_invalid_json_values() {
        assert!(ForecastConfig::from_json_str(r#"{"test_fraction": 0.9, "val_fraction": 0.2}"#).is_err());
        assert!(ForecastConfig::from_json_str(r#"{"models": []}"#).is_err());
        assert!(ForecastConfig::from_json_str(r#"{"models": ["arima"]}"#).is_err());
    }

    #[test]
    fn test_confidence_level() {
        let config = ForecastConfig::default().with_confidence_level(0.95).unwrap();
        assert_relative_eq!(config.confidence_z, 1.959964, epsilon = 1e-5);
        assert!(ForecastConfig::default().with_confidence_level(1.0).is_err());
    }
}
