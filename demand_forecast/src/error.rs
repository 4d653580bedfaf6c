//! Error types for the demand_forecast crate

use polars::prelude::PolarsError;
use series_math::MathError;
use thiserror::Error;

/// Custom error types for the demand_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Invalid or missing date/target column selection
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Not enough usable history after feature engineering or splitting
    #[error("Data quality error: {0}")]
    DataQualityError(String),

    /// Every selected model failed to train
    #[error("Training error: {0}")]
    TrainingError(String),

    /// Invalid forecast request
    #[error("Forecasting error: {0}")]
    ForecastingError(String),

    /// A single model failed to fit or predict
    #[error("Model error: {0}")]
    ModelError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Cancellation was requested before all work completed
    #[error("Operation cancelled")]
    Cancelled,

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

impl From<MathError> for ForecastError {
    fn from(err: MathError) -> Self {
        ForecastError::DataQualityError(err.to_string())
    }
}
