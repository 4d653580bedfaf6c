//! # Series Math
//!
//! Numeric building blocks for demand time series.
//! This crate provides rolling window statistics, period-over-period
//! changes and descriptive statistics used by the forecasting engine.

use thiserror::Error;

pub mod change;
pub mod rolling;
pub mod stats;

/// Errors that can occur in series calculations
#[derive(Error, Debug)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for series math operations
pub type Result<T> = std::result::Result<T, MathError>;
