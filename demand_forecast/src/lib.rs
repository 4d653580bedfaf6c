//! # Demand Forecast
//!
//! A Rust library for monthly demand forecasting with an ensemble of
//! regression models.
//!
//! ## Features
//!
//! - Demand tables on top of polars DataFrames, with column detection and data-quality warnings
//! - Leakage-safe feature engineering (calendar, lags, rolling statistics, growth)
//! - Chronological train / validation / test splitting
//! - Linear, Ridge, Lasso, Random Forest, Gradient Boosting and XGBoost-style models
//! - Parallel ensemble training with model selection by validation MAPE
//! - Recursive multi-step forecasting with static confidence intervals
//!
//! ## Quick Start
//!
//! ```no_run
//! use demand_forecast::synthetic;
//! use demand_forecast::{ForecastConfig, ForecastSession};
//!
//! let table = synthetic::sample_demand_table(42)?;
//! let mut session = ForecastSession::new(table, ForecastConfig::default())?;
//!
//! session.configure("date", "demand")?;
//! let training = session.train()?;
//! for row in training.metrics_table() {
//!     println!("{}: MAPE {:.2}%", row.name, row.mape);
//! }
//!
//! let forecast = session.forecast(None, 6)?;
//! for point in forecast.points() {
//!     println!(
//!         "{}: {:.0} [{:.0}, {:.0}]",
//!         point.date, point.point_estimate, point.lower_bound, point.upper_bound
//!     );
//! }
//! # Ok::<(), demand_forecast::ForecastError>(())
//! ```

pub mod confidence;
pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod forecast;
pub mod metrics;
pub mod models;
pub mod selection;
pub mod session;
pub mod split;
pub mod synthetic;
pub mod training;

// Re-export commonly used types
pub use crate::config::ForecastConfig;
pub use crate::data::{DemandSeries, DemandTable, Observation, ValidationReport};
pub use crate::error::{ForecastError, Result};
pub use crate::features::{FeatureBuilder, FeatureMatrix};
pub use crate::forecast::{ForecastPoint, RecursiveForecaster};
pub use crate::models::{FittedRegressor, ModelKind};
pub use crate::session::{ForecastOutput, ForecastSession, SessionState};
pub use crate::training::{CancellationToken, ModelRegistry, ModelResult};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
