//! # Demand Forecast Workspace
//!
//! Umbrella crate for the demand forecasting workspace. It re-exports the
//! forecasting engine and the series statistics it is built on, so callers
//! can depend on a single package.
//!
//! ## Example
//!
//! ```no_run
//! use demand_forecast_workspace::demand_forecast::{synthetic, ForecastConfig, ForecastSession};
//!
//! let table = synthetic::sample_demand_table(42)?;
//! let mut session = ForecastSession::new(table, ForecastConfig::default())?;
//! session.configure("date", "demand")?;
//! session.train()?;
//! let forecast = session.forecast(None, 6)?;
//! assert_eq!(forecast.points().len(), 6);
//! # Ok::<(), demand_forecast_workspace::demand_forecast::ForecastError>(())
//! ```

pub use demand_forecast;
pub use series_math;
