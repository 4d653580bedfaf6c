//! Seeded sample demand data
//!
//! Four years of monthly demand: a linear trend from 40 000 to 60 000, a
//! yearly sine wave of amplitude 5 000 and Gaussian noise with σ = 2 000,
//! clipped at zero.

use crate::data::{DemandTable, Observation};
use crate::error::{ForecastError, Result};
use chrono::{Months, NaiveDate};
use polars::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;

/// Number of months in the sample
pub const SAMPLE_MONTHS: usize = 48;

/// Date column of the sample table
pub const DATE_COLUMN: &str = "date";
/// Demand column of the sample table
pub const DEMAND_COLUMN: &str = "demand";

/// Sample demand observations, one per month from 2020-01-01
pub fn sample_demand(seed: u64) -> Result<Vec<Observation>> {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1)
        .ok_or_else(|| ForecastError::InvalidParameter("Invalid start date".to_string()))?;
    let noise = Normal::new(0.0, 2000.0)
        .map_err(|e| ForecastError::InvalidParameter(format!("Noise distribution: {}", e)))?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let step = 20_000.0 / (SAMPLE_MONTHS - 1) as f64;

    (0..SAMPLE_MONTHS)
        .map(|i| {
            let date = start
                .checked_add_months(Months::new(i as u32))
                .ok_or_else(|| ForecastError::InvalidParameter("Date out of range".to_string()))?;
            let trend = 40_000.0 + step * i as f64;
            let seasonal = 5_000.0 * (2.0 * PI * i as f64 / 12.0).sin();
            let value = (trend + seasonal + noise.sample(&mut rng)).max(0.0);
            Ok(Observation { date, value })
        })
        .collect()
}

/// [`sample_demand`] as a table with a native date column
pub fn sample_demand_table(seed: u64) -> Result<DemandTable> {
    let observations = sample_demand(seed)?;
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
        .ok_or_else(|| ForecastError::InvalidParameter("Invalid epoch".to_string()))?;

    let days: Vec<i32> = observations
        .iter()
        .map(|obs| (obs.date - epoch).num_days() as i32)
        .collect();
    let values: Vec<f64> = observations.iter().map(|obs| obs.value).collect();

    let dates = Series::new(DATE_COLUMN, days).cast(&DataType::Date)?;
    let demand = Series::new(DEMAND_COLUMN, values);
    DemandTable::from_dataframe(DataFrame::new(vec![dates, demand])?)
}
