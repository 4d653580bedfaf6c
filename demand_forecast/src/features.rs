//! Leakage-safe feature engineering
//!
//! Every feature at row `i` is computed from the date of row `i` and target
//! values at rows `<= i` only. Rows that end up with a missing or non-finite
//! value anywhere are dropped, which always removes at least the first
//! `max(LAGS)` observations.

use crate::data::Observation;
use crate::error::{ForecastError, Result};
use chrono::{Datelike, NaiveDate};
use ndarray::{Array1, Array2};
use series_math::{change, rolling};
use std::f64::consts::PI;
use tracing::debug;

/// Lag set, in periods
pub const LAGS: [usize; 5] = [1, 2, 3, 6, 12];

/// Rolling window lengths, in periods
pub const WINDOWS: [usize; 3] = [3, 6, 12];

/// Names of the date-derived features, in column order
pub const CALENDAR_FEATURES: [&str; 12] = [
    "year",
    "month",
    "day",
    "day_of_week",
    "day_of_year",
    "quarter",
    "week_of_month",
    "is_weekend",
    "month_sin",
    "month_cos",
    "day_of_week_sin",
    "day_of_week_cos",
];

/// Calendar and cyclical features of a single date
///
/// Day of week counts from Monday = 0. The values line up with
/// [`CALENDAR_FEATURES`].
pub fn calendar_features(date: NaiveDate) -> [f64; 12] {
    let month = date.month() as f64;
    let day = date.day();
    let day_of_week = date.weekday().num_days_from_monday() as f64;

    [
        date.year() as f64,
        month,
        day as f64,
        day_of_week,
        date.ordinal() as f64,
        ((date.month() - 1) / 3 + 1) as f64,
        (day / 7 + 1) as f64,
        if day_of_week >= 5.0 { 1.0 } else { 0.0 },
        (2.0 * PI * month / 12.0).sin(),
        (2.0 * PI * month / 12.0).cos(),
        (2.0 * PI * day_of_week / 7.0).sin(),
        (2.0 * PI * day_of_week / 7.0).cos(),
    ]
}

/// One engineered row: the feature vector plus its aligned date and target
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    /// Observation date
    pub date: NaiveDate,
    /// Target value observed on `date`
    pub target: f64,
    /// Feature values, ordered like [`FeatureMatrix::feature_names`]
    pub values: Vec<f64>,
}

/// Engineered feature matrix, ordered by date ascending
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    feature_names: Vec<String>,
    rows: Vec<FeatureRow>,
}

impl FeatureMatrix {
    /// Column names of the feature vectors
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Position of a feature column by name
    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|n| n == name)
    }

    /// All rows
    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the matrix has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of feature columns
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Most recent row
    pub fn last_row(&self) -> Option<&FeatureRow> {
        self.rows.last()
    }

    /// Row dates
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.rows.iter().map(|r| r.date).collect()
    }

    /// Target column
    pub fn targets(&self) -> Array1<f64> {
        self.rows.iter().map(|r| r.target).collect()
    }

    /// Feature values as a dense `rows x features` matrix
    pub fn to_array(&self) -> Array2<f64> {
        rows_to_array(&self.rows, self.n_features())
    }
}

pub(crate) fn rows_to_array(rows: &[FeatureRow], n_features: usize) -> Array2<f64> {
    Array2::from_shape_fn((rows.len(), n_features), |(i, j)| rows[i].values[j])
}

/// Builds a [`FeatureMatrix`] from a dated series
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureBuilder;

impl FeatureBuilder {
    /// Create a feature builder
    pub fn new() -> Self {
        Self
    }

    /// Column names produced by [`FeatureBuilder::build`], in order
    pub fn feature_names() -> Vec<String> {
        let mut names: Vec<String> = CALENDAR_FEATURES.iter().map(|s| s.to_string()).collect();
        names.extend(LAGS.iter().map(|k| format!("lag_{}", k)));
        for window in WINDOWS {
            for stat in ["mean", "std", "min", "max"] {
                names.push(format!("rolling_{}_{}", stat, window));
            }
        }
        names.extend(
            ["trend_3m", "pct_change", "growth_mom", "growth_yoy"]
                .iter()
                .map(|s| s.to_string()),
        );
        names
    }

    /// Engineer features for `observations`
    ///
    /// The input is sorted by date first (stable, so equal dates keep their
    /// order). Fails with `DataQualityError` when no complete row remains.
    pub fn build(&self, observations: &[Observation]) -> Result<FeatureMatrix> {
        let mut sorted = observations.to_vec();
        sorted.sort_by_key(|obs| obs.date);
        let targets: Vec<f64> = sorted.iter().map(|obs| obs.value).collect();

        let mut columns: Vec<Vec<Option<f64>>> = Vec::with_capacity(33);

        let calendar: Vec<[f64; 12]> = sorted.iter().map(|obs| calendar_features(obs.date)).collect();
        for j in 0..CALENDAR_FEATURES.len() {
            columns.push(calendar.iter().map(|c| Some(c[j])).collect());
        }

        for lag in LAGS {
            columns.push(change::lagged(&targets, lag));
        }

        for window in WINDOWS {
            let stats = rolling::rolling_stats(&targets, window, 1)?;
            columns.push(stats.iter().map(|s| s.map(|s| s.mean)).collect());
            columns.push(stats.iter().map(|s| s.and_then(|s| s.std)).collect());
            columns.push(stats.iter().map(|s| s.map(|s| s.min)).collect());
            columns.push(stats.iter().map(|s| s.map(|s| s.max)).collect());
        }

        let short = rolling::rolling_mean(&targets, 3, 3)?;
        let long = rolling::rolling_mean(&targets, 6, 6)?;
        columns.push(
            short
                .iter()
                .zip(&long)
                .map(|(s, l)| Some((*s)? - (*l)?))
                .collect(),
        );

        let pct = change::pct_change(&targets);
        columns.push(pct.clone());
        columns.push(pct);
        columns.push(change::relative_change(&targets, 12));

        let rows: Vec<FeatureRow> = sorted
            .iter()
            .enumerate()
            .filter(|(_, obs)| obs.value.is_finite())
            .filter_map(|(i, obs)| {
                let values = columns
                    .iter()
                    .map(|column| column[i].filter(|v| v.is_finite()))
                    .collect::<Option<Vec<f64>>>()?;
                Some(FeatureRow {
                    date: obs.date,
                    target: obs.value,
                    values,
                })
            })
            .collect();

        debug!(
            input_rows = sorted.len(),
            kept_rows = rows.len(),
            "Engineered feature matrix"
        );

        if rows.is_empty() {
            return Err(ForecastError::DataQualityError(format!(
                "No complete feature rows from {} observations; more than {} periods of history are needed",
                sorted.len(),
                LAGS[LAGS.len() - 1]
            )));
        }

        Ok(FeatureMatrix {
            feature_names: Self::feature_names(),
            rows,
        })
    }
}
