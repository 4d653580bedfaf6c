//! Recursive multi-step forecasting
//!
//! Each step builds a feature vector for the next month from three sources:
//! calendar features of the future date, lag features taken from observed
//! history or from earlier forecast steps, and every other feature copied
//! unchanged from the last engineered row. Rolling, trend and growth columns
//! are therefore frozen at their last observed values for the whole horizon.

use crate::confidence::ConfidenceEstimator;
use crate::error::{ForecastError, Result};
use crate::features::{calendar_features, FeatureMatrix, FeatureRow, CALENDAR_FEATURES, LAGS};
use crate::models::FittedRegressor;
use chrono::{Months, NaiveDate};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One forecast period
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// Forecast date, whole months after the last observation
    pub date: NaiveDate,
    /// Predicted value, never negative
    pub point_estimate: f64,
    /// Lower interval bound, never negative
    pub lower_bound: f64,
    /// Upper interval bound
    pub upper_bound: f64,
}

/// Point estimate for one step, before interval bounds are attached
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastStep {
    /// Forecast date
    pub date: NaiveDate,
    /// Clamped model prediction
    pub value: f64,
}

/// Projects a fitted model forward from the tail of a feature matrix
#[derive(Debug)]
pub struct RecursiveForecaster<'a> {
    model: &'a dyn FittedRegressor,
    frame: &'a FeatureMatrix,
}

impl<'a> RecursiveForecaster<'a> {
    /// Forecaster over `frame` using `model`
    pub fn new(model: &'a dyn FittedRegressor, frame: &'a FeatureMatrix) -> Self {
        Self { model, frame }
    }

    /// Point estimates for `horizon` months after the last row
    ///
    /// Every call starts again from the frame's last row.
    pub fn steps(&self, horizon: usize) -> Result<Vec<ForecastStep>> {
        if horizon == 0 {
            return Err(ForecastError::ForecastingError(
                "Forecast horizon must be at least one period".to_string(),
            ));
        }
        let last = self.frame.last_row().ok_or_else(|| {
            ForecastError::ForecastingError("No history to forecast from".to_string())
        })?;

        let calendar_columns = self.columns(CALENDAR_FEATURES.iter().map(|s| s.to_string()))?;
        let lag_columns = self.columns(LAGS.iter().map(|k| format!("lag_{}", k)))?;
        let history: Vec<f64> = self.frame.rows().iter().map(|r| r.target).collect();

        (0..horizon).try_fold(Vec::with_capacity(horizon), |mut steps, i| {
            let step = self.next_step(last, &history, &calendar_columns, &lag_columns, &steps, i)?;
            debug!(step = i + 1, date = %step.date, value = step.value, "Forecast step");
            steps.push(step);
            Ok(steps)
        })
    }

    /// Point estimates with interval bounds from `confidence`
    pub fn forecast(
        &self,
        horizon: usize,
        confidence: &ConfidenceEstimator,
    ) -> Result<Vec<ForecastPoint>> {
        Ok(self
            .steps(horizon)?
            .into_iter()
            .map(|step| {
                let (lower_bound, upper_bound) = confidence.bounds(step.value);
                ForecastPoint {
                    date: step.date,
                    point_estimate: step.value,
                    lower_bound,
                    upper_bound,
                }
            })
            .collect())
    }

    fn columns(&self, names: impl Iterator<Item = String>) -> Result<Vec<usize>> {
        names
            .map(|name| {
                self.frame.feature_index(&name).ok_or_else(|| {
                    ForecastError::ForecastingError(format!("Feature column '{}' is missing", name))
                })
            })
            .collect()
    }

    fn next_step(
        &self,
        last: &FeatureRow,
        history: &[f64],
        calendar_columns: &[usize],
        lag_columns: &[usize],
        previous: &[ForecastStep],
        i: usize,
    ) -> Result<ForecastStep> {
        let date = last
            .date
            .checked_add_months(Months::new(i as u32 + 1))
            .ok_or_else(|| ForecastError::ForecastingError("Forecast date out of range".to_string()))?;

        let mut values = last.values.clone();
        for (&column, value) in calendar_columns.iter().zip(calendar_features(date)) {
            values[column] = value;
        }
        for (&column, &k) in lag_columns.iter().zip(LAGS.iter()) {
            values[column] = if i < k {
                (history.len() + i)
                    .checked_sub(k)
                    .map_or(last.values[column], |j| history[j])
            } else {
                previous[i - k].value
            };
        }

        let width = values.len();
        let x = Array2::from_shape_vec((1, width), values)
            .map_err(|e| ForecastError::ForecastingError(e.to_string()))?;
        let prediction = self
            .model
            .predict(&x)?
            .first()
            .copied()
            .ok_or_else(|| ForecastError::ForecastingError("Model returned no prediction".to_string()))?;

        if !prediction.is_finite() {
            return Err(ForecastError::ForecastingError(format!(
                "{} produced a non-finite forecast at step {}",
                self.model.name(),
                i + 1
            )));
        }

        Ok(ForecastStep {
            date,
            value: prediction.max(0.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confidence::Z_95;
    use crate::data::Observation;
    use crate::features::FeatureBuilder;
    use ndarray::Array1;
    use std::sync::Mutex;

    /// Records every input row and answers with a fixed sequence
    #[derive(Debug)]
    struct Recorder {
        answers: Vec<f64>,
        seen: Mutex<Vec<Vec<f64>>>,
    }

    impl FittedRegressor for Recorder {
        fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
            let mut seen = self.seen.lock().map_err(|_| {
                ForecastError::ModelError("poisoned".to_string())
            })?;
            seen.push(x.row(0).to_vec());
            Ok(Array1::from(vec![self.answers[seen.len() - 1]]))
        }

        fn name(&self) -> &str {
            "Recorder"
        }
    }

    fn frame() -> FeatureMatrix {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let observations: Vec<Observation> = (0..30)
            .map(|i| Observation {
                date: start + Months::new(i),
                value: 100.0 + i as f64,
            })
            .collect();
        FeatureBuilder::new().build(&observations).unwrap()
    }

    fn recorder(answers: Vec<f64>) -> Recorder {
        Recorder {
            answers,
            seen: Mutex::new(Vec::new()),
        }
    }

    #[test]
    fn test_lags_feed_back_previous_forecasts() {
        let frame = frame();
        let model = recorder((1..=13).map(|v| v as f64 * 1000.0).collect());
        let steps = RecursiveForecaster::new(&model, &frame).steps(13).unwrap();
        assert_eq!(steps.len(), 13);

        let seen = model.seen.lock().unwrap();
        let lag = |step: usize, k: usize| {
            seen[step][frame.feature_index(&format!("lag_{}", k)).unwrap()]
        };

        // history targets are 112..=129
        assert_eq!(lag(0, 1), 129.0);
        assert_eq!(lag(0, 12), 118.0);
        assert_eq!(lag(1, 1), 1000.0);
        assert_eq!(lag(1, 2), 129.0);
        assert_eq!(lag(0, 6), 124.0);
        assert_eq!(lag(5, 6), 129.0);
        assert_eq!(lag(6, 6), 1000.0);
        assert_eq!(lag(12, 12), 1000.0);
        assert_eq!(lag(12, 1), 12000.0);
    }

    #[test]
    fn test_calendar_recomputed_and_aggregates_frozen() {
        let frame = frame();
        let model = recorder(vec![1.0, 2.0, 3.0]);
        let steps = RecursiveForecaster::new(&model, &frame).steps(3).unwrap();

        assert_eq!(steps[0].date, NaiveDate::from_ymd_opt(2022, 7, 1).unwrap());
        assert_eq!(steps[2].date, NaiveDate::from_ymd_opt(2022, 9, 1).unwrap());

        let seen = model.seen.lock().unwrap();
        let last = frame.last_row().unwrap();
        let month = frame.feature_index("month").unwrap();
        let trend = frame.feature_index("trend_3m").unwrap();
        let rolling = frame.feature_index("rolling_mean_12").unwrap();

        assert_eq!(seen[0][month], 7.0);
        assert_eq!(seen[2][month], 9.0);
        for row in seen.iter() {
            assert_eq!(row[trend], last.values[trend]);
            assert_eq!(row[rolling], last.values[rolling]);
        }
    }

    #[test]
    fn test_negative_predictions_clamped() {
        let frame = frame();
        let model = recorder(vec![-50.0, 20.0]);
        let confidence = ConfidenceEstimator::new(10.0, Z_95).unwrap();
        let points = RecursiveForecaster::new(&model, &frame)
            .forecast(2, &confidence)
            .unwrap();

        assert_eq!(points[0].point_estimate, 0.0);
        assert_eq!(points[0].lower_bound, 0.0);
        assert!(points[0].upper_bound > 0.0);
        assert_eq!(points[1].point_estimate, 20.0);
    }

    #[test]
    fn test_zero_horizon_rejected() {
        let frame = frame();
        let model = recorder(vec![]);
        let result = RecursiveForecaster::new(&model, &frame).steps(0);
        assert!(matches!(result, Err(ForecastError::ForecastingError(_))));
    }
}
