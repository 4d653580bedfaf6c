//! Forecasting session state machine
//!
//! `NotConfigured → Configured → Trained → Forecasted`. Binding columns again
//! discards any training and forecast; training again discards the forecast.
//! A failed step leaves the session as it was.

use crate::config::ForecastConfig;
use crate::confidence::ConfidenceEstimator;
use crate::data::{DemandSeries, DemandTable, DetectedColumns, ValidationReport};
use crate::error::{ForecastError, Result};
use crate::features::{FeatureBuilder, FeatureMatrix};
use crate::forecast::{ForecastPoint, RecursiveForecaster};
use crate::models::ModelKind;
use crate::selection::{FeatureImportance, MetricsRow, ModelSelector, TestComparison};
use crate::split::{DatasetSplitter, SplitSet};
use crate::training::{CancellationToken, ModelRegistry, ModelResult, ModelTrainerEnsemble};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Lifecycle stage of a [`ForecastSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Data loaded, no columns bound
    NotConfigured,
    /// Date and target columns bound
    Configured,
    /// Models trained and the best one chosen
    Trained,
    /// A forecast has been produced
    Forecasted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::NotConfigured => "not configured",
            SessionState::Configured => "configured",
            SessionState::Trained => "trained",
            SessionState::Forecasted => "forecasted",
        };
        f.write_str(name)
    }
}

/// Everything produced by one training run
#[derive(Debug)]
pub struct TrainingOutcome {
    features: FeatureMatrix,
    split: SplitSet,
    registry: ModelRegistry,
    best: ModelKind,
}

impl TrainingOutcome {
    /// Engineered feature matrix
    pub fn features(&self) -> &FeatureMatrix {
        &self.features
    }

    /// Chronological partitions
    pub fn split(&self) -> &SplitSet {
        &self.split
    }

    /// Trained models
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Model with the lowest validation MAPE
    pub fn best_kind(&self) -> ModelKind {
        self.best
    }

    /// Result of the selected model
    pub fn best(&self) -> Result<&ModelResult> {
        self.result(self.best)
    }

    /// Result of any trained model
    pub fn result(&self, kind: ModelKind) -> Result<&ModelResult> {
        self.registry.get(kind).ok_or_else(|| {
            ForecastError::ForecastingError(format!("Model '{}' was not trained", kind))
        })
    }

    /// Metrics table sorted by validation MAPE
    pub fn metrics_table(&self) -> Vec<MetricsRow> {
        ModelSelector::metrics_table(&self.registry)
    }

    /// Importance ranking of the selected model, truncated to `top_n` when given
    pub fn feature_importance(&self, top_n: Option<usize>) -> Option<Vec<FeatureImportance>> {
        let best = self.best().ok()?;
        let names = self.features.feature_names();
        match top_n {
            Some(n) => ModelSelector::top_importances(best, names, n),
            None => ModelSelector::importance_ranking(best, names),
        }
    }

    /// Validation residuals of a trained model
    pub fn validation_residuals(&self, kind: ModelKind) -> Result<Vec<f64>> {
        ModelSelector::validation_residuals(self.result(kind)?, &self.split)
    }

    /// Test-partition comparison of a trained model
    pub fn test_comparison(&self, kind: ModelKind) -> Result<Vec<TestComparison>> {
        Ok(ModelSelector::test_comparison(self.result(kind)?, &self.split))
    }
}

/// Headline numbers of a forecast
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastSummary {
    /// Mean point estimate
    pub mean: f64,
    /// Sample standard deviation of the point estimates (`None` for one point)
    pub std: Option<f64>,
    /// Smallest point estimate
    pub min: f64,
    /// Largest point estimate
    pub max: f64,
    /// Last observed target
    pub last_observed: f64,
    /// Growth of the forecast mean over the last observation, in percent
    pub growth_pct: Option<f64>,
    /// Validation MAPE of the forecasting model, in percent
    pub error_rate: f64,
    /// Nominal interval coverage, in percent
    pub confidence_pct: f64,
}

impl ForecastSummary {
    fn from_points(
        points: &[ForecastPoint],
        last_observed: f64,
        error_rate: f64,
        confidence_pct: f64,
    ) -> Result<Self> {
        let values: Vec<f64> = points.iter().map(|p| p.point_estimate).collect();
        let mean = series_math::stats::mean(&values)?;
        let (min, max) = series_math::stats::min_max(&values)?;
        let growth_pct =
            (last_observed != 0.0).then(|| (mean - last_observed) / last_observed * 100.0);

        Ok(Self {
            mean,
            std: series_math::stats::sample_std(&values).ok(),
            min,
            max,
            last_observed,
            growth_pct,
            error_rate,
            confidence_pct,
        })
    }
}

/// A produced forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastOutput {
    model: ModelKind,
    points: Vec<ForecastPoint>,
    residual_std: f64,
    summary: ForecastSummary,
}

impl ForecastOutput {
    /// Model that produced the forecast
    pub fn model(&self) -> ModelKind {
        self.model
    }

    /// One point per horizon step
    pub fn points(&self) -> &[ForecastPoint] {
        &self.points
    }

    /// Test residual standard deviation used for the bounds
    pub fn residual_std(&self) -> f64 {
        self.residual_std
    }

    /// Headline numbers
    pub fn summary(&self) -> &ForecastSummary {
        &self.summary
    }
}

/// One end-to-end forecasting session over a demand table
#[derive(Debug)]
pub struct ForecastSession {
    table: DemandTable,
    config: ForecastConfig,
    series: Option<DemandSeries>,
    training: Option<TrainingOutcome>,
    forecast: Option<ForecastOutput>,
}

impl ForecastSession {
    /// New session in the `NotConfigured` state
    pub fn new(table: DemandTable, config: ForecastConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            table,
            config,
            series: None,
            training: None,
            forecast: None,
        })
    }

    /// Current lifecycle stage
    pub fn state(&self) -> SessionState {
        match (&self.series, &self.training, &self.forecast) {
            (None, _, _) => SessionState::NotConfigured,
            (Some(_), None, _) => SessionState::Configured,
            (Some(_), Some(_), None) => SessionState::Trained,
            (Some(_), Some(_), Some(_)) => SessionState::Forecasted,
        }
    }

    /// Input table
    pub fn table(&self) -> &DemandTable {
        &self.table
    }

    /// Active configuration
    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Replace the configuration; discards training and forecast
    pub fn set_config(&mut self, config: ForecastConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        self.training = None;
        self.forecast = None;
        Ok(())
    }

    /// Candidate date and numeric columns of the table
    pub fn detect_columns(&self) -> DetectedColumns {
        self.table.detect_columns()
    }

    /// Bind the date and target columns
    pub fn configure(&mut self, date_column: &str, target_column: &str) -> Result<&ValidationReport> {
        let series = self.table.configure(date_column, target_column)?;
        self.training = None;
        self.forecast = None;
        Ok(self.series.insert(series).report())
    }

    /// Bound series, once configured
    pub fn series(&self) -> Option<&DemandSeries> {
        self.series.as_ref()
    }

    /// Engineer features, split, train every configured model and select the best
    pub fn train(&mut self) -> Result<&TrainingOutcome> {
        self.train_with_cancellation(&CancellationToken::new())
    }

    /// [`ForecastSession::train`] with cooperative cancellation
    pub fn train_with_cancellation(&mut self, token: &CancellationToken) -> Result<&TrainingOutcome> {
        let series = self.series.as_ref().ok_or_else(|| {
            ForecastError::ConfigurationError(
                "Date and target columns must be configured before training".to_string(),
            )
        })?;

        let features = FeatureBuilder::new().build(series.observations())?;
        let split =
            DatasetSplitter::new(self.config.test_fraction, self.config.val_fraction)?.split(&features)?;
        let registry = ModelTrainerEnsemble::new(&self.config.models)
            .with_seed(self.config.seed)
            .with_max_workers(self.config.max_workers)
            .train_with_cancellation(&split, token)?;
        let best = ModelSelector::select(&registry)?.kind;

        self.forecast = None;
        Ok(self.training.insert(TrainingOutcome {
            features,
            split,
            registry,
            best,
        }))
    }

    /// Outcome of the last training run
    pub fn training(&self) -> Option<&TrainingOutcome> {
        self.training.as_ref()
    }

    /// Forecast `horizon` months with `model`, or the selected model when `None`
    pub fn forecast(&mut self, model: Option<ModelKind>, horizon: usize) -> Result<&ForecastOutput> {
        let training = self.training.as_ref().ok_or_else(|| {
            ForecastError::ForecastingError("Models must be trained before forecasting".to_string())
        })?;
        let kind = model.unwrap_or(training.best);
        let result = training.result(kind)?;

        let residual_std = ModelSelector::test_residual_std(result, &training.split)?;
        let confidence = ConfidenceEstimator::new(residual_std, self.config.confidence_z)?;
        let points = RecursiveForecaster::new(result.model.as_ref(), &training.features)
            .forecast(horizon, &confidence)?;

        let last_observed = training
            .features
            .last_row()
            .map(|row| row.target)
            .ok_or_else(|| ForecastError::ForecastingError("No history".to_string()))?;
        let summary = ForecastSummary::from_points(
            &points,
            last_observed,
            result.mape(),
            self.config.confidence_level() * 100.0,
        )?;

        info!(model = %kind, horizon, mean = summary.mean, "Forecast produced");
        Ok(self.forecast.insert(ForecastOutput {
            model: kind,
            points,
            residual_std,
            summary,
        }))
    }

    /// Forecast with the configured default horizon and the selected model
    pub fn forecast_default(&mut self) -> Result<&ForecastOutput> {
        self.forecast(None, self.config.horizon)
    }

    /// Last produced forecast
    pub fn last_forecast(&self) -> Option<&ForecastOutput> {
        self.forecast.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn point(value: f64) -> ForecastPoint {
        ForecastPoint {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            point_estimate: value,
            lower_bound: value,
            upper_bound: value,
        }
    }

    #[test]
    fn test_summary() {
        let points = [point(100.0), point(120.0), point(110.0)];
        let summary = ForecastSummary::from_points(&points, 100.0, 4.2, 95.0).unwrap();
        assert_relative_eq!(summary.mean, 110.0);
        assert_relative_eq!(summary.std.unwrap(), 10.0);
        assert_eq!((summary.min, summary.max), (100.0, 120.0));
        assert_relative_eq!(summary.growth_pct.unwrap(), 10.0);
    }

    #[test]
    fn test_summary_edge_cases() {
        let summary = ForecastSummary::from_points(&[point(5.0)], 0.0, 1.0, 95.0).unwrap();
        assert_eq!(summary.std, None);
        assert_eq!(summary.growth_pct, None);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::NotConfigured.to_string(), "not configured");
        assert_eq!(SessionState::Forecasted.to_string(), "forecasted");
    }
}
