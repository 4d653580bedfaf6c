//! Best-model selection and reporting over a trained registry

use crate::error::{ForecastError, Result};
use crate::metrics;
use crate::split::SplitSet;
use crate::training::{ModelRegistry, ModelResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

/// One row of the metrics table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRow {
    /// Model display name
    pub name: String,
    /// Validation MAE
    pub mae: f64,
    /// Validation RMSE
    pub rmse: f64,
    /// Validation MAPE, in percent
    pub mape: f64,
    /// Validation R²
    pub r2: f64,
}

/// Importance of one feature column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    /// Feature column name
    pub feature: String,
    /// Normalised importance
    pub importance: f64,
}

/// Actual versus predicted value for one test row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestComparison {
    /// Row date
    pub date: NaiveDate,
    /// Observed target
    pub actual: f64,
    /// Model prediction
    pub predicted: f64,
}

/// Picks the model with the lowest validation MAPE
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelSelector;

impl ModelSelector {
    /// Lowest validation MAPE; the first registered model wins ties
    pub fn select(registry: &ModelRegistry) -> Result<&ModelResult> {
        let mut best: Option<&ModelResult> = None;
        for result in registry.iter() {
            if best.map_or(true, |b| result.mape() < b.mape()) {
                best = Some(result);
            }
        }

        let best = best.ok_or_else(|| {
            ForecastError::TrainingError("No trained models to select from".to_string())
        })?;
        info!(model = %best.kind, mape = best.mape(), "Selected best model");
        Ok(best)
    }

    /// One row per trained model, sorted by ascending MAPE
    pub fn metrics_table(registry: &ModelRegistry) -> Vec<MetricsRow> {
        let mut rows: Vec<MetricsRow> = registry
            .iter()
            .map(|r| MetricsRow {
                name: r.name().to_string(),
                mae: r.metrics.mae,
                rmse: r.metrics.rmse,
                mape: r.metrics.mape,
                r2: r.metrics.r2,
            })
            .collect();
        rows.sort_by(|a, b| a.mape.total_cmp(&b.mape));
        rows
    }

    /// Importances by descending value, `None` for models without them
    pub fn importance_ranking(
        result: &ModelResult,
        feature_names: &[String],
    ) -> Option<Vec<FeatureImportance>> {
        let importances = result.feature_importance.as_ref()?;
        let mut ranking: Vec<FeatureImportance> = feature_names
            .iter()
            .zip(importances)
            .map(|(feature, &importance)| FeatureImportance {
                feature: feature.clone(),
                importance,
            })
            .collect();
        ranking.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        Some(ranking)
    }

    /// The `n` most important features
    pub fn top_importances(
        result: &ModelResult,
        feature_names: &[String],
        n: usize,
    ) -> Option<Vec<FeatureImportance>> {
        Self::importance_ranking(result, feature_names).map(|mut ranking| {
            ranking.truncate(n);
            ranking
        })
    }

    /// Validation residuals `y - ŷ`
    pub fn validation_residuals(result: &ModelResult, split: &SplitSet) -> Result<Vec<f64>> {
        metrics::residuals(&split.validation.targets().to_vec(), &result.predictions_validation)
    }

    /// Population standard deviation of the test residuals
    pub fn test_residual_std(result: &ModelResult, split: &SplitSet) -> Result<f64> {
        metrics::residual_std(&split.test.targets().to_vec(), &result.predictions_test)
    }

    /// `(date, actual, predicted)` over the test partition
    pub fn test_comparison(result: &ModelResult, split: &SplitSet) -> Vec<TestComparison> {
        split
            .test
            .rows()
            .iter()
            .zip(&result.predictions_test)
            .map(|(row, &predicted)| TestComparison {
                date: row.date,
                actual: row.target,
                predicted,
            })
            .collect()
    }
}
