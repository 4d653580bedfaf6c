//! Ensemble training on a bounded worker pool
//!
//! Each selected model is fitted on the training partition and scored on the
//! validation partition independently of the others. A failing model is
//! logged and left out of the registry; only when every model fails does the
//! ensemble report an error.

use crate::error::{ForecastError, Result};
use crate::metrics::RegressionMetrics;
use crate::models::{FittedRegressor, ModelKind, DEFAULT_SEED};
use crate::split::SplitSet;
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Cooperative cancellation flag shared with a running training call
///
/// Checked before each model starts; a fit already in progress runs to
/// completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Outcome of training one model
#[derive(Debug)]
pub struct ModelResult {
    /// Model family
    pub kind: ModelKind,
    /// Fitted model
    pub model: Box<dyn FittedRegressor>,
    /// Accuracy on the validation partition
    pub metrics: RegressionMetrics,
    /// Predictions for the validation partition
    pub predictions_validation: Vec<f64>,
    /// Predictions for the test partition
    pub predictions_test: Vec<f64>,
    /// Native importances, one per feature column
    pub feature_importance: Option<Vec<f64>>,
}

impl ModelResult {
    /// Display name of the model
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Validation MAPE, the selection criterion
    pub fn mape(&self) -> f64 {
        self.metrics.mape
    }
}

/// Successfully trained models in registration order
#[derive(Debug, Default)]
pub struct ModelRegistry {
    results: Vec<ModelResult>,
}

impl ModelRegistry {
    /// Result for a model family, if it trained
    pub fn get(&self, kind: ModelKind) -> Option<&ModelResult> {
        self.results.iter().find(|r| r.kind == kind)
    }

    /// Whether a model family trained successfully
    pub fn contains(&self, kind: ModelKind) -> bool {
        self.get(kind).is_some()
    }

    /// Results in registration order
    pub fn iter(&self) -> impl Iterator<Item = &ModelResult> {
        self.results.iter()
    }

    /// Trained model families in registration order
    pub fn kinds(&self) -> Vec<ModelKind> {
        self.results.iter().map(|r| r.kind).collect()
    }

    /// Number of trained models
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether no model trained
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl FromIterator<ModelResult> for ModelRegistry {
    fn from_iter<I: IntoIterator<Item = ModelResult>>(iter: I) -> Self {
        Self {
            results: iter.into_iter().collect(),
        }
    }
}

/// Trains a set of model families on a [`SplitSet`]
#[derive(Debug, Clone)]
pub struct ModelTrainerEnsemble {
    models: Vec<ModelKind>,
    seed: u64,
    max_workers: Option<usize>,
}

struct TrainingInputs {
    x_train: Array2<f64>,
    y_train: Array1<f64>,
    x_val: Array2<f64>,
    y_val: Vec<f64>,
    x_test: Array2<f64>,
}

impl ModelTrainerEnsemble {
    /// Ensemble over `models`; repeated entries are trained once
    pub fn new(models: &[ModelKind]) -> Self {
        let mut unique: Vec<ModelKind> = Vec::with_capacity(models.len());
        for &kind in models {
            if !unique.contains(&kind) {
                unique.push(kind);
            }
        }
        Self {
            models: unique,
            seed: DEFAULT_SEED,
            max_workers: None,
        }
    }

    /// Seed passed to the randomised models
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Upper bound on worker threads
    pub fn with_max_workers(mut self, max_workers: Option<usize>) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Model families in registration order
    pub fn models(&self) -> &[ModelKind] {
        &self.models
    }

    /// Train every model
    pub fn train(&self, split: &SplitSet) -> Result<ModelRegistry> {
        self.train_with_cancellation(split, &CancellationToken::new())
    }

    /// Train every model, stopping before the next model once `token` is cancelled
    pub fn train_with_cancellation(
        &self,
        split: &SplitSet,
        token: &CancellationToken,
    ) -> Result<ModelRegistry> {
        self.train_with(split, token, |kind, x, y, seed| kind.fit(x, y, seed))
    }

    /// Train every model, fitting each one through `fit`
    fn train_with<F>(&self, split: &SplitSet, token: &CancellationToken, fit: F) -> Result<ModelRegistry>
    where
        F: Fn(ModelKind, &Array2<f64>, &Array1<f64>, u64) -> Result<Box<dyn FittedRegressor>> + Sync,
    {
        if self.models.is_empty() {
            return Err(ForecastError::TrainingError(
                "No models selected".to_string(),
            ));
        }

        let inputs = TrainingInputs {
            x_train: split.train.features(),
            y_train: split.train.targets(),
            x_val: split.validation.features(),
            y_val: split.validation.targets().to_vec(),
            x_test: split.test.features(),
        };

        let workers = self
            .max_workers
            .unwrap_or(self.models.len())
            .clamp(1, self.models.len());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| ForecastError::TrainingError(format!("Worker pool: {}", e)))?;

        info!(
            models = self.models.len(),
            workers,
            train_rows = split.train.len(),
            validation_rows = split.validation.len(),
            test_rows = split.test.len(),
            "Training model ensemble"
        );

        let outcomes: Vec<Option<(ModelKind, Result<ModelResult>)>> = pool.install(|| {
            self.models
                .par_iter()
                .map(|&kind| {
                    if token.is_cancelled() {
                        return None;
                    }
                    Some((kind, self.train_one(kind, &inputs, &fit)))
                })
                .collect()
        });

        if token.is_cancelled() {
            info!("Training cancelled");
            return Err(ForecastError::Cancelled);
        }

        let mut registry = ModelRegistry::default();
        for (kind, outcome) in outcomes.into_iter().flatten() {
            match outcome {
                Ok(result) => {
                    debug!(model = %kind, mape = result.metrics.mape, "Model trained");
                    registry.results.push(result);
                }
                Err(e) => warn!(model = %kind, error = %e, "Model failed; excluded from results"),
            }
        }

        if registry.is_empty() {
            return Err(ForecastError::TrainingError(
                "All selected models failed to train".to_string(),
            ));
        }

        info!(trained = registry.len(), "Ensemble training finished");
        Ok(registry)
    }

    fn train_one<F>(&self, kind: ModelKind, inputs: &TrainingInputs, fit: &F) -> Result<ModelResult>
    where
        F: Fn(ModelKind, &Array2<f64>, &Array1<f64>, u64) -> Result<Box<dyn FittedRegressor>>,
    {
        let model = fit(kind, &inputs.x_train, &inputs.y_train, self.seed)?;

        let predictions_validation = finite_predictions(model.as_ref(), &inputs.x_val)?;
        let predictions_test = finite_predictions(model.as_ref(), &inputs.x_test)?;
        let metrics = RegressionMetrics::evaluate(&inputs.y_val, &predictions_validation)?;
        let feature_importance = model.feature_importances().map(|imp| imp.to_vec());

        Ok(ModelResult {
            kind,
            model,
            metrics,
            predictions_validation,
            predictions_test,
            feature_importance,
        })
    }
}

fn finite_predictions(model: &dyn FittedRegressor, x: &Array2<f64>) -> Result<Vec<f64>> {
    let predictions = model.predict(x)?.to_vec();
    if predictions.iter().any(|p| !p.is_finite()) {
        return Err(ForecastError::ModelError(format!(
            "{} produced a non-finite prediction",
            model.name()
        )));
    }
    Ok(predictions)
}
