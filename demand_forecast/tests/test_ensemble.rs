use demand_forecast::features::FeatureBuilder;
use demand_forecast::selection::ModelSelector;
use demand_forecast::split::{DatasetSplitter, SplitSet};
use demand_forecast::synthetic::sample_demand;
use demand_forecast::training::{CancellationToken, ModelTrainerEnsemble};
use demand_forecast::{ForecastError, ModelKind};
use pretty_assertions::assert_eq;

fn sample_split() -> (SplitSet, Vec<String>) {
    let matrix = FeatureBuilder::new().build(&sample_demand(42).unwrap()).unwrap();
    let split = DatasetSplitter::new(0.2, 0.1).unwrap().split(&matrix).unwrap();
    (split, matrix.feature_names().to_vec())
}

#[test]
fn test_two_model_ensemble_selects_lower_mape() {
    let (split, _) = sample_split();
    let registry = ModelTrainerEnsemble::new(&[ModelKind::LinearRegression, ModelKind::RandomForest])
        .train(&split)
        .unwrap();

    assert_eq!(registry.len(), 2);
    let linear = registry.get(ModelKind::LinearRegression).unwrap().mape();
    let forest = registry.get(ModelKind::RandomForest).unwrap().mape();
    let expected = if forest < linear {
        ModelKind::RandomForest
    } else {
        ModelKind::LinearRegression
    };
    assert_eq!(ModelSelector::select(&registry).unwrap().kind, expected);
}

#[test]
fn test_full_catalog_trains_and_scores() {
    let (split, names) = sample_split();
    let registry = ModelTrainerEnsemble::new(&ModelKind::ALL).train(&split).unwrap();

    assert_eq!(registry.kinds(), ModelKind::ALL.to_vec());
    for result in registry.iter() {
        assert_eq!(result.predictions_validation.len(), split.validation.len());
        assert_eq!(result.predictions_test.len(), split.test.len());
        assert!(result.metrics.mae >= 0.0);
        assert!(result.metrics.rmse >= result.metrics.mae);
        assert!(result.metrics.mape.is_finite());
        assert_eq!(
            result.feature_importance.is_some(),
            result.kind.has_importances()
        );
    }

    let best = ModelSelector::select(&registry).unwrap();
    assert!(registry.iter().all(|r| best.mape() <= r.mape()));

    let table = ModelSelector::metrics_table(&registry);
    assert_eq!(table.len(), 6);
    assert!(table.windows(2).all(|w| w[0].mape <= w[1].mape));

    let forest = registry.get(ModelKind::RandomForest).unwrap();
    let ranking = ModelSelector::importance_ranking(forest, &names).unwrap();
    assert_eq!(ranking.len(), names.len());
    assert!(ranking.windows(2).all(|w| w[0].importance >= w[1].importance));
}

#[test]
fn test_training_is_deterministic() {
    let (split, _) = sample_split();
    let models = [
        ModelKind::RandomForest,
        ModelKind::GradientBoosting,
        ModelKind::LassoRegression,
    ];
    let first = ModelTrainerEnsemble::new(&models).train(&split).unwrap();
    let second = ModelTrainerEnsemble::new(&models)
        .with_max_workers(Some(1))
        .train(&split)
        .unwrap();

    for kind in models {
        let a = first.get(kind).unwrap();
        let b = second.get(kind).unwrap();
        assert_eq!(a.predictions_validation, b.predictions_validation);
        assert_eq!(a.predictions_test, b.predictions_test);
    }
}

#[test]
fn test_validation_residuals_and_test_comparison() {
    let (split, _) = sample_split();
    let registry = ModelTrainerEnsemble::new(&[ModelKind::RidgeRegression])
        .train(&split)
        .unwrap();
    let ridge = registry.get(ModelKind::RidgeRegression).unwrap();

    let residuals = ModelSelector::validation_residuals(ridge, &split).unwrap();
    assert_eq!(residuals.len(), split.validation.len());

    let comparison = ModelSelector::test_comparison(ridge, &split);
    assert_eq!(comparison.len(), split.test.len());
    assert_eq!(comparison[0].date, split.test.first_date().unwrap());
    assert_eq!(comparison[0].predicted, ridge.predictions_test[0]);
}

#[test]
fn test_cancellation_aborts_training() {
    let (split, _) = sample_split();
    let token = CancellationToken::new();
    token.cancel();
    let result = ModelTrainerEnsemble::new(&ModelKind::ALL).train_with_cancellation(&split, &token);
    assert!(matches!(result, Err(ForecastError::Cancelled)));
}
