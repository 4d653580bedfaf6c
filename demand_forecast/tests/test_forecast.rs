use chrono::{Datelike, Months};
use demand_forecast::confidence::{ConfidenceEstimator, Z_95};
use demand_forecast::features::FeatureBuilder;
use demand_forecast::split::DatasetSplitter;
use demand_forecast::synthetic::sample_demand;
use demand_forecast::training::ModelTrainerEnsemble;
use demand_forecast::{ForecastError, ModelKind, RecursiveForecaster};
use rstest::rstest;

#[rstest]
#[case(ModelKind::LinearRegression, 6)]
#[case(ModelKind::RandomForest, 12)]
#[case(ModelKind::GradientBoosting, 24)]
fn test_forecast_shape_and_bounds(#[case] kind: ModelKind, #[case] horizon: usize) {
    let matrix = FeatureBuilder::new().build(&sample_demand(42).unwrap()).unwrap();
    let split = DatasetSplitter::new(0.2, 0.1).unwrap().split(&matrix).unwrap();
    let registry = ModelTrainerEnsemble::new(&[kind]).train(&split).unwrap();
    let result = registry.get(kind).unwrap();

    let test_actual = split.test.targets().to_vec();
    let confidence =
        ConfidenceEstimator::from_residuals(&test_actual, &result.predictions_test, Z_95).unwrap();
    let points = RecursiveForecaster::new(result.model.as_ref(), &matrix)
        .forecast(horizon, &confidence)
        .unwrap();

    assert_eq!(points.len(), horizon);
    let last = matrix.last_row().unwrap().date;
    for (i, point) in points.iter().enumerate() {
        assert_eq!(point.date, last + Months::new(i as u32 + 1));
        assert_eq!(point.date.day(), 1);
        assert!(point.point_estimate >= 0.0);
        assert!(point.lower_bound >= 0.0);
        assert!(point.lower_bound <= point.point_estimate);
        assert!(point.point_estimate <= point.upper_bound);
    }
    assert!(points.windows(2).all(|w| w[0].date < w[1].date));
}

#[test]
fn test_forecast_is_repeatable() {
    let matrix = FeatureBuilder::new().build(&sample_demand(42).unwrap()).unwrap();
    let split = DatasetSplitter::new(0.2, 0.1).unwrap().split(&matrix).unwrap();
    let registry = ModelTrainerEnsemble::new(&[ModelKind::RidgeRegression])
        .train(&split)
        .unwrap();
    let model = registry.get(ModelKind::RidgeRegression).unwrap().model.as_ref();

    let forecaster = RecursiveForecaster::new(model, &matrix);
    assert_eq!(forecaster.steps(6).unwrap(), forecaster.steps(6).unwrap());
}

#[test]
fn test_zero_horizon_is_a_forecasting_error() {
    let matrix = FeatureBuilder::new().build(&sample_demand(42).unwrap()).unwrap();
    let split = DatasetSplitter::new(0.2, 0.1).unwrap().split(&matrix).unwrap();
    let registry = ModelTrainerEnsemble::new(&[ModelKind::LinearRegression])
        .train(&split)
        .unwrap();
    let model = registry.get(ModelKind::LinearRegression).unwrap().model.as_ref();

    let result = RecursiveForecaster::new(model, &matrix).steps(0);
    assert!(matches!(result, Err(ForecastError::ForecastingError(_))));
}
