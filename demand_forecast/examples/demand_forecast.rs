use demand_forecast::synthetic::{self, DATE_COLUMN, DEMAND_COLUMN};
use demand_forecast::{ForecastConfig, ForecastSession, NAME, VERSION};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("{} v{}", NAME, VERSION);

    // Four years of seeded sample demand
    let table = synthetic::sample_demand_table(42)?;
    let mut session = ForecastSession::new(table, ForecastConfig::default())?;

    let detected = session.detect_columns();
    println!("Date columns: {:?}", detected.date_columns);
    println!("Numeric columns: {:?}", detected.numeric_columns);

    let report = session.configure(DATE_COLUMN, DEMAND_COLUMN)?;
    for warning in report.warnings() {
        println!("Warning: {}", warning);
    }

    if let Some(series) = session.series() {
        println!("\nMonthly profile:");
        for month in series.monthly_profile() {
            println!("  {:>2}: {:>10.2}", month.month, month.mean);
        }
    }

    let training = session.train()?;
    println!("\nModel comparison (validation):");
    println!("{:<20} {:>12} {:>12} {:>8} {:>8}", "Model", "MAE", "RMSE", "MAPE", "R2");
    for row in training.metrics_table() {
        println!(
            "{:<20} {:>12.2} {:>12.2} {:>7.2}% {:>8.3}",
            row.name, row.mae, row.rmse, row.mape, row.r2
        );
    }
    println!("Selected model: {}", training.best_kind());

    if let Some(importance) = training.feature_importance(Some(10)) {
        println!("\nTop features:");
        for feature in importance {
            println!("  {:<18} {:.4}", feature.feature, feature.importance);
        }
    }

    let forecast = session.forecast_default()?;
    println!("\nForecast with {}:", forecast.model());
    for point in forecast.points() {
        println!(
            "  {}: {:>10.2}  [{:>10.2}, {:>10.2}]",
            point.date.format("%m/%Y"),
            point.point_estimate,
            point.lower_bound,
            point.upper_bound
        );
    }

    let summary = forecast.summary();
    match summary.growth_pct {
        Some(growth) => println!("Expected growth: {:.2}%", growth),
        None => println!("Expected growth: n/a"),
    }
    println!("Mean forecast: {:.2}", summary.mean);
    println!("Range: {:.2} - {:.2}", summary.min, summary.max);
    println!(
        "Confidence: {:.0}% | Error rate: {:.2}%",
        summary.confidence_pct, summary.error_rate
    );

    Ok(())
}
