//! Demand table handling
//!
//! A [`DemandTable`] wraps an already-parsed polars `DataFrame`. Binding a
//! date column and a numeric target column turns it into a [`DemandSeries`]
//! of dated observations, together with a [`ValidationReport`] of the data
//! quality issues found on the way.

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

/// Accepted layouts for dates stored as strings
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"];

/// One dated value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Observation date
    pub date: NaiveDate,
    /// Observed value
    pub value: f64,
}

/// Columns that can serve as date or target
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedColumns {
    /// Native date/datetime columns and string columns that parse as dates
    pub date_columns: Vec<String>,
    /// Numeric columns
    pub numeric_columns: Vec<String>,
}

/// Data quality issues found while binding columns
///
/// These are warnings only; the series is built from the data as given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Rows with no date
    pub null_dates: usize,
    /// Rows with no (or a NaN) target
    pub null_targets: usize,
    /// Rows with a negative target
    pub negative_targets: usize,
    /// Rows whose date already appeared earlier in the table
    pub duplicate_dates: usize,
}

impl ValidationReport {
    /// Whether no issue was found
    pub fn is_clean(&self) -> bool {
        self.null_dates == 0
            && self.null_targets == 0
            && self.negative_targets == 0
            && self.duplicate_dates == 0
    }

    /// Human-readable warnings, one per kind of issue
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.null_dates > 0 {
            warnings.push(format!("{} null values in the date column", self.null_dates));
        }
        if self.null_targets > 0 {
            warnings.push(format!("{} null values in the target column", self.null_targets));
        }
        if self.negative_targets > 0 {
            warnings.push(format!("{} negative target values", self.negative_targets));
        }
        if self.duplicate_dates > 0 {
            warnings.push(format!("{} duplicate dates", self.duplicate_dates));
        }
        warnings
    }
}

/// Mean target for one calendar month
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthlyProfile {
    /// Month number, 1 to 12
    pub month: u32,
    /// Mean target over all observations in that month
    pub mean: f64,
    /// Number of observations in that month
    pub count: usize,
}

/// Raw input table
#[derive(Debug, Clone)]
pub struct DemandTable {
    df: DataFrame,
}

impl DemandTable {
    /// Wrap an existing DataFrame
    pub fn from_dataframe(df: DataFrame) -> Result<Self> {
        if df.width() == 0 || df.height() == 0 {
            return Err(ForecastError::DataQualityError(
                "Input table is empty".to_string(),
            ));
        }
        Ok(Self { df })
    }

    /// Get the DataFrame
    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    /// Number of rows
    pub fn height(&self) -> usize {
        self.df.height()
    }

    /// Column names in table order
    pub fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Candidate date and numeric columns
    pub fn detect_columns(&self) -> DetectedColumns {
        let mut detected = DetectedColumns::default();
        for series in self.df.get_columns() {
            let name = series.name().to_string();
            match series.dtype() {
                DataType::Date | DataType::Datetime(_, _) => detected.date_columns.push(name),
                DataType::Utf8 => {
                    if parse_dates(series).map_or(false, |dates| dates.iter().any(Option::is_some)) {
                        detected.date_columns.push(name);
                    }
                }
                dtype if dtype.is_numeric() => detected.numeric_columns.push(name),
                _ => {}
            }
        }
        detected
    }

    /// Bind the date and target columns
    ///
    /// Fails with `ConfigurationError` when a column is missing, the date
    /// column does not parse or the target is not numeric. Rows without a
    /// date or target are reported and skipped.
    pub fn configure(&self, date_column: &str, target_column: &str) -> Result<DemandSeries> {
        if date_column == target_column {
            return Err(ForecastError::ConfigurationError(
                "Date and target must be different columns".to_string(),
            ));
        }
        let dates = parse_dates(self.column(date_column)?)?;
        let values = numeric_values(self.column(target_column)?)?;

        let mut report = ValidationReport::default();
        let mut seen = HashSet::new();
        let mut observations = Vec::with_capacity(dates.len());

        for (date, value) in dates.into_iter().zip(values) {
            let value = value.filter(|v| !v.is_nan());
            if date.is_none() {
                report.null_dates += 1;
            }
            if value.is_none() {
                report.null_targets += 1;
            }
            if value.map_or(false, |v| v < 0.0) {
                report.negative_targets += 1;
            }
            if let Some(d) = date {
                if !seen.insert(d) {
                    report.duplicate_dates += 1;
                }
            }
            if let (Some(date), Some(value)) = (date, value) {
                observations.push(Observation { date, value });
            }
        }

        for warning in report.warnings() {
            warn!(date_column, target_column, "{}", warning);
        }
        if observations.is_empty() {
            return Err(ForecastError::DataQualityError(format!(
                "No rows with both a date in '{}' and a value in '{}'",
                date_column, target_column
            )));
        }

        observations.sort_by_key(|obs| obs.date);
        info!(
            date_column,
            target_column,
            observations = observations.len(),
            "Columns configured"
        );

        Ok(DemandSeries {
            date_column: date_column.to_string(),
            target_column: target_column.to_string(),
            observations,
            report,
        })
    }

    fn column(&self, name: &str) -> Result<&Series> {
        self.df
            .column(name)
            .map_err(|_| ForecastError::ConfigurationError(format!("Column '{}' not found", name)))
    }
}

/// Observations bound to a date and target column, sorted by date
#[derive(Debug, Clone, PartialEq)]
pub struct DemandSeries {
    date_column: String,
    target_column: String,
    observations: Vec<Observation>,
    report: ValidationReport,
}

impl DemandSeries {
    /// Series from observations that did not come from a table
    pub fn from_observations(
        date_column: &str,
        target_column: &str,
        mut observations: Vec<Observation>,
    ) -> Self {
        observations.sort_by_key(|obs| obs.date);
        Self {
            date_column: date_column.to_string(),
            target_column: target_column.to_string(),
            observations,
            report: ValidationReport::default(),
        }
    }

    /// Name of the bound date column
    pub fn date_column(&self) -> &str {
        &self.date_column
    }

    /// Name of the bound target column
    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    /// Observations in date order
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Issues found while binding
    pub fn report(&self) -> &ValidationReport {
        &self.report
    }

    /// Number of observations
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether there are no observations
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Mean target per calendar month, for months that occur
    pub fn monthly_profile(&self) -> Vec<MonthlyProfile> {
        let mut by_month: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
        for obs in &self.observations {
            let entry = by_month.entry(obs.date.month()).or_insert((0.0, 0));
            entry.0 += obs.value;
            entry.1 += 1;
        }
        by_month
            .into_iter()
            .map(|(month, (sum, count))| MonthlyProfile {
                month,
                mean: sum / count as f64,
                count,
            })
            .collect()
    }
}

/// Dates of a Date, Datetime or string column; nulls stay `None`
fn parse_dates(series: &Series) -> Result<Vec<Option<NaiveDate>>> {
    match series.dtype() {
        DataType::Date => Ok(series
            .date()?
            .into_iter()
            .map(|days| days.and_then(date_from_epoch_days))
            .collect()),
        DataType::Datetime(unit, _) => {
            let per_second: i64 = match unit {
                TimeUnit::Nanoseconds => 1_000_000_000,
                TimeUnit::Microseconds => 1_000_000,
                TimeUnit::Milliseconds => 1_000,
            };
            Ok(series
                .datetime()?
                .into_iter()
                .map(|ts| ts.and_then(|ts| date_from_timestamp(ts, per_second)))
                .collect())
        }
        DataType::Utf8 => series
            .utf8()?
            .into_iter()
            .map(|value| match value {
                None => Ok(None),
                Some(text) => parse_date_str(text).map(Some).ok_or_else(|| {
                    ForecastError::ConfigurationError(format!(
                        "Value '{}' in column '{}' is not a recognised date",
                        text,
                        series.name()
                    ))
                }),
            })
            .collect(),
        other => Err(ForecastError::ConfigurationError(format!(
            "Column '{}' has type {} and cannot hold dates",
            series.name(),
            other
        ))),
    }
}

fn date_from_epoch_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1970, 1, 1)?.checked_add_signed(chrono::Duration::days(days as i64))
}

fn date_from_timestamp(ts: i64, per_second: i64) -> Option<NaiveDate> {
    let secs = ts.div_euclid(per_second);
    let nanos = ts.rem_euclid(per_second) * (1_000_000_000 / per_second);
    DateTime::from_timestamp(secs, nanos as u32).map(|dt| dt.date_naive())
}

/// Parse a single date string in one of the accepted layouts
pub fn parse_date_str(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))
}

/// Target values of a numeric column as `f64`; nulls stay `None`
fn numeric_values(series: &Series) -> Result<Vec<Option<f64>>> {
    if !series.dtype().is_numeric() {
        return Err(ForecastError::ConfigurationError(format!(
            "Target column '{}' has type {}, expected a numeric column",
            series.name(),
            series.dtype()
        )));
    }
    let values = series.cast(&DataType::Float64)?;
    let values = values.f64()?.into_iter().collect();
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn table() -> DemandTable {
        let df = df!(
            "date" => &["2021-01-01", "2021-02-01", "2021-03-01", "2021-02-01"],
            "region" => &["north", "south", "east", "west"],
            "units" => &[10i64, 12, -3, 15],
            "price" => &[1.5, 1.6, 1.7, 1.8]
        )
        .unwrap();
        DemandTable::from_dataframe(df).unwrap()
    }

    #[rstest]
    #[case("2021-03-15", Some((2021, 3, 15)))]
    #[case("15/03/2021", Some((2021, 3, 15)))]
    #[case("2021/03/15", Some((2021, 3, 15)))]
    #[case("2021-03-15 08:30:00", Some((2021, 3, 15)))]
    #[case("2021-03-15T08:30:00", Some((2021, 3, 15)))]
    #[case("2021-03-15T08:30:00+02:00", Some((2021, 3, 15)))]
    #[case("March 2021", None)]
    fn test_parse_date_str(#[case] text: &str, #[case] expected: Option<(i32, u32, u32)>) {
        let expected = expected.map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap());
        assert_eq!(parse_date_str(text), expected);
    }

    #[test]
    fn test_detect_columns() {
        let detected = table().detect_columns();
        assert_eq!(detected.date_columns, vec!["date".to_string()]);
        assert_eq!(
            detected.numeric_columns,
            vec!["units".to_string(), "price".to_string()]
        );
    }

    #[test]
    fn test_configure_reports_issues() {
        let series = table().configure("date", "units").unwrap();
        assert_eq!(series.len(), 4);
        assert_eq!(
            *series.report(),
            ValidationReport {
                null_dates: 0,
                null_targets: 0,
                negative_targets: 1,
                duplicate_dates: 1,
            }
        );
        assert_eq!(series.report().warnings().len(), 2);
        let dates: Vec<NaiveDate> = series.observations().iter().map(|o| o.date).collect();
        assert!(dates.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_configure_errors() {
        let table = table();
        assert!(matches!(
            table.configure("missing", "units"),
            Err(ForecastError::ConfigurationError(_))
        ));
        assert!(matches!(
            table.configure("date", "region"),
            Err(ForecastError::ConfigurationError(_))
        ));
        assert!(matches!(
            table.configure("region", "units"),
            Err(ForecastError::ConfigurationError(_))
        ));
        assert!(matches!(
            table.configure("date", "date"),
            Err(ForecastError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_null_rows_are_skipped() {
        let df = df!(
            "date" => &[Some("2021-01-01"), None, Some("2021-03-01")],
            "units" => &[Some(1.0), Some(2.0), None]
        )
        .unwrap();
        let series = DemandTable::from_dataframe(df)
            .unwrap()
            .configure("date", "units")
            .unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.report().null_dates, 1);
        assert_eq!(series.report().null_targets, 1);
    }

    #[test]
    fn test_native_date_and_datetime_columns() {
        let days = Series::new("day", &[18628i32, 18659])
            .cast(&DataType::Date)
            .unwrap();
        let stamps = Series::new("stamp", &[1_609_459_200_000i64, 1_612_137_600_000])
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .unwrap();
        let units = Series::new("units", &[5.0, 6.0]);
        let table = DemandTable::from_dataframe(DataFrame::new(vec![days, stamps, units]).unwrap())
            .unwrap();

        let expected = vec![
            NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2021, 2, 1).unwrap(),
        ];
        for column in ["day", "stamp"] {
            let series = table.configure(column, "units").unwrap();
            let dates: Vec<NaiveDate> = series.observations().iter().map(|o| o.date).collect();
            assert_eq!(dates, expected);
        }
    }

    #[rstest]
    #[case(1_612_137_600_000_000_000, 1_000_000_000, (2021, 2, 1))]
    #[case(1_612_180_799_999_999, 1_000_000, (2021, 2, 1))]
    #[case(-1, 1_000, (1969, 12, 31))]
    #[case(-86_400_000, 1_000, (1969, 12, 31))]
    fn test_timestamp_dates(#[case] ts: i64, #[case] per_second: i64, #[case] expected: (i32, u32, u32)) {
        let (y, m, d) = expected;
        assert_eq!(
            date_from_timestamp(ts, per_second),
            NaiveDate::from_ymd_opt(y, m, d)
        );
    }

    #[test]
    fn test_monthly_profile() {
        let observations = vec![
            Observation {
                date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                value: 10.0,
            },
            Observation {
                date: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
                value: 20.0,
            },
            Observation {
                date: NaiveDate::from_ymd_opt(2021, 6, 1).unwrap(),
                value: 7.0,
            },
        ];
        let profile = DemandSeries::from_observations("date", "units", observations).monthly_profile();
        assert_eq!(profile.len(), 2);
        assert_eq!(profile[0].month, 1);
        assert_eq!(profile[0].mean, 15.0);
        assert_eq!(profile[1].count, 1);
    }
}
