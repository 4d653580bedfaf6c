//! Chronological train / validation / test partitioning

use crate::error::{ForecastError, Result};
use crate::features::{rows_to_array, FeatureMatrix, FeatureRow};
use chrono::NaiveDate;
use ndarray::{Array1, Array2};

/// One contiguous slice of the feature matrix
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    rows: Vec<FeatureRow>,
    n_features: usize,
}

impl Partition {
    fn new(rows: &[FeatureRow], n_features: usize) -> Self {
        Self {
            rows: rows.to_vec(),
            n_features,
        }
    }

    /// Rows in date order
    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the partition is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Feature matrix of the partition
    pub fn features(&self) -> Array2<f64> {
        rows_to_array(&self.rows, self.n_features)
    }

    /// Targets of the partition
    pub fn targets(&self) -> Array1<f64> {
        self.rows.iter().map(|r| r.target).collect()
    }

    /// Dates of the partition
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.rows.iter().map(|r| r.date).collect()
    }

    /// First date, if any
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.rows.first().map(|r| r.date)
    }

    /// Last date, if any
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.last().map(|r| r.date)
    }
}

/// Ordered `(train, validation, test)` triple
#[derive(Debug, Clone, PartialEq)]
pub struct SplitSet {
    /// Earliest rows, used for fitting
    pub train: Partition,
    /// Middle rows, used for model selection
    pub validation: Partition,
    /// Latest rows, used for residual dispersion
    pub test: Partition,
}

impl SplitSet {
    /// Total number of rows across the three partitions
    pub fn len(&self) -> usize {
        self.train.len() + self.validation.len() + self.test.len()
    }

    /// Whether all partitions are empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Positional splitter; never shuffles
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatasetSplitter {
    test_fraction: f64,
    val_fraction: f64,
}

impl DatasetSplitter {
    /// Create a splitter; requires `0 < test_fraction + val_fraction < 1`
    pub fn new(test_fraction: f64, val_fraction: f64) -> Result<Self> {
        validate_fractions(test_fraction, val_fraction)?;
        Ok(Self {
            test_fraction,
            val_fraction,
        })
    }

    /// Partition sizes for `n` rows: `(train, validation, test)`
    pub fn sizes(&self, n: usize) -> (usize, usize, usize) {
        let train_n = (n as f64 * (1.0 - self.test_fraction - self.val_fraction)).floor() as usize;
        let val_n = ((n as f64 * self.val_fraction).floor() as usize).min(n - train_n);
        (train_n, val_n, n - train_n - val_n)
    }

    /// Split the matrix chronologically
    ///
    /// Every partition must end up non-empty; otherwise the history is too
    /// short for the configured fractions and a `DataQualityError` is returned.
    pub fn split(&self, matrix: &FeatureMatrix) -> Result<SplitSet> {
        let rows = matrix.rows();
        let (train_n, val_n, test_n) = self.sizes(rows.len());

        if train_n == 0 || val_n == 0 || test_n == 0 {
            return Err(ForecastError::DataQualityError(format!(
                "{} feature rows give an empty partition (train {}, validation {}, test {})",
                rows.len(),
                train_n,
                val_n,
                test_n
            )));
        }

        let n_features = matrix.n_features();
        let (train, rest) = rows.split_at(train_n);
        let (validation, test) = rest.split_at(val_n);

        Ok(SplitSet {
            train: Partition::new(train, n_features),
            validation: Partition::new(validation, n_features),
            test: Partition::new(test, n_features),
        })
    }
}

pub(crate) fn validate_fractions(test_fraction: f64, val_fraction: f64) -> Result<()> {
    let held_out = test_fraction + val_fraction;
    if !(test_fraction >= 0.0 && val_fraction >= 0.0 && held_out > 0.0 && held_out < 1.0) {
        return Err(ForecastError::InvalidParameter(format!(
            "test_fraction + val_fraction must lie in (0, 1), got {} + {}",
            test_fraction, val_fraction
        )));
    }
    Ok(())
}
