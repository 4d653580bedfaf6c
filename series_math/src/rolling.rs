//! Rolling window statistics
//!
//! Contains a fixed-length window that tracks the statistics the feature
//! pipeline needs over the most recent observations:
//! - Mean
//! - Sample standard deviation
//! - Minimum / Maximum
//!
//! A `min_periods` threshold decides when a partially filled window still
//! produces a value, so early rows get a degenerate statistic instead of
//! nothing.

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Statistics of a single rolling window position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RollingStats {
    /// Mean of the values in the window
    pub mean: f64,
    /// Sample standard deviation (n - 1), `None` with fewer than two values
    pub std: Option<f64>,
    /// Smallest value in the window
    pub min: f64,
    /// Largest value in the window
    pub max: f64,
    /// Number of values the statistics were computed from
    pub count: usize,
}

/// Fixed-length rolling window
#[derive(Debug, Clone)]
pub struct RollingWindow {
    window: usize,
    min_periods: usize,
    values: VecDeque<f64>,
}

impl RollingWindow {
    /// Create a new rolling window with the specified length and minimum fill
    pub fn new(window: usize, min_periods: usize) -> Result<Self> {
        if window == 0 {
            return Err(MathError::InvalidInput(
                "Window must be greater than zero".to_string(),
            ));
        }
        if min_periods == 0 || min_periods > window {
            return Err(MathError::InvalidInput(format!(
                "min_periods must be in 1..={}, got {}",
                window, min_periods
            )));
        }

        Ok(Self {
            window,
            min_periods,
            values: VecDeque::with_capacity(window),
        })
    }

    /// Push a new value, evicting the oldest one once the window is full
    pub fn update(&mut self, value: f64) {
        self.values.push_back(value);
        if self.values.len() > self.window {
            self.values.pop_front();
        }
    }

    /// Current statistics, or `None` while fewer than `min_periods` values are held
    pub fn stats(&self) -> Option<RollingStats> {
        let count = self.values.len();
        if count < self.min_periods {
            return None;
        }

        let mean = self.values.iter().sum::<f64>() / count as f64;
        let std = if count > 1 {
            let variance = self
                .values
                .iter()
                .map(|v| (v - mean).powi(2))
                .sum::<f64>()
                / (count - 1) as f64;
            Some(variance.sqrt())
        } else {
            None
        };
        let min = self.values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Some(RollingStats {
            mean,
            std,
            min,
            max,
            count,
        })
    }
}

/// Rolling statistics for every position of `values`
///
/// Position `i` covers `values[i + 1 - window ..= i]` (clipped at the start).
/// Only values at or before `i` are ever read.
pub fn rolling_stats(
    values: &[f64],
    window: usize,
    min_periods: usize,
) -> Result<Vec<Option<RollingStats>>> {
    let mut rolling = RollingWindow::new(window, min_periods)?;

    Ok(values
        .iter()
        .map(|&value| {
            rolling.update(value);
            rolling.stats()
        })
        .collect())
}

/// Rolling mean for every position of `values`
pub fn rolling_mean(values: &[f64], window: usize, min_periods: usize) -> Result<Vec<Option<f64>>> {
    Ok(rolling_stats(values, window, min_periods)?
        .into_iter()
        .map(|stats| stats.map(|s| s.mean))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_window_validation() {
        assert!(RollingWindow::new(0, 1).is_err());
        assert!(RollingWindow::new(3, 0).is_err());
        assert!(RollingWindow::new(3, 4).is_err());
        assert!(RollingWindow::new(3, 3).is_ok());
    }

    #[test]
    fn test_partial_window_with_min_periods_one() {
        let stats = rolling_stats(&[4.0, 8.0, 6.0, 10.0], 3, 1).unwrap();

        let first = stats[0].unwrap();
        assert_relative_eq!(first.mean, 4.0);
        assert_eq!(first.std, None);
        assert_eq!(first.count, 1);

        let second = stats[1].unwrap();
        assert_relative_eq!(second.mean, 6.0);
        assert_relative_eq!(second.std.unwrap(), 8.0_f64.sqrt());

        let last = stats[3].unwrap();
        assert_relative_eq!(last.mean, 8.0);
        assert_relative_eq!(last.min, 6.0);
        assert_relative_eq!(last.max, 10.0);
        assert_eq!(last.count, 3);
    }

    #[test]
    fn test_full_window_required() {
        let means = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 3, 3).unwrap();
        assert_eq!(means[0], None);
        assert_eq!(means[1], None);
        assert_relative_eq!(means[2].unwrap(), 2.0);
        assert_relative_eq!(means[3].unwrap(), 3.0);
    }

    #[test]
    fn test_oldest_value_is_evicted() {
        let mut window = RollingWindow::new(2, 2).unwrap();
        window.update(100.0);
        assert!(window.stats().is_none());
        window.update(1.0);
        window.update(3.0);

        let stats = window.stats().unwrap();
        assert_eq!(stats.count, 2);
        assert_relative_eq!(stats.mean, 2.0);
        assert_relative_eq!(stats.max, 3.0);
    }
}
