//! Period-over-period change calculations

/// Relative change over `periods` steps: `(x[i] - x[i-k]) / x[i-k]`
///
/// Positions with no predecessor, and positions where the ratio is not
/// finite (division by zero), are `None`.
pub fn relative_change(values: &[f64], periods: usize) -> Vec<Option<f64>> {
    values
        .iter()
        .enumerate()
        .map(|(i, &current)| {
            if periods == 0 || i < periods {
                return None;
            }
            let previous = values[i - periods];
            let change = (current - previous) / previous;
            change.is_finite().then_some(change)
        })
        .collect()
}

/// One-step percentage change (as a fraction, not multiplied by 100)
pub fn pct_change(values: &[f64]) -> Vec<Option<f64>> {
    relative_change(values, 1)
}

/// Value observed `lag` positions earlier, `None` when out of range
pub fn lagged(values: &[f64], lag: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| i.checked_sub(lag).map(|j| values[j]))
        .collect()
}
