//! Linear regression models
//!
//! Ordinary least squares, Ridge (L2) and Lasso (L1). All three fit an
//! intercept by centring the design matrix and the target first.

use crate::error::{ForecastError, Result};
use crate::models::{
    check_prediction_input, check_training_input, FittedRegressor, RegressionModel,
};
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2, Axis};

/// Fitted linear model: `y = x · coefficients + intercept`
#[derive(Debug, Clone)]
pub struct FittedLinear {
    name: String,
    coefficients: Array1<f64>,
    intercept: f64,
}

impl FittedLinear {
    /// Coefficients (weights) for each feature
    pub fn coefficients(&self) -> &Array1<f64> {
        &self.coefficients
    }

    /// Intercept (bias) term
    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Number of coefficients that are not (numerically) zero
    pub fn n_nonzero(&self) -> usize {
        self.coefficients.iter().filter(|c| c.abs() > 1e-10).count()
    }
}

impl FittedRegressor for FittedLinear {
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        check_prediction_input(x, self.coefficients.len())?;
        Ok(x.dot(&self.coefficients) + self.intercept)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Centred copy of the training data with the means needed to recover the intercept
struct Centered {
    x: Array2<f64>,
    y: Array1<f64>,
    x_mean: Array1<f64>,
    y_mean: f64,
}

fn center(x: &Array2<f64>, y: &Array1<f64>) -> Result<Centered> {
    let x_mean = x
        .mean_axis(Axis(0))
        .ok_or_else(|| ForecastError::ModelError("Cannot centre an empty matrix".to_string()))?;
    let y_mean = y
        .mean()
        .ok_or_else(|| ForecastError::ModelError("Cannot centre an empty target".to_string()))?;

    Ok(Centered {
        x: x - &x_mean,
        y: y - y_mean,
        x_mean,
        y_mean,
    })
}

fn finish(name: &str, centered: &Centered, coefficients: Array1<f64>) -> Result<FittedLinear> {
    if coefficients.iter().any(|c| !c.is_finite()) {
        return Err(ForecastError::ModelError(format!(
            "{} produced non-finite coefficients",
            name
        )));
    }
    let intercept = centered.y_mean - centered.x_mean.dot(&coefficients);

    Ok(FittedLinear {
        name: name.to_string(),
        coefficients,
        intercept,
    })
}

/// Ordinary least squares
///
/// Solves `min ||y - Xβ||²` through a singular value decomposition, which
/// yields the minimum-norm solution when columns are collinear or when there
/// are fewer rows than features.
#[derive(Debug, Clone, Default)]
pub struct LinearRegression;

impl RegressionModel for LinearRegression {
    type Fitted = FittedLinear;

    fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<Self::Fitted> {
        check_training_input(x, y)?;
        let centered = center(x, y)?;

        let (n, p) = centered.x.dim();
        let design = DMatrix::from_fn(n, p, |i, j| centered.x[[i, j]]);
        let target = DVector::from_iterator(n, centered.y.iter().copied());

        let svd = design.svd(true, true);
        let max_singular = svd.singular_values.iter().copied().fold(0.0_f64, f64::max);
        let eps = max_singular * n.max(p) as f64 * f64::EPSILON;

        let beta = svd
            .solve(&target, eps)
            .map_err(|e| ForecastError::ModelError(format!("Least squares failed: {}", e)))?;

        finish(self.name(), &centered, beta.iter().copied().collect())
    }

    fn name(&self) -> &str {
        "Linear Regression"
    }
}

/// Ridge Regression (L2 regularization)
///
/// Uses the closed-form solution on centred data: β = (X'X + αI)^(-1) X'y
#[derive(Debug, Clone)]
pub struct RidgeRegression {
    alpha: f64,
}

impl Default for RidgeRegression {
    fn default() -> Self {
        Self { alpha: 1.0 }
    }
}

impl RidgeRegression {
    /// Create a new Ridge model with the given regularization strength
    pub fn new(alpha: f64) -> Result<Self> {
        if alpha.is_nan() || alpha < 0.0 {
            return Err(ForecastError::InvalidParameter(format!(
                "Ridge alpha must be non-negative, got {}",
                alpha
            )));
        }
        Ok(Self { alpha })
    }
}

impl RegressionModel for RidgeRegression {
    type Fitted = FittedLinear;

    fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<Self::Fitted> {
        check_training_input(x, y)?;
        let centered = center(x, y)?;

        let mut gram = centered.x.t().dot(&centered.x);
        for i in 0..gram.nrows() {
            gram[[i, i]] += self.alpha;
        }
        let xty = centered.x.t().dot(&centered.y);

        let coefficients = cholesky_solve(&gram, &xty)?;
        finish(self.name(), &centered, coefficients)
    }

    fn name(&self) -> &str {
        "Ridge Regression"
    }
}

/// Solve `a · x = b` for symmetric positive definite `a`
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    // Cholesky decomposition: A = L * L^T
    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }

            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return Err(ForecastError::ModelError(
                        "Matrix not positive definite".to_string(),
                    ));
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // Forward substitution: L * z = b
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * z[j];
        }
        z[i] = (b[i] - sum) / l[[i, i]];
    }

    // Backward substitution: L' * x = z
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (z[i] - sum) / l[[i, i]];
    }

    Ok(x)
}

/// Lasso Regression (L1 regularization)
///
/// Minimizes: (1/2n)||y - Xβ||² + α||β||₁ with cyclic coordinate descent.
#[derive(Debug, Clone)]
pub struct LassoRegression {
    alpha: f64,
    max_iter: usize,
    tolerance: f64,
}

impl Default for LassoRegression {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            max_iter: 1000,
            tolerance: 1e-4,
        }
    }
}

impl LassoRegression {
    /// Create a new Lasso model
    pub fn new(alpha: f64, max_iter: usize, tolerance: f64) -> Result<Self> {
        if alpha.is_nan() || alpha < 0.0 {
            return Err(ForecastError::InvalidParameter(format!(
                "Lasso alpha must be non-negative, got {}",
                alpha
            )));
        }
        if max_iter == 0 {
            return Err(ForecastError::InvalidParameter(
                "Lasso needs at least one iteration".to_string(),
            ));
        }
        Ok(Self {
            alpha,
            max_iter,
            tolerance,
        })
    }

    /// Soft thresholding operator
    fn soft_threshold(x: f64, lambda: f64) -> f64 {
        if x > lambda {
            x - lambda
        } else if x < -lambda {
            x + lambda
        } else {
            0.0
        }
    }
}

impl RegressionModel for LassoRegression {
    type Fitted = FittedLinear;

    fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<Self::Fitted> {
        check_training_input(x, y)?;
        let centered = center(x, y)?;
        let (n_samples, n_features) = centered.x.dim();

        let column_norms: Vec<f64> = centered
            .x
            .columns()
            .into_iter()
            .map(|col| col.dot(&col))
            .collect();

        let threshold = self.alpha * n_samples as f64;
        let mut coef = Array1::<f64>::zeros(n_features);
        // residual = y - X·coef, kept in sync after every coordinate update
        let mut residual = centered.y.clone();

        for _ in 0..self.max_iter {
            let mut max_change: f64 = 0.0;
            let mut max_coef: f64 = 0.0;

            for j in 0..n_features {
                if column_norms[j] <= 1e-12 {
                    continue;
                }
                let column = centered.x.column(j);
                let old = coef[j];
                let rho = column.dot(&residual) + column_norms[j] * old;
                let new = Self::soft_threshold(rho, threshold) / column_norms[j];

                if new != old {
                    residual.scaled_add(old - new, &column);
                    coef[j] = new;
                }
                max_change = max_change.max((new - old).abs());
                max_coef = max_coef.max(new.abs());
            }

            if max_coef == 0.0 || max_change / max_coef < self.tolerance {
                break;
            }
        }

        finish(self.name(), &centered, coef)
    }

    fn name(&self) -> &str {
        "Lasso Regression"
    }
}
