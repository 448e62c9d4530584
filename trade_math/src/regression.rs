//! Linear least squares for model fitting
//!
//! Contains:
//! - Ordinary least squares with coefficient standard errors and information criteria
//! - Ridge (per-coefficient L2 penalised) least squares
//! - A dense Gauss-Jordan solver used by both

use crate::{MathError, Result};
use std::f64::consts::PI;

/// Result of an ordinary least squares fit
#[derive(Debug, Clone)]
pub struct OlsFit {
    /// Estimated coefficients, one per design column
    pub coefficients: Vec<f64>,
    /// Standard errors of the coefficients
    pub std_errors: Vec<f64>,
    /// Residuals `y - X b`
    pub residuals: Vec<f64>,
    /// Sum of squared residuals
    pub ssr: f64,
    /// Number of observations
    pub nobs: usize,
}

impl OlsFit {
    /// Gaussian log-likelihood evaluated at the MLE of the error variance
    pub fn log_likelihood(&self) -> f64 {
        let n = self.nobs as f64;
        -n / 2.0 * ((2.0 * PI * self.ssr / n).ln() + 1.0)
    }

    /// Akaike information criterion
    pub fn aic(&self) -> f64 {
        -2.0 * self.log_likelihood() + 2.0 * self.coefficients.len() as f64
    }

    /// t statistic of coefficient `i`
    pub fn t_stat(&self, i: usize) -> Option<f64> {
        let se = *self.std_errors.get(i)?;
        if se <= 0.0 || !se.is_finite() {
            return None;
        }
        Some(self.coefficients[i] / se)
    }
}

/// Fit `y = X b + e` by ordinary least squares.
///
/// `x` is row-major: one inner vector per observation.
pub fn ols(x: &[Vec<f64>], y: &[f64]) -> Result<OlsFit> {
    let k = check_design(x, y)?;
    let n = y.len();
    if n <= k {
        return Err(MathError::InsufficientData(format!(
            "OLS needs more observations ({}) than regressors ({})",
            n, k
        )));
    }

    let (xtx, xty) = normal_equations(x, y, k);
    let xtx_inv = invert(&xtx)?;
    let coefficients: Vec<f64> = (0..k)
        .map(|i| (0..k).map(|j| xtx_inv[i][j] * xty[j]).sum())
        .collect();

    let residuals = residuals(x, y, &coefficients);
    let ssr: f64 = residuals.iter().map(|r| r * r).sum();
    let sigma2 = ssr / (n - k) as f64;
    let std_errors = (0..k).map(|i| (sigma2 * xtx_inv[i][i]).max(0.0).sqrt()).collect();

    Ok(OlsFit {
        coefficients,
        std_errors,
        residuals,
        ssr,
        nobs: n,
    })
}

/// Minimise `|y - X b|^2 + sum_i penalties[i] * b_i^2`.
pub fn ridge(x: &[Vec<f64>], y: &[f64], penalties: &[f64]) -> Result<Vec<f64>> {
    let k = check_design(x, y)?;
    if penalties.len() != k {
        return Err(MathError::InvalidInput(format!(
            "Expected {} penalties, got {}",
            k,
            penalties.len()
        )));
    }

    let (mut xtx, xty) = normal_equations(x, y, k);
    for (i, p) in penalties.iter().enumerate() {
        xtx[i][i] += p;
    }
    solve(xtx, xty)
}

/// Solve the square system `a x = b` by Gauss-Jordan elimination with partial pivoting.
pub fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    if a.len() != n || a.iter().any(|row| row.len() != n) {
        return Err(MathError::InvalidInput(
            "System matrix must be square and match the right-hand side".to_string(),
        ));
    }

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < 1e-12 {
            return Err(MathError::CalculationError(
                "Singular matrix in linear solve".to_string(),
            ));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        let diag = a[col][col];
        for j in col..n {
            a[col][j] /= diag;
        }
        b[col] /= diag;

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = a[row][col];
            if factor == 0.0 {
                continue;
            }
            for j in col..n {
                a[row][j] -= factor * a[col][j];
            }
            b[row] -= factor * b[col];
        }
    }

    Ok(b)
}

/// Invert a square matrix column by column.
pub fn invert(a: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
    let n = a.len();
    let mut columns = Vec::with_capacity(n);
    for j in 0..n {
        let mut e = vec![0.0; n];
        e[j] = 1.0;
        columns.push(solve(a.to_vec(), e)?);
    }
    Ok((0..n).map(|i| (0..n).map(|j| columns[j][i]).collect()).collect())
}

fn check_design(x: &[Vec<f64>], y: &[f64]) -> Result<usize> {
    if x.is_empty() || x.len() != y.len() {
        return Err(MathError::InvalidInput(format!(
            "Design has {} rows but target has {} values",
            x.len(),
            y.len()
        )));
    }
    let k = x[0].len();
    if k == 0 || x.iter().any(|row| row.len() != k) {
        return Err(MathError::InvalidInput(
            "Design rows must share a non-zero width".to_string(),
        ));
    }
    Ok(k)
}

fn normal_equations(x: &[Vec<f64>], y: &[f64], k: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (row, &target) in x.iter().zip(y) {
        for i in 0..k {
            xty[i] += row[i] * target;
            for j in i..k {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }
    for i in 0..k {
        for j in 0..i {
            xtx[i][j] = xtx[j][i];
        }
    }
    (xtx, xty)
}

fn residuals(x: &[Vec<f64>], y: &[f64], b: &[f64]) -> Vec<f64> {
    x.iter()
        .zip(y)
        .map(|(row, target)| target - row.iter().zip(b).map(|(v, c)| v * c).sum::<f64>())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ols_recovers_line() {
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![1.0, i as f64]).collect();
        let y: Vec<f64> = (0..20).map(|i| 3.0 + 0.5 * i as f64).collect();

        let fit = ols(&x, &y).unwrap();
        assert_relative_eq!(fit.coefficients[0], 3.0, epsilon = 1e-9);
        assert_relative_eq!(fit.coefficients[1], 0.5, epsilon = 1e-9);
        assert!(fit.ssr < 1e-12);
    }

    #[test]
    fn test_ols_standard_errors_positive_with_noise() {
        let x: Vec<Vec<f64>> = (0..30).map(|i| vec![1.0, i as f64]).collect();
        let y: Vec<f64> = (0..30)
            .map(|i| 1.0 + 2.0 * i as f64 + if i % 2 == 0 { 0.5 } else { -0.5 })
            .collect();

        let fit = ols(&x, &y).unwrap();
        assert!(fit.std_errors.iter().all(|se| *se > 0.0));
        assert!(fit.t_stat(1).unwrap() > 100.0);
        assert!(fit.aic().is_finite());
    }

    #[test]
    fn test_ridge_shrinks_towards_zero() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..10).map(|i| 2.0 * i as f64).collect();

        let free = ridge(&x, &y, &[0.0]).unwrap();
        let shrunk = ridge(&x, &y, &[1000.0]).unwrap();
        assert_relative_eq!(free[0], 2.0, epsilon = 1e-9);
        assert!(shrunk[0] < free[0]);
    }

    #[test]
    fn test_singular_system_is_error() {
        let a = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        assert!(solve(a, vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn test_invert_identity_product() {
        let a = vec![vec![4.0, 7.0], vec![2.0, 6.0]];
        let inv = invert(&a).unwrap();
        assert_relative_eq!(inv[0][0], 0.6, epsilon = 1e-12);
        assert_relative_eq!(inv[0][1], -0.7, epsilon = 1e-12);
        assert_relative_eq!(inv[1][0], -0.2, epsilon = 1e-12);
        assert_relative_eq!(inv[1][1], 0.4, epsilon = 1e-12);
    }
}
