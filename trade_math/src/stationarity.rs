//! Augmented Dickey-Fuller unit-root test
//!
//! Regression with a constant:
//! `dy_t = a + b * y_{t-1} + sum_{i=1..k} g_i * dy_{t-i} + e_t`
//! with `k` chosen by AIC over `0..=max_lag` on a common sample. The test
//! statistic is the t ratio of `b`; the p-value uses MacKinnon's (1994)
//! response-surface approximation for the constant-only case.

use crate::regression::ols;
use crate::{MathError, Result};
use statrs::distribution::{ContinuousCDF, Normal};

/// Outcome of an ADF test
#[derive(Debug, Clone, PartialEq)]
pub struct AdfResult {
    /// t statistic of the lagged level coefficient
    pub statistic: f64,
    /// Approximate p-value of the unit-root null
    pub p_value: f64,
    /// Number of lagged differences retained
    pub used_lag: usize,
    /// Observations in the final regression
    pub nobs: usize,
}

impl AdfResult {
    /// Whether the unit-root null is rejected at `significance`
    pub fn is_stationary(&self, significance: f64) -> bool {
        self.p_value < significance
    }
}

// MacKinnon (1994) coefficients, constant term, one series.
const TAU_MAX: f64 = 2.74;
const TAU_MIN: f64 = -18.83;
const TAU_STAR: f64 = -1.61;
const SMALL_P: [f64; 3] = [2.1659, 1.4412, 0.038269];
const LARGE_P: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

/// Run the test with the default maximum lag `ceil(12 * (n / 100)^(1/4))`.
pub fn adf_test(series: &[f64]) -> Result<AdfResult> {
    let n = series.len();
    let default_lag = (12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as usize;
    // Keep enough rows for the regression to be identified.
    let cap = (n / 2).saturating_sub(2);
    adf_test_with_max_lag(series, default_lag.min(cap))
}

/// Run the test choosing the lag order by AIC over `0..=max_lag`.
pub fn adf_test_with_max_lag(series: &[f64], max_lag: usize) -> Result<AdfResult> {
    if series.len() < max_lag + 8 {
        return Err(MathError::InsufficientData(format!(
            "ADF test needs at least {} observations, got {}",
            max_lag + 8,
            series.len()
        )));
    }

    let diffs: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();

    let mut best: Option<(f64, usize)> = None;
    for lags in 0..=max_lag {
        let (x, y) = design(series, &diffs, lags, max_lag);
        let fit = ols(&x, &y)?;
        let aic = fit.aic();
        if best.map_or(true, |(b, _)| aic < b) {
            best = Some((aic, lags));
        }
    }
    let used_lag = best.map(|(_, l)| l).unwrap_or(0);

    let (x, y) = design(series, &diffs, used_lag, used_lag);
    let fit = ols(&x, &y)?;
    let statistic = fit.t_stat(1).ok_or_else(|| {
        MathError::CalculationError("Degenerate ADF regression".to_string())
    })?;

    Ok(AdfResult {
        statistic,
        p_value: mackinnon_p_value(statistic)?,
        used_lag,
        nobs: y.len(),
    })
}

/// Rows `[1, y_{t}, dy_{t-1}, .., dy_{t-lags}]` targeting `dy_t`, starting at `start`.
fn design(levels: &[f64], diffs: &[f64], lags: usize, start: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
    let mut x = Vec::with_capacity(diffs.len().saturating_sub(start));
    let mut y = Vec::with_capacity(diffs.len().saturating_sub(start));
    for t in start..diffs.len() {
        let mut row = Vec::with_capacity(lags + 2);
        row.push(1.0);
        row.push(levels[t]);
        row.extend((1..=lags).map(|i| diffs[t - i]));
        x.push(row);
        y.push(diffs[t]);
    }
    (x, y)
}

/// MacKinnon approximate p-value for the constant-only ADF statistic
pub fn mackinnon_p_value(statistic: f64) -> Result<f64> {
    if statistic > TAU_MAX {
        return Ok(1.0);
    }
    if statistic < TAU_MIN {
        return Ok(0.0);
    }
    let coefficients: &[f64] = if statistic <= TAU_STAR {
        &SMALL_P
    } else {
        &LARGE_P
    };
    let z = coefficients
        .iter()
        .rev()
        .fold(0.0, |acc, c| acc * statistic + c);

    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| MathError::CalculationError(e.to_string()))?;
    Ok(normal.cdf(z))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noise(n: usize) -> Vec<f64> {
        // Deterministic pseudo-noise from a linear congruential sequence
        let mut state: u64 = 12345;
        (0..n)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((state >> 11) as f64 / (1u64 << 53) as f64) - 0.5
            })
            .collect()
    }

    #[test]
    fn test_white_noise_is_stationary() {
        let series = noise(500);
        let result = adf_test(&series).unwrap();
        assert!(result.is_stationary(0.05), "p = {}", result.p_value);
    }

    #[test]
    fn test_random_walk_is_not_stationary() {
        let mut level = 100.0;
        let series: Vec<f64> = noise(500)
            .into_iter()
            .map(|e| {
                level += e;
                level
            })
            .collect();
        let result = adf_test(&series).unwrap();
        assert!(!result.is_stationary(0.01), "p = {}", result.p_value);
    }

    #[test]
    fn test_p_value_bounds() {
        assert_eq!(mackinnon_p_value(5.0).unwrap(), 1.0);
        assert_eq!(mackinnon_p_value(-25.0).unwrap(), 0.0);
        let mid = mackinnon_p_value(-2.86).unwrap();
        assert!((mid - 0.05).abs() < 0.01, "p = {}", mid);
    }

    #[test]
    fn test_short_series_rejected() {
        assert!(adf_test_with_max_lag(&[1.0, 2.0, 3.0], 2).is_err());
    }
}
