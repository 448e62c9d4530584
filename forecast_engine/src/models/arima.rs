//! ARIMA mean model with automatic order selection
//!
//! Coefficients are estimated by the Hannan-Rissanen two-stage regression:
//! a long autoregression supplies innovation estimates, then the series is
//! regressed on its own lags and the lagged innovations. The likelihood used
//! for order selection is the Gaussian conditional sum of squares of the
//! recursively filtered residuals.

use crate::error::{ForecastError, Result};
use crate::returns::difference;
use std::f64::consts::PI;
use tracing::debug;
use trade_math::regression::ols;
use trade_math::stationarity::adf_test;

/// ARIMA order `(p, d, q)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl std::fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ARIMA({},{},{})", self.p, self.d, self.q)
    }
}

/// Fitted ARIMA model
#[derive(Debug, Clone)]
pub struct ArimaModel {
    order: ArimaOrder,
    /// Intercept of the (differenced) series; zero when `d > 0`
    constant: f64,
    ar_coefficients: Vec<f64>,
    ma_coefficients: Vec<f64>,
    sigma2: f64,
    log_likelihood: f64,
    nobs: usize,
}

impl ArimaModel {
    /// Fit a given order to `series`
    pub fn fit(series: &[f64], order: ArimaOrder) -> Result<Self> {
        let mut working = series.to_vec();
        for _ in 0..order.d {
            working = difference(&working);
        }
        let required = 4 * (order.p + order.q + 1);
        if working.len() < required {
            return Err(ForecastError::InsufficientHistory {
                required,
                available: working.len(),
            });
        }
        let with_constant = order.d == 0;

        let (constant, ar, ma) = hannan_rissanen(&working, order.p, order.q, with_constant)?;
        let residuals = filter_residuals(&working, constant, &ar, &ma);
        let kept = &residuals[order.p..];
        if kept.iter().any(|e| !e.is_finite() || e.abs() > 1e6) {
            return Err(ForecastError::FitError(format!(
                "{} residual recursion diverged",
                order
            )));
        }

        let nobs = kept.len();
        let ssr: f64 = kept.iter().map(|e| e * e).sum();
        let sigma2 = ssr / nobs as f64;
        if sigma2 <= 0.0 || !sigma2.is_finite() {
            return Err(ForecastError::FitError(format!(
                "{} produced a degenerate residual variance",
                order
            )));
        }
        let n = nobs as f64;
        let log_likelihood = -n / 2.0 * ((2.0 * PI * sigma2).ln() + 1.0);

        Ok(Self {
            order,
            constant,
            ar_coefficients: ar,
            ma_coefficients: ma,
            sigma2,
            log_likelihood,
            nobs,
        })
    }

    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn ar_coefficients(&self) -> &[f64] {
        &self.ar_coefficients
    }

    pub fn ma_coefficients(&self) -> &[f64] {
        &self.ma_coefficients
    }

    /// First autoregressive coefficient, zero for pure MA models
    pub fn ar_l1(&self) -> f64 {
        self.ar_coefficients.first().copied().unwrap_or(0.0)
    }

    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    pub fn nobs(&self) -> usize {
        self.nobs
    }

    /// Akaike information criterion; the innovation variance counts as a parameter
    pub fn aic(&self) -> f64 {
        let k = self.order.p + self.order.q + usize::from(self.order.d == 0) + 1;
        2.0 * k as f64 - 2.0 * self.log_likelihood
    }
}

/// Long-AR order used for the first Hannan-Rissanen stage
fn long_ar_order(n: usize, p: usize, q: usize) -> usize {
    let base = ((n as f64).ln().powi(2)).ceil() as usize;
    base.max(p + q + 1).min(n / 4)
}

fn hannan_rissanen(
    y: &[f64],
    p: usize,
    q: usize,
    with_constant: bool,
) -> Result<(f64, Vec<f64>, Vec<f64>)> {
    let n = y.len();
    if p == 0 && q == 0 {
        let constant = if with_constant {
            y.iter().sum::<f64>() / n.max(1) as f64
        } else {
            0.0
        };
        return Ok((constant, Vec::new(), Vec::new()));
    }

    // Stage one: innovations from a long autoregression.
    let innovations = if q > 0 {
        let m = long_ar_order(n, p, q);
        if m == 0 {
            return Err(ForecastError::InsufficientHistory {
                required: 4 * (p + q + 1),
                available: n,
            });
        }
        let (x, target): (Vec<Vec<f64>>, Vec<f64>) = (m..n)
            .map(|t| {
                let mut row = vec![1.0];
                row.extend((1..=m).map(|i| y[t - i]));
                (row, y[t])
            })
            .unzip();
        let fit = ols(&x, &target)?;
        let mut e = vec![0.0; n];
        e[m..].copy_from_slice(&fit.residuals);
        Some((m, e))
    } else {
        None
    };

    // Stage two: regress on own lags and lagged innovations.
    let start = match &innovations {
        Some((m, _)) => (m + q).max(p),
        None => p,
    };
    let (x, target): (Vec<Vec<f64>>, Vec<f64>) = (start..n)
        .map(|t| {
            let mut row = Vec::with_capacity(p + q + 1);
            if with_constant {
                row.push(1.0);
            }
            row.extend((1..=p).map(|i| y[t - i]));
            if let Some((_, e)) = &innovations {
                row.extend((1..=q).map(|j| e[t - j]));
            }
            (row, y[t])
        })
        .unzip();
    let fit = ols(&x, &target)?;

    let mut coefficients = fit.coefficients.into_iter();
    let constant = if with_constant {
        coefficients.next().unwrap_or(0.0)
    } else {
        0.0
    };
    let ar: Vec<f64> = coefficients.by_ref().take(p).collect();
    let ma: Vec<f64> = coefficients.take(q).collect();
    Ok((constant, ar, ma))
}

/// Conditional residuals `e_t = y_t - c - sum phi_i y_{t-i} - sum theta_j e_{t-j}`,
/// zero for the first `p` observations.
fn filter_residuals(y: &[f64], constant: f64, ar: &[f64], ma: &[f64]) -> Vec<f64> {
    let p = ar.len();
    let mut e = vec![0.0; y.len()];
    for t in p..y.len() {
        let mut fitted = constant;
        for (i, phi) in ar.iter().enumerate() {
            fitted += phi * y[t - i - 1];
        }
        for (j, theta) in ma.iter().enumerate() {
            if t > j {
                fitted += theta * e[t - j - 1];
            }
        }
        e[t] = y[t] - fitted;
    }
    e
}

/// Pick the differencing order by an ADF test, then the `(p, q)` pair with
/// the lowest AIC. Orders whose fit fails are skipped.
pub fn auto_arima(
    series: &[f64],
    max_p: usize,
    max_q: usize,
    significance: f64,
) -> Result<ArimaModel> {
    let adf = adf_test(series)?;
    let d = if adf.is_stationary(significance) { 0 } else { 1 };

    let mut best: Option<ArimaModel> = None;
    for p in 0..=max_p {
        for q in 0..=max_q {
            let order = ArimaOrder { p, d, q };
            match ArimaModel::fit(series, order) {
                Ok(model) => {
                    debug!(%order, aic = model.aic(), "candidate order");
                    if best.as_ref().map_or(true, |b| model.aic() < b.aic()) {
                        best = Some(model);
                    }
                }
                Err(e) => debug!(%order, error = %e, "skipping order"),
            }
        }
    }

    best.ok_or_else(|| ForecastError::FitError("No ARIMA order could be fitted".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, StandardNormal};

    fn ar1(n: usize, c: f64, phi: f64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(7);
        let mut y = Vec::with_capacity(n);
        let mut prev = c / (1.0 - phi);
        for _ in 0..n {
            let z: f64 = StandardNormal.sample(&mut rng);
            prev = c + phi * prev + z;
            y.push(prev);
        }
        y
    }

    #[test]
    fn test_fit_recovers_ar1() {
        let y = ar1(2000, 0.5, 0.6);
        let model = ArimaModel::fit(&y, ArimaOrder { p: 1, d: 0, q: 0 }).unwrap();
        assert!((model.ar_l1() - 0.6).abs() < 0.05, "phi = {}", model.ar_l1());
        assert!((model.constant() - 0.5).abs() < 0.15);
        assert!((model.sigma2() - 1.0).abs() < 0.1);
    }

    #[test]
    fn test_auto_arima_prefers_ar_over_white_noise() {
        let y = ar1(1500, 0.0, 0.7);
        let model = auto_arima(&y, 3, 3, 0.05).unwrap();
        assert_eq!(model.order().d, 0);
        assert!(model.order().p + model.order().q > 0);
    }

    #[test]
    fn test_white_noise_mean_model() {
        let model = ArimaModel::fit(&[1.0, 2.0, 3.0, 2.0], ArimaOrder { p: 0, d: 0, q: 0 }).unwrap();
        assert_eq!(model.ar_l1(), 0.0);
        assert!((model.constant() - 2.0).abs() < 1e-12);
    }
}
