//! GARCH volatility models with Student-t innovations
//!
//! `sigma2_t = omega + sum_i alpha_i * e_{t-i}^2 + sum_j beta_j * sigma2_{t-j}`
//! with `e_t = r_t - mu`. Parameters are estimated by maximum likelihood
//! using a Nelder-Mead search; pre-sample terms use an exponentially
//! weighted backcast of the squared residuals.

use crate::error::{ForecastError, Result};
use statrs::function::gamma::ln_gamma;
use std::f64::consts::PI;
use tracing::{debug, info};
use trade_math::optimize::NelderMead;
use trade_math::statistics::{mean, variance};

const BACKCAST_DECAY: f64 = 0.94;
const BACKCAST_WINDOW: usize = 75;
const NU_MIN: f64 = 2.05;
const NU_MAX: f64 = 500.0;

/// Fitted GARCH(p, q) model
#[derive(Debug, Clone)]
pub struct GarchModel {
    /// Number of ARCH (squared residual) lags
    p: usize,
    /// Number of GARCH (lagged variance) lags
    q: usize,
    mu: f64,
    omega: f64,
    alpha: Vec<f64>,
    beta: Vec<f64>,
    /// Student-t degrees of freedom
    nu: f64,
    log_likelihood: f64,
    residuals: Vec<f64>,
    conditional_volatility: Vec<f64>,
}

impl GarchModel {
    /// Estimate a GARCH(p, q) on `returns`
    pub fn fit(returns: &[f64], p: usize, q: usize) -> Result<Self> {
        if p == 0 || q == 0 {
            return Err(ForecastError::InvalidParameter(format!(
                "GARCH orders must be positive, got ({}, {})",
                p, q
            )));
        }
        let required = 10 * (p + q + 3);
        if returns.len() < required {
            return Err(ForecastError::InsufficientHistory {
                required,
                available: returns.len(),
            });
        }

        let mu0 = mean(returns).unwrap_or(0.0);
        let var0 = variance(returns, 0).unwrap_or(1.0).max(1e-12);

        let mut start = Vec::with_capacity(p + q + 3);
        start.push(mu0);
        start.push(0.1 * var0);
        start.extend(std::iter::repeat(0.1 / p as f64).take(p));
        start.extend(std::iter::repeat(0.8 / q as f64).take(q));
        start.push(8.0);

        let objective = |theta: &[f64]| {
            let params = GarchParams::unpack(theta, p, q);
            if !params.is_admissible() {
                return f64::INFINITY;
            }
            -params.log_likelihood(returns)
        };

        let optimizer = NelderMead {
            max_iterations: 4000,
            tolerance: 1e-7,
            initial_step: 0.2,
        };
        // A restart from the first optimum tightens the simplex.
        let first = optimizer.minimize(&objective, &start)?;
        let best = optimizer.minimize(&objective, &first.point)?;
        debug!(
            p,
            q,
            iterations = first.iterations + best.iterations,
            converged = best.converged,
            "garch optimisation finished"
        );

        let params = GarchParams::unpack(&best.point, p, q);
        let residuals: Vec<f64> = returns.iter().map(|r| r - params.mu).collect();
        let variances = params.variance_path(&residuals);
        Ok(Self {
            p,
            q,
            mu: params.mu,
            omega: params.omega,
            alpha: params.alpha,
            beta: params.beta,
            nu: params.nu,
            log_likelihood: -best.value,
            residuals,
            conditional_volatility: variances.iter().map(|v| v.sqrt()).collect(),
        })
    }

    /// Fit every `(p, q)` pair from `orders` and keep the lowest AIC.
    ///
    /// Ties keep the earlier pair. Pairs that fail to fit are skipped.
    pub fn select(returns: &[f64], orders: &[usize]) -> Result<Self> {
        let mut best: Option<GarchModel> = None;
        for &p in orders {
            for &q in orders {
                match GarchModel::fit(returns, p, q) {
                    Ok(model) => {
                        debug!(p, q, aic = model.aic(), "garch candidate");
                        if best.as_ref().map_or(true, |b| model.aic() < b.aic()) {
                            best = Some(model);
                        }
                    }
                    Err(e) => debug!(p, q, error = %e, "skipping garch order"),
                }
            }
        }
        let best = best
            .ok_or_else(|| ForecastError::FitError("No GARCH order could be fitted".to_string()))?;
        info!(p = best.p, q = best.q, aic = best.aic(), nu = best.nu, "selected garch order");
        Ok(best)
    }

    pub fn order(&self) -> (usize, usize) {
        (self.p, self.q)
    }

    pub fn mu(&self) -> f64 {
        self.mu
    }

    pub fn omega(&self) -> f64 {
        self.omega
    }

    pub fn alpha(&self) -> &[f64] {
        &self.alpha
    }

    pub fn beta(&self) -> &[f64] {
        &self.beta
    }

    pub fn nu(&self) -> f64 {
        self.nu
    }

    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    /// Number of estimated parameters
    pub fn num_params(&self) -> usize {
        self.p + self.q + 3
    }

    pub fn aic(&self) -> f64 {
        2.0 * self.num_params() as f64 - 2.0 * self.log_likelihood
    }

    /// In-sample residuals `r_t - mu`
    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }

    /// In-sample conditional standard deviations
    pub fn conditional_volatility(&self) -> &[f64] {
        &self.conditional_volatility
    }
}

struct GarchParams {
    mu: f64,
    omega: f64,
    alpha: Vec<f64>,
    beta: Vec<f64>,
    nu: f64,
}

impl GarchParams {
    fn unpack(theta: &[f64], p: usize, q: usize) -> Self {
        Self {
            mu: theta[0],
            omega: theta[1],
            alpha: theta[2..2 + p].to_vec(),
            beta: theta[2 + p..2 + p + q].to_vec(),
            nu: theta[2 + p + q],
        }
    }

    fn is_admissible(&self) -> bool {
        let persistence: f64 = self.alpha.iter().sum::<f64>() + self.beta.iter().sum::<f64>();
        self.omega > 0.0
            && self.alpha.iter().all(|a| *a >= 0.0)
            && self.beta.iter().all(|b| *b >= 0.0)
            && persistence < 1.0
            && self.nu > NU_MIN
            && self.nu < NU_MAX
    }

    fn variance_path(&self, residuals: &[f64]) -> Vec<f64> {
        let backcast = backcast(residuals);
        let mut sigma2 = Vec::with_capacity(residuals.len());
        for t in 0..residuals.len() {
            let mut v = self.omega;
            for (i, a) in self.alpha.iter().enumerate() {
                let e2 = if t > i { residuals[t - i - 1].powi(2) } else { backcast };
                v += a * e2;
            }
            for (j, b) in self.beta.iter().enumerate() {
                let s2 = if t > j { sigma2[t - j - 1] } else { backcast };
                v += b * s2;
            }
            sigma2.push(v);
        }
        sigma2
    }

    fn log_likelihood(&self, returns: &[f64]) -> f64 {
        let residuals: Vec<f64> = returns.iter().map(|r| r - self.mu).collect();
        let sigma2 = self.variance_path(&residuals);
        let nu = self.nu;
        let norm = ln_gamma((nu + 1.0) / 2.0) - ln_gamma(nu / 2.0) - 0.5 * (PI * (nu - 2.0)).ln();
        residuals
            .iter()
            .zip(&sigma2)
            .map(|(e, s2)| {
                norm - 0.5 * s2.ln()
                    - (nu + 1.0) / 2.0 * (1.0 + e * e / (s2 * (nu - 2.0))).ln()
            })
            .sum()
    }
}

/// Exponentially weighted mean of the leading squared residuals
fn backcast(residuals: &[f64]) -> f64 {
    let tau = residuals.len().min(BACKCAST_WINDOW);
    let weights: Vec<f64> = (0..tau).map(|i| BACKCAST_DECAY.powi(i as i32)).collect();
    let total: f64 = weights.iter().sum();
    residuals[..tau]
        .iter()
        .zip(&weights)
        .map(|(e, w)| w * e * e)
        .sum::<f64>()
        / total
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, StandardNormal};

    fn simulate_garch11(n: usize, omega: f64, alpha: f64, beta: f64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(42);
        let mut sigma2 = omega / (1.0 - alpha - beta);
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let z: f64 = StandardNormal.sample(&mut rng);
            let e = sigma2.sqrt() * z;
            out.push(e);
            sigma2 = omega + alpha * e * e + beta * sigma2;
        }
        out
    }

    #[test]
    fn test_fit_garch11_is_admissible() {
        let returns = simulate_garch11(1500, 0.1, 0.1, 0.85);
        let model = GarchModel::fit(&returns, 1, 1).unwrap();
        let persistence = model.alpha()[0] + model.beta()[0];
        assert!(model.omega() > 0.0);
        assert!(persistence < 1.0);
        assert!(persistence > 0.5, "persistence = {}", persistence);
        assert_eq!(model.conditional_volatility().len(), returns.len());
        assert!(model.conditional_volatility().iter().all(|v| *v > 0.0));
    }

    #[test]
    fn test_select_prefers_lower_aic() {
        let returns = simulate_garch11(800, 0.1, 0.1, 0.8);
        let best = GarchModel::select(&returns, &[1, 2]).unwrap();
        for p in [1, 2] {
            for q in [1, 2] {
                if let Ok(m) = GarchModel::fit(&returns, p, q) {
                    assert!(best.aic() <= m.aic() + 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_zero_order_rejected() {
        assert!(GarchModel::fit(&[0.0; 100], 0, 1).is_err());
    }

    #[test]
    fn test_backcast_of_constant_residuals() {
        assert!((backcast(&[2.0; 100]) - 4.0).abs() < 1e-12);
    }
}
