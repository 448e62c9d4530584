//! ARIMA-GARCH adapter
//!
//! Percent returns are split chronologically, an ARIMA mean model and a
//! Student-t GARCH volatility model are fitted on the training part, and
//! price paths are produced by simulating returns forward and compounding
//! them from an anchor price.

use crate::config::ArimaGarchConfig;
use crate::data::PriceSeries;
use crate::error::{ForecastError, Result};
use crate::models::arima::{auto_arima, ArimaModel};
use crate::models::garch::GarchModel;
use crate::models::{BacktestSeries, ForecastResult, ModelAdapter, ModelFamily, ModelOutput};
use crate::returns::{reconstruct_prices, ReturnsSeries};
use crate::utils::train_test_split;
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::collections::VecDeque;
use tracing::info;
use trade_math::statistics::quantile;

/// Significance level for choosing the differencing order of the mean model
const ORDER_SIGNIFICANCE: f64 = 0.05;

/// Recursion coefficients driving the return simulation
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParams {
    /// Mean-equation constant
    pub mu: f64,
    /// Weight on the current shock (the first AR coefficient)
    pub theta: f64,
    pub omega: f64,
    pub alpha: Vec<f64>,
    pub beta: Vec<f64>,
}

/// Volatility state carried between simulation steps, most recent first
#[derive(Debug, Clone, PartialEq)]
pub struct VolatilityState {
    pub shocks: VecDeque<f64>,
    pub sigmas: VecDeque<f64>,
}

impl VolatilityState {
    /// State at the end of the GARCH estimation sample
    pub fn from_garch(garch: &GarchModel) -> Self {
        let (p, q) = garch.order();
        let recent = |values: &[f64], n: usize| -> VecDeque<f64> {
            values.iter().rev().take(n).copied().collect()
        };
        Self {
            shocks: recent(garch.residuals(), p),
            sigmas: recent(garch.conditional_volatility(), q),
        }
    }
}

/// One simulated return path with the volatility used at each step
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedPath {
    pub returns: Vec<f64>,
    pub volatility: Vec<f64>,
}

/// Clipped GARCH-driven return simulator
#[derive(Debug, Clone)]
pub struct ReturnSimulator {
    params: SimulationParams,
    volatility_floor: f64,
    volatility_cap: f64,
    return_clip: f64,
}

impl ReturnSimulator {
    pub fn new(params: SimulationParams, config: &ArimaGarchConfig) -> Self {
        Self {
            params,
            volatility_floor: config.volatility_floor,
            volatility_cap: config.volatility_cap,
            return_clip: config.return_clip,
        }
    }

    /// Simulator built from a fitted mean and volatility model
    pub fn from_models(arima: &ArimaModel, garch: &GarchModel, config: &ArimaGarchConfig) -> Self {
        Self::new(
            SimulationParams {
                mu: arima.constant(),
                theta: arima.ar_l1(),
                omega: garch.omega(),
                alpha: garch.alpha().to_vec(),
                beta: garch.beta().to_vec(),
            },
            config,
        )
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    /// Simulate `steps` returns starting from `state`.
    ///
    /// Each step draws a shock from the current volatility, updates the
    /// volatility through the GARCH recursion, draws the forecast shock and
    /// combines both through the mean equation. Volatility and returns are
    /// clipped every step.
    pub fn simulate<R: Rng>(&self, steps: usize, state: &VolatilityState, rng: &mut R) -> SimulatedPath {
        let p = self.params.alpha.len();
        let q = self.params.beta.len();
        let mut shocks = state.shocks.clone();
        let mut sigmas = state.sigmas.clone();
        let mut returns = Vec::with_capacity(steps);
        let mut volatility = Vec::with_capacity(steps);

        for _ in 0..steps {
            let sigma_t = sigmas.front().copied().unwrap_or(self.volatility_floor);
            let z_t: f64 = rng.sample(StandardNormal);
            let epsilon_t = sigma_t * z_t;
            shocks.push_front(epsilon_t);
            shocks.truncate(p);

            let mut variance = self.params.omega;
            for (a, e) in self.params.alpha.iter().zip(&shocks) {
                variance += a * e * e;
            }
            for (b, s) in self.params.beta.iter().zip(&sigmas) {
                variance += b * s * s;
            }
            let sigma_f = clip(variance.max(0.0).sqrt(), self.volatility_floor, self.volatility_cap);

            let z_f: f64 = rng.sample(StandardNormal);
            let epsilon_f = sigma_f * z_f;
            let r = self.params.mu + epsilon_f + self.params.theta * epsilon_t;
            returns.push(clip(r, -self.return_clip, self.return_clip));
            volatility.push(sigma_f);

            sigmas.push_front(sigma_f);
            sigmas.truncate(q.max(1));
        }

        SimulatedPath {
            returns,
            volatility,
        }
    }
}

/// `value` limited to `[low, high]`; NaN maps to `low`
fn clip(value: f64, low: f64, high: f64) -> f64 {
    if value.is_nan() {
        low
    } else {
        value.max(low).min(high)
    }
}

/// Fitted ARIMA-GARCH bundle
#[derive(Debug, Clone)]
pub struct ArimaGarchFit {
    pub arima: ArimaModel,
    pub garch: GarchModel,
    /// Percent returns used for estimation
    pub train_returns: Vec<f64>,
    /// Held-out percent returns
    pub test_returns: Vec<f64>,
    dates: Vec<NaiveDate>,
    closes: Vec<f64>,
}

impl ArimaGarchFit {
    /// Price the backtest path is compounded from: the close ending the training returns
    pub fn backtest_anchor(&self) -> f64 {
        self.closes[self.train_returns.len()]
    }

    pub fn last_close(&self) -> f64 {
        self.closes[self.closes.len() - 1]
    }

    pub fn last_date(&self) -> NaiveDate {
        self.dates[self.dates.len() - 1]
    }
}

/// ARIMA-GARCH model family
#[derive(Debug, Clone, Default)]
pub struct ArimaGarchAdapter {
    config: ArimaGarchConfig,
}

impl ArimaGarchAdapter {
    pub fn new(config: ArimaGarchConfig) -> Self {
        Self { config }
    }

    /// Percentile bounds over independent simulated price paths, widened to
    /// enclose `point`
    fn interval_bounds(
        &self,
        simulator: &ReturnSimulator,
        state: &VolatilityState,
        anchor: f64,
        point: &[f64],
    ) -> Result<Vec<(f64, f64)>> {
        let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(1));
        let paths: Vec<Vec<f64>> = (0..self.config.interval_paths)
            .map(|_| reconstruct_prices(anchor, &simulator.simulate(point.len(), state, &mut rng).returns))
            .collect();

        let tail = (1.0 - self.config.interval_width) / 2.0;
        point
            .iter()
            .enumerate()
            .map(|(k, &value)| {
                if paths.is_empty() {
                    return Ok((value, value));
                }
                let step: Vec<f64> = paths.iter().map(|p| p[k]).collect();
                let lower = quantile(&step, tail)?;
                let upper = quantile(&step, 1.0 - tail)?;
                Ok((lower.min(value), upper.max(value)))
            })
            .collect()
    }
}

impl ModelAdapter for ArimaGarchAdapter {
    type Fitted = ArimaGarchFit;

    fn family(&self) -> ModelFamily {
        ModelFamily::ArimaGarch
    }

    fn fit(&self, series: &PriceSeries) -> Result<ArimaGarchFit> {
        series.require(100)?;
        let returns = ReturnsSeries::from_prices(series, 100.0);
        let (train, test) = train_test_split(&returns.values, self.config.train_ratio)?;

        let arima = auto_arima(
            train,
            self.config.max_ar_order,
            self.config.max_ma_order,
            ORDER_SIGNIFICANCE,
        )?;
        info!(
            order = %arima.order(),
            constant = arima.constant(),
            ar_l1 = arima.ar_l1(),
            aic = arima.aic(),
            "selected mean model"
        );
        let garch = GarchModel::select(train, &self.config.garch_orders)?;

        Ok(ArimaGarchFit {
            arima,
            garch,
            train_returns: train.to_vec(),
            test_returns: test.to_vec(),
            dates: series.dates(),
            closes: series.closes(),
        })
    }

    fn forecast(&self, fitted: &ArimaGarchFit, horizon: usize) -> Result<ModelOutput> {
        if horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "Horizon must be positive".to_string(),
            ));
        }
        let simulator = ReturnSimulator::from_models(&fitted.arima, &fitted.garch, &self.config);
        let state = VolatilityState::from_garch(&fitted.garch);
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        // Backtest over the held-out returns, then the forward horizon, from one stream.
        let test_len = fitted.test_returns.len();
        let backtest_path = simulator.simulate(test_len, &state, &mut rng);
        let predicted = reconstruct_prices(fitted.backtest_anchor(), &backtest_path.returns);
        let first_test = fitted.train_returns.len() + 1;
        let backtest = BacktestSeries::new(
            fitted.dates[first_test..].to_vec(),
            predicted,
            fitted.closes[first_test..].to_vec(),
        )?;

        let forward_path = simulator.simulate(horizon, &state, &mut rng);
        let point = reconstruct_prices(fitted.last_close(), &forward_path.returns);
        let bounds = self.interval_bounds(&simulator, &state, fitted.last_close(), &point)?;
        let forecast = ForecastResult::new(fitted.last_date(), point, Some(bounds))?;

        Ok(ModelOutput {
            forecast,
            backtest,
            frame: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn explosive_simulator() -> ReturnSimulator {
        ReturnSimulator::new(
            SimulationParams {
                mu: 0.5,
                theta: 3.0,
                omega: 50.0,
                alpha: vec![0.9, 0.5],
                beta: vec![0.9],
            },
            &ArimaGarchConfig::default(),
        )
    }

    #[test]
    fn test_simulation_respects_clip_bounds() {
        let state = VolatilityState {
            shocks: VecDeque::from(vec![20.0, -20.0]),
            sigmas: VecDeque::from(vec![9.0]),
        };
        let mut rng = StdRng::seed_from_u64(1);
        let path = explosive_simulator().simulate(500, &state, &mut rng);
        assert_eq!(path.returns.len(), 500);
        assert!(path.volatility.iter().all(|v| (1e-8..=10.0).contains(v)));
        assert!(path.returns.iter().all(|r| (-10.0..=10.0).contains(r)));
    }

    #[test]
    fn test_simulation_is_seeded() {
        let state = VolatilityState {
            shocks: VecDeque::from(vec![0.1]),
            sigmas: VecDeque::from(vec![1.0]),
        };
        let sim = ReturnSimulator::new(
            SimulationParams {
                mu: 0.0,
                theta: 0.1,
                omega: 0.05,
                alpha: vec![0.1],
                beta: vec![0.85],
            },
            &ArimaGarchConfig::default(),
        );
        let a = sim.simulate(20, &state, &mut StdRng::seed_from_u64(42));
        let b = sim.simulate(20, &state, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_clip_maps_nan_to_floor() {
        assert_eq!(clip(f64::NAN, 1e-8, 10.0), 1e-8);
        assert_eq!(clip(11.0, 1e-8, 10.0), 10.0);
    }
}
