//! Gradient-boosted trees adapter
//!
//! Each row predicts one day's close from technical indicators computed on
//! the closes strictly before that day. The booster learns log prices;
//! hyperparameters come from an exhaustive grid scored by contiguous k-fold
//! mean squared error.
//!
//! Two forecast strategies exist and the choice is a per-ticker allow-list:
//! a static model that recursively feeds its own predictions back into the
//! indicator buffer, and a walk-forward model that refits on a trailing
//! window.

use crate::calendar::business_days_after;
use crate::config::GbtConfig;
use crate::data::{PriceSeries, Ticker};
use crate::error::{ForecastError, Result};
use crate::models::trees::{BoostingParams, GradientBoostedTrees};
use crate::models::{BacktestSeries, ForecastResult, ModelAdapter, ModelFamily, ModelOutput};
use crate::utils::{kfold_ranges, split_index};
use chrono::NaiveDate;
use rayon::prelude::*;
use std::fmt;
use tracing::{debug, info};
use trade_math::moving_averages::{ewm_mean, rolling_mean};
use trade_math::scaling::StandardScaler;
use trade_math::statistics::mean_squared_error;

pub const FEATURE_COLUMNS: [&str; 7] = [
    "EMA_9", "SMA_5", "SMA_10", "SMA_15", "SMA_30", "SMA_50", "Returns",
];
pub const FEATURE_COUNT: usize = FEATURE_COLUMNS.len();

const EMA_SPAN: usize = 9;
const SMA_WINDOWS: [usize; 5] = [5, 10, 15, 30, 50];
/// First row with every indicator defined
const WARM_UP: usize = 50;

/// Indicators for every row of `closes` plus one row past the end.
///
/// Entry `t` only reads `closes[..t]`; entry `closes.len()` describes the
/// next, still unknown day. Rows inside the warm-up are `None`.
pub fn build_features(closes: &[f64]) -> Result<Vec<Option<[f64; FEATURE_COUNT]>>> {
    let ema = ewm_mean(closes, EMA_SPAN)?;
    let smas = SMA_WINDOWS
        .iter()
        .map(|&w| rolling_mean(closes, w))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok((0..=closes.len())
        .map(|t| {
            if t < WARM_UP {
                return None;
            }
            let prev = t - 1;
            let mut row = [0.0; FEATURE_COUNT];
            row[0] = ema[prev];
            for (slot, sma) in row[1..=SMA_WINDOWS.len()].iter_mut().zip(&smas) {
                *slot = sma[prev]?;
            }
            row[FEATURE_COUNT - 1] = closes[prev] / closes[prev - 1] - 1.0;
            Some(row)
        })
        .collect())
}

/// Indicators for the day after `history`
pub fn next_features(history: &[f64]) -> Result<[f64; FEATURE_COUNT]> {
    build_features(history)?
        .pop()
        .flatten()
        .ok_or(ForecastError::InsufficientHistory {
            required: WARM_UP,
            available: history.len(),
        })
}

/// One supervised example
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub features: [f64; FEATURE_COUNT],
    /// Close on `date`
    pub target: f64,
}

fn feature_matrix(rows: &[FeatureRow]) -> Vec<Vec<f64>> {
    rows.iter().map(|r| r.features.to_vec()).collect()
}

fn log_targets(rows: &[FeatureRow]) -> Vec<f64> {
    rows.iter().map(|r| r.target.ln()).collect()
}

/// Scaler and booster trained together on the same rows
#[derive(Debug, Clone)]
pub struct TrainedBooster {
    pub scaler: StandardScaler,
    pub model: GradientBoostedTrees,
}

impl TrainedBooster {
    pub fn train(rows: &[FeatureRow], params: &BoostingParams) -> Result<Self> {
        let x = feature_matrix(rows);
        let scaler = StandardScaler::fit(&x)?;
        let model = GradientBoostedTrees::fit(&scaler.transform(&x)?, &log_targets(rows), params)?;
        Ok(Self { scaler, model })
    }

    /// Price prediction for one feature row
    pub fn predict(&self, features: &[f64]) -> Result<f64> {
        let scaled = self.scaler.transform_row(features)?;
        Ok(self.model.predict_row(&scaled).exp())
    }
}

/// Exhaustive search over `grid`, scored by mean k-fold MSE of the log target.
///
/// Candidates are scored in parallel; ties keep the earlier candidate.
pub fn grid_search(
    x: &[Vec<f64>],
    y: &[f64],
    grid: &[BoostingParams],
    folds: usize,
) -> Result<(BoostingParams, f64)> {
    let ranges = kfold_ranges(y.len(), folds)?;
    let scores: Vec<f64> = grid
        .par_iter()
        .map(|params| -> Result<f64> {
            let mut total = 0.0;
            for range in &ranges {
                let (mut train_x, mut train_y) = (Vec::new(), Vec::new());
                for i in (0..y.len()).filter(|i| !range.contains(i)) {
                    train_x.push(x[i].clone());
                    train_y.push(y[i]);
                }
                let model = GradientBoostedTrees::fit(&train_x, &train_y, params)?;
                let predicted = model.predict(&x[range.clone()]);
                total += mean_squared_error(&y[range.clone()], &predicted)?;
            }
            Ok(total / ranges.len() as f64)
        })
        .collect::<Result<Vec<f64>>>()?;

    let mut best: Option<(usize, f64)> = None;
    for (i, &score) in scores.iter().enumerate() {
        if best.map_or(true, |(_, s)| score < s) {
            best = Some((i, score));
        }
    }
    let (index, score) = best.ok_or_else(|| {
        ForecastError::InvalidParameter("Hyperparameter grid is empty".to_string())
    })?;
    Ok((grid[index], score))
}

/// How a ticker's forecasts are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GbtStrategy {
    /// One fit; predictions feed the indicator buffer
    Static,
    /// Walk-forward refits on a trailing window
    Rolling,
}

impl fmt::Display for GbtStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GbtStrategy::Static => write!(f, "static"),
            GbtStrategy::Rolling => write!(f, "rolling"),
        }
    }
}

/// Fitted rows, split point and the grid-search winner
#[derive(Debug, Clone)]
pub struct GbtFit {
    pub rows: Vec<FeatureRow>,
    pub train_len: usize,
    pub booster: TrainedBooster,
    pub best_params: BoostingParams,
    /// Mean cross-validated MSE of the winner (log scale)
    pub cv_mse: f64,
    closes: Vec<f64>,
    last_date: NaiveDate,
}

impl GbtFit {
    pub fn train_rows(&self) -> &[FeatureRow] {
        &self.rows[..self.train_len]
    }

    pub fn test_rows(&self) -> &[FeatureRow] {
        &self.rows[self.train_len..]
    }
}

/// Forecast plus what the chosen strategy did to produce it
#[derive(Debug, Clone)]
pub struct GbtForecast {
    pub output: ModelOutput,
    pub strategy: GbtStrategy,
    /// Models trained after the initial fit
    pub retrain_count: usize,
}

/// Gradient-boosted trees for one ticker
#[derive(Debug, Clone)]
pub struct GbtAdapter {
    config: GbtConfig,
    ticker: Ticker,
}

impl GbtAdapter {
    pub fn new(config: GbtConfig, ticker: Ticker) -> Self {
        Self { config, ticker }
    }

    pub fn strategy(&self) -> GbtStrategy {
        if self.config.uses_rolling(self.ticker) {
            GbtStrategy::Rolling
        } else {
            GbtStrategy::Static
        }
    }

    /// Backtest and forecast, reporting the strategy and number of refits
    pub fn forecast_detailed(&self, fit: &GbtFit, horizon: usize) -> Result<GbtForecast> {
        if horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "Horizon must be positive".to_string(),
            ));
        }
        let strategy = self.strategy();
        let (backtest, values, retrain_count) = match strategy {
            GbtStrategy::Static => {
                let (backtest, values) = self.forecast_without_rolling(fit, horizon)?;
                (backtest, values, 0)
            }
            GbtStrategy::Rolling => self.forecast_with_rolling(fit, horizon)?,
        };
        info!(
            ticker = %self.ticker,
            %strategy,
            retrain_count,
            horizon,
            "gbt forecast complete"
        );

        Ok(GbtForecast {
            output: ModelOutput {
                forecast: ForecastResult::new(fit.last_date, values, None)?,
                backtest,
                frame: None,
            },
            strategy,
            retrain_count,
        })
    }

    fn backtest(fit: &GbtFit, predicted: Vec<f64>) -> Result<BacktestSeries> {
        let test = fit.test_rows();
        BacktestSeries::new(
            test.iter().map(|r| r.date).collect(),
            predicted,
            test.iter().map(|r| r.target).collect(),
        )
    }

    fn forecast_without_rolling(&self, fit: &GbtFit, horizon: usize) -> Result<(BacktestSeries, Vec<f64>)> {
        let predicted = fit
            .test_rows()
            .iter()
            .map(|r| fit.booster.predict(&r.features))
            .collect::<Result<Vec<f64>>>()?;
        let backtest = Self::backtest(fit, predicted)?;

        let mut buffer = fit.closes.clone();
        let mut values = Vec::with_capacity(horizon);
        for _ in 0..horizon {
            let features = next_features(&buffer)?;
            let value = fit.booster.predict(&features)?;
            buffer.push(value);
            values.push(value);
        }
        Ok((backtest, values))
    }

    fn forecast_with_rolling(&self, fit: &GbtFit, horizon: usize) -> Result<(BacktestSeries, Vec<f64>, usize)> {
        let window = self.config.window_size;
        let mut retrains = 0;

        // Walk-forward over the test rows; refit only when recent error is high.
        let test = fit.test_rows();
        let mut booster = fit.booster.clone();
        let mut predicted = Vec::with_capacity(test.len());
        for (i, row) in test.iter().enumerate() {
            if i > 0 {
                let seen: Vec<f64> = test[..i].iter().map(|r| r.target).collect();
                let mse = mean_squared_error(&seen, &predicted)?;
                if mse > self.config.mse_threshold {
                    let known = &fit.rows[..fit.train_len + i];
                    let start = known.len().saturating_sub(window);
                    booster = TrainedBooster::train(&known[start..], &fit.best_params)?;
                    retrains += 1;
                    debug!(step = i, mse, "retrained on trailing window");
                }
            }
            predicted.push(booster.predict(&row.features)?);
        }
        let backtest = Self::backtest(fit, predicted)?;

        // Horizon: refit every step on the newest rows, predictions included.
        let dates = business_days_after(fit.last_date, horizon);
        let mut rows = fit.rows.clone();
        let mut closes = fit.closes.clone();
        let mut values = Vec::with_capacity(horizon);
        for date in dates {
            let start = rows.len().saturating_sub(window);
            let booster = TrainedBooster::train(&rows[start..], &fit.best_params)?;
            retrains += 1;

            let features = next_features(&closes)?;
            let value = booster.predict(&features)?;
            closes.push(value);
            rows.push(FeatureRow {
                date,
                features,
                target: value,
            });
            values.push(value);
        }
        Ok((backtest, values, retrains))
    }
}

impl ModelAdapter for GbtAdapter {
    type Fitted = GbtFit;

    fn family(&self) -> ModelFamily {
        ModelFamily::Xgboost
    }

    fn fit(&self, series: &PriceSeries) -> Result<GbtFit> {
        let closes = series.closes();
        let dates = series.dates();
        let features = build_features(&closes)?;
        let rows: Vec<FeatureRow> = dates
            .iter()
            .zip(&closes)
            .zip(&features)
            .filter_map(|((&date, &target), &f)| {
                f.map(|features| FeatureRow {
                    date,
                    features,
                    target,
                })
            })
            .collect();

        let train_len = split_index(rows.len(), self.config.train_ratio);
        let min_train = 2 * self.config.cv_folds.max(2);
        if train_len < min_train || train_len == rows.len() {
            return Err(ForecastError::InsufficientHistory {
                required: WARM_UP + min_train + 1,
                available: closes.len(),
            });
        }

        let train = &rows[..train_len];
        let grid: Vec<BoostingParams> = self
            .config
            .grid
            .combinations()
            .into_iter()
            .map(|p| BoostingParams {
                seed: self.config.seed,
                ..p
            })
            .collect();

        let x = feature_matrix(train);
        let scaler = StandardScaler::fit(&x)?;
        let (best_params, cv_mse) = grid_search(
            &scaler.transform(&x)?,
            &log_targets(train),
            &grid,
            self.config.cv_folds,
        )?;
        info!(
            ticker = %self.ticker,
            candidates = grid.len(),
            n_estimators = best_params.n_estimators,
            max_depth = best_params.max_depth,
            learning_rate = best_params.learning_rate,
            cv_mse,
            "grid search finished"
        );
        let booster = TrainedBooster::train(train, &best_params)?;

        Ok(GbtFit {
            rows,
            train_len,
            booster,
            best_params,
            cv_mse,
            closes,
            last_date: series.last_date(),
        })
    }

    fn forecast(&self, fitted: &GbtFit, horizon: usize) -> Result<ModelOutput> {
        Ok(self.forecast_detailed(fitted, horizon)?.output)
    }
}
