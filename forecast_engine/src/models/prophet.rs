//! Prophet-style additive decomposition
//!
//! `y(t) = trend(t) + seasonality(t) + noise`, where the trend is piecewise
//! linear with potential changepoints spread over the first part of the
//! history and each seasonality is a truncated Fourier series. Coefficients
//! are the MAP estimate under Gaussian priors, computed as a ridge
//! regression on the max-abs scaled series. Intervals come from simulating
//! future trend changes plus observation noise.

use crate::calendar::business_days_after;
use crate::config::ProphetConfig;
use crate::data::PriceSeries;
use crate::error::{ForecastError, Result};
use crate::models::{BacktestSeries, ForecastResult, ModelAdapter, ModelFamily, ModelOutput};
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Poisson, StandardNormal};
use serde::Serialize;
use std::f64::consts::PI;
use tracing::{debug, info};
use trade_math::regression::ridge;
use trade_math::statistics::quantile;

/// Prior scale of the base growth rate and offset
const TREND_PRIOR_SCALE: f64 = 5.0;
const MIN_HISTORY: usize = 30;
const PENALTY_FLOOR: f64 = 1e-8;

/// One Fourier seasonality component
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Seasonality {
    pub name: &'static str,
    /// Period in days
    pub period: f64,
    /// Number of sine/cosine pairs
    pub order: usize,
}

impl Seasonality {
    pub const YEARLY: Seasonality = Seasonality {
        name: "yearly",
        period: 365.25,
        order: 10,
    };
    pub const WEEKLY: Seasonality = Seasonality {
        name: "weekly",
        period: 7.0,
        order: 3,
    };
    pub const DAILY: Seasonality = Seasonality {
        name: "daily",
        period: 1.0,
        order: 4,
    };

    /// `[sin(2 pi n d / P), cos(2 pi n d / P)]` for `n = 1..=order`
    fn features(&self, days: f64, out: &mut Vec<f64>) {
        for n in 1..=self.order {
            let x = 2.0 * PI * n as f64 * days / self.period;
            out.push(x.sin());
            out.push(x.cos());
        }
    }
}

/// One row of the history-plus-horizon frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameRow {
    pub date: NaiveDate,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
    pub trend: f64,
    /// Observed close, `None` for future rows
    pub actual: Option<f64>,
}

/// Fitted values over the history followed by the forecast rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProphetFrame {
    pub rows: Vec<FrameRow>,
    pub history_len: usize,
}

impl ProphetFrame {
    pub fn history_rows(&self) -> &[FrameRow] {
        &self.rows[..self.history_len]
    }

    pub fn future_rows(&self) -> &[FrameRow] {
        &self.rows[self.history_len..]
    }
}

/// MAP parameters of the decomposition
#[derive(Debug, Clone)]
pub struct ProphetFit {
    dates: Vec<NaiveDate>,
    closes: Vec<f64>,
    first_day: NaiveDate,
    /// Span of the history in days; maps dates onto `t in [0, 1]`
    span_days: f64,
    y_scale: f64,
    changepoints: Vec<f64>,
    seasonalities: Vec<Seasonality>,
    /// `[offset, rate, deltas..., seasonal betas...]`
    coefficients: Vec<f64>,
    /// Residual standard deviation on the scaled series
    sigma: f64,
}

impl ProphetFit {
    pub fn changepoints(&self) -> &[f64] {
        &self.changepoints
    }

    pub fn seasonalities(&self) -> &[Seasonality] {
        &self.seasonalities
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    fn scaled_time(&self, date: NaiveDate) -> f64 {
        (date - self.first_day).num_days() as f64 / self.span_days
    }

    fn deltas(&self) -> &[f64] {
        &self.coefficients[2..2 + self.changepoints.len()]
    }

    /// Trend on the scaled series
    fn trend_at(&self, t: f64) -> f64 {
        let mut value = self.coefficients[0] + self.coefficients[1] * t;
        for (s, d) in self.changepoints.iter().zip(self.deltas()) {
            value += d * (t - s).max(0.0);
        }
        value
    }

    /// Seasonal component on the scaled series
    fn seasonal_at(&self, date: NaiveDate) -> f64 {
        let mut features = Vec::new();
        let days = days_since_epoch(date);
        for s in &self.seasonalities {
            s.features(days, &mut features);
        }
        let offset = 2 + self.changepoints.len();
        features
            .iter()
            .zip(&self.coefficients[offset..])
            .map(|(x, b)| x * b)
            .sum()
    }
}

fn days_since_epoch(date: NaiveDate) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    (date - epoch).num_days() as f64
}

/// Prophet model family
#[derive(Debug, Clone, Default)]
pub struct ProphetAdapter {
    config: ProphetConfig,
}

impl ProphetAdapter {
    pub fn new(config: ProphetConfig) -> Self {
        Self { config }
    }

    fn active_seasonalities(&self, span_days: f64) -> Vec<Seasonality> {
        let mut out = Vec::new();
        if self.config.yearly_seasonality && span_days >= 2.0 * 365.0 {
            out.push(Seasonality::YEARLY);
        }
        if self.config.weekly_seasonality && span_days >= 14.0 {
            out.push(Seasonality::WEEKLY);
        }
        if self.config.daily_seasonality {
            out.push(Seasonality::DAILY);
        }
        out
    }

    /// Changepoint locations: evenly spaced history rows within the leading
    /// `changepoint_range` share, excluding the first row
    fn changepoint_times(&self, t: &[f64]) -> Vec<f64> {
        let hist = ((t.len() as f64) * self.config.changepoint_range).floor() as usize;
        let n_cp = self.config.n_changepoints.min(hist.saturating_sub(1));
        if n_cp == 0 {
            return Vec::new();
        }
        let mut idx: Vec<usize> = (0..=n_cp)
            .map(|i| ((hist - 1) as f64 * i as f64 / n_cp as f64).round() as usize)
            .skip(1)
            .collect();
        idx.dedup();
        idx.into_iter().map(|i| t[i]).collect()
    }

    fn design_row(
        t: f64,
        date: NaiveDate,
        changepoints: &[f64],
        seasonalities: &[Seasonality],
    ) -> Vec<f64> {
        let mut row = Vec::with_capacity(2 + changepoints.len() + 2 * 17);
        row.push(1.0);
        row.push(t);
        row.extend(changepoints.iter().map(|s| (t - s).max(0.0)));
        let days = days_since_epoch(date);
        for s in seasonalities {
            s.features(days, &mut row);
        }
        row
    }

    /// Per-coefficient ridge penalties for noise variance `sigma2`
    fn penalties(&self, n_changepoints: usize, n_seasonal: usize, sigma2: f64) -> Vec<f64> {
        let trend = sigma2 / TREND_PRIOR_SCALE.powi(2);
        // Laplace prior on deltas, matched by variance 2 * tau^2
        let delta = sigma2 / (2.0 * self.config.changepoint_prior_scale.powi(2));
        let seasonal = sigma2 / self.config.seasonality_prior_scale.powi(2);
        let mut p = vec![trend, trend];
        p.extend(std::iter::repeat(delta).take(n_changepoints));
        p.extend(std::iter::repeat(seasonal).take(n_seasonal));
        // Daily terms are constant on daily data; the floor keeps the system solvable.
        p.into_iter().map(|v| v.max(PENALTY_FLOOR)).collect()
    }

    /// Build the history-plus-horizon frame with sampled uncertainty
    pub fn predict_frame(&self, fit: &ProphetFit, horizon: usize) -> Result<ProphetFrame> {
        let last = fit.dates[fit.dates.len() - 1];
        let future = business_days_after(last, horizon);
        let history_len = fit.dates.len();
        let all_dates: Vec<NaiveDate> = fit.dates.iter().copied().chain(future).collect();

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let samples = self.config.uncertainty_samples.max(1);
        let tail = (1.0 - self.config.interval_width) / 2.0;

        let mean_abs_delta = {
            let d = fit.deltas();
            if d.is_empty() {
                0.0
            } else {
                d.iter().map(|x| x.abs()).sum::<f64>() / d.len() as f64
            }
        };
        let t_end = fit.scaled_time(all_dates[all_dates.len() - 1]);

        // Trend paths: each sample draws its own future changepoints.
        let future_changes: Vec<Vec<(f64, f64)>> = (0..samples)
            .map(|_| sample_future_changepoints(&mut rng, fit.changepoints.len(), t_end, mean_abs_delta))
            .collect::<Result<_>>()?;

        let mut rows = Vec::with_capacity(all_dates.len());
        for (i, &date) in all_dates.iter().enumerate() {
            let t = fit.scaled_time(date);
            let trend = fit.trend_at(t);
            let seasonal = fit.seasonal_at(date);
            let yhat = trend + seasonal;

            let draws: Vec<f64> = future_changes
                .iter()
                .map(|changes| {
                    let shift: f64 = changes.iter().map(|(s, d)| d * (t - s).max(0.0)).sum();
                    let noise: f64 = rng.sample(StandardNormal);
                    yhat + shift + fit.sigma * noise
                })
                .collect();
            let lower = quantile(&draws, tail)?;
            let upper = quantile(&draws, 1.0 - tail)?;

            let scale = fit.y_scale;
            rows.push(FrameRow {
                date,
                yhat: yhat * scale,
                yhat_lower: lower.min(yhat) * scale,
                yhat_upper: upper.max(yhat) * scale,
                trend: trend * scale,
                actual: fit.closes.get(i).copied(),
            });
        }
        Ok(ProphetFrame { rows, history_len })
    }
}

/// Future changepoints `(location, delta)` beyond `t = 1`, at the historical
/// rate, with Laplace-distributed deltas
fn sample_future_changepoints<R: Rng>(
    rng: &mut R,
    n_changepoints: usize,
    t_end: f64,
    scale: f64,
) -> Result<Vec<(f64, f64)>> {
    let span = t_end - 1.0;
    if span <= 0.0 || n_changepoints == 0 || scale <= 0.0 {
        return Ok(Vec::new());
    }
    let poisson = Poisson::new(n_changepoints as f64 * span)
        .map_err(|e| ForecastError::FitError(format!("invalid changepoint rate: {}", e)))?;
    let count = poisson.sample(rng) as usize;
    Ok((0..count)
        .map(|_| {
            let location = 1.0 + rng.gen::<f64>() * span;
            let u: f64 = rng.gen::<f64>() - 0.5;
            let delta = -scale * u.signum() * (1.0 - 2.0 * u.abs()).max(f64::MIN_POSITIVE).ln();
            (location, delta)
        })
        .collect())
}

impl ModelAdapter for ProphetAdapter {
    type Fitted = ProphetFit;

    fn family(&self) -> ModelFamily {
        ModelFamily::Prophet
    }

    fn fit(&self, series: &PriceSeries) -> Result<ProphetFit> {
        series.require(MIN_HISTORY)?;
        let dates = series.dates();
        let closes = series.closes();

        let first_day = dates[0];
        let span_days = (dates[dates.len() - 1] - first_day).num_days() as f64;
        let y_scale = closes.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        if span_days <= 0.0 || y_scale <= 0.0 {
            return Err(ForecastError::DataError(
                "Series must span more than one day with a non-zero level".to_string(),
            ));
        }

        let t: Vec<f64> = dates
            .iter()
            .map(|d| (*d - first_day).num_days() as f64 / span_days)
            .collect();
        let y: Vec<f64> = closes.iter().map(|c| c / y_scale).collect();

        let changepoints = self.changepoint_times(&t);
        let seasonalities = self.active_seasonalities(span_days);
        let n_seasonal: usize = seasonalities.iter().map(|s| 2 * s.order).sum();
        let x: Vec<Vec<f64>> = t
            .iter()
            .zip(&dates)
            .map(|(&ti, &d)| Self::design_row(ti, d, &changepoints, &seasonalities))
            .collect();

        // Two passes: the penalties depend on the noise level the first pass estimates.
        let mut sigma2 = trade_math::statistics::variance(&y, 0).unwrap_or(1.0).max(1e-6) * 0.1;
        let mut coefficients = Vec::new();
        for pass in 0..2 {
            let penalties = self.penalties(changepoints.len(), n_seasonal, sigma2);
            coefficients = ridge(&x, &y, &penalties)?;
            let ssr: f64 = x
                .iter()
                .zip(&y)
                .map(|(row, yi)| {
                    let fitted: f64 = row.iter().zip(&coefficients).map(|(a, b)| a * b).sum();
                    (yi - fitted).powi(2)
                })
                .sum();
            sigma2 = (ssr / y.len() as f64).max(1e-12);
            debug!(pass, sigma = sigma2.sqrt(), "prophet fit pass");
        }

        info!(
            changepoints = changepoints.len(),
            seasonalities = ?seasonalities.iter().map(|s| s.name).collect::<Vec<_>>(),
            sigma = sigma2.sqrt() * y_scale,
            "fitted prophet decomposition"
        );

        Ok(ProphetFit {
            dates,
            closes,
            first_day,
            span_days,
            y_scale,
            changepoints,
            seasonalities,
            coefficients,
            sigma: sigma2.sqrt(),
        })
    }

    fn forecast(&self, fitted: &ProphetFit, horizon: usize) -> Result<ModelOutput> {
        if horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "Horizon must be positive".to_string(),
            ));
        }
        let frame = self.predict_frame(fitted, horizon)?;

        let history = frame.history_rows();
        let backtest = BacktestSeries::new(
            history.iter().map(|r| r.date).collect(),
            history.iter().map(|r| r.yhat).collect(),
            fitted.closes.clone(),
        )?;

        let future = frame.future_rows();
        let forecast = ForecastResult::new(
            fitted.dates[fitted.dates.len() - 1],
            future.iter().map(|r| r.yhat).collect(),
            Some(future.iter().map(|r| (r.yhat_lower, r.yhat_upper)).collect()),
        )?;

        Ok(ModelOutput {
            forecast,
            backtest,
            frame: Some(frame),
        })
    }
}
