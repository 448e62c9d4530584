//! Returns transforms and chart overlays derived from a price series

use crate::data::PriceSeries;
use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use serde::Serialize;
use trade_math::moving_averages::rolling_mean;

/// Dated percentage returns, one per price after the first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnsSeries {
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

impl ReturnsSeries {
    /// Percentage change of close, multiplied by `scale`
    pub fn from_prices(series: &PriceSeries, scale: f64) -> Self {
        let dates = series.dates().into_iter().skip(1).collect();
        let values = calculate_returns(&series.closes())
            .into_iter()
            .map(|r| r * scale)
            .collect();
        Self { dates, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Simple returns `p[t] / p[t-1] - 1`
pub fn calculate_returns(prices: &[f64]) -> Vec<f64> {
    if prices.len() < 2 {
        return Vec::new();
    }
    prices.windows(2).map(|w| (w[1] / w[0]) - 1.0).collect()
}

/// First differences
pub fn difference(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Rebuild levels from `anchor` by cumulative re-addition of `diffs`
pub fn undifference(anchor: f64, diffs: &[f64]) -> Vec<f64> {
    diffs
        .iter()
        .scan(anchor, |level, d| {
            *level += d;
            Some(*level)
        })
        .collect()
}

/// Price path `anchor * exp(cumsum(returns) / 100)` from percent returns
pub fn reconstruct_prices(anchor: f64, returns_pct: &[f64]) -> Vec<f64> {
    returns_pct
        .iter()
        .scan(0.0, |acc, r| {
            *acc += r;
            Some(anchor * (*acc / 100.0).exp())
        })
        .collect()
}

/// Inverse of [`reconstruct_prices`]: `100 * ln(p[t] / p[t-1])` with `p[-1] = anchor`
pub fn log_returns_pct(anchor: f64, prices: &[f64]) -> Vec<f64> {
    std::iter::once(anchor)
        .chain(prices.iter().copied())
        .collect::<Vec<_>>()
        .windows(2)
        .map(|w| 100.0 * (w[1] / w[0]).ln())
        .collect()
}

/// Moving averages and axis range drawn alongside a forecast
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartOverlays {
    /// 50-day moving average of close, `None` during warm-up
    pub ma50: Vec<Option<f64>>,
    /// 200-day moving average of close, `None` during warm-up
    pub ma200: Vec<Option<f64>>,
    /// `(min * 0.9` floored at zero`, max * 1.1)` over the plotted values
    pub price_range: (f64, f64),
}

impl ChartOverlays {
    /// Overlays for `series`, with the range also covering `forecast` values
    pub fn compute(series: &PriceSeries, forecast: &[f64]) -> Result<Self> {
        let closes = series.closes();
        let mut plotted = closes.clone();
        plotted.extend_from_slice(forecast);
        Ok(Self {
            ma50: rolling_mean(&closes, 50)?,
            ma200: rolling_mean(&closes, 200)?,
            price_range: price_range(&plotted)?,
        })
    }
}

/// Chart axis range for `values`
pub fn price_range(values: &[f64]) -> Result<(f64, f64)> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return Err(ForecastError::DataError(
            "Cannot compute a price range without finite values".to_string(),
        ));
    }
    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Ok(((min * 0.9).max(0.0), max * 1.1))
}
