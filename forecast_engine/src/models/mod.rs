//! Forecasting model families and their shared result types

use crate::calendar::business_days_after;
use crate::data::PriceSeries;
use crate::error::{ForecastError, Result};
use crate::metrics::{evaluate_forecast, ForecastMetrics};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::str::FromStr;

pub mod arima;
pub mod arima_garch;
pub mod garch;
pub mod gbt;
pub mod lstm;
pub mod prophet;
pub mod trees;

/// The closed set of forecasting families a request can choose from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelFamily {
    ArimaGarch,
    Prophet,
    Lstm,
    Xgboost,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 4] = [
        ModelFamily::ArimaGarch,
        ModelFamily::Prophet,
        ModelFamily::Lstm,
        ModelFamily::Xgboost,
    ];

    /// Label shown in the model selector
    pub fn label(&self) -> &'static str {
        match self {
            ModelFamily::ArimaGarch => "ARIMA-GARCH",
            ModelFamily::Prophet => "Prophet",
            ModelFamily::Lstm => "LSTM",
            ModelFamily::Xgboost => "XGBoost",
        }
    }

    /// Whether forecasts from this family carry lower/upper bounds
    pub fn has_intervals(&self) -> bool {
        matches!(self, ModelFamily::ArimaGarch | ModelFamily::Prophet)
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ModelFamily {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "arimagarch" => Ok(ModelFamily::ArimaGarch),
            "prophet" => Ok(ModelFamily::Prophet),
            "lstm" => Ok(ModelFamily::Lstm),
            "xgboost" | "gbt" => Ok(ModelFamily::Xgboost),
            _ => Err(ForecastError::InvalidParameter(format!(
                "Unknown model family: {}",
                s
            ))),
        }
    }
}

/// One forecasted business day
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub value: f64,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

/// Forward forecast covering exactly `horizon` business days after the last
/// historical observation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResult {
    points: Vec<ForecastPoint>,
}

impl ForecastResult {
    /// Attach business-day dates to `values` (and optional `(lower, upper)` bounds)
    pub fn new(
        last_date: NaiveDate,
        values: Vec<f64>,
        bounds: Option<Vec<(f64, f64)>>,
    ) -> Result<Self> {
        if values.is_empty() {
            return Err(ForecastError::ValidationError(
                "Forecast must cover at least one day".to_string(),
            ));
        }
        if let Some(b) = &bounds {
            if b.len() != values.len() {
                return Err(ForecastError::ValidationError(format!(
                    "Values length ({}) doesn't match intervals length ({})",
                    values.len(),
                    b.len()
                )));
            }
        }
        if let Some(bad) = values.iter().position(|v| !v.is_finite()) {
            return Err(ForecastError::ValidationError(format!(
                "Forecast value at step {} is not finite",
                bad + 1
            )));
        }

        let dates = business_days_after(last_date, values.len());
        let points = dates
            .into_iter()
            .zip(values)
            .enumerate()
            .map(|(i, (date, value))| {
                let (lower, upper) = match &bounds {
                    Some(b) => (Some(b[i].0), Some(b[i].1)),
                    None => (None, None),
                };
                ForecastPoint {
                    date,
                    value,
                    lower,
                    upper,
                }
            })
            .collect::<Vec<_>>();

        for p in &points {
            if let (Some(lo), Some(hi)) = (p.lower, p.upper) {
                if !(lo <= p.value && p.value <= hi) {
                    return Err(ForecastError::ValidationError(format!(
                        "Interval [{}, {}] on {} does not enclose {}",
                        lo, hi, p.date, p.value
                    )));
                }
            }
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[ForecastPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of business days covered
    pub fn horizon(&self) -> usize {
        self.points.len()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn has_intervals(&self) -> bool {
        self.points.iter().all(|p| p.lower.is_some() && p.upper.is_some())
    }
}

/// Model predictions over a stretch of known history, for display and scoring
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestSeries {
    pub dates: Vec<NaiveDate>,
    pub predicted: Vec<f64>,
    pub actual: Vec<f64>,
}

impl BacktestSeries {
    pub fn new(dates: Vec<NaiveDate>, predicted: Vec<f64>, actual: Vec<f64>) -> Result<Self> {
        if dates.len() != predicted.len() || dates.len() != actual.len() {
            return Err(ForecastError::ValidationError(format!(
                "Backtest lengths differ: {} dates, {} predictions, {} actuals",
                dates.len(),
                predicted.len(),
                actual.len()
            )));
        }
        Ok(Self {
            dates,
            predicted,
            actual,
        })
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Accuracy against the realized prices
    pub fn metrics(&self) -> Result<ForecastMetrics> {
        evaluate_forecast(&self.predicted, &self.actual)
    }
}

/// Everything one model family produces for a request
#[derive(Debug, Clone)]
pub struct ModelOutput {
    pub forecast: ForecastResult,
    pub backtest: BacktestSeries,
    /// Full history-plus-horizon frame (Prophet only)
    pub frame: Option<prophet::ProphetFrame>,
}

/// A forecasting family: fit on a price series, then forecast forward.
///
/// Fitted state is owned by the caller for the duration of one request.
pub trait ModelAdapter {
    /// The fitted parameter bundle
    type Fitted: Debug;

    fn family(&self) -> ModelFamily;

    /// Fit on the whole series
    fn fit(&self, series: &PriceSeries) -> Result<Self::Fitted>;

    /// Backtest and forecast `horizon` business days past the series end
    fn forecast(&self, fitted: &Self::Fitted, horizon: usize) -> Result<ModelOutput>;
}
