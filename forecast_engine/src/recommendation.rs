//! Buy/sell timing derived from a forecast
//!
//! The buy leg is always "today at the last close". The sell leg is the
//! first trading day on or after today whose forecast reaches the target
//! price; weekends and U.S. federal holidays are never proposed.

use crate::calendar::is_trading_day;
use crate::data::PriceSeries;
use crate::error::{ForecastError, Result};
use crate::models::{ForecastResult, ModelFamily};
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use tracing::info;

/// Label shown when the target is never reached
pub const UNREACHABLE_LABEL: &str = "Not possible within forecasted period";
/// Price label accompanying [`UNREACHABLE_LABEL`]
pub const NOT_AVAILABLE_LABEL: &str = "N/A";

const DATE_FORMAT: &str = "%B %d, %Y";

/// Outcome of the sell-date scan
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum SellSignal {
    /// First qualifying day and the forecast value on it
    Reachable { date: NaiveDate, forecast_value: f64 },
    /// The target is not met inside the forecast horizon
    Unreachable,
}

/// Trade-timing recommendation for one forecast
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub model: ModelFamily,
    pub buy_date: NaiveDate,
    pub buy_price: f64,
    /// Price that realizes the target earnings
    pub target_price: f64,
    pub sell: SellSignal,
}

impl Recommendation {
    pub fn is_reachable(&self) -> bool {
        matches!(self.sell, SellSignal::Reachable { .. })
    }

    pub fn sell_date(&self) -> Option<NaiveDate> {
        match self.sell {
            SellSignal::Reachable { date, .. } => Some(date),
            SellSignal::Unreachable => None,
        }
    }

    /// Recommended sell price, absent when the target is unreachable
    pub fn sell_price(&self) -> Option<f64> {
        self.is_reachable().then_some(self.target_price)
    }

    pub fn buy_date_label(&self) -> String {
        self.buy_date.format(DATE_FORMAT).to_string()
    }

    pub fn buy_price_label(&self) -> String {
        format!("{:.2}", self.buy_price)
    }

    pub fn sell_date_label(&self) -> String {
        match self.sell_date() {
            Some(date) => date.format(DATE_FORMAT).to_string(),
            None => UNREACHABLE_LABEL.to_string(),
        }
    }

    pub fn sell_price_label(&self) -> String {
        match self.sell_price() {
            Some(price) => format!("{:.2}", price),
            None => NOT_AVAILABLE_LABEL.to_string(),
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Buy on {} at {}", self.buy_date_label(), self.buy_price_label())?;
        write!(f, "Sell on {} at {}", self.sell_date_label(), self.sell_price_label())
    }
}

/// Stateless recommendation rules
#[derive(Debug, Clone, Copy, Default)]
pub struct RecommendationEngine;

impl RecommendationEngine {
    /// Recommend a trade from `forecast` for a gain of `target_pct` percent.
    ///
    /// `today` is the invocation date and becomes the buy date. Ties resolve
    /// to the earliest qualifying day, not the highest forecast.
    pub fn recommend(
        &self,
        series: &PriceSeries,
        model: ModelFamily,
        forecast: &ForecastResult,
        target_pct: f64,
        today: NaiveDate,
    ) -> Result<Recommendation> {
        if !target_pct.is_finite() {
            return Err(ForecastError::InvalidParameter(format!(
                "Target earnings percentage must be finite, got {}",
                target_pct
            )));
        }
        let buy_price = series.last_close();
        let target_price = buy_price * (1.0 + target_pct / 100.0);

        let sell = forecast
            .points()
            .iter()
            .filter(|p| p.date >= today && is_trading_day(p.date))
            .find(|p| p.value >= target_price)
            .map_or(SellSignal::Unreachable, |p| SellSignal::Reachable {
                date: p.date,
                forecast_value: p.value,
            });

        let recommendation = Recommendation {
            model,
            buy_date: today,
            buy_price,
            target_price,
            sell,
        };
        info!(
            %model,
            buy_price,
            target_price,
            sell_date = %recommendation.sell_date_label(),
            "recommendation computed"
        );
        Ok(recommendation)
    }
}
