//! Metrics for evaluating forecast performance

use crate::error::{ForecastError, Result};
use serde::Serialize;
use trade_math::statistics::{mean_absolute_error, mean_absolute_percentage_error, mean_squared_error};

/// Accuracy of a backtest against realized prices
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastMetrics {
    /// Mean Absolute Error
    pub mae: f64,
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error
    pub mape: f64,
    /// Share of day-over-day moves whose direction was predicted correctly (percent)
    pub direction_accuracy: f64,
}

/// Evaluate forecast accuracy against actual values
pub fn evaluate_forecast(forecast: &[f64], actual: &[f64]) -> Result<ForecastMetrics> {
    if forecast.len() != actual.len() || forecast.is_empty() {
        return Err(ForecastError::ValidationError(
            "Forecast and actual values must have the same non-zero length".to_string(),
        ));
    }

    let mse = mean_squared_error(actual, forecast)?;

    let moves: Vec<bool> = forecast
        .windows(2)
        .zip(actual.windows(2))
        .filter(|(f, a)| (f[1] - f[0]).abs() > 1e-10 && (a[1] - a[0]).abs() > 1e-10)
        .map(|(f, a)| (f[1] > f[0]) == (a[1] > a[0]))
        .collect();
    let direction_accuracy = if moves.is_empty() {
        0.0
    } else {
        moves.iter().filter(|&&hit| hit).count() as f64 / moves.len() as f64 * 100.0
    };

    Ok(ForecastMetrics {
        mae: mean_absolute_error(actual, forecast)?,
        mse,
        rmse: mse.sqrt(),
        mape: mean_absolute_percentage_error(actual, forecast)?,
        direction_accuracy,
    })
}

impl std::fmt::Display for ForecastMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Backtest Accuracy:")?;
        writeln!(f, "  MAE:   {:.4}", self.mae)?;
        writeln!(f, "  MSE:   {:.4}", self.mse)?;
        writeln!(f, "  RMSE:  {:.4}", self.rmse)?;
        writeln!(f, "  MAPE:  {:.4}%", self.mape)?;
        writeln!(f, "  Direction: {:.1}%", self.direction_accuracy)?;
        Ok(())
    }
}
