//! Moving average calculation implementations
//!
//! Contains streaming and batch forms of:
//! - Simple Moving Average (SMA)
//! - Exponential Moving Average (EMA), recursive form seeded with the first value
//!
//! Batch helpers return `None` for positions inside the warm-up window so that
//! callers can drop or blank them instead of mistaking them for zero.

use crate::{MathError, Result};
use std::collections::VecDeque;

/// Simple Moving Average (SMA) implementation
#[derive(Debug, Clone)]
pub struct SimpleMovingAverage {
    period: usize,
    values: VecDeque<f64>,
    sum: f64,
}

impl SimpleMovingAverage {
    /// Create a new Simple Moving Average with the specified period
    pub fn new(period: usize) -> Result<Self> {
        if period == 0 {
            return Err(MathError::InvalidInput(
                "Period must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            period,
            values: VecDeque::with_capacity(period),
            sum: 0.0,
        })
    }

    /// Push a new value into the window
    pub fn update(&mut self, value: f64) {
        self.values.push_back(value);
        self.sum += value;

        if self.values.len() > self.period {
            if let Some(old_value) = self.values.pop_front() {
                self.sum -= old_value;
            }
        }
    }

    /// Current average, `None` until the window is full
    pub fn value(&self) -> Option<f64> {
        if self.values.len() < self.period {
            return None;
        }
        Some(self.sum / self.period as f64)
    }

    /// Get the current period
    pub fn period(&self) -> usize {
        self.period
    }

    /// Reset the SMA, clearing all values
    pub fn reset(&mut self) {
        self.values.clear();
        self.sum = 0.0;
    }
}

/// Exponential Moving Average (EMA) in recursive form.
///
/// The first observation seeds the average, then
/// `ema_t = alpha * x_t + (1 - alpha) * ema_{t-1}` with `alpha = 2 / (span + 1)`.
#[derive(Debug, Clone)]
pub struct ExponentialMovingAverage {
    span: usize,
    alpha: f64,
    current_ema: Option<f64>,
}

impl ExponentialMovingAverage {
    /// Create a new Exponential Moving Average with the specified span
    pub fn new(span: usize) -> Result<Self> {
        if span == 0 {
            return Err(MathError::InvalidInput(
                "Span must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            span,
            alpha: 2.0 / (span as f64 + 1.0),
            current_ema: None,
        })
    }

    /// Update the EMA with a new value
    pub fn update(&mut self, value: f64) {
        self.current_ema = Some(match self.current_ema {
            None => value,
            Some(current) => self.alpha * value + (1.0 - self.alpha) * current,
        });
    }

    /// Current EMA, `None` before the first update
    pub fn value(&self) -> Option<f64> {
        self.current_ema
    }

    /// Get the span
    pub fn span(&self) -> usize {
        self.span
    }

    /// Reset the EMA
    pub fn reset(&mut self) {
        self.current_ema = None;
    }
}

/// Rolling mean over `window` values, `None` while fewer than `window` values are available.
pub fn rolling_mean(values: &[f64], window: usize) -> Result<Vec<Option<f64>>> {
    let mut sma = SimpleMovingAverage::new(window)?;
    Ok(values
        .iter()
        .map(|&v| {
            sma.update(v);
            sma.value()
        })
        .collect())
}

/// Recursive exponential mean over the whole slice.
pub fn ewm_mean(values: &[f64], span: usize) -> Result<Vec<f64>> {
    let mut ema = ExponentialMovingAverage::new(span)?;
    Ok(values
        .iter()
        .map(|&v| {
            ema.update(v);
            ema.value().unwrap_or(v)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sma_calculation() {
        let mut sma = SimpleMovingAverage::new(3).unwrap();

        assert!(sma.value().is_none());

        sma.update(2.0);
        sma.update(4.0);
        assert!(sma.value().is_none());

        sma.update(6.0);
        assert_eq!(sma.value().unwrap(), 4.0);

        // The window slides, dropping the oldest value
        sma.update(8.0);
        assert_eq!(sma.value().unwrap(), 6.0);
    }

    #[test]
    fn test_ema_seeds_with_first_value() {
        let mut ema = ExponentialMovingAverage::new(3).unwrap();
        assert!(ema.value().is_none());

        ema.update(2.0);
        assert_eq!(ema.value().unwrap(), 2.0);

        // alpha = 0.5
        ema.update(4.0);
        assert_relative_eq!(ema.value().unwrap(), 3.0);
        ema.update(6.0);
        assert_relative_eq!(ema.value().unwrap(), 4.5);
    }

    #[test]
    fn test_rolling_mean_warm_up_is_none() {
        let means = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 3).unwrap();
        assert_eq!(means, vec![None, None, Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_ewm_mean_matches_streaming() {
        let values = [10.0, 11.0, 9.5, 12.0, 13.0];
        let batch = ewm_mean(&values, 9).unwrap();
        let mut ema = ExponentialMovingAverage::new(9).unwrap();
        for (i, v) in values.iter().enumerate() {
            ema.update(*v);
            assert_relative_eq!(batch[i], ema.value().unwrap());
        }
    }

    #[test]
    fn test_zero_period_rejected() {
        assert!(SimpleMovingAverage::new(0).is_err());
        assert!(ExponentialMovingAverage::new(0).is_err());
    }
}
