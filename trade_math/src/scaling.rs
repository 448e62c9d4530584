//! Feature scalers
//!
//! - `MinMaxScaler` maps a single series onto a target range
//! - `StandardScaler` centres and scales each column of a feature matrix

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Min-max scaler for a single series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    /// Target range `(low, high)`
    pub feature_range: (f64, f64),
    /// Minimum seen while fitting
    pub data_min: Option<f64>,
    /// Maximum seen while fitting
    pub data_max: Option<f64>,
}

impl Default for MinMaxScaler {
    fn default() -> Self {
        Self {
            feature_range: (0.0, 1.0),
            data_min: None,
            data_max: None,
        }
    }
}

impl MinMaxScaler {
    /// Create an unfitted scaler for the given range
    pub fn new(low: f64, high: f64) -> Result<Self> {
        if low >= high {
            return Err(MathError::InvalidInput(format!(
                "Feature range low ({}) must be below high ({})",
                low, high
            )));
        }
        Ok(Self {
            feature_range: (low, high),
            data_min: None,
            data_max: None,
        })
    }

    /// Learn the data range
    pub fn fit(&mut self, values: &[f64]) -> Result<()> {
        if values.is_empty() {
            return Err(MathError::InsufficientData(
                "Cannot fit a scaler on an empty series".to_string(),
            ));
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        self.data_min = Some(min);
        self.data_max = Some(max);
        Ok(())
    }

    /// Fit then transform in one pass
    pub fn fit_transform(&mut self, values: &[f64]) -> Result<Vec<f64>> {
        self.fit(values)?;
        self.transform(values)
    }

    /// Scale a single value
    pub fn scale_value(&self, value: f64) -> Result<f64> {
        let (min, span) = self.params()?;
        let (low, high) = self.feature_range;
        Ok(low + (value - min) / span * (high - low))
    }

    /// Undo `scale_value`
    pub fn inverse_value(&self, scaled: f64) -> Result<f64> {
        let (min, span) = self.params()?;
        let (low, high) = self.feature_range;
        Ok(min + (scaled - low) / (high - low) * span)
    }

    /// Scale a series
    pub fn transform(&self, values: &[f64]) -> Result<Vec<f64>> {
        values.iter().map(|&v| self.scale_value(v)).collect()
    }

    /// Undo `transform`
    pub fn inverse_transform(&self, scaled: &[f64]) -> Result<Vec<f64>> {
        scaled.iter().map(|&v| self.inverse_value(v)).collect()
    }

    fn params(&self) -> Result<(f64, f64)> {
        match (self.data_min, self.data_max) {
            (Some(min), Some(max)) => {
                let span = max - min;
                // Constant input maps onto the low end of the range.
                Ok((min, if span == 0.0 { 1.0 } else { span }))
            }
            _ => Err(MathError::CalculationError(
                "Scaler has not been fitted".to_string(),
            )),
        }
    }
}

/// Column-wise standardisation to zero mean and unit variance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    /// Learn column means and population standard deviations
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        let width = rows.first().map(Vec::len).ok_or_else(|| {
            MathError::InsufficientData("Cannot fit a scaler on zero rows".to_string())
        })?;
        let n = rows.len() as f64;

        let mut means = vec![0.0; width];
        for row in rows {
            if row.len() != width {
                return Err(MathError::InvalidInput(
                    "Rows must share the same width".to_string(),
                ));
            }
            for (m, v) in means.iter_mut().zip(row) {
                *m += v / n;
            }
        }

        let mut scales = vec![0.0; width];
        for row in rows {
            for (j, v) in row.iter().enumerate() {
                scales[j] += (v - means[j]).powi(2) / n;
            }
        }
        // Zero-variance columns keep unit scale.
        for s in &mut scales {
            *s = if *s > 0.0 { s.sqrt() } else { 1.0 };
        }

        Ok(Self { means, scales })
    }

    /// Standardise one row
    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.means.len() {
            return Err(MathError::InvalidInput(format!(
                "Expected {} features, got {}",
                self.means.len(),
                row.len()
            )));
        }
        Ok(row
            .iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(v, (m, s))| (v - m) / s)
            .collect())
    }

    /// Standardise many rows
    pub fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        rows.iter().map(|r| self.transform_row(r)).collect()
    }

    /// Number of columns the scaler was fitted on
    pub fn width(&self) -> usize {
        self.means.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_min_max_round_trip() {
        let mut scaler = MinMaxScaler::default();
        let values = [10.0, 20.0, 15.0];
        let scaled = scaler.fit_transform(&values).unwrap();
        assert_eq!(scaled, vec![0.0, 1.0, 0.5]);

        let restored = scaler.inverse_transform(&scaled).unwrap();
        for (a, b) in restored.iter().zip(values.iter()) {
            assert_relative_eq!(a, b);
        }
    }

    #[test]
    fn test_min_max_custom_range() {
        let mut scaler = MinMaxScaler::new(-1.0, 1.0).unwrap();
        scaler.fit(&[0.0, 4.0]).unwrap();
        assert_relative_eq!(scaler.scale_value(2.0).unwrap(), 0.0);
        assert_relative_eq!(scaler.inverse_value(1.0).unwrap(), 4.0);
    }

    #[test]
    fn test_unfitted_scaler_errors() {
        let scaler = MinMaxScaler::default();
        assert!(scaler.scale_value(1.0).is_err());
        assert!(MinMaxScaler::new(1.0, 0.0).is_err());
    }

    #[test]
    fn test_standard_scaler_centres_columns() {
        let rows = vec![vec![1.0, 10.0], vec![3.0, 10.0]];
        let scaler = StandardScaler::fit(&rows).unwrap();
        let scaled = scaler.transform(&rows).unwrap();
        assert_relative_eq!(scaled[0][0], -1.0);
        assert_relative_eq!(scaled[1][0], 1.0);
        // Constant column is centred but not blown up
        assert_relative_eq!(scaled[0][1], 0.0);
        assert!(scaler.transform_row(&[1.0]).is_err());
    }
}
