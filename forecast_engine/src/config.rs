//! Engine configuration
//!
//! Every section falls back to its defaults, so a partial TOML file (or none
//! at all) is valid. The defaults reproduce the constants the engine has
//! always used.

use crate::data::Ticker;
use crate::error::{ForecastError, Result};
use crate::models::trees::BoostingParams;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub data: DataConfig,
    pub forecast: ForecastConfig,
    pub arima_garch: ArimaGarchConfig,
    pub prophet: ProphetConfig,
    pub lstm: LstmConfig,
    pub gbt: GbtConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

/// Where price history comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory holding `<TICKER>.csv` files
    pub data_dir: PathBuf,
    /// First date of history handed to the models
    pub history_start: NaiveDate,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            history_start: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap_or_default(),
        }
    }
}

/// Request-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Horizons (business days) a request may ask for
    pub horizons: Vec<usize>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizons: vec![7, 30, 90, 180, 270, 365],
        }
    }
}

/// ARIMA-GARCH adapter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArimaGarchConfig {
    pub train_ratio: f64,
    pub max_ar_order: usize,
    pub max_ma_order: usize,
    /// Candidate ARCH and GARCH orders for the grid search
    pub garch_orders: Vec<usize>,
    pub volatility_floor: f64,
    pub volatility_cap: f64,
    /// Simulated (percent) returns are clipped to `[-return_clip, return_clip]`
    pub return_clip: f64,
    pub seed: u64,
    /// Extra simulated paths used to derive interval bounds
    pub interval_paths: usize,
    pub interval_width: f64,
}

impl Default for ArimaGarchConfig {
    fn default() -> Self {
        Self {
            train_ratio: 0.8,
            max_ar_order: 3,
            max_ma_order: 3,
            garch_orders: vec![1, 2, 3],
            volatility_floor: 1e-8,
            volatility_cap: 10.0,
            return_clip: 10.0,
            seed: 42,
            interval_paths: 200,
            interval_width: 0.8,
        }
    }
}

/// Prophet adapter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProphetConfig {
    pub daily_seasonality: bool,
    pub weekly_seasonality: bool,
    pub yearly_seasonality: bool,
    pub n_changepoints: usize,
    pub changepoint_range: f64,
    pub changepoint_prior_scale: f64,
    pub seasonality_prior_scale: f64,
    pub interval_width: f64,
    pub uncertainty_samples: usize,
    pub seed: u64,
}

impl Default for ProphetConfig {
    fn default() -> Self {
        Self {
            daily_seasonality: true,
            weekly_seasonality: true,
            yearly_seasonality: true,
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            seasonality_prior_scale: 10.0,
            interval_width: 0.8,
            uncertainty_samples: 1000,
            seed: 42,
        }
    }
}

/// LSTM adapter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LstmConfig {
    /// Directory holding `<TICKER>_lstm_model.json` and `<TICKER>_scaler.json`
    pub artifact_dir: PathBuf,
    pub lookback: usize,
    /// ADF p-value below which the close series counts as stationary
    pub adf_significance: f64,
}

impl Default for LstmConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("artifacts"),
            lookback: 60,
            adf_significance: 0.05,
        }
    }
}

/// Gradient-boosted trees adapter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbtConfig {
    pub train_ratio: f64,
    pub cv_folds: usize,
    /// Trailing test MSE (price units squared) above which walk-forward retrains
    pub mse_threshold: f64,
    /// Trailing observations used for each walk-forward refit
    pub window_size: usize,
    /// Tickers that always use walk-forward retraining
    pub rolling_tickers: Vec<Ticker>,
    pub grid: GbtParamGrid,
    pub seed: u64,
}

impl Default for GbtConfig {
    fn default() -> Self {
        Self {
            train_ratio: 0.7,
            cv_folds: 3,
            mse_threshold: 70.0,
            window_size: 90,
            rolling_tickers: vec![
                Ticker::Aapl,
                Ticker::Msft,
                Ticker::Nvda,
                Ticker::Googl,
                Ticker::Smci,
                Ticker::Mstr,
            ],
            grid: GbtParamGrid::default(),
            seed: 0,
        }
    }
}

impl GbtConfig {
    /// Whether `ticker` is on the walk-forward allow-list
    pub fn uses_rolling(&self, ticker: Ticker) -> bool {
        self.rolling_tickers.contains(&ticker)
    }
}

/// Hyperparameter grid searched exhaustively for the boosted trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbtParamGrid {
    pub colsample_bytree: Vec<f64>,
    pub gamma: Vec<f64>,
    pub learning_rate: Vec<f64>,
    pub max_depth: Vec<usize>,
    pub min_child_weight: Vec<f64>,
    pub n_estimators: Vec<usize>,
    pub subsample: Vec<f64>,
}

impl Default for GbtParamGrid {
    fn default() -> Self {
        Self {
            colsample_bytree: vec![0.8, 1.0],
            gamma: vec![0.0, 0.1, 0.2],
            learning_rate: vec![0.01, 0.05, 0.1],
            max_depth: vec![3, 5, 7],
            min_child_weight: vec![1.0, 5.0, 10.0],
            n_estimators: vec![50, 100, 150],
            subsample: vec![0.8, 1.0],
        }
    }
}

impl GbtParamGrid {
    /// All combinations, keys in alphabetical order with the last key varying fastest
    pub fn combinations(&self) -> Vec<BoostingParams> {
        let mut out = Vec::new();
        for &colsample_bytree in &self.colsample_bytree {
            for &gamma in &self.gamma {
                for &learning_rate in &self.learning_rate {
                    for &max_depth in &self.max_depth {
                        for &min_child_weight in &self.min_child_weight {
                            for &n_estimators in &self.n_estimators {
                                for &subsample in &self.subsample {
                                    out.push(BoostingParams {
                                        n_estimators,
                                        learning_rate,
                                        max_depth,
                                        subsample,
                                        colsample_bytree,
                                        gamma,
                                        min_child_weight,
                                        ..BoostingParams::default()
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.colsample_bytree.len()
            * self.gamma.len()
            * self.learning_rate.len()
            * self.max_depth.len()
            * self.min_child_weight.len()
            * self.n_estimators.len()
            * self.subsample.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Render cache settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum entries; `None` keeps every entry
    pub capacity: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Read and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ForecastError::ConfigError(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no model can run with
    pub fn validate(&self) -> Result<()> {
        let ratio_ok = |r: f64| r > 0.0 && r < 1.0;
        if !ratio_ok(self.arima_garch.train_ratio) || !ratio_ok(self.gbt.train_ratio) {
            return Err(ForecastError::ConfigError(
                "train ratios must lie strictly between 0 and 1".to_string(),
            ));
        }
        if !ratio_ok(self.arima_garch.interval_width) || !ratio_ok(self.prophet.interval_width) {
            return Err(ForecastError::ConfigError(
                "interval widths must lie strictly between 0 and 1".to_string(),
            ));
        }
        if self.arima_garch.volatility_floor <= 0.0
            || self.arima_garch.volatility_floor >= self.arima_garch.volatility_cap
        {
            return Err(ForecastError::ConfigError(
                "volatility clip must satisfy 0 < floor < cap".to_string(),
            ));
        }
        if self.arima_garch.return_clip <= 0.0 {
            return Err(ForecastError::ConfigError(
                "return_clip must be positive".to_string(),
            ));
        }
        if self.arima_garch.garch_orders.iter().any(|&o| o == 0)
            || self.arima_garch.garch_orders.is_empty()
        {
            return Err(ForecastError::ConfigError(
                "garch_orders must be non-empty and positive".to_string(),
            ));
        }
        if self.lstm.lookback == 0 || self.gbt.window_size == 0 {
            return Err(ForecastError::ConfigError(
                "lookback and window_size must be positive".to_string(),
            ));
        }
        if self.gbt.cv_folds < 2 {
            return Err(ForecastError::ConfigError(
                "cv_folds must be at least 2".to_string(),
            ));
        }
        if self.gbt.grid.is_empty() {
            return Err(ForecastError::ConfigError(
                "gbt grid must contain at least one combination".to_string(),
            ));
        }
        if self.forecast.horizons.is_empty() || self.forecast.horizons.contains(&0) {
            return Err(ForecastError::ConfigError(
                "horizons must be non-empty and positive".to_string(),
            ));
        }
        if self.cache.capacity == Some(0) {
            return Err(ForecastError::ConfigError(
                "cache capacity must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}
