//! # Forecast Engine
//!
//! Multi-model equity price forecasting and trade-timing recommendations.
//!
//! ## Features
//!
//! - Daily price history per ticker (CSV via Polars, or in memory)
//! - Four forecasting families behind one `fit` / `forecast` interface:
//!   ARIMA-GARCH, Prophet-style additive regression, LSTM (persisted
//!   weights) and gradient-boosted trees with walk-forward retraining
//! - Backtests with accuracy metrics for every family
//! - Buy/sell recommendations on the U.S. trading calendar
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chrono::NaiveDate;
//! use forecast_engine::config::EngineConfig;
//! use forecast_engine::data::{CsvPriceSource, Ticker};
//! use forecast_engine::models::ModelFamily;
//! use forecast_engine::orchestrator::{ForecastOrchestrator, ForecastRequest};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::load("config/default.toml")?;
//! let source = CsvPriceSource::new(&config.data.data_dir, config.data.history_start);
//! let orchestrator = ForecastOrchestrator::new(source, config);
//!
//! let request = ForecastRequest::new(Ticker::Aapl, ModelFamily::Prophet, 30, 10.0);
//! let today = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
//! let bundle = orchestrator.run(request, today)?;
//! println!("{}", bundle.recommendation);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod calendar;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod recommendation;
pub mod returns;
pub mod utils;

// Re-export commonly used types
pub use crate::config::EngineConfig;
pub use crate::data::{PriceSeries, Ticker, TimeSeriesSource};
pub use crate::error::{ForecastError, ForecastFailure};
pub use crate::models::{ForecastResult, ModelAdapter, ModelFamily};
pub use crate::orchestrator::{ForecastBundle, ForecastOrchestrator, ForecastRequest};
pub use crate::recommendation::{Recommendation, RecommendationEngine};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
