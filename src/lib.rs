//! # Equity Forecast Workspace
//!
//! Umbrella crate for the equity forecasting workspace. It re-exports the
//! forecasting engine and the numeric toolkit it is built on.
//!
//! ## Example
//!
//! ```
//! use equity_forecast_workspace::engine::data::Ticker;
//!
//! let ticker: Ticker = "nvda".parse().unwrap();
//! assert_eq!(ticker.symbol(), "NVDA");
//! ```

pub use forecast_engine as engine;
pub use trade_math as math;

pub use forecast_engine::{
    EngineConfig, ForecastBundle, ForecastError, ForecastFailure, ForecastOrchestrator,
    ForecastRequest, ModelFamily, Recommendation, Ticker,
};

/// Version of the workspace
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
