//! Error types for the forecast_engine crate

use crate::data::Ticker;
use crate::models::ModelFamily;
use std::path::PathBuf;
use thiserror::Error;

/// Custom error types for the forecast_engine crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// A model needs a longer history than the series provides
    #[error("Insufficient history: need at least {required} observations, have {available}")]
    InsufficientHistory { required: usize, available: usize },

    /// A persisted model artifact is absent
    #[error("Missing artifact for {ticker}: {}", path.display())]
    MissingArtifact { ticker: Ticker, path: PathBuf },

    /// A persisted model artifact exists but cannot be used
    #[error("Artifact error: {0}")]
    ArtifactError(String),

    /// Error related to parameter validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Model fitting failed (non-convergence, singular design, ...)
    #[error("Fit error: {0}")]
    FitError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Configuration could not be read or is inconsistent
    #[error("Config error: {0}")]
    ConfigError(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// Error from a numerical routine
    #[error("Math error: {0}")]
    MathError(#[from] trade_math::MathError),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<polars::prelude::PolarsError> for ForecastError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::ArtifactError(err.to_string())
    }
}

impl From<toml::de::Error> for ForecastError {
    fn from(err: toml::de::Error) -> Self {
        ForecastError::ConfigError(err.to_string())
    }
}

/// A forecast request that failed for one model family and ticker.
///
/// The presentation layer shows a failure state for that graph only.
#[derive(Debug, Error)]
#[error("{model} forecast for {ticker} failed: {source}")]
pub struct ForecastFailure {
    pub model: ModelFamily,
    pub ticker: Ticker,
    #[source]
    pub source: ForecastError,
}

impl ForecastFailure {
    pub fn new(model: ModelFamily, ticker: Ticker, source: ForecastError) -> Self {
        Self {
            model,
            ticker,
            source,
        }
    }

    /// Whether the failure came from a missing persisted artifact
    pub fn is_missing_artifact(&self) -> bool {
        matches!(self.source, ForecastError::MissingArtifact { .. })
    }
}
