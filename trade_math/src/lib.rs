//! # Trade Math
//!
//! Numerical building blocks for price forecasting.
//! This crate provides moving averages, descriptive statistics, least
//! squares, a unit-root test, feature scalers and a derivative-free
//! minimiser, all operating on plain slices.

use thiserror::Error;

pub mod moving_averages;
pub mod optimize;
pub mod regression;
pub mod scaling;
pub mod stationarity;
pub mod statistics;

/// Errors that can occur in numerical calculations
#[derive(Error, Debug)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for trading math operations
pub type Result<T> = std::result::Result<T, MathError>;
