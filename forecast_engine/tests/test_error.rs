use forecast_engine::data::Ticker;
use forecast_engine::error::{ForecastError, ForecastFailure};
use forecast_engine::models::ModelFamily;
use std::error::Error;
use std::io;
use std::path::PathBuf;

#[test]
fn test_error_conversion() {
    let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
    match ForecastError::from(io_error) {
        ForecastError::IoError(_) => {}
        other => panic!("Expected IoError variant, got {:?}", other),
    }

    let math_error = trade_math::MathError::InsufficientData("need more".to_string());
    match ForecastError::from(math_error) {
        ForecastError::MathError(_) => {}
        other => panic!("Expected MathError variant, got {:?}", other),
    }

    let json_error = serde_json::from_str::<Vec<f64>>("not json").unwrap_err();
    assert!(matches!(
        ForecastError::from(json_error),
        ForecastError::ArtifactError(_)
    ));
}

#[test]
fn test_error_display() {
    let error = ForecastError::InsufficientHistory {
        required: 60,
        available: 12,
    };
    assert_eq!(
        error.to_string(),
        "Insufficient history: need at least 60 observations, have 12"
    );

    let error = ForecastError::MissingArtifact {
        ticker: Ticker::Nflx,
        path: PathBuf::from("artifacts/NFLX_scaler.json"),
    };
    assert_eq!(
        error.to_string(),
        "Missing artifact for NFLX: artifacts/NFLX_scaler.json"
    );
}

#[test]
fn test_failure_carries_model_and_ticker() {
    let failure = ForecastFailure::new(
        ModelFamily::ArimaGarch,
        Ticker::Mara,
        ForecastError::FitError("No GARCH order could be fitted".to_string()),
    );
    assert_eq!(
        failure.to_string(),
        "ARIMA-GARCH forecast for MARA failed: Fit error: No GARCH order could be fitted"
    );
    assert!(!failure.is_missing_artifact());
    assert!(failure.source().is_some());
}
