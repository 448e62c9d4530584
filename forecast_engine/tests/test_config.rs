use forecast_engine::config::{EngineConfig, GbtParamGrid};
use forecast_engine::data::Ticker;
use forecast_engine::error::ForecastError;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

#[test]
fn test_shipped_defaults_match_builtin_defaults() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/default.toml");
    let loaded = EngineConfig::load(path).unwrap();
    assert_eq!(loaded, EngineConfig::default());
}

#[test]
fn test_default_constants() {
    let config = EngineConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.arima_garch.train_ratio, 0.8);
    assert_eq!(config.arima_garch.garch_orders, vec![1, 2, 3]);
    assert_eq!(config.arima_garch.volatility_floor, 1e-8);
    assert_eq!(config.arima_garch.volatility_cap, 10.0);
    assert_eq!(config.lstm.lookback, 60);
    assert_eq!(config.gbt.mse_threshold, 70.0);
    assert_eq!(config.gbt.window_size, 90);
    assert_eq!(config.gbt.grid.len(), 972);
    assert_eq!(config.forecast.horizons, vec![7, 30, 90, 180, 270, 365]);
    assert_eq!(config.cache.capacity, None);
}

#[rstest]
#[case(Ticker::Aapl, true)]
#[case(Ticker::Msft, true)]
#[case(Ticker::Nvda, true)]
#[case(Ticker::Googl, true)]
#[case(Ticker::Smci, true)]
#[case(Ticker::Mstr, true)]
#[case(Ticker::Tsla, false)]
#[case(Ticker::Amzn, false)]
#[case(Ticker::Riot, false)]
fn test_rolling_allow_list(#[case] ticker: Ticker, #[case] rolling: bool) {
    assert_eq!(EngineConfig::default().gbt.uses_rolling(ticker), rolling);
}

#[test]
fn test_partial_file_keeps_other_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[gbt]").unwrap();
    writeln!(file, "window_size = 30").unwrap();
    writeln!(file, "rolling_tickers = [\"TSLA\"]").unwrap();
    writeln!(file, "[cache]").unwrap();
    writeln!(file, "capacity = 8").unwrap();

    let config = EngineConfig::load(file.path()).unwrap();
    assert_eq!(config.gbt.window_size, 30);
    assert!(config.gbt.uses_rolling(Ticker::Tsla));
    assert!(!config.gbt.uses_rolling(Ticker::Nvda));
    assert_eq!(config.gbt.mse_threshold, 70.0);
    assert_eq!(config.cache.capacity, Some(8));
    assert_eq!(config.prophet, EngineConfig::default().prophet);
}

#[rstest]
#[case("[arima_garch]\ntrain_ratio = 1.5")]
#[case("[gbt]\ncv_folds = 1")]
#[case("[arima_garch]\nvolatility_floor = 20.0")]
#[case("[gbt.grid]\nmax_depth = []")]
#[case("[forecast]\nhorizons = [0]")]
#[case("[lstm]\nlookback = 0")]
fn test_invalid_settings_rejected(#[case] text: &str) {
    assert!(matches!(
        EngineConfig::from_toml_str(text),
        Err(ForecastError::ConfigError(_))
    ));
}

#[test]
fn test_malformed_toml_is_config_error() {
    assert!(matches!(
        EngineConfig::from_toml_str("[gbt\nwindow_size = "),
        Err(ForecastError::ConfigError(_))
    ));
}

#[test]
fn test_grid_order_varies_last_key_fastest() {
    let grid = GbtParamGrid {
        colsample_bytree: vec![1.0],
        gamma: vec![0.0],
        learning_rate: vec![0.1],
        max_depth: vec![3, 5],
        min_child_weight: vec![1.0],
        n_estimators: vec![50],
        subsample: vec![0.8, 1.0],
    };
    let combos = grid.combinations();
    assert_eq!(combos.len(), grid.len());
    let pairs: Vec<(usize, f64)> = combos.iter().map(|p| (p.max_depth, p.subsample)).collect();
    assert_eq!(pairs, vec![(3, 0.8), (3, 1.0), (5, 0.8), (5, 1.0)]);
}
