use chrono::NaiveDate;
use forecast_engine::cache::RenderCache;
use forecast_engine::calendar::next_business_day;
use forecast_engine::config::{EngineConfig, GbtConfig, GbtParamGrid, LstmConfig};
use forecast_engine::data::{InMemorySource, PriceSeries, Ticker};
use forecast_engine::error::ForecastError;
use forecast_engine::models::gbt::GbtStrategy;
use forecast_engine::models::ModelFamily;
use forecast_engine::orchestrator::{render_summary, ForecastOrchestrator, ForecastRequest};
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tempfile::TempDir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn create_test_series(n: usize) -> PriceSeries {
    let mut rng = StdRng::seed_from_u64(17);
    let closes: Vec<f64> = (0..n)
        .map(|i| {
            let t = i as f64;
            let noise: f64 = rng.sample(StandardNormal);
            100.0 + 0.05 * t + 4.0 * (t / 15.0).sin() + 1.5 * noise
        })
        .collect();
    PriceSeries::from_closes(date(2020, 1, 2), &closes).unwrap()
}

fn orchestrator(artifacts: &TempDir) -> ForecastOrchestrator<InMemorySource> {
    let series = create_test_series(400);
    let source = InMemorySource::new()
        .with_series(Ticker::Aapl, series.clone())
        .with_series(Ticker::Nvda, series.clone())
        .with_series(Ticker::Tsla, series);
    let config = EngineConfig {
        lstm: LstmConfig {
            artifact_dir: artifacts.path().to_path_buf(),
            ..LstmConfig::default()
        },
        gbt: GbtConfig {
            grid: GbtParamGrid {
                colsample_bytree: vec![1.0],
                gamma: vec![0.0],
                learning_rate: vec![0.1],
                max_depth: vec![3],
                min_child_weight: vec![1.0],
                n_estimators: vec![25],
                subsample: vec![1.0],
            },
            ..GbtConfig::default()
        },
        ..EngineConfig::default()
    };
    ForecastOrchestrator::new(source, config)
}

#[test]
fn test_prophet_request_bundle() {
    let dir = TempDir::new().unwrap();
    let orch = orchestrator(&dir);
    let history_end = create_test_series(400).last_date();
    let today = next_business_day(history_end);

    let request = ForecastRequest::new(Ticker::Aapl, ModelFamily::Prophet, 30, 10.0);
    let bundle = orch.run(request, today).unwrap();

    assert_eq!(bundle.history_end, history_end);
    assert_eq!(bundle.forecast.len(), 30);
    assert_eq!(bundle.forecast.dates()[0], today);
    assert_eq!(bundle.prophet_frame.as_ref().map(|f| f.future_rows().len()), Some(30));
    assert_eq!(bundle.fingerprint, "recommendations-AAPL-Prophet-30-10");
    assert_eq!(bundle.recommendation.buy_date, today);
    assert!(bundle.metrics.is_some());
    assert!(bundle.gbt_run.is_none());

    // Moving averages stay blank during warm-up.
    assert!(bundle.overlays.ma50[..49].iter().all(Option::is_none));
    assert!(bundle.overlays.ma50[49].is_some());
    assert!(bundle.overlays.ma200[..199].iter().all(Option::is_none));
    let (low, high) = bundle.overlays.price_range;
    assert!(low >= 0.0 && low < high);
}

#[test]
fn test_arima_garch_request_has_intervals() {
    let dir = TempDir::new().unwrap();
    let orch = orchestrator(&dir);
    let request = ForecastRequest::new(Ticker::Tsla, ModelFamily::ArimaGarch, 7, 2.0);
    let bundle = orch.run(request, date(2021, 7, 1)).unwrap();
    assert_eq!(bundle.forecast.len(), 7);
    assert!(bundle.forecast.has_intervals());
}

#[test]
fn test_gbt_requests_dispatch_by_ticker() {
    let dir = TempDir::new().unwrap();
    let orch = orchestrator(&dir);
    let today = date(2021, 7, 1);

    let nvda = orch
        .run(ForecastRequest::new(Ticker::Nvda, ModelFamily::Xgboost, 7, 5.0), today)
        .unwrap();
    let tsla = orch
        .run(ForecastRequest::new(Ticker::Tsla, ModelFamily::Xgboost, 7, 5.0), today)
        .unwrap();

    let (strategy, retrains) = nvda.gbt_run.unwrap();
    assert_eq!(strategy, GbtStrategy::Rolling);
    assert!(retrains >= 7);
    assert_eq!(tsla.gbt_run, Some((GbtStrategy::Static, 0)));
}

#[test]
fn test_missing_lstm_artifact_fails_only_that_request() {
    let dir = TempDir::new().unwrap();
    let orch = orchestrator(&dir);
    let failure = orch
        .run(
            ForecastRequest::new(Ticker::Aapl, ModelFamily::Lstm, 30, 5.0),
            date(2021, 7, 1),
        )
        .unwrap_err();

    assert!(failure.is_missing_artifact());
    assert_eq!(failure.model, ModelFamily::Lstm);
    assert_eq!(failure.ticker, Ticker::Aapl);
    assert!(failure.to_string().starts_with("LSTM forecast for AAPL failed"));

    // The same orchestrator still serves other models.
    assert!(orch
        .run(
            ForecastRequest::new(Ticker::Aapl, ModelFamily::Prophet, 7, 5.0),
            date(2021, 7, 1),
        )
        .is_ok());
}

#[test]
fn test_unsupported_horizon_is_rejected() {
    let dir = TempDir::new().unwrap();
    let failure = orchestrator(&dir)
        .run(
            ForecastRequest::new(Ticker::Aapl, ModelFamily::Prophet, 10, 5.0),
            date(2021, 7, 1),
        )
        .unwrap_err();
    assert!(matches!(failure.source, ForecastError::InvalidParameter(_)));
}

#[test]
fn test_unknown_series_is_a_data_failure() {
    let dir = TempDir::new().unwrap();
    let failure = orchestrator(&dir)
        .run(
            ForecastRequest::new(Ticker::Mara, ModelFamily::Prophet, 7, 5.0),
            date(2021, 7, 1),
        )
        .unwrap_err();
    assert_eq!(failure.ticker, Ticker::Mara);
    assert!(matches!(failure.source, ForecastError::DataError(_)));
}

#[test]
fn test_render_cache_reuses_summary() {
    let dir = TempDir::new().unwrap();
    let orch = orchestrator(&dir);
    let bundle = orch
        .run(
            ForecastRequest::new(Ticker::Aapl, ModelFamily::Prophet, 7, 3.0),
            date(2021, 7, 1),
        )
        .unwrap();

    let mut cache = RenderCache::new(None);
    let mut renders = 0;
    for _ in 0..3 {
        cache.get_or_insert_with(&bundle.fingerprint, || {
            renders += 1;
            render_summary(&bundle)
        });
    }
    assert_eq!(renders, 1);
    let text = cache.get(&bundle.fingerprint).unwrap();
    assert!(text.contains("AAPL Prophet forecast"));
    assert!(text.contains("Buy on"));
}
