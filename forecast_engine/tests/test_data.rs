use chrono::NaiveDate;
use forecast_engine::data::{
    resample_business_days, CsvPriceSource, InMemorySource, PriceBar, PriceSeries, Ticker,
    TimeSeriesSource,
};
use forecast_engine::error::ForecastError;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::fs::File;
use std::io::Write;
use tempfile::tempdir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_csv_source_loads_and_fills_gaps() {
    let dir = tempdir().unwrap();
    let mut file = File::create(dir.path().join("AAPL.csv")).unwrap();
    writeln!(file, "Date,Open,High,Low,Close,Volume").unwrap();
    writeln!(file, "2014-12-31,90.0,91.0,89.0,90.5,500").unwrap();
    // Friday, then Tuesday: Monday is missing.
    writeln!(file, "2015-01-02,100.0,105.0,98.0,103.0,1000").unwrap();
    writeln!(file, "2015-01-06,103.0,107.0,101.0,106.0,1200").unwrap();
    writeln!(file, "2015-01-07,106.0,110.0,104.0,108.0,1500").unwrap();
    drop(file);

    let source = CsvPriceSource::new(dir.path(), date(2015, 1, 1));
    let series = source.load(Ticker::Aapl).unwrap();

    assert_eq!(
        series.dates(),
        vec![date(2015, 1, 2), date(2015, 1, 5), date(2015, 1, 6), date(2015, 1, 7)]
    );
    assert_eq!(series.closes(), vec![103.0, 103.0, 106.0, 108.0]);
    assert_eq!(series.bars()[2].volume, 1200.0);
}

#[test]
fn test_csv_source_accepts_lowercase_close_only() {
    let dir = tempdir().unwrap();
    let mut file = File::create(dir.path().join("TSLA.csv")).unwrap();
    writeln!(file, "date,close").unwrap();
    writeln!(file, "2023-01-02,100.0").unwrap();
    writeln!(file, "2023-01-03,102.0").unwrap();
    drop(file);

    let series = CsvPriceSource::new(dir.path(), date(2015, 1, 1))
        .load(Ticker::Tsla)
        .unwrap();
    assert_eq!(series.len(), 2);
    assert_eq!(series.bars()[0].open, 100.0);
    assert_eq!(series.last_close(), 102.0);
}

#[test]
fn test_csv_source_missing_file_is_io_error() {
    let dir = tempdir().unwrap();
    let err = CsvPriceSource::new(dir.path(), date(2015, 1, 1))
        .load(Ticker::Mstr)
        .unwrap_err();
    assert!(matches!(err, ForecastError::IoError(_)));
}

#[test]
fn test_resample_drops_leading_gap_and_history_before_start() {
    let raw = vec![
        PriceBar::from_close(date(2014, 12, 30), 1.0),
        PriceBar::from_close(date(2015, 1, 6), 10.0),
        PriceBar::from_close(date(2015, 1, 9), 12.0),
    ];
    let series = resample_business_days(raw, date(2015, 1, 1)).unwrap();
    assert_eq!(series.dates().first(), Some(&date(2015, 1, 6)));
    assert_eq!(series.closes(), vec![10.0, 10.0, 10.0, 12.0]);
}

#[test]
fn test_price_series_rejects_unordered_dates() {
    let bars = vec![
        PriceBar::from_close(date(2023, 1, 3), 1.0),
        PriceBar::from_close(date(2023, 1, 2), 1.0),
    ];
    assert!(PriceSeries::new(bars).is_err());
    assert!(PriceSeries::new(Vec::new()).is_err());
}

#[test]
fn test_from_closes_uses_business_days() {
    let series = PriceSeries::from_closes(date(2024, 1, 5), &[1.0, 2.0, 3.0]).unwrap();
    assert_eq!(
        series.dates(),
        vec![date(2024, 1, 5), date(2024, 1, 8), date(2024, 1, 9)]
    );
}

#[test]
fn test_require_reports_shortfall() {
    let series = PriceSeries::from_closes(date(2024, 1, 2), &[1.0; 10]).unwrap();
    match series.require(60) {
        Err(ForecastError::InsufficientHistory {
            required,
            available,
        }) => {
            assert_eq!(required, 60);
            assert_eq!(available, 10);
        }
        other => panic!("expected InsufficientHistory, got {:?}", other),
    }
}

#[test]
fn test_in_memory_source() {
    let series = PriceSeries::from_closes(date(2024, 1, 2), &[5.0, 6.0]).unwrap();
    let source = InMemorySource::new().with_series(Ticker::Nvda, series.clone());
    assert_eq!(source.load(Ticker::Nvda).unwrap(), series);
    assert!(matches!(
        source.load(Ticker::Amzn),
        Err(ForecastError::DataError(_))
    ));
}

#[rstest]
#[case("AAPL", Ticker::Aapl)]
#[case("googl", Ticker::Googl)]
#[case(" mstr ", Ticker::Mstr)]
fn test_ticker_parse(#[case] text: &str, #[case] expected: Ticker) {
    assert_eq!(text.parse::<Ticker>().unwrap(), expected);
}

#[test]
fn test_unknown_ticker_rejected() {
    assert!("IBM".parse::<Ticker>().is_err());
    assert_eq!(Ticker::ALL.len(), 12);
}
