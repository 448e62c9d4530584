//! Price history handling: the ticker universe, the cleaned daily series the
//! models consume, and the sources that produce it.

use crate::calendar::business_days_between;
use crate::error::{ForecastError, Result};
use chrono::{Duration, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// The fixed set of equities the engine forecasts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Ticker {
    Aapl,
    Amzn,
    Nvda,
    Asml,
    Tsla,
    Googl,
    Mara,
    Riot,
    Msft,
    Nflx,
    Smci,
    Mstr,
}

impl Ticker {
    /// Every supported ticker, in menu order
    pub const ALL: [Ticker; 12] = [
        Ticker::Aapl,
        Ticker::Amzn,
        Ticker::Nvda,
        Ticker::Asml,
        Ticker::Tsla,
        Ticker::Googl,
        Ticker::Mara,
        Ticker::Riot,
        Ticker::Msft,
        Ticker::Nflx,
        Ticker::Smci,
        Ticker::Mstr,
    ];

    /// Exchange symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Ticker::Aapl => "AAPL",
            Ticker::Amzn => "AMZN",
            Ticker::Nvda => "NVDA",
            Ticker::Asml => "ASML",
            Ticker::Tsla => "TSLA",
            Ticker::Googl => "GOOGL",
            Ticker::Mara => "MARA",
            Ticker::Riot => "RIOT",
            Ticker::Msft => "MSFT",
            Ticker::Nflx => "NFLX",
            Ticker::Smci => "SMCI",
            Ticker::Mstr => "MSTR",
        }
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Ticker {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        Ticker::ALL
            .into_iter()
            .find(|t| t.symbol() == upper)
            .ok_or_else(|| ForecastError::InvalidParameter(format!("Unknown ticker: {}", s)))
    }
}

/// One daily OHLCV observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// A bar whose OHLC values all equal `close`
    pub fn from_close(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 0.0,
        }
    }
}

/// Gap-free daily price history.
///
/// Dates are strictly increasing and every close is finite. Models only
/// read it.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Validate and wrap a list of bars
    pub fn new(bars: Vec<PriceBar>) -> Result<Self> {
        if bars.is_empty() {
            return Err(ForecastError::DataError(
                "Price series must not be empty".to_string(),
            ));
        }
        for pair in bars.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(ForecastError::DataError(format!(
                    "Dates must be strictly increasing ({} follows {})",
                    pair[1].date, pair[0].date
                )));
            }
        }
        if let Some(bad) = bars.iter().find(|b| !b.close.is_finite()) {
            return Err(ForecastError::DataError(format!(
                "Non-finite close on {}",
                bad.date
            )));
        }
        Ok(Self { bars })
    }

    /// Build a series from closes on consecutive business days starting at `start`
    pub fn from_closes(start: NaiveDate, closes: &[f64]) -> Result<Self> {
        let mut date = start;
        while crate::calendar::is_weekend(date) {
            date += Duration::days(1);
        }
        let mut bars = Vec::with_capacity(closes.len());
        for &close in closes {
            bars.push(PriceBar::from_close(date, close));
            date = crate::calendar::next_business_day(date);
        }
        Self::new(bars)
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.bars.iter().map(|b| b.date).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Date of the final observation
    pub fn last_date(&self) -> NaiveDate {
        self.bars[self.bars.len() - 1].date
    }

    /// The most recent close
    pub fn last_close(&self) -> f64 {
        self.bars[self.bars.len() - 1].close
    }

    /// Fail with `InsufficientHistory` when shorter than `required`
    pub fn require(&self, required: usize) -> Result<()> {
        if self.len() < required {
            return Err(ForecastError::InsufficientHistory {
                required,
                available: self.len(),
            });
        }
        Ok(())
    }
}

/// Turn raw daily rows into a business-day series.
///
/// Rows before `start` are dropped, the remainder is re-indexed onto every
/// business day between the first and last row, and gaps take the most
/// recent earlier row.
pub fn resample_business_days(mut raw: Vec<PriceBar>, start: NaiveDate) -> Result<PriceSeries> {
    raw.retain(|b| b.date >= start && b.close.is_finite());
    raw.sort_by_key(|b| b.date);
    raw.dedup_by_key(|b| b.date);

    let (first, last) = match (raw.first(), raw.last()) {
        (Some(f), Some(l)) => (f.date, l.date),
        _ => {
            return Err(ForecastError::DataError(format!(
                "No observations on or after {}",
                start
            )))
        }
    };

    let by_date: HashMap<NaiveDate, PriceBar> = raw.iter().map(|b| (b.date, *b)).collect();
    let mut bars = Vec::new();
    let mut previous: Option<PriceBar> = None;
    for date in business_days_between(first, last) {
        match by_date.get(&date) {
            Some(bar) => {
                previous = Some(*bar);
                bars.push(*bar);
            }
            None => {
                // A leading gap has nothing to fill from and is dropped.
                if let Some(prev) = previous {
                    bars.push(PriceBar { date, ..prev });
                }
            }
        }
    }
    PriceSeries::new(bars)
}

/// Supplier of cleaned price history
pub trait TimeSeriesSource {
    /// Load the business-day series for `ticker`
    fn load(&self, ticker: Ticker) -> Result<PriceSeries>;
}

/// Reads `<data_dir>/<TICKER>.csv` files with a header row containing
/// `Date` and `Close` (plus optional `Open`, `High`, `Low`, `Volume`).
#[derive(Debug, Clone)]
pub struct CsvPriceSource {
    data_dir: PathBuf,
    history_start: NaiveDate,
}

impl CsvPriceSource {
    pub fn new(data_dir: impl Into<PathBuf>, history_start: NaiveDate) -> Self {
        Self {
            data_dir: data_dir.into(),
            history_start,
        }
    }

    /// Path of the CSV file for `ticker`
    pub fn path_for(&self, ticker: Ticker) -> PathBuf {
        self.data_dir.join(format!("{}.csv", ticker.symbol()))
    }

    /// Parse one CSV file into raw bars
    pub fn read_bars<P: AsRef<Path>>(path: P) -> Result<Vec<PriceBar>> {
        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        let dates = date_column(&df)?;
        let close = float_column(&df, "close")?.ok_or_else(|| {
            ForecastError::DataError("No close column found in data".to_string())
        })?;
        let open = float_column(&df, "open")?;
        let high = float_column(&df, "high")?;
        let low = float_column(&df, "low")?;
        let volume = float_column(&df, "volume")?;

        let mut bars = Vec::with_capacity(dates.len());
        for (i, date) in dates.iter().enumerate() {
            let (Some(date), Some(close)) = (date, close[i]) else {
                continue;
            };
            let pick = |col: &Option<Vec<Option<f64>>>| {
                col.as_ref().and_then(|c| c[i]).unwrap_or(close)
            };
            bars.push(PriceBar {
                date: *date,
                open: pick(&open),
                high: pick(&high),
                low: pick(&low),
                close,
                volume: volume.as_ref().and_then(|v| v[i]).unwrap_or(0.0),
            });
        }
        Ok(bars)
    }
}

impl TimeSeriesSource for CsvPriceSource {
    fn load(&self, ticker: Ticker) -> Result<PriceSeries> {
        let path = self.path_for(ticker);
        debug!(path = %path.display(), "reading price history");
        let raw = Self::read_bars(&path)?;
        let series = resample_business_days(raw, self.history_start)?;
        info!(
            ticker = %ticker,
            rows = series.len(),
            last = %series.last_date(),
            "loaded price history"
        );
        Ok(series)
    }
}

fn find_column<'a>(df: &'a DataFrame, name: &str) -> Option<&'a Series> {
    df.get_columns()
        .iter()
        .find(|s| s.name().trim().eq_ignore_ascii_case(name))
}

fn float_column(df: &DataFrame, name: &str) -> Result<Option<Vec<Option<f64>>>> {
    let Some(series) = find_column(df, name) else {
        return Ok(None);
    };
    let cast = series.cast(&DataType::Float64)?;
    Ok(Some(cast.f64()?.into_iter().collect()))
}

fn date_column(df: &DataFrame) -> Result<Vec<Option<NaiveDate>>> {
    let series = find_column(df, "date")
        .or_else(|| df.get_columns().first())
        .ok_or_else(|| ForecastError::DataError("No time column found in data".to_string()))?;

    match series.dtype() {
        DataType::Utf8 => Ok(series
            .utf8()?
            .into_iter()
            .map(|s| s.and_then(parse_date))
            .collect()),
        DataType::Date => {
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
                .ok_or_else(|| ForecastError::DataError("Invalid epoch".to_string()))?;
            Ok(series
                .date()?
                .into_iter()
                .map(|d| d.map(|days| epoch + Duration::days(days as i64)))
                .collect())
        }
        other => Err(ForecastError::DataError(format!(
            "Unsupported date column type: {}",
            other
        ))),
    }
}

/// Parse the date part of `YYYY-MM-DD[ HH:MM:SS...]`
fn parse_date(text: &str) -> Option<NaiveDate> {
    let head = text.trim().get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Fixed in-memory series, keyed by ticker
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    series: HashMap<Ticker, PriceSeries>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the series for `ticker`
    pub fn with_series(mut self, ticker: Ticker, series: PriceSeries) -> Self {
        self.series.insert(ticker, series);
        self
    }

    pub fn insert(&mut self, ticker: Ticker, series: PriceSeries) {
        self.series.insert(ticker, series);
    }
}

impl TimeSeriesSource for InMemorySource {
    fn load(&self, ticker: Ticker) -> Result<PriceSeries> {
        self.series
            .get(&ticker)
            .cloned()
            .ok_or_else(|| ForecastError::DataError(format!("No price history for {}", ticker)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_accepts_timestamps() {
        assert_eq!(
            parse_date("2020-01-02 00:00:00-05:00"),
            NaiveDate::from_ymd_opt(2020, 1, 2)
        );
        assert_eq!(parse_date("bad"), None);
    }
}
