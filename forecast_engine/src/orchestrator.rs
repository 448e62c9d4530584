//! Request orchestration: load, fit, forecast, recommend

use crate::cache::fingerprint;
use crate::config::EngineConfig;
use crate::data::{PriceSeries, Ticker, TimeSeriesSource};
use crate::error::{ForecastError, ForecastFailure, Result};
use crate::metrics::ForecastMetrics;
use crate::models::arima_garch::ArimaGarchAdapter;
use crate::models::gbt::{GbtAdapter, GbtStrategy};
use crate::models::lstm::LstmAdapter;
use crate::models::prophet::{ProphetAdapter, ProphetFrame};
use crate::models::{BacktestSeries, ForecastResult, ModelAdapter, ModelFamily, ModelOutput};
use crate::recommendation::{Recommendation, RecommendationEngine};
use crate::returns::ChartOverlays;
use chrono::NaiveDate;
use std::fmt::Write as _;
use tracing::{info, warn};

/// User selection for one forecast
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastRequest {
    pub ticker: Ticker,
    pub model: ModelFamily,
    /// Business days to forecast
    pub horizon: usize,
    /// Desired gain in percent
    pub target_pct: f64,
}

impl ForecastRequest {
    pub fn new(ticker: Ticker, model: ModelFamily, horizon: usize, target_pct: f64) -> Self {
        Self {
            ticker,
            model,
            horizon,
            target_pct,
        }
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(self.ticker, self.model, self.horizon, self.target_pct)
    }
}

/// Everything the presentation layer needs for one request
#[derive(Debug, Clone)]
pub struct ForecastBundle {
    pub request: ForecastRequest,
    pub history_end: NaiveDate,
    pub forecast: ForecastResult,
    pub backtest: BacktestSeries,
    /// Backtest accuracy, absent for an empty backtest
    pub metrics: Option<ForecastMetrics>,
    pub prophet_frame: Option<ProphetFrame>,
    /// GBT strategy taken and its refit count
    pub gbt_run: Option<(GbtStrategy, usize)>,
    pub recommendation: Recommendation,
    pub overlays: ChartOverlays,
    pub fingerprint: String,
}

/// Runs forecast requests against a price source
#[derive(Debug, Clone)]
pub struct ForecastOrchestrator<S> {
    source: S,
    config: EngineConfig,
    engine: RecommendationEngine,
}

impl<S: TimeSeriesSource> ForecastOrchestrator<S> {
    pub fn new(source: S, config: EngineConfig) -> Self {
        Self {
            source,
            config,
            engine: RecommendationEngine,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Run one request; `today` is the buy date.
    ///
    /// Any failure is reported for this model and ticker only.
    pub fn run(
        &self,
        request: ForecastRequest,
        today: NaiveDate,
    ) -> std::result::Result<ForecastBundle, ForecastFailure> {
        info!(
            ticker = %request.ticker,
            model = %request.model,
            horizon = request.horizon,
            target_pct = request.target_pct,
            "forecast requested"
        );
        self.execute(request, today).map_err(|source| {
            warn!(
                ticker = %request.ticker,
                model = %request.model,
                error = %source,
                "forecast failed"
            );
            ForecastFailure::new(request.model, request.ticker, source)
        })
    }

    fn execute(&self, request: ForecastRequest, today: NaiveDate) -> Result<ForecastBundle> {
        if !self.config.forecast.horizons.contains(&request.horizon) {
            return Err(ForecastError::InvalidParameter(format!(
                "Horizon {} is not one of {:?}",
                request.horizon, self.config.forecast.horizons
            )));
        }
        let series = self.source.load(request.ticker)?;

        let mut gbt_run = None;
        let output = match request.model {
            ModelFamily::ArimaGarch => {
                run_adapter(&ArimaGarchAdapter::new(self.config.arima_garch.clone()), &series, request.horizon)?
            }
            ModelFamily::Prophet => {
                run_adapter(&ProphetAdapter::new(self.config.prophet.clone()), &series, request.horizon)?
            }
            ModelFamily::Lstm => {
                let adapter = LstmAdapter::load(self.config.lstm.clone(), request.ticker)?;
                run_adapter(&adapter, &series, request.horizon)?
            }
            ModelFamily::Xgboost => {
                let adapter = GbtAdapter::new(self.config.gbt.clone(), request.ticker);
                let fit = adapter.fit(&series)?;
                let detailed = adapter.forecast_detailed(&fit, request.horizon)?;
                gbt_run = Some((detailed.strategy, detailed.retrain_count));
                detailed.output
            }
        };

        let ModelOutput {
            forecast,
            backtest,
            frame,
        } = output;
        let metrics = if backtest.is_empty() {
            None
        } else {
            Some(backtest.metrics()?)
        };
        let recommendation =
            self.engine
                .recommend(&series, request.model, &forecast, request.target_pct, today)?;
        let overlays = ChartOverlays::compute(&series, &forecast.values())?;

        Ok(ForecastBundle {
            request,
            history_end: series.last_date(),
            forecast,
            backtest,
            metrics,
            prophet_frame: frame,
            gbt_run,
            recommendation,
            overlays,
            fingerprint: request.fingerprint(),
        })
    }
}

fn run_adapter<A: ModelAdapter>(adapter: &A, series: &PriceSeries, horizon: usize) -> Result<ModelOutput> {
    let fitted = adapter.fit(series)?;
    adapter.forecast(&fitted, horizon)
}

/// Plain-text rendering of a bundle
pub fn render_summary(bundle: &ForecastBundle) -> String {
    let mut out = String::new();
    let req = &bundle.request;
    let _ = writeln!(
        out,
        "{} {} forecast, {} business days after {}",
        req.ticker, req.model, req.horizon, bundle.history_end
    );
    for p in bundle.forecast.points() {
        let _ = match (p.lower, p.upper) {
            (Some(lo), Some(hi)) => writeln!(out, "{}  {:>10.2}  [{:.2}, {:.2}]", p.date, p.value, lo, hi),
            _ => writeln!(out, "{}  {:>10.2}", p.date, p.value),
        };
    }
    if let Some(metrics) = &bundle.metrics {
        let _ = write!(out, "{}", metrics);
    }
    if let Some((strategy, retrains)) = bundle.gbt_run {
        let _ = writeln!(out, "Strategy: {} ({} refits)", strategy, retrains);
    }
    let _ = write!(out, "{}", bundle.recommendation);
    out
}
