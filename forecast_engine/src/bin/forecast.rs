use chrono::Local;
use forecast_engine::cache::RenderCache;
use forecast_engine::config::EngineConfig;
use forecast_engine::data::{CsvPriceSource, Ticker};
use forecast_engine::models::ModelFamily;
use forecast_engine::orchestrator::{render_summary, ForecastOrchestrator, ForecastRequest};
use std::env;
use std::process;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: forecast <TICKER> <MODEL> <HORIZON> <TARGET_PCT> [CONFIG]";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() < 4 || args.len() > 5 {
        eprintln!("{}", USAGE);
        eprintln!(
            "  TICKER one of: {}",
            Ticker::ALL.iter().map(|t| t.symbol()).collect::<Vec<_>>().join(", ")
        );
        eprintln!(
            "  MODEL one of: {}",
            ModelFamily::ALL.iter().map(|m| m.label()).collect::<Vec<_>>().join(", ")
        );
        process::exit(2);
    }

    let config = match args.get(4) {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    // RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    let ticker: Ticker = args[0].parse()?;
    let model: ModelFamily = args[1].parse()?;
    let horizon: usize = args[2].parse()?;
    let target_pct: f64 = args[3].parse()?;

    let source = CsvPriceSource::new(&config.data.data_dir, config.data.history_start);
    let mut renders: RenderCache<String> = RenderCache::new(config.cache.capacity);
    let orchestrator = ForecastOrchestrator::new(source, config);

    let request = ForecastRequest::new(ticker, model, horizon, target_pct);
    let today = Local::now().date_naive();
    match orchestrator.run(request, today) {
        Ok(bundle) => {
            if let Some(text) = renders.get_or_insert_with(&bundle.fingerprint, || render_summary(&bundle)) {
                println!("{}", text);
            }
            Ok(())
        }
        Err(failure) => {
            eprintln!("{}", failure);
            if failure.is_missing_artifact() {
                eprintln!("No trained network is available for {}.", failure.ticker);
            }
            process::exit(1);
        }
    }
}
