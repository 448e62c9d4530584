//! LSTM adapter backed by persisted per-ticker artifacts
//!
//! Nothing is trained at request time: the network and the scaler are
//! read from `<artifact_dir>/<TICKER>_lstm_model.json` and
//! `<artifact_dir>/<TICKER>_scaler.json`. The close series is differenced
//! when an ADF test cannot reject a unit root, min-max scaled, and cut into
//! fixed lookback windows. Forecasts roll the network forward on its own
//! output.

use crate::config::LstmConfig;
use crate::data::{PriceSeries, Ticker};
use crate::error::{ForecastError, Result};
use crate::models::{BacktestSeries, ForecastResult, ModelAdapter, ModelFamily, ModelOutput};
use crate::returns::{difference, undifference};
use chrono::NaiveDate;
use ndarray::{s, Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use trade_math::scaling::MinMaxScaler;
use trade_math::stationarity::adf_test;

/// One-step-ahead model over a window of scaled values, oldest first
pub trait SequencePredictor {
    fn predict(&self, window: &[f64]) -> f64;
}

/// Serialized LSTM layer, Keras layout with gates ordered `i, f, c, o`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LstmLayerArtifact {
    pub units: usize,
    /// `input_dim x 4 * units`
    pub kernel: Vec<Vec<f64>>,
    /// `units x 4 * units`
    pub recurrent_kernel: Vec<Vec<f64>>,
    /// `4 * units`
    pub bias: Vec<f64>,
}

/// Serialized output layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseArtifact {
    /// `units x 1`
    pub kernel: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

/// Serialized network: stacked LSTM layers then a single-output dense head
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LstmArtifact {
    pub lookback: usize,
    pub layers: Vec<LstmLayerArtifact>,
    pub dense: DenseArtifact,
}

#[derive(Debug, Clone)]
struct LstmLayer {
    units: usize,
    kernel: Array2<f64>,
    recurrent: Array2<f64>,
    bias: Array1<f64>,
}

fn matrix(rows: &[Vec<f64>], expected: (usize, usize), what: &str) -> Result<Array2<f64>> {
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    if rows.len() != expected.0 || rows.iter().any(|r| r.len() != expected.1) {
        return Err(ForecastError::ArtifactError(format!(
            "{} must be {}x{}",
            what, expected.0, expected.1
        )));
    }
    Array2::from_shape_vec(expected, flat)
        .map_err(|e| ForecastError::ArtifactError(format!("{}: {}", what, e)))
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl LstmLayer {
    fn from_artifact(artifact: &LstmLayerArtifact, input_dim: usize) -> Result<Self> {
        let u = artifact.units;
        if artifact.bias.len() != 4 * u {
            return Err(ForecastError::ArtifactError(format!(
                "LSTM bias must hold {} values",
                4 * u
            )));
        }
        Ok(Self {
            units: u,
            kernel: matrix(&artifact.kernel, (input_dim, 4 * u), "LSTM kernel")?,
            recurrent: matrix(&artifact.recurrent_kernel, (u, 4 * u), "LSTM recurrent kernel")?,
            bias: Array1::from_vec(artifact.bias.clone()),
        })
    }

    /// Hidden state for every timestep of `inputs` (`T x input_dim`)
    fn forward(&self, inputs: &Array2<f64>) -> Array2<f64> {
        let u = self.units;
        let mut h = Array1::<f64>::zeros(u);
        let mut c = Array1::<f64>::zeros(u);
        let mut out = Array2::<f64>::zeros((inputs.nrows(), u));

        for (t, x) in inputs.outer_iter().enumerate() {
            let z = x.dot(&self.kernel) + h.dot(&self.recurrent) + &self.bias;
            let i = z.slice(s![0..u]).mapv(sigmoid);
            let f = z.slice(s![u..2 * u]).mapv(sigmoid);
            let g = z.slice(s![2 * u..3 * u]).mapv(f64::tanh);
            let o = z.slice(s![3 * u..4 * u]).mapv(sigmoid);
            c = &f * &c + &i * &g;
            h = &o * &c.mapv(f64::tanh);
            out.row_mut(t).assign(&h);
        }
        out
    }
}

/// Feed-forward evaluation of a persisted LSTM network
#[derive(Debug, Clone)]
pub struct LstmNetwork {
    lookback: usize,
    layers: Vec<LstmLayer>,
    dense_kernel: Array1<f64>,
    dense_bias: f64,
}

impl LstmNetwork {
    pub fn from_artifact(artifact: &LstmArtifact) -> Result<Self> {
        if artifact.layers.is_empty() {
            return Err(ForecastError::ArtifactError(
                "Network has no LSTM layers".to_string(),
            ));
        }
        let mut input_dim = 1;
        let mut layers = Vec::with_capacity(artifact.layers.len());
        for layer in &artifact.layers {
            let built = LstmLayer::from_artifact(layer, input_dim)?;
            input_dim = built.units;
            layers.push(built);
        }
        let dense = matrix(&artifact.dense.kernel, (input_dim, 1), "dense kernel")?;
        let dense_bias = match artifact.dense.bias.as_slice() {
            [b] => *b,
            _ => {
                return Err(ForecastError::ArtifactError(
                    "dense bias must hold one value".to_string(),
                ))
            }
        };
        Ok(Self {
            lookback: artifact.lookback,
            layers,
            dense_kernel: dense.column(0).to_owned(),
            dense_bias,
        })
    }

    /// Window length the network was trained on
    pub fn lookback(&self) -> usize {
        self.lookback
    }
}

impl SequencePredictor for LstmNetwork {
    fn predict(&self, window: &[f64]) -> f64 {
        let mut seq = Array2::from_shape_fn((window.len(), 1), |(t, _)| window[t]);
        for layer in &self.layers {
            seq = layer.forward(&seq);
        }
        match seq.outer_iter().last() {
            Some(h) => h.dot(&self.dense_kernel) + self.dense_bias,
            None => self.dense_bias,
        }
    }
}

/// Artifact file paths for `ticker`
pub fn artifact_paths(dir: &Path, ticker: Ticker) -> (PathBuf, PathBuf) {
    (
        dir.join(format!("{}_lstm_model.json", ticker.symbol())),
        dir.join(format!("{}_scaler.json", ticker.symbol())),
    )
}

/// Read the persisted network and scaler; a missing file is a hard failure
pub fn load_artifacts(dir: &Path, ticker: Ticker) -> Result<(LstmNetwork, MinMaxScaler)> {
    let (model_path, scaler_path) = artifact_paths(dir, ticker);
    for path in [&model_path, &scaler_path] {
        if !path.exists() {
            return Err(ForecastError::MissingArtifact {
                ticker,
                path: path.clone(),
            });
        }
    }

    let artifact: LstmArtifact = serde_json::from_str(&std::fs::read_to_string(&model_path)?)?;
    let network = LstmNetwork::from_artifact(&artifact)?;
    let scaler: MinMaxScaler = serde_json::from_str(&std::fs::read_to_string(&scaler_path)?)?;
    info!(
        ticker = %ticker,
        layers = artifact.layers.len(),
        lookback = artifact.lookback,
        "loaded lstm artifacts"
    );
    Ok((network, scaler))
}

/// Autoregressive rollout.
///
/// The window starts as `seed` (oldest first). Each step predicts from the
/// current window, appends the prediction and drops the oldest value.
pub fn rollout<P: SequencePredictor + ?Sized>(predictor: &P, seed: &[f64], steps: usize) -> Vec<f64> {
    let mut window: VecDeque<f64> = seed.iter().copied().collect();
    let mut predictions = Vec::with_capacity(steps);
    for _ in 0..steps {
        let next = predictor.predict(window.make_contiguous());
        predictions.push(next);
        window.push_back(next);
        window.pop_front();
    }
    predictions
}

/// Prepared inputs for one request
#[derive(Debug, Clone)]
pub struct LstmFit {
    pub closes: Vec<f64>,
    dates: Vec<NaiveDate>,
    /// ADF verdict on the raw closes
    pub is_stationary: bool,
    /// Scaler refitted on the (possibly differenced) series
    pub scaler: MinMaxScaler,
    pub scaled: Vec<f64>,
    /// Supervised inputs, each the `lookback` values preceding its target
    pub windows: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
    pub lookback: usize,
}

impl LstmFit {
    /// Whether the modelled series is first differences of close
    pub fn differenced(&self) -> bool {
        !self.is_stationary
    }
}

/// LSTM model family
#[derive(Debug, Clone)]
pub struct LstmAdapter<P = LstmNetwork> {
    config: LstmConfig,
    predictor: P,
    scaler: MinMaxScaler,
}

impl LstmAdapter<LstmNetwork> {
    /// Adapter for `ticker` using the artifacts under `config.artifact_dir`
    pub fn load(config: LstmConfig, ticker: Ticker) -> Result<Self> {
        let (network, scaler) = load_artifacts(&config.artifact_dir, ticker)?;
        if network.lookback() != config.lookback {
            warn!(
                ticker = %ticker,
                artifact = network.lookback(),
                configured = config.lookback,
                "artifact lookback differs from configuration"
            );
            return Err(ForecastError::ConfigError(format!(
                "{} network was trained on {}-day windows but lstm.lookback is {}",
                ticker,
                network.lookback(),
                config.lookback
            )));
        }
        Ok(Self::with_predictor(config, network, scaler))
    }
}

impl<P: SequencePredictor> LstmAdapter<P> {
    pub fn with_predictor(config: LstmConfig, predictor: P, scaler: MinMaxScaler) -> Self {
        Self {
            config,
            predictor,
            scaler,
        }
    }

    pub fn predictor(&self) -> &P {
        &self.predictor
    }
}

impl<P: SequencePredictor> ModelAdapter for LstmAdapter<P> {
    type Fitted = LstmFit;

    fn family(&self) -> ModelFamily {
        ModelFamily::Lstm
    }

    fn fit(&self, series: &PriceSeries) -> Result<LstmFit> {
        let lookback = self.config.lookback;
        series.require(lookback + 2)?;
        let closes = series.closes();

        let adf = adf_test(&closes)?;
        let is_stationary = adf.is_stationary(self.config.adf_significance);
        let working = if is_stationary {
            closes.clone()
        } else {
            difference(&closes)
        };
        debug!(p_value = adf.p_value, is_stationary, "lstm stationarity check");

        // The persisted scaler keeps its range but is refitted on this series.
        let mut scaler = self.scaler.clone();
        let scaled = scaler.fit_transform(&working)?;

        let (windows, targets): (Vec<Vec<f64>>, Vec<f64>) = (lookback..scaled.len())
            .map(|t| (scaled[t - lookback..t].to_vec(), scaled[t]))
            .unzip();

        Ok(LstmFit {
            closes,
            dates: series.dates(),
            is_stationary,
            scaler,
            scaled,
            windows,
            targets,
            lookback,
        })
    }

    fn forecast(&self, fitted: &LstmFit, horizon: usize) -> Result<ModelOutput> {
        if horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "Horizon must be positive".to_string(),
            ));
        }
        let lookback = fitted.lookback;
        // Index of the close a working-series value ends at.
        let shift = usize::from(fitted.differenced());

        let in_sample: Vec<f64> = fitted
            .windows
            .iter()
            .map(|w| self.predictor.predict(w))
            .collect();
        let in_sample = fitted.scaler.inverse_transform(&in_sample)?;
        let (mut dates, mut predicted, mut actual) = (Vec::new(), Vec::new(), Vec::new());
        for (k, value) in in_sample.into_iter().enumerate() {
            let idx = k + lookback + shift;
            let price = if fitted.differenced() {
                fitted.closes[idx - 1] + value
            } else {
                value
            };
            dates.push(fitted.dates[idx]);
            predicted.push(price);
            actual.push(fitted.closes[idx]);
        }
        let backtest = BacktestSeries::new(dates, predicted, actual)?;

        let seed = &fitted.scaled[fitted.scaled.len() - lookback..];
        let future = rollout(&self.predictor, seed, horizon);
        let future = fitted.scaler.inverse_transform(&future)?;
        let last_close = fitted.closes[fitted.closes.len() - 1];
        let values = if fitted.differenced() {
            undifference(last_close, &future)
        } else {
            future
        };

        let last_date = fitted.dates[fitted.dates.len() - 1];
        Ok(ModelOutput {
            forecast: ForecastResult::new(last_date, values, None)?,
            backtest,
            frame: None,
        })
    }
}
