//! Analysis configuration
//!
//! Every tunable of the pipeline lives here with the defaults used by the
//! dashboard. Configuration is layered: defaults, then an optional JSON file,
//! then `CRYPTO_DASH_*` environment variables, then whatever the caller sets
//! explicitly (command-line flags).

use crate::data::{default_cutoff, ymd};
use crate::error::{ForecastError, Result};
use crate::evaluation::AlignmentStrategy;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Prefix of the environment variables read by [`AnalysisConfig::apply_env`]
pub const ENV_PREFIX: &str = "CRYPTO_DASH_";

/// Default chart endpoint of the market-data provider
pub const DEFAULT_PROVIDER_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Where and how price history is obtained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub symbol: String,
    pub start: NaiveDate,
    /// Rows dated after this day are discarded by the loader
    pub cutoff: NaiveDate,
    pub provider_url: String,
    /// Appended to the symbol to form the provider ticker (`BTC` -> `BTC-USD`)
    pub quote_currency: String,
    pub timeout_secs: u64,
    /// Read `<dir>/<SYMBOL>.csv` instead of calling the provider
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            symbol: "BTC".to_string(),
            start: ymd(2016, 1, 1),
            cutoff: default_cutoff(),
            provider_url: DEFAULT_PROVIDER_URL.to_string(),
            quote_currency: "USD".to_string(),
            timeout_secs: 30,
            snapshot_dir: None,
        }
    }
}

impl DataConfig {
    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            return Err(ForecastError::InvalidParameter(
                "Symbol must not be empty".to_string(),
            ));
        }
        if self.start > self.cutoff {
            return Err(ForecastError::InvalidParameter(format!(
                "Start date {} is after the cutoff {}",
                self.start, self.cutoff
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ForecastError::InvalidParameter(
                "Provider timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Window sizes of the derived columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub volatility_window: usize,
    pub short_ma_window: usize,
    pub long_ma_window: usize,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            volatility_window: 7,
            short_ma_window: 7,
            long_ma_window: 30,
        }
    }
}

impl PreprocessConfig {
    /// Number of leading rows without a complete set of derived fields.
    ///
    /// Returns lose one row and their volatility window needs
    /// `volatility_window` returns, so that column is defined from row
    /// `volatility_window` onwards.
    pub fn warmup(&self) -> usize {
        self.volatility_window
            .max(self.short_ma_window.saturating_sub(1))
            .max(self.long_ma_window.saturating_sub(1))
    }

    pub fn validate(&self) -> Result<()> {
        if self.volatility_window < 2 {
            return Err(ForecastError::InvalidParameter(
                "Volatility window must be at least 2".to_string(),
            ));
        }
        if self.short_ma_window == 0 || self.long_ma_window == 0 {
            return Err(ForecastError::InvalidParameter(
                "Moving average windows must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Non-seasonal ARIMA order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArimaConfig {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl Default for ArimaConfig {
    fn default() -> Self {
        Self { p: 5, d: 1, q: 0 }
    }
}

impl ArimaConfig {
    pub fn validate(&self) -> Result<()> {
        if self.p == 0 && self.q == 0 {
            return Err(ForecastError::InvalidParameter(
                "ARIMA needs at least one AR or MA term".to_string(),
            ));
        }
        if self.d > 2 {
            return Err(ForecastError::InvalidParameter(format!(
                "Differencing order {} is not supported (max 2)",
                self.d
            )));
        }
        Ok(())
    }
}

/// Seasonal ARIMA order `(p,d,q) x (P,D,Q,s)`, shared by fitting and forecasting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SarimaConfig {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub seasonal_p: usize,
    pub seasonal_d: usize,
    pub seasonal_q: usize,
    pub period: usize,
    /// Iteration cap of the Nelder-Mead search
    pub max_iter: usize,
}

impl Default for SarimaConfig {
    fn default() -> Self {
        Self {
            p: 1,
            d: 1,
            q: 1,
            seasonal_p: 1,
            seasonal_d: 1,
            seasonal_q: 1,
            period: 12,
            max_iter: 2000,
        }
    }
}

impl SarimaConfig {
    pub fn validate(&self) -> Result<()> {
        let seasonal = self.seasonal_p + self.seasonal_d + self.seasonal_q > 0;
        if seasonal && self.period < 2 {
            return Err(ForecastError::InvalidParameter(
                "Seasonal period must be at least 2".to_string(),
            ));
        }
        if self.p + self.q + self.seasonal_p + self.seasonal_q == 0 {
            return Err(ForecastError::InvalidParameter(
                "SARIMA needs at least one AR or MA term".to_string(),
            ));
        }
        if self.d > 2 || self.seasonal_d > 1 {
            return Err(ForecastError::InvalidParameter(
                "Differencing orders above d=2, D=1 are not supported".to_string(),
            ));
        }
        if self.max_iter == 0 {
            return Err(ForecastError::InvalidParameter(
                "Iteration cap must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Decomposition model settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProphetConfig {
    pub n_changepoints: usize,
    /// Share of the history in which changepoints are placed
    pub changepoint_range: f64,
    pub changepoint_prior_scale: f64,
    pub yearly_seasonality: bool,
    pub yearly_order: usize,
    pub weekly_seasonality: bool,
    pub weekly_order: usize,
    pub seasonality_prior_scale: f64,
    pub interval_width: f64,
}

impl Default for ProphetConfig {
    fn default() -> Self {
        Self {
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            yearly_seasonality: true,
            yearly_order: 10,
            weekly_seasonality: false,
            weekly_order: 3,
            seasonality_prior_scale: 10.0,
            interval_width: 0.95,
        }
    }
}

impl ProphetConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.changepoint_range > 0.0 && self.changepoint_range <= 1.0) {
            return Err(ForecastError::InvalidParameter(
                "Changepoint range must be in (0, 1]".to_string(),
            ));
        }
        if self.changepoint_prior_scale <= 0.0 || self.seasonality_prior_scale <= 0.0 {
            return Err(ForecastError::InvalidParameter(
                "Prior scales must be positive".to_string(),
            ));
        }
        if !(self.interval_width > 0.0 && self.interval_width < 1.0) {
            return Err(ForecastError::InvalidParameter(
                "Interval width must be between 0 and 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Recurrent network settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LstmConfig {
    pub lookback: usize,
    pub hidden_units: usize,
    pub layers: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Share of the windows used for training in the historical fit
    pub train_ratio: f64,
    /// `None` seeds from entropy
    pub seed: Option<u64>,
}

impl Default for LstmConfig {
    fn default() -> Self {
        Self {
            lookback: 60,
            hidden_units: 50,
            layers: 2,
            epochs: 5,
            batch_size: 32,
            learning_rate: 0.001,
            train_ratio: 0.8,
            seed: Some(42),
        }
    }
}

impl LstmConfig {
    pub fn validate(&self) -> Result<()> {
        if self.lookback == 0 || self.hidden_units == 0 || self.layers == 0 {
            return Err(ForecastError::InvalidParameter(
                "Lookback, hidden units and layers must be greater than zero".to_string(),
            ));
        }
        if self.epochs == 0 || self.batch_size == 0 {
            return Err(ForecastError::InvalidParameter(
                "Epochs and batch size must be greater than zero".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(ForecastError::InvalidParameter(
                "Learning rate must be positive".to_string(),
            ));
        }
        if !(self.train_ratio > 0.0 && self.train_ratio < 1.0) {
            return Err(ForecastError::InvalidParameter(
                "Train ratio must be between 0 and 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// What the evaluator loads and how it aligns the fits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub symbol: String,
    pub start: NaiveDate,
    pub alignment: AlignmentStrategy,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            symbol: "BTC".to_string(),
            start: ymd(2016, 1, 1),
            alignment: AlignmentStrategy::default(),
        }
    }
}

/// Complete configuration of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub data: DataConfig,
    pub preprocess: PreprocessConfig,
    pub arima: ArimaConfig,
    pub sarima: SarimaConfig,
    pub prophet: ProphetConfig,
    pub lstm: LstmConfig,
    pub evaluation: EvaluationConfig,
    pub forecast_steps: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            data: DataConfig::default(),
            preprocess: PreprocessConfig::default(),
            arima: ArimaConfig::default(),
            sarima: SarimaConfig::default(),
            prophet: ProphetConfig::default(),
            lstm: LstmConfig::default(),
            evaluation: EvaluationConfig::default(),
            forecast_steps: 30,
        }
    }
}

impl AnalysisConfig {
    /// Read a (possibly partial) configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        debug!(path = %path.as_ref().display(), "loaded configuration file");
        Ok(config)
    }

    /// Override fields from `CRYPTO_DASH_*` process environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Override fields from any key lookup; keys carry the [`ENV_PREFIX`]
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(symbol) = get("SYMBOL") {
            self.data.symbol = symbol.trim().to_uppercase();
        }
        if let Some(start) = get("START") {
            self.data.start = parse_env("START", &start)?;
        }
        if let Some(url) = get("PROVIDER_URL") {
            self.data.provider_url = url;
        }
        if let Some(dir) = get("SNAPSHOT_DIR") {
            self.data.snapshot_dir = Some(PathBuf::from(dir));
        }
        if let Some(steps) = get("FORECAST_STEPS") {
            self.forecast_steps = parse_env("FORECAST_STEPS", &steps)?;
        }
        if let Some(seed) = get("LSTM_SEED") {
            self.lstm.seed = Some(parse_env("LSTM_SEED", &seed)?);
        }
        if let Some(symbol) = get("EVAL_SYMBOL") {
            self.evaluation.symbol = symbol.trim().to_uppercase();
        }
        if let Some(start) = get("EVAL_START") {
            self.evaluation.start = parse_env("EVAL_START", &start)?;
        }
        if let Some(alignment) = get("ALIGNMENT") {
            self.evaluation.alignment = parse_env("ALIGNMENT", &alignment)?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.data.validate()?;
        self.preprocess.validate()?;
        self.arima.validate()?;
        self.sarima.validate()?;
        self.prophet.validate()?;
        self.lstm.validate()?;
        if self.forecast_steps == 0 {
            return Err(ForecastError::InvalidParameter(
                "Forecast steps must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| {
        ForecastError::ParseError(format!("{}{}={}: {}", ENV_PREFIX, name, value, e))
    })
}
