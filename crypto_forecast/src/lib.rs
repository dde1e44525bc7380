//! # Crypto Forecast
//!
//! Price analysis and forecast comparison for daily cryptocurrency history.
//!
//! ## Features
//!
//! - Daily OHLCV loading through a pluggable market-data provider, capped at a
//!   fixed cutoff date, with CSV snapshots for offline use
//! - Rolling-feature preprocessing (returns, volatility, moving averages)
//! - Exploratory statistics: KPIs, histograms, correlations, monthly returns
//! - Four forecasting models behind one adapter trait: ARIMA, seasonal ARIMA,
//!   a Prophet-style trend/seasonality decomposition and a stacked LSTM
//! - Side-by-side MAE/RMSE evaluation of the historical fits
//!
//! ## Quick Start
//!
//! ```no_run
//! use crypto_forecast::config::AnalysisConfig;
//! use crypto_forecast::data::DataLoader;
//! use crypto_forecast::models::{adapter_for, ForecastAdapter, ModelKind};
//! use crypto_forecast::preprocessing::preprocess;
//!
//! # fn main() -> crypto_forecast::Result<()> {
//! let config = AnalysisConfig::default();
//!
//! // Load BTC from 2016-01-01 up to the cutoff and derive the rolling features
//! let loader = DataLoader::from_config(&config.data)?;
//! let table = loader.load(&config.data.symbol, config.data.start)?;
//! let series = preprocess(&table, &config.preprocess)?;
//!
//! // 30-day ARIMA(5,1,0) projection
//! let arima = adapter_for(ModelKind::Arima, &config);
//! let forecast = arima.forecast_future(&series, config.forecast_steps)?;
//! for point in forecast.points() {
//!     println!("{} {:.2}", point.date, point.value);
//! }
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod config;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod metrics;
pub mod models;
pub mod preprocessing;
pub mod utils;

// Re-export commonly used types
pub use crate::config::AnalysisConfig;
pub use crate::data::{DataLoader, MarketDataProvider, PriceRecord, PriceTable};
pub use crate::error::{ForecastError, Result};
pub use crate::evaluation::{AlignmentStrategy, EvaluationRecord, Evaluator};
pub use crate::models::{FitResult, ForecastAdapter, ForecastResult, ModelKind};
pub use crate::preprocessing::{preprocess, PreprocessedSeries};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
