//! Forecasting models over a preprocessed closing-price series
//!
//! Every model is wrapped in a [`ForecastAdapter`] with the same two entry
//! points: an in-sample historical fit and an out-of-sample forecast of the
//! calendar days right after the last observation. Hyperparameters come from
//! configuration and are never searched.

pub(crate) mod arma;

pub mod arima;
pub mod lstm;
pub mod prophet;
pub mod sarima;

use crate::config::AnalysisConfig;
use crate::error::{ForecastError, Result};
use crate::preprocessing::PreprocessedSeries;
use crate::utils::future_dates;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use arima::ArimaAdapter;
pub use lstm::LstmAdapter;
pub use prophet::ProphetAdapter;
pub use sarima::SarimaAdapter;

/// The four compared model families, in reporting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelKind {
    #[serde(rename = "ARIMA")]
    Arima,
    #[serde(rename = "SARIMA")]
    Sarima,
    #[serde(rename = "Prophet")]
    Prophet,
    #[serde(rename = "LSTM")]
    Lstm,
}

impl ModelKind {
    /// All models in reporting order
    pub const ALL: [ModelKind; 4] = [
        ModelKind::Arima,
        ModelKind::Sarima,
        ModelKind::Prophet,
        ModelKind::Lstm,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::Arima => "ARIMA",
            ModelKind::Sarima => "SARIMA",
            ModelKind::Prophet => "Prophet",
            ModelKind::Lstm => "LSTM",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "arima" => Ok(ModelKind::Arima),
            "sarima" => Ok(ModelKind::Sarima),
            "prophet" => Ok(ModelKind::Prophet),
            "lstm" => Ok(ModelKind::Lstm),
            other => Err(ForecastError::InvalidParameter(format!(
                "Unknown model '{}'",
                other
            ))),
        }
    }
}

/// A value attached to a calendar day
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatedValue {
    pub date: NaiveDate,
    pub value: f64,
}

impl DatedValue {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// In-sample fitted values over the dates a model naturally covers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitResult {
    model: ModelKind,
    fitted: Vec<DatedValue>,
    /// Actual closes on the same dates, when the model reports its own
    actual: Option<Vec<DatedValue>>,
}

impl FitResult {
    pub fn new(model: ModelKind, fitted: Vec<DatedValue>) -> Result<Self> {
        if fitted.is_empty() {
            return Err(ForecastError::ModelError(format!(
                "{} produced no fitted values",
                model
            )));
        }
        if let Some(bad) = fitted.iter().find(|p| !p.value.is_finite()) {
            return Err(ForecastError::ModelError(format!(
                "{} produced a non-finite fitted value on {}",
                model, bad.date
            )));
        }
        Ok(Self {
            model,
            fitted,
            actual: None,
        })
    }

    /// Attach the actual values the fit should be compared against
    pub fn with_actual(mut self, actual: Vec<DatedValue>) -> Result<Self> {
        let aligned = actual.len() == self.fitted.len()
            && actual.iter().zip(&self.fitted).all(|(a, f)| a.date == f.date);
        if !aligned {
            return Err(ForecastError::ValidationError(format!(
                "{} actual values are not aligned with its fitted values",
                self.model
            )));
        }
        self.actual = Some(actual);
        Ok(self)
    }

    pub fn model(&self) -> ModelKind {
        self.model
    }

    pub fn fitted(&self) -> &[DatedValue] {
        &self.fitted
    }

    pub fn actual(&self) -> Option<&[DatedValue]> {
        self.actual.as_deref()
    }

    pub fn len(&self) -> usize {
        self.fitted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fitted.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.fitted.iter().map(|p| p.date).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.fitted.iter().map(|p| p.value).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.fitted.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.fitted.last().map(|p| p.date)
    }
}

/// Out-of-sample forecast for consecutive days after the last observation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResult {
    model: ModelKind,
    points: Vec<DatedValue>,
    /// 95% (or configured) prediction interval per point
    intervals: Option<Vec<(f64, f64)>>,
}

impl ForecastResult {
    /// Date `values` from the day after `last_date`
    pub fn new(model: ModelKind, last_date: NaiveDate, values: Vec<f64>) -> Result<Self> {
        if let Some(v) = values.iter().find(|v| !v.is_finite()) {
            return Err(ForecastError::ModelError(format!(
                "{} produced a non-finite forecast ({})",
                model, v
            )));
        }

        let dates = future_dates(last_date, values.len())?;
        let points = dates
            .into_iter()
            .zip(values)
            .map(|(d, v)| DatedValue::new(d, v))
            .collect();

        Ok(Self {
            model,
            points,
            intervals: None,
        })
    }

    /// Same as [`new`](Self::new) with prediction intervals
    pub fn new_with_intervals(
        model: ModelKind,
        last_date: NaiveDate,
        values: Vec<f64>,
        intervals: Vec<(f64, f64)>,
    ) -> Result<Self> {
        if values.len() != intervals.len() {
            return Err(ForecastError::ValidationError(format!(
                "Values length ({}) doesn't match intervals length ({})",
                values.len(),
                intervals.len()
            )));
        }

        let mut result = Self::new(model, last_date, values)?;
        result.intervals = Some(intervals);
        Ok(result)
    }

    pub fn model(&self) -> ModelKind {
        self.model
    }

    pub fn points(&self) -> &[DatedValue] {
        &self.points
    }

    pub fn intervals(&self) -> Option<&[(f64, f64)]> {
        self.intervals.as_deref()
    }

    /// Number of forecast days
    pub fn horizons(&self) -> usize {
        self.points.len()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }
}

/// Fit/forecast contract shared by all models
pub trait ForecastAdapter {
    fn kind(&self) -> ModelKind;

    /// Fit on the whole closing series and return in-sample values
    fn fit_historical(&self, series: &PreprocessedSeries) -> Result<FitResult>;

    /// Forecast `steps` calendar days after the last date of `series`
    fn forecast_future(&self, series: &PreprocessedSeries, steps: usize)
        -> Result<ForecastResult>;

    fn name(&self) -> &'static str {
        self.kind().name()
    }
}

/// Build the adapter of `kind` from the analysis configuration
pub fn adapter_for(kind: ModelKind, config: &AnalysisConfig) -> Box<dyn ForecastAdapter> {
    match kind {
        ModelKind::Arima => Box::new(ArimaAdapter::new(config.arima)),
        ModelKind::Sarima => Box::new(SarimaAdapter::new(config.sarima)),
        ModelKind::Prophet => Box::new(ProphetAdapter::new(config.prophet)),
        ModelKind::Lstm => Box::new(LstmAdapter::new(config.lstm)),
    }
}

pub(crate) fn check_steps(steps: usize) -> Result<()> {
    if steps == 0 {
        return Err(ForecastError::InvalidParameter(
            "Forecast steps must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Last observed date of a non-empty series
pub(crate) fn last_date(series: &PreprocessedSeries) -> Result<NaiveDate> {
    series.last_date().ok_or(ForecastError::InsufficientData {
        required: 1,
        actual: 0,
    })
}
