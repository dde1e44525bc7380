//! Side-by-side accuracy of the four historical fits
//!
//! Every model is fitted on the same preprocessed series and scored with MAE
//! and RMSE. The fits cover different date ranges (the autoregressive models
//! lose their leading lags, the recurrent model only predicts its held-out
//! tail), so an [`AlignmentStrategy`] decides which points are compared.

use crate::config::AnalysisConfig;
use crate::data::{DataLoader, MarketDataProvider};
use crate::error::{ForecastError, Result};
use crate::metrics;
use crate::models::{adapter_for, FitResult, ModelKind};
use crate::preprocessing::{preprocess, PreprocessedSeries};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// How fitted values are paired with actual closes across models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlignmentStrategy {
    /// Score every model on the calendar dates covered by all fits
    #[default]
    CommonDates,
    /// Score each fit on its own last N points, N being the shorter of the
    /// fit and its actual values; models may cover different windows
    TrailingCount,
}

impl fmt::Display for AlignmentStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlignmentStrategy::CommonDates => write!(f, "common-dates"),
            AlignmentStrategy::TrailingCount => write!(f, "trailing-count"),
        }
    }
}

impl FromStr for AlignmentStrategy {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "common-dates" => Ok(AlignmentStrategy::CommonDates),
            "trailing-count" => Ok(AlignmentStrategy::TrailingCount),
            other => Err(ForecastError::InvalidParameter(format!(
                "Unknown alignment '{}', expected common-dates or trailing-count",
                other
            ))),
        }
    }
}

/// Accuracy of one model over the window it was compared on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub model: ModelKind,
    pub mae: f64,
    pub rmse: f64,
    /// Percent; `None` when every compared actual is zero
    pub mape: Option<f64>,
    /// Number of compared points
    pub n: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
}

fn record(
    model: ModelKind,
    predicted: &[f64],
    actual: &[f64],
    dates: &[NaiveDate],
) -> Result<EvaluationRecord> {
    let (first_date, last_date) = match (dates.first(), dates.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => {
            return Err(ForecastError::ValidationError(format!(
                "{} has no points to compare",
                model
            )))
        }
    };

    let accuracy = metrics::forecast_accuracy(predicted, actual)?;
    Ok(EvaluationRecord {
        model,
        mae: accuracy.mae,
        rmse: accuracy.rmse,
        mape: accuracy.mape,
        n: predicted.len(),
        first_date,
        last_date,
    })
}

/// Actual values a fit is compared against: its own when it carries them,
/// otherwise the series closes.
fn actual_by_date(series: &PreprocessedSeries, fit: &FitResult) -> BTreeMap<NaiveDate, f64> {
    match fit.actual() {
        Some(actual) => actual.iter().map(|p| (p.date, p.value)).collect(),
        None => series
            .rows()
            .iter()
            .map(|r| (r.record.date, r.record.close))
            .collect(),
    }
}

fn score_common_dates(
    series: &PreprocessedSeries,
    fits: &[FitResult],
) -> Result<Vec<EvaluationRecord>> {
    let mut common: BTreeSet<NaiveDate> = series.dates().into_iter().collect();
    for fit in fits {
        let covered: BTreeSet<NaiveDate> = fit.dates().into_iter().collect();
        common = common.intersection(&covered).copied().collect();
    }
    if common.is_empty() {
        return Err(ForecastError::ValidationError(
            "Model fits share no common dates".to_string(),
        ));
    }
    let dates: Vec<NaiveDate> = common.into_iter().collect();

    fits.iter()
        .map(|fit| {
            let fitted: BTreeMap<NaiveDate, f64> =
                fit.fitted().iter().map(|p| (p.date, p.value)).collect();
            let actual = actual_by_date(series, fit);

            let mut predicted = Vec::with_capacity(dates.len());
            let mut observed = Vec::with_capacity(dates.len());
            for date in &dates {
                match (fitted.get(date), actual.get(date)) {
                    (Some(p), Some(a)) => {
                        predicted.push(*p);
                        observed.push(*a);
                    }
                    _ => {
                        return Err(ForecastError::ValidationError(format!(
                            "{} has no actual value on {}",
                            fit.model(),
                            date
                        )))
                    }
                }
            }

            record(fit.model(), &predicted, &observed, &dates)
        })
        .collect()
}

fn score_trailing_count(
    series: &PreprocessedSeries,
    fits: &[FitResult],
) -> Result<Vec<EvaluationRecord>> {
    let closes = series.closes();

    fits.iter()
        .map(|fit| {
            let actual: Vec<f64> = match fit.actual() {
                Some(actual) => actual.iter().map(|p| p.value).collect(),
                None => closes.clone(),
            };
            let n = fit.len().min(actual.len());
            if n == 0 {
                return Err(ForecastError::ValidationError(format!(
                    "{} has no points to compare",
                    fit.model()
                )));
            }

            let tail = &fit.fitted()[fit.len() - n..];
            let predicted: Vec<f64> = tail.iter().map(|p| p.value).collect();
            let dates: Vec<NaiveDate> = tail.iter().map(|p| p.date).collect();

            record(fit.model(), &predicted, &actual[actual.len() - n..], &dates)
        })
        .collect()
}

/// Score already computed fits of one series
pub fn score_fits(
    series: &PreprocessedSeries,
    fits: &[FitResult],
    alignment: AlignmentStrategy,
) -> Result<Vec<EvaluationRecord>> {
    if fits.is_empty() {
        return Err(ForecastError::ValidationError(
            "Nothing to evaluate".to_string(),
        ));
    }
    match alignment {
        AlignmentStrategy::CommonDates => score_common_dates(series, fits),
        AlignmentStrategy::TrailingCount => score_trailing_count(series, fits),
    }
}

/// Runs every model's historical fit and scores them together
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    config: AnalysisConfig,
}

impl Evaluator {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Load and preprocess the configured evaluation symbol, then evaluate it
    pub fn evaluate<P: MarketDataProvider>(
        &self,
        loader: &DataLoader<P>,
    ) -> Result<Vec<EvaluationRecord>> {
        let eval = &self.config.evaluation;
        let table = loader.load(&eval.symbol, eval.start)?;
        let series = preprocess(&table, &self.config.preprocess)?;
        self.evaluate_series(&series)
    }

    /// One record per model in [`ModelKind::ALL`] order; any failing fit
    /// fails the whole evaluation.
    pub fn evaluate_series(&self, series: &PreprocessedSeries) -> Result<Vec<EvaluationRecord>> {
        let fits = ModelKind::ALL
            .iter()
            .map(|kind| adapter_for(*kind, &self.config).fit_historical(series))
            .collect::<Result<Vec<_>>>()?;

        let alignment = self.config.evaluation.alignment;
        let records = score_fits(series, &fits, alignment)?;
        for r in &records {
            info!(
                model = %r.model,
                mae = r.mae,
                rmse = r.rmse,
                points = r.n,
                %alignment,
                "evaluated"
            );
        }
        Ok(records)
    }
}
