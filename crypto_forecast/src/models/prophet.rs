//! Trend-plus-seasonality decomposition in the style of Prophet
//!
//! The model works on `ln(close)` so that back-transformed forecasts stay
//! positive:
//!
//! ```text
//! ln(close)(t) = k + m t + sum_j delta_j (t - s_j)+ + seasonality(t) + noise
//! ```
//!
//! `s_j` are potential changepoints spread evenly over the first part of the
//! history and `delta_j` their slope changes. Seasonality is a Fourier series
//! with a 365.25-day period (and optionally a 7-day one). All coefficients are
//! fitted once by ridge-penalised least squares; the penalties correspond to
//! Gaussian priors with the configured scales. A sub-daily component would be
//! constant on one-sample-per-day data, so none is modelled.

use crate::config::ProphetConfig;
use crate::error::{ForecastError, Result};
use crate::models::{
    check_steps, last_date, DatedValue, FitResult, ForecastAdapter, ForecastResult, ModelKind,
};
use crate::preprocessing::PreprocessedSeries;
use crate::utils::future_dates;
use chrono::NaiveDate;
use crypto_math::linalg::ridge_least_squares;
use ndarray::{Array1, Array2};
use statrs::distribution::{ContinuousCDF, Normal};
use std::f64::consts::PI;
use tracing::{debug, info};

const YEAR_DAYS: f64 = 365.25;
const WEEK_DAYS: f64 = 7.0;

/// Penalty applied to unpenalised columns to keep the first pass solvable
const JITTER: f64 = 1e-8;

/// Smallest history the decomposition accepts
pub const MIN_OBSERVATIONS: usize = 3;

/// Prophet-style decomposition adapter
#[derive(Debug, Clone)]
pub struct ProphetAdapter {
    config: ProphetConfig,
}

/// Coefficients and scaling of a fitted decomposition
#[derive(Debug, Clone)]
struct FittedProphet {
    config: ProphetConfig,
    origin: NaiveDate,
    /// Days between the first and last history date
    span: f64,
    /// Changepoint locations on the scaled time axis
    changepoints: Vec<f64>,
    beta: Array1<f64>,
    /// `ln(close)` is divided by this before fitting
    y_scale: f64,
    /// Residual standard deviation on the log scale
    sigma: f64,
}

impl FittedProphet {
    fn fourier_terms(&self, days: f64, row: &mut Vec<f64>) {
        let mut push = |period: f64, order: usize| {
            for k in 1..=order {
                let x = 2.0 * PI * k as f64 * days / period;
                row.push(x.sin());
                row.push(x.cos());
            }
        };
        if self.config.yearly_seasonality {
            push(YEAR_DAYS, self.config.yearly_order);
        }
        if self.config.weekly_seasonality {
            push(WEEK_DAYS, self.config.weekly_order);
        }
    }

    fn design_row(&self, date: NaiveDate) -> Vec<f64> {
        let days = (date - self.origin).num_days() as f64;
        let t = days / self.span;

        let mut row = Vec::with_capacity(2 + self.changepoints.len());
        row.push(1.0);
        row.push(t);
        row.extend(self.changepoints.iter().map(|s| (t - s).max(0.0)));
        self.fourier_terms(days, &mut row);
        row
    }

    fn design(&self, dates: &[NaiveDate]) -> Array2<f64> {
        let rows: Vec<Vec<f64>> = dates.iter().map(|d| self.design_row(*d)).collect();
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        let mut x = Array2::<f64>::zeros((rows.len(), cols));
        for (i, row) in rows.iter().enumerate() {
            for (j, v) in row.iter().enumerate() {
                x[[i, j]] = *v;
            }
        }
        x
    }

    fn n_seasonal(&self) -> usize {
        let yearly = if self.config.yearly_seasonality {
            2 * self.config.yearly_order
        } else {
            0
        };
        let weekly = if self.config.weekly_seasonality {
            2 * self.config.weekly_order
        } else {
            0
        };
        yearly + weekly
    }

    /// Per-column penalties for a residual variance `sigma2` (scaled units)
    fn penalties(&self, sigma2: f64, with_changepoints: bool) -> Vec<f64> {
        // Laplace prior with scale b has variance 2 b^2
        let cp_var = 2.0 * self.config.changepoint_prior_scale.powi(2);
        let season_var = self.config.seasonality_prior_scale.powi(2);

        let mut p = vec![0.0, 0.0];
        p.extend(self.changepoints.iter().map(|_| {
            if with_changepoints {
                (sigma2 / cp_var).max(JITTER)
            } else {
                // Effectively removes the changepoints in the first pass
                1e12
            }
        }));
        p.extend(std::iter::repeat((sigma2 / season_var).max(JITTER)).take(self.n_seasonal()));
        p
    }

    /// Predicted `ln(close)` for each date
    fn predict_log(&self, dates: &[NaiveDate]) -> Vec<f64> {
        self.design(dates)
            .dot(&self.beta)
            .iter()
            .map(|v| v * self.y_scale)
            .collect()
    }
}

/// Changepoints at evenly spaced history rows within the leading `range` share
fn changepoint_positions(t: &[f64], n_changepoints: usize, range: f64) -> Vec<f64> {
    let hist = ((t.len() as f64) * range).floor() as usize;
    let n = n_changepoints.min(hist.saturating_sub(1));
    if n == 0 {
        return Vec::new();
    }

    let last = (hist - 1) as f64;
    (1..=n)
        .map(|j| {
            let idx = (last * j as f64 / n as f64).round() as usize;
            t[idx.min(t.len() - 1)]
        })
        .collect()
}

impl ProphetAdapter {
    pub fn new(config: ProphetConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProphetConfig {
        &self.config
    }

    fn train(&self, dates: &[NaiveDate], closes: &[f64]) -> Result<FittedProphet> {
        self.config.validate()?;
        if dates.len() < MIN_OBSERVATIONS {
            return Err(ForecastError::InsufficientData {
                required: MIN_OBSERVATIONS,
                actual: dates.len(),
            });
        }
        if let Some(bad) = closes.iter().find(|c| !(**c > 0.0)) {
            return Err(ForecastError::DataError(format!(
                "Log transform needs positive prices, found {}",
                bad
            )));
        }

        let origin = dates[0];
        let span = (dates[dates.len() - 1] - origin).num_days() as f64;
        if span <= 0.0 {
            return Err(ForecastError::DataError(
                "History must span more than one day".to_string(),
            ));
        }
        let t: Vec<f64> = dates
            .iter()
            .map(|d| (*d - origin).num_days() as f64 / span)
            .collect();

        let log_y: Vec<f64> = closes.iter().map(|c| c.ln()).collect();
        let y_scale = log_y
            .iter()
            .fold(0.0_f64, |acc, v| acc.max(v.abs()))
            .max(f64::MIN_POSITIVE);
        let y = Array1::from_iter(log_y.iter().map(|v| v / y_scale));

        let mut model = FittedProphet {
            config: self.config,
            origin,
            span,
            changepoints: changepoint_positions(
                &t,
                self.config.n_changepoints,
                self.config.changepoint_range,
            ),
            beta: Array1::zeros(0),
            y_scale,
            sigma: 0.0,
        };
        let x = model.design(dates);

        // First pass without changepoints gives the noise level for the priors
        let beta0 = ridge_least_squares(&x, &y, &model.penalties(1.0, false))?;
        let sigma2 = residual_variance(&x, &y, &beta0);

        let beta = ridge_least_squares(&x, &y, &model.penalties(sigma2, true))?;
        let final_var = residual_variance(&x, &y, &beta);
        model.beta = beta;
        model.sigma = final_var.sqrt() * y_scale;

        debug!(
            changepoints = model.changepoints.len(),
            seasonal_terms = model.n_seasonal(),
            sigma = model.sigma,
            "fitted decomposition"
        );

        Ok(model)
    }
}

fn residual_variance(x: &Array2<f64>, y: &Array1<f64>, beta: &Array1<f64>) -> f64 {
    let resid = y - &x.dot(beta);
    resid.iter().map(|r| r * r).sum::<f64>() / resid.len() as f64
}

impl Default for ProphetAdapter {
    fn default() -> Self {
        Self::new(ProphetConfig::default())
    }
}

impl ForecastAdapter for ProphetAdapter {
    fn kind(&self) -> ModelKind {
        ModelKind::Prophet
    }

    fn fit_historical(&self, series: &PreprocessedSeries) -> Result<FitResult> {
        let dates = series.dates();
        let model = self.train(&dates, &series.closes())?;

        let fitted = dates
            .iter()
            .zip(model.predict_log(&dates))
            .map(|(d, v)| DatedValue::new(*d, v.exp()))
            .collect::<Vec<_>>();

        info!(
            symbol = series.symbol(),
            points = fitted.len(),
            "Prophet historical fit"
        );
        FitResult::new(ModelKind::Prophet, fitted)
    }

    fn forecast_future(
        &self,
        series: &PreprocessedSeries,
        steps: usize,
    ) -> Result<ForecastResult> {
        check_steps(steps)?;
        let last = last_date(series)?;
        let history = series.dates();
        let model = self.train(&history, &series.closes())?;

        // Predict history and future as one frame, keep the future tail
        let mut frame = history;
        frame.extend(future_dates(last, steps)?);
        let log_pred = model.predict_log(&frame);
        let tail = &log_pred[log_pred.len() - steps..];

        let z = Normal::new(0.0, 1.0)
            .map_err(|e| ForecastError::ModelError(e.to_string()))?
            .inverse_cdf(0.5 + self.config.interval_width / 2.0);
        let half = z * model.sigma;

        let values = tail.iter().map(|v| v.exp()).collect();
        let intervals = tail
            .iter()
            .map(|v| ((v - half).exp(), (v + half).exp()))
            .collect();

        info!(symbol = series.symbol(), steps, "Prophet forecast");
        ForecastResult::new_with_intervals(ModelKind::Prophet, last, values, intervals)
    }
}
