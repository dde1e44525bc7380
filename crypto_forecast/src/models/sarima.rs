//! Seasonal ARIMA `(p,d,q) x (P,D,Q,s)`
//!
//! One order drives both the historical fit and the forecast. The closing
//! series is first put on a gapless daily calendar (missing days carry the
//! previous close forward), then estimated by conditional sum of squares.

use crate::config::SarimaConfig;
use crate::error::Result;
use crate::models::arima::INTERVAL_LEVEL;
use crate::models::arma::{ArmaOrder, FittedArma};
use crate::models::{
    check_steps, last_date, DatedValue, FitResult, ForecastAdapter, ForecastResult, ModelKind,
};
use crate::preprocessing::PreprocessedSeries;
use chrono::{Days, NaiveDate};
use tracing::{debug, info};

/// Forward-fill `values` onto every calendar day between the first and last date
pub fn regularize_daily(dates: &[NaiveDate], values: &[f64]) -> (Vec<NaiveDate>, Vec<f64>) {
    let mut out_dates: Vec<NaiveDate> = Vec::with_capacity(dates.len());
    let mut out_values: Vec<f64> = Vec::with_capacity(values.len());

    for (date, value) in dates.iter().zip(values) {
        let previous = out_dates.last().copied().zip(out_values.last().copied());
        if let Some((mut day, prev_value)) = previous {
            while let Some(next) = day.checked_add_days(Days::new(1)) {
                if next >= *date {
                    break;
                }
                out_dates.push(next);
                out_values.push(prev_value);
                day = next;
            }
        }
        out_dates.push(*date);
        out_values.push(*value);
    }

    (out_dates, out_values)
}

/// Seasonal ARIMA adapter
#[derive(Debug, Clone)]
pub struct SarimaAdapter {
    config: SarimaConfig,
}

impl SarimaAdapter {
    pub fn new(config: SarimaConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SarimaConfig {
        &self.config
    }

    fn order(&self) -> ArmaOrder {
        ArmaOrder {
            p: self.config.p,
            d: self.config.d,
            q: self.config.q,
            seasonal_p: self.config.seasonal_p,
            seasonal_d: self.config.seasonal_d,
            seasonal_q: self.config.seasonal_q,
            period: self.config.period,
        }
    }

    fn train(&self, series: &PreprocessedSeries) -> Result<(Vec<NaiveDate>, FittedArma)> {
        self.config.validate()?;
        let (dates, closes) = regularize_daily(&series.dates(), &series.closes());
        let filled = dates.len() - series.len();
        if filled > 0 {
            debug!(filled, "forward-filled missing calendar days");
        }

        let model = FittedArma::fit(&closes, self.order(), self.config.max_iter)?;
        Ok((dates, model))
    }
}

impl Default for SarimaAdapter {
    fn default() -> Self {
        Self::new(SarimaConfig::default())
    }
}

impl ForecastAdapter for SarimaAdapter {
    fn kind(&self) -> ModelKind {
        ModelKind::Sarima
    }

    fn fit_historical(&self, series: &PreprocessedSeries) -> Result<FitResult> {
        let (dates, model) = self.train(series)?;

        let fitted: Vec<DatedValue> = dates[model.first_fitted_index()..]
            .iter()
            .zip(model.fitted_levels())
            .map(|(d, v)| DatedValue::new(*d, v))
            .collect();

        info!(
            symbol = series.symbol(),
            points = fitted.len(),
            sigma2 = model.sigma2(),
            "SARIMA historical fit"
        );

        FitResult::new(ModelKind::Sarima, fitted)
    }

    fn forecast_future(
        &self,
        series: &PreprocessedSeries,
        steps: usize,
    ) -> Result<ForecastResult> {
        check_steps(steps)?;
        let last = last_date(series)?;
        let (_, model) = self.train(series)?;
        let (values, intervals) = model.forecast(steps, INTERVAL_LEVEL)?;

        info!(symbol = series.symbol(), steps, "SARIMA forecast");
        ForecastResult::new_with_intervals(ModelKind::Sarima, last, values, intervals)
    }
}
