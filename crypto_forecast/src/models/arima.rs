//! ARIMA model (AutoRegressive Integrated Moving Average)
//!
//! Fits a fixed `(p,d,q)` order, `(5,1,0)` by default, to the closing price.
//! In-sample values are one-step-ahead predictions on the price scale and
//! start once the differencing and the autoregressive lags are filled. The
//! forecast is the recursive conditional mean with normal 95% intervals.

use crate::config::ArimaConfig;
use crate::error::Result;
use crate::models::arma::{ArmaOrder, FittedArma};
use crate::models::{
    check_steps, last_date, DatedValue, FitResult, ForecastAdapter, ForecastResult, ModelKind,
};
use crate::preprocessing::PreprocessedSeries;
use tracing::info;

/// Nelder-Mead iteration cap when the order has moving-average terms
const MAX_ITER: usize = 1000;

/// Confidence level of the forecast intervals
pub const INTERVAL_LEVEL: f64 = 0.95;

/// ARIMA adapter with a fixed order
#[derive(Debug, Clone)]
pub struct ArimaAdapter {
    config: ArimaConfig,
}

impl ArimaAdapter {
    pub fn new(config: ArimaConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ArimaConfig {
        &self.config
    }

    fn order(&self) -> ArmaOrder {
        ArmaOrder::non_seasonal(self.config.p, self.config.d, self.config.q)
    }

    fn train(&self, series: &PreprocessedSeries) -> Result<FittedArma> {
        self.config.validate()?;
        FittedArma::fit(&series.closes(), self.order(), MAX_ITER)
    }

    /// Estimated AR coefficients of the differenced series, lag 1 first
    pub fn ar_coefficients(&self, series: &PreprocessedSeries) -> Result<Vec<f64>> {
        Ok(self.train(series)?.ar_weights().to_vec())
    }
}

impl Default for ArimaAdapter {
    fn default() -> Self {
        Self::new(ArimaConfig::default())
    }
}

impl ForecastAdapter for ArimaAdapter {
    fn kind(&self) -> ModelKind {
        ModelKind::Arima
    }

    fn fit_historical(&self, series: &PreprocessedSeries) -> Result<FitResult> {
        let model = self.train(series)?;
        let dates = series.dates();

        let fitted: Vec<DatedValue> = dates[model.first_fitted_index()..]
            .iter()
            .zip(model.fitted_levels())
            .map(|(d, v)| DatedValue::new(*d, v))
            .collect();

        info!(
            symbol = series.symbol(),
            order = ?(self.config.p, self.config.d, self.config.q),
            points = fitted.len(),
            sigma2 = model.sigma2(),
            "ARIMA historical fit"
        );

        FitResult::new(ModelKind::Arima, fitted)
    }

    fn forecast_future(
        &self,
        series: &PreprocessedSeries,
        steps: usize,
    ) -> Result<ForecastResult> {
        check_steps(steps)?;
        let last = last_date(series)?;
        let model = self.train(series)?;
        let (values, intervals) = model.forecast(steps, INTERVAL_LEVEL)?;

        info!(symbol = series.symbol(), steps, "ARIMA forecast");
        ForecastResult::new_with_intervals(ModelKind::Arima, last, values, intervals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PreprocessConfig;
    use crate::preprocessing::preprocess;
    use crate::utils::{future_dates, generate_price_table};
    use pretty_assertions::assert_eq;

    fn series(days: usize) -> PreprocessedSeries {
        let table = generate_price_table("BTC", days, 21);
        preprocess(&table, &PreprocessConfig::default()).unwrap()
    }

    #[test]
    fn test_fit_starts_after_lags() {
        let series = series(200);
        let fit = ArimaAdapter::default().fit_historical(&series).unwrap();

        // p + d = 6 leading points have no prediction
        assert_eq!(fit.len(), series.len() - 6);
        assert_eq!(fit.first_date(), Some(series.dates()[6]));
        assert_eq!(fit.last_date(), series.last_date());
    }

    #[test]
    fn test_forecast_dates_and_determinism() {
        let series = series(300);
        let adapter = ArimaAdapter::default();

        let a = adapter.forecast_future(&series, 30).unwrap();
        let b = adapter.forecast_future(&series, 30).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.horizons(), 30);
        assert_eq!(
            a.dates(),
            future_dates(series.last_date().unwrap(), 30).unwrap()
        );
        assert!(a.intervals().is_some());
    }

    #[test]
    fn test_ar_coefficients_match_order() {
        let series = series(200);
        let coefs = ArimaAdapter::default().ar_coefficients(&series).unwrap();

        assert_eq!(coefs.len(), 5);
        assert!(coefs.iter().all(|c| c.is_finite()));
    }

    #[test]
    fn test_zero_steps_rejected() {
        let series = series(120);
        assert!(ArimaAdapter::default().forecast_future(&series, 0).is_err());
    }

    #[test]
    fn test_moving_average_order() {
        let series = series(250);
        let adapter = ArimaAdapter::new(ArimaConfig { p: 1, d: 1, q: 1 });

        let fit = adapter.fit_historical(&series).unwrap();
        assert_eq!(fit.len(), series.len() - 2);
        assert_eq!(adapter.forecast_future(&series, 5).unwrap().horizons(), 5);
    }
}
