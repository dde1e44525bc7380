//! Derived rolling features over a price table

use crate::config::PreprocessConfig;
use crate::data::{PriceRecord, PriceTable};
use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use crypto_math::returns::pct_change;
use crypto_math::rolling::{rolling_mean, rolling_std_opt};
use polars::prelude::*;
use serde::Serialize;
use tracing::debug;

/// A price record with its trailing-window features.
///
/// Fields are named after the default windows; the actual window sizes are
/// those of the [`PreprocessConfig`] the series was built with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PreprocessedRow {
    #[serde(flatten)]
    pub record: PriceRecord,
    /// Day-over-day percentage change of close
    pub daily_return: f64,
    /// Sample standard deviation of daily returns
    pub volatility_7d: f64,
    pub ma_7: f64,
    pub ma_30: f64,
}

/// Output of [`preprocess`]. Immutable; rebuild it from the table to change it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreprocessedSeries {
    symbol: String,
    config: PreprocessConfig,
    rows: Vec<PreprocessedRow>,
}

impl PreprocessedSeries {
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    pub fn rows(&self) -> &[PreprocessedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.rows.iter().map(|r| r.record.date).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.record.close).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.rows.first().map(|r| r.record.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.last().map(|r| r.record.date)
    }

    /// The base records without derived fields
    pub fn to_price_table(&self) -> PriceTable {
        PriceTable::from_unsorted(
            self.symbol.clone(),
            self.rows.iter().map(|r| r.record).collect(),
        )
    }

    /// Ten-column frame: the six base columns plus the derived ones
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut df = self.to_price_table().to_dataframe()?;

        let derived = [
            ("daily_return", self.rows.iter().map(|r| r.daily_return).collect::<Vec<_>>()),
            ("volatility_7d", self.rows.iter().map(|r| r.volatility_7d).collect()),
            ("ma_7", self.rows.iter().map(|r| r.ma_7).collect()),
            ("ma_30", self.rows.iter().map(|r| r.ma_30).collect()),
        ];
        for (name, values) in derived {
            df.with_column(Series::new(name, values))?;
        }

        Ok(df)
    }
}

/// Compute returns, rolling volatility and both moving averages, keeping only
/// rows where every derived field is defined.
///
/// The output has `table.len() - config.warmup()` rows.
pub fn preprocess(table: &PriceTable, config: &PreprocessConfig) -> Result<PreprocessedSeries> {
    config.validate()?;

    let warmup = config.warmup();
    if table.len() <= warmup {
        return Err(ForecastError::InsufficientData {
            required: warmup + 1,
            actual: table.len(),
        });
    }

    // PriceTable already guarantees ascending unique dates
    let closes = table.closes();
    let returns = pct_change(&closes);
    let volatility = rolling_std_opt(&returns, config.volatility_window)?;
    let ma_short = rolling_mean(&closes, config.short_ma_window)?;
    let ma_long = rolling_mean(&closes, config.long_ma_window)?;

    let rows: Vec<PreprocessedRow> = table
        .records()
        .iter()
        .enumerate()
        .filter_map(|(i, record)| {
            Some(PreprocessedRow {
                record: *record,
                daily_return: returns[i]?,
                volatility_7d: volatility[i]?,
                ma_7: ma_short[i]?,
                ma_30: ma_long[i]?,
            })
        })
        .collect();

    debug!(
        symbol = table.symbol(),
        input = table.len(),
        output = rows.len(),
        "preprocessed series"
    );

    Ok(PreprocessedSeries {
        symbol: table.symbol().to_string(),
        config: *config,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::generate_price_table;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_output_length() {
        let table = generate_price_table("BTC", 100, 1);
        let series = preprocess(&table, &PreprocessConfig::default()).unwrap();

        assert_eq!(series.len(), 100 - 29);
        assert_eq!(series.first_date(), table.records().get(29).map(|r| r.date));
        assert_eq!(series.last_date(), table.last_date());
    }

    #[test]
    fn test_derived_values() {
        let table = generate_price_table("ETH", 40, 3);
        let series = preprocess(&table, &PreprocessConfig::default()).unwrap();
        let closes = table.closes();

        let first = series.rows()[0];
        let expected_ma30 = closes[..30].iter().sum::<f64>() / 30.0;
        let expected_ma7 = closes[23..30].iter().sum::<f64>() / 7.0;
        let expected_ret = closes[29] / closes[28] - 1.0;

        assert_abs_diff_eq!(first.ma_30, expected_ma30, epsilon = 1e-9);
        assert_abs_diff_eq!(first.ma_7, expected_ma7, epsilon = 1e-9);
        assert_abs_diff_eq!(first.daily_return, expected_ret, epsilon = 1e-12);
        assert!(first.volatility_7d >= 0.0);
    }

    #[test]
    fn test_short_windows() {
        let config = PreprocessConfig {
            volatility_window: 3,
            short_ma_window: 2,
            long_ma_window: 3,
        };
        let table = generate_price_table("SOL", 10, 5);
        let series = preprocess(&table, &config).unwrap();

        // Volatility over three returns needs four prices
        assert_eq!(series.len(), 10 - 3);
    }

    #[test]
    fn test_too_short() {
        let table = generate_price_table("BTC", 29, 1);
        assert!(matches!(
            preprocess(&table, &PreprocessConfig::default()),
            Err(ForecastError::InsufficientData {
                required: 30,
                actual: 29
            })
        ));
    }

    #[test]
    fn test_dataframe_columns() {
        let table = generate_price_table("BTC", 35, 9);
        let df = preprocess(&table, &PreprocessConfig::default())
            .unwrap()
            .to_dataframe()
            .unwrap();

        assert_eq!(df.shape(), (6, 10));
        assert!(df.column("volatility_7d").is_ok());
    }
}
