//! Exploratory statistics over a price table
//!
//! Produces the numbers behind the overview, KPI and EDA views: descriptive
//! summaries, market KPIs with a coarse risk band, the closing-price
//! histogram, OHLCV correlations, the month-by-month distribution of daily
//! returns and the rolling overlays.

use crate::data::PriceTable;
use crate::error::{ForecastError, Result};
use chrono::{Datelike, NaiveDate};
use crypto_math::returns::pct_change;
use crypto_math::rolling::{rolling_mean, rolling_std_opt};
use crypto_math::stats;
use serde::Serialize;
use statrs::statistics::Statistics;
use std::fmt;

pub use crypto_math::stats::{HistogramBin, Summary};

/// Rows in the trailing KPI window
pub const KPI_WINDOW: usize = 30;

/// Bins of the closing-price histogram
pub const DEFAULT_HISTOGRAM_BINS: usize = 40;

pub const SHORT_SMA_WINDOW: usize = 20;
pub const LONG_SMA_WINDOW: usize = 50;
pub const VOLATILITY_WINDOW: usize = 30;

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Summary statistics of the finite values in `values`
pub fn summary_statistics(values: &[f64]) -> Result<Summary> {
    Ok(stats::summarize(values)?)
}

/// Risk band derived from daily-return volatility in percent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_volatility(volatility_pct: f64) -> Self {
        if volatility_pct < 2.0 {
            RiskLevel::Low
        } else if volatility_pct < 4.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "Low Risk"),
            RiskLevel::Medium => write!(f, "Medium Risk"),
            RiskLevel::High => write!(f, "High Risk"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trend {
    Bullish,
    Bearish,
}

/// Where the last close sits inside the trailing high/low range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RangePosition {
    NearHigh,
    NearLow,
}

/// Headline figures for the latest trading day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketKpis {
    pub symbol: String,
    pub date: NaiveDate,
    pub current_close: f64,
    pub previous_close: f64,
    /// Change against the previous close, in percent
    pub change_pct: f64,
    pub high_30d: f64,
    pub low_30d: f64,
    pub avg_volume_30d: f64,
    /// Sample std of daily returns over the whole table, in percent
    pub volatility_pct: f64,
    pub risk: RiskLevel,
    pub trend: Trend,
    pub position: RangePosition,
}

/// KPIs of the latest row, needs at least two rows
pub fn market_kpis(table: &PriceTable) -> Result<MarketKpis> {
    let records = table.records();
    if records.len() < 2 {
        return Err(ForecastError::InsufficientData {
            required: 2,
            actual: records.len(),
        });
    }

    let latest = records[records.len() - 1];
    let previous = records[records.len() - 2];
    let change_pct = (latest.close - previous.close) / previous.close * 100.0;

    let tail = &records[records.len().saturating_sub(KPI_WINDOW)..];
    let high_30d = Statistics::max(tail.iter().map(|r| r.high));
    let low_30d = Statistics::min(tail.iter().map(|r| r.low));
    let avg_volume_30d = tail.iter().map(|r| r.volume).mean();

    let returns: Vec<f64> = pct_change(&table.closes()).into_iter().flatten().collect();
    let volatility_pct = returns.iter().std_dev() * 100.0;

    let position = if latest.close > (high_30d + low_30d) / 2.0 {
        RangePosition::NearHigh
    } else {
        RangePosition::NearLow
    };

    Ok(MarketKpis {
        symbol: table.symbol().to_string(),
        date: latest.date,
        current_close: latest.close,
        previous_close: previous.close,
        change_pct,
        high_30d,
        low_30d,
        avg_volume_30d,
        volatility_pct,
        risk: RiskLevel::from_volatility(volatility_pct),
        trend: if change_pct >= 0.0 {
            Trend::Bullish
        } else {
            Trend::Bearish
        },
        position,
    })
}

/// Equal-width histogram of closing prices
pub fn close_histogram(table: &PriceTable, bins: usize) -> Result<Vec<HistogramBin>> {
    Ok(stats::histogram(&table.closes(), bins)?)
}

/// Labelled square matrix of pairwise Pearson correlations
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub labels: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, row: &str, col: &str) -> Option<f64> {
        let i = self.labels.iter().position(|l| l == row)?;
        let j = self.labels.iter().position(|l| l == col)?;
        Some(self.values[i][j])
    }
}

/// Correlations between open, high, low, close and volume
pub fn correlation_matrix(table: &PriceTable) -> Result<CorrelationMatrix> {
    let columns = [
        ("Open", table.opens()),
        ("High", table.highs()),
        ("Low", table.lows()),
        ("Close", table.closes()),
        ("Volume", table.volumes()),
    ];
    let slices: Vec<&[f64]> = columns.iter().map(|(_, c)| c.as_slice()).collect();

    Ok(CorrelationMatrix {
        labels: columns.iter().map(|(l, _)| l.to_string()).collect(),
        values: stats::correlation_matrix(&slices)?,
    })
}

/// Daily returns that fell in one calendar month, across all years
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyReturns {
    pub month: &'static str,
    pub returns: Vec<f64>,
    /// `None` for a month without observations
    pub summary: Option<Summary>,
}

/// Daily returns grouped by calendar month, January first
pub fn monthly_return_distribution(table: &PriceTable) -> Result<Vec<MonthlyReturns>> {
    let mut buckets: Vec<Vec<f64>> = vec![Vec::new(); 12];
    for (record, ret) in table.records().iter().zip(pct_change(&table.closes())) {
        if let Some(r) = ret.filter(|r| r.is_finite()) {
            buckets[record.date.month0() as usize].push(r);
        }
    }

    buckets
        .into_iter()
        .zip(MONTH_NAMES)
        .map(|(returns, month)| {
            let summary = if returns.is_empty() {
                None
            } else {
                Some(stats::summarize(&returns)?)
            };
            Ok(MonthlyReturns {
                month,
                returns,
                summary,
            })
        })
        .collect()
}

/// Moving averages and rolling volatility aligned with the table rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollingOverlays {
    pub dates: Vec<NaiveDate>,
    pub close: Vec<f64>,
    pub sma_20: Vec<Option<f64>>,
    pub sma_50: Vec<Option<f64>>,
    /// Sample std of daily returns over 30 rows
    pub volatility_30: Vec<Option<f64>>,
}

pub fn rolling_overlays(table: &PriceTable) -> Result<RollingOverlays> {
    let close = table.closes();
    let returns = pct_change(&close);

    Ok(RollingOverlays {
        dates: table.dates(),
        sma_20: rolling_mean(&close, SHORT_SMA_WINDOW)?,
        sma_50: rolling_mean(&close, LONG_SMA_WINDOW)?,
        volatility_30: rolling_std_opt(&returns, VOLATILITY_WINDOW)?,
        close,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ymd, PriceRecord};
    use crate::utils::generate_price_table;
    use approx::assert_relative_eq;
    use chrono::Days;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn table_from_closes(closes: &[f64]) -> PriceTable {
        let start = ymd(2024, 1, 1);
        let records = closes
            .iter()
            .enumerate()
            .map(|(i, c)| {
                PriceRecord::new(
                    start + Days::new(i as u64),
                    *c,
                    c + 1.0,
                    c - 1.0,
                    *c,
                    1000.0 + i as f64,
                )
            })
            .collect();
        PriceTable::new("TST", records).unwrap()
    }

    #[rstest]
    #[case(0.5, RiskLevel::Low)]
    #[case(2.0, RiskLevel::Medium)]
    #[case(3.99, RiskLevel::Medium)]
    #[case(4.0, RiskLevel::High)]
    fn test_risk_bands(#[case] volatility: f64, #[case] expected: RiskLevel) {
        assert_eq!(RiskLevel::from_volatility(volatility), expected);
    }

    #[test]
    fn test_market_kpis() {
        let table = table_from_closes(&[100.0, 102.0, 101.0, 105.0]);
        let kpis = market_kpis(&table).unwrap();

        assert_eq!(kpis.date, ymd(2024, 1, 4));
        assert_relative_eq!(kpis.change_pct, 4.0 / 101.0 * 100.0);
        assert_eq!(kpis.high_30d, 106.0);
        assert_eq!(kpis.low_30d, 99.0);
        assert_relative_eq!(kpis.avg_volume_30d, 1001.5);
        assert_eq!(kpis.trend, Trend::Bullish);
        assert_eq!(kpis.position, RangePosition::NearHigh);
        assert!(kpis.volatility_pct > 0.0);
    }

    #[test]
    fn test_market_kpis_window_and_short_input() {
        let table = generate_price_table("BTC", 90, 3);
        let kpis = market_kpis(&table).unwrap();
        let tail = &table.records()[60..];
        let expected_high = tail.iter().map(|r| r.high).fold(f64::MIN, f64::max);
        assert_eq!(kpis.high_30d, expected_high);

        let single = table_from_closes(&[1.0]);
        assert!(market_kpis(&single).is_err());
    }

    #[test]
    fn test_histogram_counts_every_close() {
        let table = generate_price_table("ETH", 300, 8);
        let bins = close_histogram(&table, DEFAULT_HISTOGRAM_BINS).unwrap();

        assert_eq!(bins.len(), 40);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 300);
    }

    #[test]
    fn test_correlation_matrix_labels() {
        let table = table_from_closes(&[1.0, 3.0, 2.0, 5.0, 4.0]);
        let matrix = correlation_matrix(&table).unwrap();

        assert_eq!(matrix.labels, vec!["Open", "High", "Low", "Close", "Volume"]);
        assert_relative_eq!(matrix.get("Open", "Close").unwrap(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(matrix.get("High", "Low").unwrap(), 1.0, epsilon = 1e-12);
        assert!(matrix.get("Close", "Missing").is_none());
    }

    #[test]
    fn test_monthly_distribution() {
        let table = table_from_closes(&[100.0; 40]);
        let months = monthly_return_distribution(&table).unwrap();

        assert_eq!(months.len(), 12);
        assert_eq!(months[0].month, "January");
        // Jan 2..31 and Feb 1..9 have a previous close
        assert_eq!(months[0].returns.len(), 30);
        assert_eq!(months[1].returns.len(), 9);
        assert!(months[2].summary.is_none());
        assert_eq!(months[0].summary.as_ref().map(|s| s.mean), Some(0.0));
    }

    #[test]
    fn test_rolling_overlays_alignment() {
        let table = generate_price_table("SOL", 80, 5);
        let overlays = rolling_overlays(&table).unwrap();

        assert_eq!(overlays.sma_20.len(), 80);
        assert!(overlays.sma_20[18].is_none());
        assert!(overlays.sma_20[19].is_some());
        assert!(overlays.sma_50[49].is_some());
        // First return is at row 1, so 30 returns complete at row 30
        assert!(overlays.volatility_30[29].is_none());
        assert!(overlays.volatility_30[30].is_some());
    }
}
