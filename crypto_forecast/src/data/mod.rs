//! Daily price history: records, validated tables and the loader
//!
//! The loader asks a [`MarketDataProvider`] for the full daily history of a
//! symbol and caps it at a fixed cutoff date so every run analyses the same
//! window. Two providers ship with the crate: [`yahoo::YahooProvider`] for the
//! public chart API and [`snapshot::SnapshotProvider`] for CSV files on disk.

pub mod snapshot;
pub mod yahoo;

use crate::config::DataConfig;
use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

pub use snapshot::{read_snapshot, write_snapshot, SnapshotProvider};
pub use yahoo::YahooProvider;

/// Symbols offered by the dashboard. The loader accepts any symbol.
pub const SUPPORTED_SYMBOLS: [&str; 15] = [
    "BTC", "ETH", "BNB", "ADA", "SOL", "XRP", "DOGE", "DOT", "AVAX", "MATIC", "LTC", "BCH", "TRX",
    "LINK", "UNI",
];

/// Build a date from parts, falling back to `NaiveDate::MIN` for impossible dates
pub(crate) fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
}

/// Last day of history any analysis may see
pub fn default_cutoff() -> NaiveDate {
    ymd(2025, 12, 31)
}

/// Parse a `YYYY-MM-DD` date, ignoring anything after the first ten characters
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    let trimmed = text.trim();
    let head = trimmed.get(..10).unwrap_or(trimmed);
    Ok(NaiveDate::parse_from_str(head, "%Y-%m-%d")?)
}

/// One trading day
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceRecord {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Whether every numeric field is finite
    pub fn is_finite(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Price history of one symbol with unique, ascending dates and finite values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceTable {
    symbol: String,
    records: Vec<PriceRecord>,
}

impl PriceTable {
    /// Wrap records that are already clean, rejecting anything that is not
    pub fn new(symbol: impl Into<String>, records: Vec<PriceRecord>) -> Result<Self> {
        if let Some(bad) = records.iter().find(|r| !r.is_finite()) {
            return Err(ForecastError::ValidationError(format!(
                "Non-finite value in row dated {}",
                bad.date
            )));
        }
        if let Some(w) = records.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(ForecastError::ValidationError(format!(
                "Dates must be unique and ascending ({} followed by {})",
                w[0].date, w[1].date
            )));
        }

        Ok(Self {
            symbol: symbol.into(),
            records,
        })
    }

    /// Clean arbitrary rows: drop non-finite ones, keep the last row per date, sort
    pub fn from_unsorted(symbol: impl Into<String>, records: Vec<PriceRecord>) -> Self {
        let symbol = symbol.into();
        let total = records.len();

        let mut by_date = BTreeMap::new();
        for record in records.into_iter().filter(PriceRecord::is_finite) {
            by_date.insert(record.date, record);
        }

        let dropped = total - by_date.len();
        if dropped > 0 {
            warn!(%symbol, dropped, "dropped invalid or duplicate rows");
        }

        Self {
            symbol,
            records: by_date.into_values().collect(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn records(&self) -> &[PriceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.records.first().map(|r| r.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.records.last().map(|r| r.date)
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.records.iter().map(|r| r.date).collect()
    }

    pub fn opens(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.open).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.low).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.volume).collect()
    }

    /// Drop every row dated after `cutoff`
    pub fn truncate_after(&mut self, cutoff: NaiveDate) {
        self.records.retain(|r| r.date <= cutoff);
    }

    /// Six-column frame (`date` as `YYYY-MM-DD` text)
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let dates: Vec<String> = self.records.iter().map(|r| r.date.to_string()).collect();

        let df = DataFrame::new(vec![
            Series::new("date", dates),
            Series::new("open", self.opens()),
            Series::new("high", self.highs()),
            Series::new("low", self.lows()),
            Series::new("close", self.closes()),
            Series::new("volume", self.volumes()),
        ])?;

        Ok(df)
    }
}

/// Source of raw daily bars
pub trait MarketDataProvider {
    /// Daily bars for `symbol` between `start` and `end` (both inclusive).
    ///
    /// Providers may return rows outside the range, unsorted or duplicated;
    /// the loader cleans them up.
    fn fetch_daily(&self, symbol: &str, start: NaiveDate, end: NaiveDate)
        -> Result<Vec<PriceRecord>>;

    /// Short name used in logs
    fn name(&self) -> &str;
}

impl<P: MarketDataProvider + ?Sized> MarketDataProvider for Box<P> {
    fn fetch_daily(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceRecord>> {
        (**self).fetch_daily(symbol, start, end)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Loads cutoff-capped daily history through a provider
#[derive(Debug)]
pub struct DataLoader<P> {
    provider: P,
    cutoff: NaiveDate,
}

impl<P: MarketDataProvider> DataLoader<P> {
    /// Loader using the default cutoff date
    pub fn new(provider: P) -> Self {
        Self::with_cutoff(provider, default_cutoff())
    }

    pub fn with_cutoff(provider: P, cutoff: NaiveDate) -> Self {
        Self { provider, cutoff }
    }

    pub fn cutoff(&self) -> NaiveDate {
        self.cutoff
    }

    /// Load the history of `symbol` from `start` up to the cutoff.
    ///
    /// A single attempt is made; provider failures propagate unchanged.
    pub fn load(&self, symbol: &str, start: NaiveDate) -> Result<PriceTable> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "Symbol must not be empty".to_string(),
            ));
        }
        if start > self.cutoff {
            return Err(ForecastError::InvalidParameter(format!(
                "Start date {} is after the cutoff {}",
                start, self.cutoff
            )));
        }

        let rows = self.provider.fetch_daily(&symbol, start, self.cutoff)?;
        let fetched = rows.len();
        let in_range: Vec<PriceRecord> = rows
            .into_iter()
            .filter(|r| r.date >= start && r.date <= self.cutoff)
            .collect();

        let table = PriceTable::from_unsorted(symbol.clone(), in_range);
        if table.is_empty() {
            return Err(ForecastError::NoData { symbol });
        }

        info!(
            provider = self.provider.name(),
            %symbol,
            fetched,
            kept = table.len(),
            first = ?table.first_date(),
            last = ?table.last_date(),
            "loaded daily history"
        );

        Ok(table)
    }
}

impl DataLoader<Box<dyn MarketDataProvider>> {
    /// Snapshot-backed loader when `snapshot_dir` is set, network-backed otherwise
    pub fn from_config(config: &DataConfig) -> Result<Self> {
        let provider: Box<dyn MarketDataProvider> = match &config.snapshot_dir {
            Some(dir) => Box::new(SnapshotProvider::new(dir.clone())),
            None => Box::new(YahooProvider::new(config)?),
        };
        Ok(Self::with_cutoff(provider, config.cutoff))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::StaticProvider;
    use pretty_assertions::assert_eq;

    fn record(date: NaiveDate, close: f64) -> PriceRecord {
        PriceRecord::new(date, close, close, close, close, 1.0)
    }

    #[test]
    fn test_parse_date_accepts_timestamps() {
        assert_eq!(parse_date("2024-03-01").unwrap(), ymd(2024, 3, 1));
        assert_eq!(parse_date(" 2024-03-01 00:00:00+00:00").unwrap(), ymd(2024, 3, 1));
        assert!(parse_date("03/01/2024").is_err());
    }

    #[test]
    fn test_table_rejects_unordered_rows() {
        let rows = vec![record(ymd(2024, 1, 2), 1.0), record(ymd(2024, 1, 1), 1.0)];
        assert!(PriceTable::new("BTC", rows).is_err());
    }

    #[test]
    fn test_from_unsorted_cleans_rows() {
        let rows = vec![
            record(ymd(2024, 1, 3), 3.0),
            record(ymd(2024, 1, 1), 1.0),
            record(ymd(2024, 1, 3), 30.0),
            record(ymd(2024, 1, 2), f64::NAN),
        ];
        let table = PriceTable::from_unsorted("BTC", rows);

        assert_eq!(table.dates(), vec![ymd(2024, 1, 1), ymd(2024, 1, 3)]);
        // Last occurrence wins
        assert_eq!(table.closes(), vec![1.0, 30.0]);
    }

    #[test]
    fn test_loader_applies_cutoff() {
        let rows = (0..10)
            .map(|i| record(ymd(2025, 12, 26) + chrono::Days::new(i), 100.0 + i as f64))
            .collect();
        let loader = DataLoader::new(StaticProvider::new(rows));
        let table = loader.load("btc", ymd(2025, 1, 1)).unwrap();

        assert_eq!(table.symbol(), "BTC");
        assert_eq!(table.last_date(), Some(default_cutoff()));
        assert_eq!(table.len(), 6);
    }

    #[test]
    fn test_loader_no_data_after_cutoff() {
        let rows = vec![record(ymd(2026, 2, 1), 1.0)];
        let loader = DataLoader::new(StaticProvider::new(rows));

        match loader.load("SOL", ymd(2020, 1, 1)) {
            Err(ForecastError::NoData { symbol }) => assert_eq!(symbol, "SOL"),
            other => panic!("expected NoData, got {:?}", other),
        }
    }

    #[test]
    fn test_to_dataframe_shape() {
        let table = PriceTable::new("ETH", vec![record(ymd(2024, 1, 1), 5.0)]).unwrap();
        let df = table.to_dataframe().unwrap();

        assert_eq!(df.shape(), (1, 6));
        assert_eq!(
            df.get_column_names(),
            vec!["date", "open", "high", "low", "close", "volume"]
        );
    }
}
