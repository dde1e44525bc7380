//! CSV snapshots of daily history
//!
//! One file per symbol, `<dir>/<SYMBOL>.csv`, with the columns
//! `Date,Open,High,Low,Close,Volume`. Reading is forgiving: header names are
//! matched case-insensitively after trimming, dates may carry a time suffix,
//! and rows with unparseable values are dropped.

use super::{parse_date, MarketDataProvider, PriceRecord, PriceTable};
use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const COLUMNS: [&str; 6] = ["Date", "Open", "High", "Low", "Close", "Volume"];

/// Snapshot path of a symbol inside `dir`
pub fn snapshot_path<P: AsRef<Path>>(dir: P, symbol: &str) -> PathBuf {
    dir.as_ref().join(format!("{}.csv", symbol.trim().to_uppercase()))
}

/// Write a table as a snapshot CSV
pub fn write_snapshot<P: AsRef<Path>>(path: P, table: &PriceTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    writer.write_record(COLUMNS)?;

    for r in table.records() {
        writer.write_record([
            r.date.to_string(),
            r.open.to_string(),
            r.high.to_string(),
            r.low.to_string(),
            r.close.to_string(),
            r.volume.to_string(),
        ])?;
    }
    writer.flush()?;

    debug!(path = %path.as_ref().display(), rows = table.len(), "wrote snapshot");
    Ok(())
}

fn find_column<'a>(df: &'a DataFrame, wanted: &str) -> Result<&'a Series> {
    df.get_columns()
        .iter()
        .find(|s| s.name().trim().eq_ignore_ascii_case(wanted))
        .ok_or_else(|| ForecastError::DataError(format!("Snapshot has no '{}' column", wanted)))
}

fn numeric_column(df: &DataFrame, wanted: &str) -> Result<Vec<Option<f64>>> {
    let series = find_column(df, wanted)?.cast(&DataType::Float64)?;
    let values = series.f64()?.into_iter().collect();
    Ok(values)
}

/// Read a snapshot CSV into a clean table named `symbol`
pub fn read_snapshot<P: AsRef<Path>>(path: P, symbol: &str) -> Result<PriceTable> {
    let file = File::open(path.as_ref())?;
    let df = CsvReader::new(file)
        .infer_schema(None)
        .has_header(true)
        .finish()?;

    let dates: Vec<Option<NaiveDate>> = find_column(&df, "Date")?
        .cast(&DataType::Utf8)?
        .utf8()?
        .into_iter()
        .map(|v| v.and_then(|s| parse_date(s).ok()))
        .collect();

    let opens = numeric_column(&df, "Open")?;
    let highs = numeric_column(&df, "High")?;
    let lows = numeric_column(&df, "Low")?;
    let closes = numeric_column(&df, "Close")?;
    let volumes = numeric_column(&df, "Volume")?;

    let mut records = Vec::with_capacity(dates.len());
    let mut invalid = 0usize;
    for i in 0..dates.len() {
        match (dates[i], opens[i], highs[i], lows[i], closes[i], volumes[i]) {
            (Some(d), Some(o), Some(h), Some(l), Some(c), Some(v)) => {
                records.push(PriceRecord::new(d, o, h, l, c, v))
            }
            _ => invalid += 1,
        }
    }
    if invalid > 0 {
        warn!(path = %path.as_ref().display(), invalid, "skipped unparseable snapshot rows");
    }

    Ok(PriceTable::from_unsorted(symbol.trim().to_uppercase(), records))
}

/// Serves history from a directory of snapshot files
#[derive(Debug, Clone)]
pub struct SnapshotProvider {
    dir: PathBuf,
}

impl SnapshotProvider {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Every row of a symbol's snapshot, without any date filtering
    pub fn load_all(&self, symbol: &str) -> Result<PriceTable> {
        let path = snapshot_path(&self.dir, symbol);
        if !path.exists() {
            return Err(ForecastError::NoData {
                symbol: symbol.trim().to_uppercase(),
            });
        }
        read_snapshot(path, symbol)
    }
}

impl MarketDataProvider for SnapshotProvider {
    fn fetch_daily(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceRecord>> {
        let table = self.load_all(symbol)?;
        Ok(table
            .records()
            .iter()
            .filter(|r| r.date >= start && r.date <= end)
            .copied()
            .collect())
    }

    fn name(&self) -> &str {
        "snapshot"
    }
}
