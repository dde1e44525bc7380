//! Utility functions for the crypto_forecast crate

use crate::data::{ymd, MarketDataProvider, PriceRecord, PriceTable};
use crate::error::{ForecastError, Result};
use chrono::{Days, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// Calendar days `last + 1 ..= last + steps`
pub fn future_dates(last: NaiveDate, steps: usize) -> Result<Vec<NaiveDate>> {
    (1..=steps as u64)
        .map(|i| {
            last.checked_add_days(Days::new(i)).ok_or_else(|| {
                ForecastError::ValidationError(format!("Date overflow {} days after {}", i, last))
            })
        })
        .collect()
}

/// Number of leading items that make up a `ratio` training share
pub fn train_size(len: usize, ratio: f64) -> usize {
    ((len as f64) * ratio).floor() as usize
}

/// Seeded synthetic daily history starting 2023-01-01
pub fn generate_price_table(symbol: &str, days: usize, seed: u64) -> PriceTable {
    generate_price_table_from(symbol, ymd(2023, 1, 1), days, seed)
}

/// Seeded synthetic daily history: a geometric random walk with drift and a
/// mild yearly cycle, consecutive calendar days from `start`.
pub fn generate_price_table_from(
    symbol: &str,
    start: NaiveDate,
    days: usize,
    seed: u64,
) -> PriceTable {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut records = Vec::with_capacity(days);
    let mut current_price = 20_000.0;
    let volatility = 0.02;

    // Normal::new only fails for a negative deviation
    let shocks = Normal::new(0.0005, volatility).ok();

    for i in 0..days {
        let Some(date) = start.checked_add_days(Days::new(i as u64)) else {
            break;
        };

        let shock = shocks.map(|n| n.sample(&mut rng)).unwrap_or(0.0);
        let season = 0.002 * (2.0 * std::f64::consts::PI * i as f64 / 365.25).sin();

        let open = current_price;
        let close = open * (shock + season).exp();

        let high = open.max(close) * (1.0 + rng.gen::<f64>() * volatility * 0.5);
        let low = open.min(close) * (1.0 - rng.gen::<f64>() * volatility * 0.5);
        let volume = rng.gen_range(1.0e9..5.0e9);

        records.push(PriceRecord::new(date, open, high, low, close, volume));
        current_price = close;
    }

    PriceTable::from_unsorted(symbol.trim().to_uppercase(), records)
}

/// In-memory provider returning a fixed set of rows for any symbol
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    rows: Vec<PriceRecord>,
}

impl StaticProvider {
    pub fn new(rows: Vec<PriceRecord>) -> Self {
        Self { rows }
    }

    pub fn from_table(table: &PriceTable) -> Self {
        Self::new(table.records().to_vec())
    }
}

impl MarketDataProvider for StaticProvider {
    fn fetch_daily(
        &self,
        _symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceRecord>> {
        Ok(self
            .rows
            .iter()
            .filter(|r| r.date >= start && r.date <= end)
            .copied()
            .collect())
    }

    fn name(&self) -> &str {
        "static"
    }
}
