//! Yahoo Finance chart API provider

use super::{MarketDataProvider, PriceRecord};
use crate::config::DataConfig;
use crate::error::{ForecastError, Result};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteColumns>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QuoteColumns {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

/// Blocking client for the daily chart endpoint
#[derive(Debug, Clone)]
pub struct YahooProvider {
    base_url: String,
    quote_currency: String,
    client: reqwest::blocking::Client,
}

impl YahooProvider {
    pub fn new(config: &DataConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.provider_url.trim_end_matches('/').to_string(),
            quote_currency: config.quote_currency.clone(),
            client,
        })
    }

    /// Provider ticker for a symbol, e.g. `BTC-USD`
    pub fn ticker(&self, symbol: &str) -> String {
        format!("{}-{}", symbol, self.quote_currency)
    }

    fn url(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        // period2 is exclusive
        let period1 = start.and_hms_opt(0, 0, 0).map(|t| t.and_utc().timestamp());
        let period2 = end
            .checked_add_days(Days::new(1))
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|t| t.and_utc().timestamp());

        format!(
            "{}/{}?period1={}&period2={}&interval=1d",
            self.base_url,
            self.ticker(symbol),
            period1.unwrap_or(0),
            period2.unwrap_or(i64::MAX),
        )
    }
}

impl MarketDataProvider for YahooProvider {
    fn fetch_daily(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceRecord>> {
        let url = self.url(symbol, start, end);
        debug!(%url, "requesting chart");

        let response = self.client.get(&url).send()?;
        let status = response.status();
        let body = response.text()?;

        match parse_chart(&body) {
            Ok(rows) if status.is_success() => Ok(rows),
            Ok(_) => Err(ForecastError::ProviderError(format!(
                "HTTP {} for {}",
                status,
                self.ticker(symbol)
            ))),
            // Provider-reported errors carry a better message than the status
            Err(e @ ForecastError::ProviderError(_)) => Err(e),
            Err(_) if !status.is_success() => Err(ForecastError::ProviderError(format!(
                "HTTP {} for {}",
                status,
                self.ticker(symbol)
            ))),
            Err(e) => Err(e),
        }
    }

    fn name(&self) -> &str {
        "yahoo"
    }
}

fn field(column: &[Option<f64>], i: usize) -> Option<f64> {
    column.get(i).copied().flatten()
}

/// Flatten a chart payload into daily rows, skipping rows with a missing field
pub(crate) fn parse_chart(body: &str) -> Result<Vec<PriceRecord>> {
    let response: ChartResponse = serde_json::from_str(body)
        .map_err(|e| ForecastError::ParseError(format!("Unexpected chart payload: {}", e)))?;

    if let Some(error) = response.chart.error {
        return Err(ForecastError::ProviderError(format!(
            "{}: {}",
            error.code, error.description
        )));
    }

    let Some(data) = response.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };
    let Some(quote) = data.indicators.quote.into_iter().next() else {
        return Ok(Vec::new());
    };

    let rows = data
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let date = DateTime::<Utc>::from_timestamp(*ts, 0)?.date_naive();
            Some(PriceRecord::new(
                date,
                field(&quote.open, i)?,
                field(&quote.high, i)?,
                field(&quote.low, i)?,
                field(&quote.close, i)?,
                field(&quote.volume, i)?,
            ))
        })
        .collect();

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ymd;
    use pretty_assertions::assert_eq;

    const PAYLOAD: &str = r#"{
        "chart": {
            "result": [{
                "meta": { "symbol": "BTC-USD" },
                "timestamp": [1735603200, 1735689600, 1735776000],
                "indicators": {
                    "quote": [{
                        "open":   [92000.5, 93500.0, null],
                        "high":   [94000.0, 95000.0, 96000.0],
                        "low":    [91000.0, 92500.0, 93000.0],
                        "close":  [93400.0, 94400.0, 95500.0],
                        "volume": [30000000000, 28000000000, 27000000000]
                    }]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn test_parse_chart_skips_incomplete_rows() {
        let rows = parse_chart(PAYLOAD).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, ymd(2024, 12, 31));
        assert_eq!(rows[1].date, ymd(2025, 1, 1));
        assert_eq!(rows[1].close, 94400.0);
        assert_eq!(rows[0].volume, 30_000_000_000.0);
    }

    #[test]
    fn test_parse_chart_provider_error() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        match parse_chart(body) {
            Err(ForecastError::ProviderError(msg)) => assert!(msg.contains("Not Found")),
            other => panic!("expected provider error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_chart_garbage() {
        assert!(matches!(
            parse_chart("<html>"),
            Err(ForecastError::ParseError(_))
        ));
    }

    #[test]
    fn test_url_uses_quote_currency() {
        let provider = YahooProvider::new(&DataConfig::default()).unwrap();
        let url = provider.url("ETH", ymd(2016, 1, 1), ymd(2016, 1, 1));

        assert!(url.contains("/ETH-USD?"));
        assert!(url.contains("period1=1451606400"));
        assert!(url.contains("period2=1451692800"));
        assert!(url.ends_with("interval=1d"));
    }
}
