use chrono::NaiveDate;
use crypto_forecast::analysis::{market_kpis, monthly_return_distribution, RiskLevel};
use crypto_forecast::config::{AnalysisConfig, PreprocessConfig};
use crypto_forecast::data::{read_snapshot, write_snapshot, PriceRecord};
use crypto_forecast::utils::{generate_price_table, StaticProvider};
use crypto_forecast::{preprocess, DataLoader, ForecastError, PriceTable};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::io::Write;
use tempfile::NamedTempFile;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[rstest]
#[case(PreprocessConfig::default(), 29)]
#[case(PreprocessConfig { volatility_window: 7, short_ma_window: 7, long_ma_window: 7 }, 7)]
#[case(PreprocessConfig { volatility_window: 3, short_ma_window: 5, long_ma_window: 10 }, 9)]
fn test_preprocessed_length(#[case] config: PreprocessConfig, #[case] dropped: usize) {
    let table = generate_price_table("ADA", 120, 1);
    let series = preprocess(&table, &config).unwrap();

    assert_eq!(series.len(), 120 - dropped);
    assert!(series.rows().iter().all(|r| r.daily_return.is_finite()
        && r.volatility_7d.is_finite()
        && r.ma_7.is_finite()
        && r.ma_30.is_finite()));
}

#[test]
fn test_short_history_is_insufficient() {
    let table = generate_price_table("ADA", 29, 1);
    assert!(matches!(
        preprocess(&table, &PreprocessConfig::default()),
        Err(ForecastError::InsufficientData { .. })
    ));
}

#[test]
fn test_snapshot_with_loose_headers() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, " date ,OPEN,High,low,Close,Volume").unwrap();
    writeln!(file, "2024-01-02 00:00:00+00:00,2,3,1,2.5,100").unwrap();
    writeln!(file, "2024-01-01,1,2,0.5,1.5,90").unwrap();
    writeln!(file, "2024-01-03,oops,3,1,2.5,100").unwrap();

    let table = read_snapshot(file.path(), "xrp").unwrap();

    assert_eq!(table.symbol(), "XRP");
    assert_eq!(table.dates(), vec![date(2024, 1, 1), date(2024, 1, 2)]);
    assert_eq!(table.closes(), vec![1.5, 2.5]);
}

#[test]
fn test_written_snapshot_reads_back() {
    let table = generate_price_table("LTC", 20, 3);
    let file = NamedTempFile::new().unwrap();

    write_snapshot(file.path(), &table).unwrap();
    let back = read_snapshot(file.path(), "LTC").unwrap();

    assert_eq!(back.dates(), table.dates());
    for (a, b) in back.closes().iter().zip(table.closes()) {
        assert!((a - b).abs() < 1e-9 * b.abs());
    }
}

#[test]
fn test_loader_cleans_provider_rows() {
    let rows = vec![
        PriceRecord::new(date(2025, 12, 30), 1.0, 1.0, 1.0, 2.0, 1.0),
        PriceRecord::new(date(2025, 12, 29), 1.0, 1.0, 1.0, 1.0, 1.0),
        PriceRecord::new(date(2025, 12, 30), 1.0, 1.0, 1.0, 3.0, 1.0),
        PriceRecord::new(date(2025, 12, 31), 1.0, 1.0, 1.0, f64::NAN, 1.0),
        PriceRecord::new(date(2026, 1, 1), 1.0, 1.0, 1.0, 4.0, 1.0),
    ];
    let loader = DataLoader::new(StaticProvider::new(rows));

    let table = loader.load("BNB", date(2025, 1, 1)).unwrap();

    assert_eq!(table.dates(), vec![date(2025, 12, 29), date(2025, 12, 30)]);
    // Duplicate dates keep the last row
    assert_eq!(table.closes(), vec![1.0, 3.0]);
}

#[test]
fn test_kpis_and_monthly_returns_on_loaded_history() {
    let config = AnalysisConfig::default();
    let table: PriceTable = generate_price_table("BTC", 400, 77);
    let series = preprocess(&table, &config.preprocess).unwrap();
    let kpis = market_kpis(&series.to_price_table()).unwrap();

    assert_eq!(kpis.symbol, "BTC");
    assert_eq!(kpis.date, table.last_date().unwrap());
    assert_eq!(kpis.risk, RiskLevel::from_volatility(kpis.volatility_pct));
    assert!(kpis.low_30d <= kpis.current_close && kpis.current_close <= kpis.high_30d);

    let months = monthly_return_distribution(&table).unwrap();
    let total: usize = months.iter().map(|m| m.returns.len()).sum();
    assert_eq!(total, table.len() - 1);
}
