use chrono::NaiveDate;
use crypto_forecast::config::{AnalysisConfig, LstmConfig, SarimaConfig};
use crypto_forecast::data::snapshot::snapshot_path;
use crypto_forecast::data::{write_snapshot, DataLoader, SnapshotProvider};
use crypto_forecast::models::adapter_for;
use crypto_forecast::utils::{generate_price_table_from, StaticProvider};
use crypto_forecast::{
    preprocess, AlignmentStrategy, Evaluator, ForecastAdapter, ForecastError, ModelKind,
};
use tempfile::tempdir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Configuration small enough for debug-mode test runs
fn fast_config() -> AnalysisConfig {
    let mut config = AnalysisConfig::default();
    config.sarima = SarimaConfig {
        max_iter: 300,
        ..Default::default()
    };
    config.lstm = LstmConfig {
        lookback: 10,
        hidden_units: 6,
        epochs: 2,
        ..Default::default()
    };
    config
}

#[test]
fn test_load_to_cutoff_then_forecast() {
    // History runs past the cutoff into 2026
    let table = generate_price_table_from("BTC", date(2025, 1, 1), 420, 99);
    let loader = DataLoader::new(StaticProvider::from_table(&table));

    let loaded = loader.load("btc", date(2025, 1, 1)).unwrap();
    assert_eq!(loaded.last_date(), Some(date(2025, 12, 31)));
    assert!(loaded.dates().iter().all(|d| *d <= loader.cutoff()));

    let config = fast_config();
    let series = preprocess(&loaded, &config.preprocess).unwrap();
    assert_eq!(series.len(), loaded.len() - 29);

    let forecast = adapter_for(ModelKind::Arima, &config)
        .forecast_future(&series, 30)
        .unwrap();
    let dates = forecast.dates();
    assert_eq!(dates.len(), 30);
    assert_eq!(dates[0], date(2026, 1, 1));
    assert_eq!(dates[29], date(2026, 1, 30));
}

#[test]
fn test_snapshot_round_trip_through_loader() {
    let dir = tempdir().unwrap();
    let table = generate_price_table_from("ETH", date(2025, 11, 1), 90, 5);
    write_snapshot(snapshot_path(dir.path(), "ETH"), &table).unwrap();

    let loader = DataLoader::new(SnapshotProvider::new(dir.path()));
    let loaded = loader.load("eth", date(2025, 12, 1)).unwrap();

    assert_eq!(loaded.first_date(), Some(date(2025, 12, 1)));
    assert_eq!(loaded.last_date(), Some(date(2025, 12, 31)));
    assert_eq!(loaded.len(), 31);

    match loader.load("DOGE", date(2025, 1, 1)) {
        Err(ForecastError::NoData { symbol }) => assert_eq!(symbol, "DOGE"),
        other => panic!("expected NoData, got {:?}", other),
    }
}

#[test]
fn test_evaluator_reports_four_models_in_order() {
    let table = generate_price_table_from("BTC", date(2025, 1, 1), 365, 2024);
    let loader = DataLoader::new(StaticProvider::from_table(&table));

    for alignment in [AlignmentStrategy::CommonDates, AlignmentStrategy::TrailingCount] {
        let mut config = fast_config();
        config.evaluation.symbol = "BTC".to_string();
        config.evaluation.start = date(2025, 1, 1);
        config.evaluation.alignment = alignment;

        let records = Evaluator::new(config).evaluate(&loader).unwrap();

        let models: Vec<ModelKind> = records.iter().map(|r| r.model).collect();
        assert_eq!(models, ModelKind::ALL.to_vec());
        for r in &records {
            assert!(r.mae >= 0.0 && r.rmse >= 0.0);
            assert!(r.rmse >= r.mae);
            assert!(r.mape.map_or(false, |m| m >= 0.0));
            assert_eq!(r.last_date, records[0].last_date);
        }
        match alignment {
            AlignmentStrategy::CommonDates => {
                assert!(records.iter().all(|r| r.n == records[0].n));
                assert!(records.iter().all(|r| r.first_date == records[0].first_date));
            }
            AlignmentStrategy::TrailingCount => {
                // Statistical fits span most of the history, the LSTM only its held-out tail
                assert!(records[0].n > records[3].n);
                assert!(records[0].first_date < records[3].first_date);
            }
        }
    }
}
