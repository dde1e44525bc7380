use chrono::Days;
use crypto_forecast::config::{AnalysisConfig, LstmConfig, SarimaConfig};
use crypto_forecast::models::adapter_for;
use crypto_forecast::utils::generate_price_table;
use crypto_forecast::{preprocess, ForecastError, ModelKind, PreprocessedSeries};
use rstest::rstest;

fn test_config() -> AnalysisConfig {
    let mut config = AnalysisConfig::default();
    config.sarima = SarimaConfig {
        max_iter: 300,
        ..Default::default()
    };
    config.lstm = LstmConfig {
        lookback: 12,
        hidden_units: 5,
        epochs: 2,
        seed: Some(11),
        ..Default::default()
    };
    config
}

fn test_series() -> PreprocessedSeries {
    let table = generate_price_table("BTC", 330, 42);
    preprocess(&table, &AnalysisConfig::default().preprocess).unwrap()
}

#[rstest]
#[case(ModelKind::Arima)]
#[case(ModelKind::Sarima)]
#[case(ModelKind::Prophet)]
#[case(ModelKind::Lstm)]
fn test_forecast_dates_follow_last_observation(#[case] kind: ModelKind) {
    let series = test_series();
    let adapter = adapter_for(kind, &test_config());
    let last = series.last_date().unwrap();

    let forecast = adapter.forecast_future(&series, 14).unwrap();

    assert_eq!(forecast.model(), kind);
    assert_eq!(forecast.horizons(), 14);
    for (i, d) in forecast.dates().iter().enumerate() {
        assert_eq!(*d, last + Days::new(i as u64 + 1));
    }
    assert!(forecast.values().iter().all(|v| v.is_finite()));
}

#[rstest]
#[case(ModelKind::Arima)]
#[case(ModelKind::Sarima)]
#[case(ModelKind::Prophet)]
#[case(ModelKind::Lstm)]
fn test_repeated_runs_are_identical(#[case] kind: ModelKind) {
    let series = test_series();
    let adapter = adapter_for(kind, &test_config());

    assert_eq!(
        adapter.fit_historical(&series).unwrap(),
        adapter.fit_historical(&series).unwrap()
    );
    assert_eq!(
        adapter.forecast_future(&series, 5).unwrap(),
        adapter.forecast_future(&series, 5).unwrap()
    );
}

#[rstest]
#[case(ModelKind::Arima)]
#[case(ModelKind::Sarima)]
#[case(ModelKind::Prophet)]
#[case(ModelKind::Lstm)]
fn test_zero_steps_rejected(#[case] kind: ModelKind) {
    let series = test_series();
    let adapter = adapter_for(kind, &test_config());

    assert!(matches!(
        adapter.forecast_future(&series, 0),
        Err(ForecastError::InvalidParameter(_))
    ));
}

#[test]
fn test_fit_ranges_end_at_last_observation() {
    let series = test_series();
    let config = test_config();

    for kind in ModelKind::ALL {
        let fit = adapter_for(kind, &config).fit_historical(&series).unwrap();
        assert_eq!(fit.last_date(), series.last_date(), "{}", kind);
        assert!(fit.first_date() >= series.first_date(), "{}", kind);
    }

    let prophet = adapter_for(ModelKind::Prophet, &config)
        .fit_historical(&series)
        .unwrap();
    assert_eq!(prophet.len(), series.len());

    let lstm = adapter_for(ModelKind::Lstm, &config)
        .fit_historical(&series)
        .unwrap();
    assert_eq!(lstm.actual().map(|a| a.len()), Some(lstm.len()));
}
