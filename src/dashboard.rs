//! Report builders behind the sub-commands

use crypto_forecast::analysis::{
    close_histogram, correlation_matrix, market_kpis, monthly_return_distribution,
    rolling_overlays, summary_statistics, CorrelationMatrix, HistogramBin, MarketKpis,
    MonthlyReturns, RollingOverlays, Summary,
};
use crypto_forecast::data::snapshot::snapshot_path;
use crypto_forecast::data::{write_snapshot, MarketDataProvider};
use crypto_forecast::models::adapter_for;
use crypto_forecast::{
    preprocess, AnalysisConfig, DataLoader, EvaluationRecord, Evaluator, FitResult,
    ForecastResult, ModelKind, PreprocessedSeries, PriceRecord, PriceTable, Result,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Rows shown at each end of the overview
pub const PREVIEW_ROWS: usize = 5;

/// Summary of one numeric column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub column: String,
    #[serde(flatten)]
    pub summary: Summary,
}

/// Shape, date range, first/last rows and per-column statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub symbol: String,
    pub rows: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub head: Vec<PriceRecord>,
    pub tail: Vec<PriceRecord>,
    pub columns: Vec<ColumnSummary>,
}

/// Everything the exploratory view plots
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdaReport {
    pub symbol: String,
    pub histogram: Vec<HistogramBin>,
    pub correlation: CorrelationMatrix,
    pub monthly_returns: Vec<MonthlyReturns>,
    pub overlays: RollingOverlays,
}

/// Loads the configured symbol and builds each report
#[derive(Debug)]
pub struct Dashboard<P> {
    config: AnalysisConfig,
    loader: DataLoader<P>,
}

impl Dashboard<Box<dyn MarketDataProvider>> {
    pub fn from_config(config: AnalysisConfig) -> Result<Self> {
        let loader = DataLoader::from_config(&config.data)?;
        Ok(Self::new(config, loader))
    }
}

impl<P: MarketDataProvider> Dashboard<P> {
    pub fn new(config: AnalysisConfig, loader: DataLoader<P>) -> Self {
        Self { config, loader }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn load(&self) -> Result<PriceTable> {
        self.loader
            .load(&self.config.data.symbol, self.config.data.start)
    }

    /// Write the loaded history to `<dir>/<SYMBOL>.csv`, creating `dir`
    pub fn save_snapshot(&self, dir: &Path) -> Result<PathBuf> {
        let table = self.load()?;
        std::fs::create_dir_all(dir)?;
        let path = snapshot_path(dir, table.symbol());
        write_snapshot(&path, &table)?;
        info!(path = %path.display(), rows = table.len(), "saved snapshot");
        Ok(path)
    }

    pub fn series(&self) -> Result<PreprocessedSeries> {
        preprocess(&self.load()?, &self.config.preprocess)
    }

    pub fn overview(&self) -> Result<Overview> {
        let table = self.load()?;
        let records = table.records();

        let columns = [
            ("Open", table.opens()),
            ("High", table.highs()),
            ("Low", table.lows()),
            ("Close", table.closes()),
            ("Volume", table.volumes()),
        ]
        .into_iter()
        .map(|(column, values)| {
            Ok(ColumnSummary {
                column: column.to_string(),
                summary: summary_statistics(&values)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

        Ok(Overview {
            symbol: table.symbol().to_string(),
            rows: table.len(),
            first_date: table.first_date(),
            last_date: table.last_date(),
            head: records.iter().take(PREVIEW_ROWS).copied().collect(),
            tail: records[records.len().saturating_sub(PREVIEW_ROWS)..].to_vec(),
            columns,
        })
    }

    /// KPIs of the preprocessed history
    pub fn kpis(&self) -> Result<MarketKpis> {
        market_kpis(&self.series()?.to_price_table())
    }

    pub fn eda(&self, bins: usize) -> Result<EdaReport> {
        let table = self.load()?;
        Ok(EdaReport {
            symbol: table.symbol().to_string(),
            histogram: close_histogram(&table, bins)?,
            correlation: correlation_matrix(&table)?,
            monthly_returns: monthly_return_distribution(&table)?,
            overlays: rolling_overlays(&table)?,
        })
    }

    pub fn fit(&self, models: &[ModelKind]) -> Result<Vec<FitResult>> {
        let series = self.series()?;
        models
            .iter()
            .map(|kind| adapter_for(*kind, &self.config).fit_historical(&series))
            .collect()
    }

    pub fn forecast(&self, models: &[ModelKind], steps: usize) -> Result<Vec<ForecastResult>> {
        let series = self.series()?;
        info!(
            symbol = series.symbol(),
            last = ?series.last_date(),
            steps,
            "forecasting"
        );
        models
            .iter()
            .map(|kind| adapter_for(*kind, &self.config).forecast_future(&series, steps))
            .collect()
    }

    /// Evaluate the configured evaluation symbol and start date
    pub fn evaluate(&self) -> Result<Vec<EvaluationRecord>> {
        Evaluator::new(self.config.clone()).evaluate(&self.loader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crypto_forecast::data::{read_snapshot, SnapshotProvider};
    use crypto_forecast::utils::{generate_price_table, StaticProvider};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn dashboard(days: usize) -> Dashboard<StaticProvider> {
        let table = generate_price_table("BTC", days, 9);
        let mut config = AnalysisConfig::default();
        config.data.start = table.first_date().unwrap();
        Dashboard::new(config, DataLoader::new(StaticProvider::from_table(&table)))
    }

    #[test]
    fn test_overview() {
        let overview = dashboard(50).overview().unwrap();

        assert_eq!(overview.rows, 50);
        assert_eq!(overview.head.len(), PREVIEW_ROWS);
        assert_eq!(overview.tail.last().map(|r| r.date), overview.last_date);
        assert_eq!(overview.columns.len(), 5);
        assert_eq!(overview.columns[3].column, "Close");
        assert_eq!(overview.columns[3].summary.count, 50);
    }

    #[test]
    fn test_eda_and_kpis() {
        let dash = dashboard(120);

        let eda = dash.eda(10).unwrap();
        assert_eq!(eda.histogram.len(), 10);
        assert_eq!(eda.monthly_returns.len(), 12);
        assert_eq!(eda.overlays.dates.len(), 120);

        let kpis = dash.kpis().unwrap();
        assert_eq!(kpis.symbol, "BTC");
    }

    #[test]
    fn test_forecast_selected_model() {
        let dash = dashboard(200);
        let forecasts = dash.forecast(&[ModelKind::Arima], 7).unwrap();

        assert_eq!(forecasts.len(), 1);
        assert_eq!(forecasts[0].horizons(), 7);
    }

    #[test]
    fn test_saved_snapshot_serves_later_runs() {
        let dash = dashboard(40);
        let dir = tempdir().unwrap();
        let target = dir.path().join("raw");

        let path = dash.save_snapshot(&target).unwrap();
        assert_eq!(path, target.join("BTC.csv"));
        assert_eq!(read_snapshot(&path, "BTC").unwrap().len(), 40);

        let offline = Dashboard::new(
            dash.config().clone(),
            DataLoader::new(SnapshotProvider::new(target.clone())),
        );
        assert_eq!(offline.overview().unwrap().rows, 40);
    }
}
