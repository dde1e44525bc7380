//! Text, JSON and CSV output of the dashboard reports

use crate::dashboard::{EdaReport, Overview};
use crate::OutputFormat;
use anyhow::Result;
use crypto_forecast::analysis::MarketKpis;
use crypto_forecast::{EvaluationRecord, FitResult, ForecastResult, PriceRecord};
use serde::Serialize;
use std::io::Write;

/// Header plus string cells, rendered either as a padded table or as CSV
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Grid {
    pub fn new<S: Into<String>>(header: impl IntoIterator<Item = S>) -> Self {
        Self {
            header: header.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn write_table<W: Write>(&self, out: &mut W) -> Result<()> {
        let mut widths: Vec<usize> = self.header.iter().map(String::len).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if i < widths.len() {
                    widths[i] = widths[i].max(cell.len());
                }
            }
        }

        let line = |cells: &[String]| {
            cells
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:>width$}", c, width = w))
                .collect::<Vec<_>>()
                .join("  ")
        };

        writeln!(out, "{}", line(self.header.as_slice()))?;
        let rule: usize = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
        writeln!(out, "{}", "-".repeat(rule))?;
        for row in &self.rows {
            writeln!(out, "{}", line(row.as_slice()))?;
        }
        Ok(())
    }

    pub fn write_csv<W: Write>(&self, out: &mut W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(out);
        writer.write_record(&self.header)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn write<W: Write>(&self, out: &mut W, format: OutputFormat) -> Result<()> {
        match format {
            OutputFormat::Csv => self.write_csv(out),
            _ => self.write_table(out),
        }
    }
}

fn num(value: f64) -> String {
    format!("{:.4}", value)
}

fn opt(value: Option<f64>) -> String {
    value.map(num).unwrap_or_default()
}

fn write_json<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn price_grid(records: &[PriceRecord]) -> Grid {
    let mut grid = Grid::new(["Date", "Open", "High", "Low", "Close", "Volume"]);
    for r in records {
        grid.push(vec![
            r.date.to_string(),
            num(r.open),
            num(r.high),
            num(r.low),
            num(r.close),
            format!("{:.0}", r.volume),
        ]);
    }
    grid
}

pub fn render_overview<W: Write>(
    out: &mut W,
    overview: &Overview,
    format: OutputFormat,
) -> Result<()> {
    let mut stats = Grid::new([
        "Column", "Count", "Mean", "Std", "Min", "25%", "50%", "75%", "Max",
    ]);
    for c in &overview.columns {
        let s = &c.summary;
        stats.push(vec![
            c.column.clone(),
            s.count.to_string(),
            num(s.mean),
            num(s.std_dev),
            num(s.min),
            num(s.q25),
            num(s.median),
            num(s.q75),
            num(s.max),
        ]);
    }

    match format {
        OutputFormat::Json => write_json(out, overview),
        OutputFormat::Csv => stats.write_csv(out),
        OutputFormat::Table => {
            let range = match (overview.first_date, overview.last_date) {
                (Some(first), Some(last)) => format!("{} .. {}", first, last),
                _ => "-".to_string(),
            };
            writeln!(out, "{}: {} rows, {}", overview.symbol, overview.rows, range)?;
            writeln!(out)?;
            price_grid(&overview.head).write_table(out)?;
            writeln!(out, "...")?;
            price_grid(&overview.tail).write_table(out)?;
            writeln!(out)?;
            stats.write_table(out)
        }
    }
}

pub fn render_kpis<W: Write>(out: &mut W, kpis: &MarketKpis, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return write_json(out, kpis);
    }

    let mut grid = Grid::new(["Metric", "Value"]);
    let rows = [
        ("Symbol", kpis.symbol.clone()),
        ("Date", kpis.date.to_string()),
        ("Current price", format!("{:.2}", kpis.current_close)),
        ("Change %", format!("{:.2}", kpis.change_pct)),
        ("30D high", format!("{:.2}", kpis.high_30d)),
        ("30D low", format!("{:.2}", kpis.low_30d)),
        ("Avg volume (30D)", format!("{:.0}", kpis.avg_volume_30d)),
        ("Volatility %", format!("{:.2}", kpis.volatility_pct)),
        ("Risk", kpis.risk.to_string()),
        ("Trend", format!("{:?}", kpis.trend)),
        ("Position", format!("{:?}", kpis.position)),
    ];
    for (metric, value) in rows {
        grid.push(vec![metric.to_string(), value]);
    }
    grid.write(out, format)
}

fn overlay_grid(eda: &EdaReport) -> Grid {
    let o = &eda.overlays;
    let mut grid = Grid::new(["Date", "Close", "SMA20", "SMA50", "Volatility30"]);
    for i in 0..o.dates.len() {
        grid.push(vec![
            o.dates[i].to_string(),
            num(o.close[i]),
            opt(o.sma_20[i]),
            opt(o.sma_50[i]),
            opt(o.volatility_30[i]),
        ]);
    }
    grid
}

/// Table format prints the histogram, correlations and monthly returns; CSV
/// carries the per-row overlays.
pub fn render_eda<W: Write>(out: &mut W, eda: &EdaReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => write_json(out, eda),
        OutputFormat::Csv => overlay_grid(eda).write_csv(out),
        OutputFormat::Table => {
            writeln!(out, "Closing price distribution ({})", eda.symbol)?;
            let mut hist = Grid::new(["From", "To", "Count"]);
            for bin in &eda.histogram {
                hist.push(vec![num(bin.lower), num(bin.upper), bin.count.to_string()]);
            }
            hist.write_table(out)?;

            writeln!(out, "\nCorrelation")?;
            let mut header = vec![String::new()];
            header.extend(eda.correlation.labels.iter().cloned());
            let mut corr = Grid::new(header);
            for (label, row) in eda.correlation.labels.iter().zip(&eda.correlation.values) {
                let mut cells = vec![label.clone()];
                cells.extend(row.iter().map(|v| format!("{:.3}", v)));
                corr.push(cells);
            }
            corr.write_table(out)?;

            writeln!(out, "\nDaily returns by month")?;
            let mut monthly = Grid::new(["Month", "Count", "Mean", "Std", "Min", "Median", "Max"]);
            for m in &eda.monthly_returns {
                let mut cells = vec![m.month.to_string(), m.returns.len().to_string()];
                match &m.summary {
                    Some(s) => cells.extend([s.mean, s.std_dev, s.min, s.median, s.max].map(num)),
                    None => cells.extend(std::iter::repeat(String::new()).take(5)),
                }
                monthly.push(cells);
            }
            monthly.write_table(out)
        }
    }
}

pub fn render_fits<W: Write>(out: &mut W, fits: &[FitResult], format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return write_json(out, fits);
    }

    let mut grid = Grid::new(["Model", "Date", "Fitted", "Actual"]);
    for fit in fits {
        let actual = fit.actual();
        for (i, point) in fit.fitted().iter().enumerate() {
            grid.push(vec![
                fit.model().to_string(),
                point.date.to_string(),
                num(point.value),
                opt(actual.and_then(|a| a.get(i)).map(|p| p.value)),
            ]);
        }
    }
    grid.write(out, format)
}

pub fn render_forecasts<W: Write>(
    out: &mut W,
    forecasts: &[ForecastResult],
    format: OutputFormat,
) -> Result<()> {
    if format == OutputFormat::Json {
        return write_json(out, forecasts);
    }

    let mut grid = Grid::new(["Model", "Date", "Forecast", "Lower", "Upper"]);
    for forecast in forecasts {
        let intervals = forecast.intervals();
        for (i, point) in forecast.points().iter().enumerate() {
            let bounds = intervals.and_then(|iv| iv.get(i)).copied();
            grid.push(vec![
                forecast.model().to_string(),
                point.date.to_string(),
                num(point.value),
                opt(bounds.map(|b| b.0)),
                opt(bounds.map(|b| b.1)),
            ]);
        }
    }
    grid.write(out, format)
}

pub fn render_evaluation<W: Write>(
    out: &mut W,
    records: &[EvaluationRecord],
    format: OutputFormat,
) -> Result<()> {
    if format == OutputFormat::Json {
        return write_json(out, records);
    }

    let mut grid = Grid::new(["Model", "MAE", "RMSE", "MAPE %", "Points", "From", "To"]);
    for r in records {
        grid.push(vec![
            r.model.to_string(),
            num(r.mae),
            num(r.rmse),
            opt(r.mape),
            r.n.to_string(),
            r.first_date.to_string(),
            r.last_date.to_string(),
        ]);
    }
    grid.write(out, format)
}
