use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use crypto_dash::render::{
    render_eda, render_evaluation, render_fits, render_forecasts, render_kpis, render_overview,
};
use crypto_dash::{Dashboard, ModelSelection, OutputFormat};
use crypto_forecast::analysis::DEFAULT_HISTOGRAM_BINS;
use crypto_forecast::{AlignmentStrategy, AnalysisConfig};
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "crypto_dash", version, about = "Crypto price analysis and forecast comparison")]
struct Cli {
    /// Ticker symbol, e.g. BTC
    #[arg(long, global = true)]
    symbol: Option<String>,

    /// First date of the history (YYYY-MM-DD)
    #[arg(long, global = true)]
    start: Option<NaiveDate>,

    /// JSON configuration file; missing fields keep their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Read `<SYMBOL>.csv` snapshots from this directory instead of the network
    #[arg(long, global = true)]
    snapshot_dir: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Also write the loaded history to `<DIR>/<SYMBOL>.csv`
    #[arg(long, global = true, value_name = "DIR")]
    save_snapshot: Option<PathBuf>,

    /// Seed of the LSTM weight initialisation and shuffling
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Row count, date range, first/last rows and column statistics
    Overview,
    /// Latest price, 30 day range, volatility and risk
    Kpis,
    /// Distribution, correlation, monthly returns and rolling overlays
    Eda {
        #[arg(long, default_value_t = DEFAULT_HISTOGRAM_BINS)]
        bins: usize,
    },
    /// In-sample fitted values of each model
    Fit {
        #[arg(long, default_value_t = ModelSelection::All)]
        model: ModelSelection,
    },
    /// Daily forecasts past the last observation
    Forecast {
        #[arg(long, default_value_t = ModelSelection::All)]
        model: ModelSelection,
        /// Horizon in days; defaults to the configured forecast steps
        #[arg(long)]
        steps: Option<usize>,
    },
    /// MAE, RMSE and MAPE of every model on the evaluation history
    Evaluate {
        #[arg(long)]
        alignment: Option<AlignmentStrategy>,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn resolve_config(cli: &Cli) -> Result<AnalysisConfig> {
    let mut config = match &cli.config {
        Some(path) => AnalysisConfig::from_json_file(path)
            .with_context(|| format!("reading configuration {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    config.apply_env()?;

    if let Some(symbol) = &cli.symbol {
        let symbol = symbol.trim().to_uppercase();
        config.data.symbol = symbol.clone();
        config.evaluation.symbol = symbol;
    }
    if let Some(start) = cli.start {
        config.data.start = start;
        config.evaluation.start = start;
    }
    if let Some(dir) = &cli.snapshot_dir {
        config.data.snapshot_dir = Some(dir.clone());
    }
    if cli.seed.is_some() {
        config.lstm.seed = cli.seed;
    }
    if let Command::Evaluate {
        alignment: Some(alignment),
    } = cli.command
    {
        config.evaluation.alignment = alignment;
    }

    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    debug!(?config, "resolved configuration");
    info!(
        symbol = %config.data.symbol,
        start = %config.data.start,
        "starting crypto_dash"
    );

    let dashboard = Dashboard::from_config(config)?;
    if let Some(dir) = &cli.save_snapshot {
        dashboard
            .save_snapshot(dir)
            .with_context(|| format!("saving snapshot to {}", dir.display()))?;
    }
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let format = cli.format;

    match cli.command {
        Command::Overview => render_overview(&mut out, &dashboard.overview()?, format)?,
        Command::Kpis => render_kpis(&mut out, &dashboard.kpis()?, format)?,
        Command::Eda { bins } => render_eda(&mut out, &dashboard.eda(bins)?, format)?,
        Command::Fit { model } => {
            render_fits(&mut out, &dashboard.fit(&model.models())?, format)?
        }
        Command::Forecast { model, steps } => {
            let steps = steps.unwrap_or(dashboard.config().forecast_steps);
            let forecasts = dashboard.forecast(&model.models(), steps)?;
            render_forecasts(&mut out, &forecasts, format)?
        }
        Command::Evaluate { .. } => {
            render_evaluation(&mut out, &dashboard.evaluate()?, format)?
        }
    }

    out.flush()?;
    Ok(())
}
