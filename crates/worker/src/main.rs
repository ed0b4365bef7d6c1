use clap::Parser;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use grantob_core::analytics::{analyze_all, period_accuracy, AnalysisReport, PeriodStats};
use grantob_core::config::Settings;
use grantob_core::domain::stock::Horizon;

#[derive(Debug, Parser)]
#[command(name = "grantob_worker")]
struct Args {
    /// Dataset snapshot to analyze (JSON keyed by ticker). Defaults to
    /// STOCK_DATA_PATH.
    #[arg(long)]
    data_path: Option<String>,

    /// Restrict the analysis to a single ticker.
    #[arg(long)]
    ticker: Option<String>,

    /// Pretty-print the JSON report.
    #[arg(long)]
    pretty: bool,
}

#[derive(Debug, Serialize)]
struct Output {
    #[serde(flatten)]
    report: AnalysisReport,
    #[serde(rename = "periodAccuracy")]
    period_accuracy: BTreeMap<Horizon, PeriodStats>,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    if let Err(err) = run(&settings, &args) {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %err, "analysis run failed");
        return Err(err);
    }
    Ok(())
}

fn run(settings: &Settings, args: &Args) -> anyhow::Result<()> {
    let path = match args.data_path.as_deref() {
        Some(path) => path,
        None => settings.require_stock_data_path()?,
    };

    let mut dataset = grantob_core::dataset::load_dataset(path)?;

    if let Some(ticker) = &args.ticker {
        dataset.retain(|t, _| t == ticker);
        anyhow::ensure!(!dataset.is_empty(), "ticker {ticker} not found in dataset");
    }

    let report = analyze_all(&dataset);
    let period_accuracy = period_accuracy(&report);

    tracing::info!(
        stocks = dataset.len(),
        total = report.total,
        valid = report.valid_recommendations,
        accurate = report.accurate,
        "analysis run complete"
    );

    let output = Output {
        report,
        period_accuracy,
    };
    let text = if args.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{text}");

    Ok(())
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
