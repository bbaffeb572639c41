//! cnbfx
//!
//! Converts amounts between CZK and the currencies of the CNB daily fixing.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cnbfx_common::RateSheet;
use cnbfx_fx::{
    format_amount, format_exchange_rate, ConversionResult, FxEngine, FxError, HttpRateFeed, RateFeed,
    StaticRateFeed,
};

mod config;

use config::CliConfig;

/// CNB daily fixing converter
#[derive(Parser, Debug)]
#[command(name = "cnbfx")]
#[command(about = "Convert between CZK and currencies of the CNB daily exchange-rate fixing")]
struct Args {
    /// Amount to convert (digits, at most two decimals)
    amount: Option<String>,

    /// Foreign currency code; defaults to USD or the first listed currency
    currency: Option<String>,

    /// Convert from the foreign currency into CZK instead
    #[arg(long)]
    to_home: bool,

    /// Read the feed from a file instead of fetching it
    #[arg(long)]
    feed_file: Option<PathBuf>,

    /// Feed URL (overrides CNBFX_FEED_URL)
    #[arg(long)]
    url: Option<String>,

    /// List all rates in the fixing
    #[arg(short, long)]
    list: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Repeat the conversion every N seconds until Ctrl+C
    #[arg(long)]
    watch: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = CliConfig::from_env();
    if let Some(url) = &args.url {
        config.feed_url = url.clone();
    }

    init_logging(&config);

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        bail!("Configuration error: {}", e);
    }

    let feed: Arc<dyn RateFeed> = match &args.feed_file {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read feed file {}", path.display()))?;
            Arc::new(StaticRateFeed::new(path.display().to_string(), text))
        }
        None => Arc::new(HttpRateFeed::new(config.feed_config())?),
    };

    info!(feed = feed.name(), "Starting cnbfx");

    let engine = FxEngine::new(feed, config.engine_config());

    match args.watch {
        Some(secs) => watch(&engine, &args, Duration::from_secs(secs.max(1))).await,
        None => run_once(&engine, &args).await,
    }
}

fn init_logging(config: &CliConfig) {
    let filter = tracing_subscriber::EnvFilter::new(&config.log_level);
    let registry = tracing_subscriber::registry().with(filter);

    if config.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run_once(engine: &FxEngine, args: &Args) -> anyhow::Result<()> {
    let sheet = load_sheet(engine).await?;
    render(engine, args, &sheet)
}

fn render(engine: &FxEngine, args: &Args, sheet: &RateSheet) -> anyhow::Result<()> {
    if args.list || args.amount.is_none() {
        return print_sheet(sheet, engine, args.json);
    }

    let result = calculate(engine, args, sheet)?;
    print_result(&result, engine, sheet, args.json)
}

/// Refresh on every tick. A failed fetch is reported and the last good
/// sheet, if any, is shown again marked as stale.
async fn watch(engine: &FxEngine, args: &Args, every: Duration) -> anyhow::Result<()> {
    info!(interval_secs = every.as_secs(), "Watching for rate updates");

    loop {
        match engine.rate_sheet().await {
            Ok(sheet) => render(engine, args, &sheet)?,
            Err(FxError::Fetch(e)) => {
                warn!(kind = e.kind(), error = %e, "Refresh failed, keeping previous rates");
                eprintln!("{}", e.user_message());

                if let Some(sheet) = engine.last_good_sheet() {
                    eprintln!(
                        "Showing stale rates from the fixing of {} (fetched {})",
                        sheet.as_of_date(),
                        sheet.fetched_at().format("%Y-%m-%d %H:%M:%S UTC")
                    );
                    render(engine, args, &sheet)?;
                }
            }
            Err(e) => return Err(e.into()),
        }

        tokio::select! {
            _ = tokio::time::sleep(every) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                return Ok(());
            }
        }
    }
}

async fn load_sheet(engine: &FxEngine) -> anyhow::Result<Arc<RateSheet>> {
    match engine.rate_sheet().await {
        Ok(sheet) => Ok(sheet),
        Err(FxError::Fetch(e)) => {
            error!(kind = e.kind(), error = %e, "Failed to load rate sheet");
            bail!("{}", e.user_message())
        }
        Err(e) => Err(e.into()),
    }
}

fn calculate(engine: &FxEngine, args: &Args, sheet: &RateSheet) -> anyhow::Result<ConversionResult> {
    let amount = args.amount.as_deref().unwrap_or_default();
    let currency = match &args.currency {
        Some(code) => code.clone(),
        None => sheet
            .default_currency()
            .map(|c| c.to_string())
            .context("The rate sheet lists no currencies")?,
    };

    let outcome = if args.to_home {
        engine.calculate_to_home(amount, &currency, sheet)
    } else {
        engine.calculate(amount, &currency, sheet)
    };

    outcome.map_err(|errors| {
        let messages: Vec<&str> = errors.messages().collect();
        anyhow::anyhow!("{}", messages.join("; "))
    })
}

fn print_result(
    result: &ConversionResult,
    engine: &FxEngine,
    sheet: &RateSheet,
    json: bool,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    let quote = sheet
        .find(result.foreign_currency().code())
        .map(|rate| format_exchange_rate(rate, engine.home_currency()))
        .unwrap_or_default();

    println!(
        "{} = {}  ({}, fixing of {})",
        format_amount(&result.original),
        format_amount(&result.target),
        quote,
        result.as_of_date
    );
    Ok(())
}

fn print_sheet(sheet: &RateSheet, engine: &FxEngine, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(sheet)?);
        return Ok(());
    }

    println!("CNB fixing of {}", sheet.as_of_date());
    for rate in sheet.rates() {
        println!(
            "  {:<24} {:<12} {}",
            rate.country,
            rate.currency_name,
            format_exchange_rate(rate, engine.home_currency())
        );
    }
    Ok(())
}
