use anyhow::{Context, Result};
use arbitrage_agent::{aggregator, cli::Cli, config, utils};
use clap::Parser;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    utils::init_logging();

    let cli = Cli::parse();
    let options = cli.run_options();

    // Configuration
    let app = config::AppConfig::load().context("loading configuration")?;
    let accounts = config::load_accounts(&cli.accounts)
        .with_context(|| format!("reading accounts from {}", cli.accounts.display()))?;
    let http = app.http_client().context("building HTTP client")?;

    tracing::info!(
        accounts = accounts.len(),
        invalid = accounts.iter().filter(|row| row.is_err()).count(),
        bitstamp = %app.bitstamp.host,
        valr = %app.valr.host,
        pair = %app.market.bitstamp_pair(),
        utilization = app.balance_utilization,
        fail_fast = options.fail_fast,
        mode = ?options.mode,
        "[INIT] arbitrage-agent starting"
    );

    let report = aggregator::run_accounts(&app, &http, accounts, options).await;
    report.log_summary();

    Ok(if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
