//! Runs one cycle per account, in file order, and aggregates the results
//! into a single report.

use crate::arbitrage::{CycleEngine, CycleOutcome};
use crate::cex::bitstamp::LegacyNonce;
use crate::config::{AccountConfig, AppConfig};
use crate::errors::{AppError, Result};
use reqwest::Client;
use tracing::{Instrument, error, info, info_span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Full arbitrage evaluation (and execution when an account allows it).
    Evaluate,
    /// Query balances only, Bitstamp through the legacy balance call.
    Balances,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Abort the remaining accounts after the first error.
    pub fail_fast: bool,
    pub mode: RunMode,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            fail_fast: false,
            mode: RunMode::Evaluate,
        }
    }
}

#[derive(Debug)]
pub struct AccountReport {
    /// 1-based position in the accounts file.
    pub row: usize,
    pub outcome: Result<CycleOutcome>,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub accounts: Vec<AccountReport>,
    /// Set when fail-fast stopped the run before every account ran.
    pub aborted: bool,
}

impl RunReport {
    pub fn failures(&self) -> impl Iterator<Item = (usize, &AppError)> {
        self.accounts
            .iter()
            .filter_map(|r| r.outcome.as_ref().err().map(|e| (r.row, e)))
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn log_summary(&self) {
        let mut skipped = 0;
        let mut qualified = 0;
        let mut executed = 0;
        for report in &self.accounts {
            match &report.outcome {
                Ok(CycleOutcome::Skipped(_)) => skipped += 1,
                Ok(CycleOutcome::Qualified(_)) => qualified += 1,
                Ok(CycleOutcome::Executed { .. }) => executed += 1,
                Ok(CycleOutcome::Balances(_)) | Err(_) => {}
            }
        }
        for (row, e) in self.failures() {
            error!(row, error = %e, "[REPORT] account failed");
        }
        info!(
            accounts = self.accounts.len(),
            skipped,
            qualified,
            executed,
            failed = self.failures().count(),
            aborted = self.aborted,
            "[REPORT] run complete"
        );
    }
}

/// Process every account row once, sequentially. A row that failed to
/// parse is reported as that account's failure without touching a venue.
pub async fn run_accounts(
    config: &AppConfig,
    http: &Client,
    accounts: Vec<Result<AccountConfig>>,
    options: RunOptions,
) -> RunReport {
    let total = accounts.len();
    let mut legacy_nonce = LegacyNonce::from_clock();
    let mut report = RunReport::default();
    for (i, account) in accounts.into_iter().enumerate() {
        let row = i + 1;
        let outcome = match account {
            Ok(account) => {
                let span = info_span!("account", row, customer = %account.bitstamp.customer_id);
                let engine = CycleEngine::new(config, http, &account);
                run_account(&engine, &account, options.mode, &mut legacy_nonce)
                    .instrument(span)
                    .await
            }
            Err(e) => Err(e),
        };

        let failed = outcome.is_err();
        if let Err(e) = &outcome {
            error!(row, error = %e, "[CYCLE] account failed");
        }
        report.accounts.push(AccountReport { row, outcome });
        if failed && options.fail_fast {
            report.aborted = row < total;
            break;
        }
    }
    report
}

async fn run_account(
    engine: &CycleEngine,
    account: &AccountConfig,
    mode: RunMode,
    legacy_nonce: &mut LegacyNonce,
) -> Result<CycleOutcome> {
    match mode {
        RunMode::Evaluate => engine.run(account).await,
        RunMode::Balances => engine
            .legacy_balances(legacy_nonce)
            .await
            .map(CycleOutcome::Balances),
    }
}
