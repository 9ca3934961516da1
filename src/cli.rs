//! Command-line interface.

use crate::aggregator::{RunMode, RunOptions};
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "arbitrage-agent", about = "Bitstamp → VALR arbitrage agent", version)]
pub struct Cli {
    /// Headerless CSV of account rows.
    #[arg(env = "ACCOUNTS_CSV")]
    pub accounts: PathBuf,

    /// Stop the whole run at the first account that errors.
    #[arg(long, env = "FAIL_FAST")]
    pub fail_fast: bool,

    /// Only query and log each account's balances.
    #[arg(long)]
    pub balances_only: bool,
}

impl Cli {
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            fail_fast: self.fail_fast,
            mode: if self.balances_only {
                RunMode::Balances
            } else {
                RunMode::Evaluate
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_full_evaluation() {
        let cli = Cli::try_parse_from(["arbitrage-agent", "accounts.csv"]).unwrap();
        assert_eq!(cli.accounts, PathBuf::from("accounts.csv"));
        let options = cli.run_options();
        assert!(!options.fail_fast);
        assert_eq!(options.mode, RunMode::Evaluate);
    }

    #[test]
    fn flags_switch_modes() {
        let cli = Cli::try_parse_from([
            "arbitrage-agent",
            "--fail-fast",
            "--balances-only",
            "accounts.csv",
        ])
        .unwrap();
        let options = cli.run_options();
        assert!(options.fail_fast);
        assert_eq!(options.mode, RunMode::Balances);
    }
}
