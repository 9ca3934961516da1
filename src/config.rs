//! Configuration loader and application settings.

use crate::cex::VenueEndpoint;
use crate::cex::bitstamp::BitstampCredentials;
use crate::cex::valr::ValrCredentials;
use crate::errors::{AppError, Result};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Consolidated application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bitstamp: VenueEndpoint,
    pub valr: VenueEndpoint,
    pub market: MarketConfig,
    /// Fraction of each queried balance a cycle may use (e.g. 0.02).
    pub balance_utilization: f64,
    /// Deadline applied to every venue request.
    pub request_timeout: Duration,
}

impl AppConfig {
    /// Load configuration from environment variables, falling back to the
    /// production venues and a BTC/USD → BTC/ZAR market.
    pub fn load() -> Result<Self> {
        let market = MarketConfig {
            base: env_or("BASE_CURRENCY", "btc"),
            buy_quote: env_or("BUY_QUOTE_CURRENCY", "usd"),
            sell_quote: env_or("SELL_QUOTE_CURRENCY", "zar"),
        };
        let balance_utilization: f64 = parse_env("BALANCE_UTILIZATION", 0.02)?;
        if !(balance_utilization > 0.0 && balance_utilization <= 1.0) {
            return Err(AppError::Config(format!(
                "BALANCE_UTILIZATION must be in (0, 1], got {balance_utilization}"
            )));
        }
        let timeout_secs: u64 = parse_env("REQUEST_TIMEOUT_SECS", 10)?;

        Ok(Self {
            bitstamp: VenueEndpoint::https(&env_or("BITSTAMP_HOST", "www.bitstamp.net")),
            valr: VenueEndpoint::https(&env_or("VALR_HOST", "api.valr.com")),
            market,
            balance_utilization,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Shared HTTP client for the whole run.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()?)
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env<T: FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{name} is not valid: {raw:?}"))),
        _ => Ok(default),
    }
}

/// The asset bought on Bitstamp and sold on VALR, with each venue's quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketConfig {
    pub base: String,
    pub buy_quote: String,
    pub sell_quote: String,
}

impl MarketConfig {
    /// e.g. `btcusd`
    pub fn bitstamp_pair(&self) -> String {
        format!("{}{}", self.base, self.buy_quote).to_lowercase()
    }

    /// Pair as it appears in VALR request paths, e.g. `btczar`.
    pub fn valr_path_pair(&self) -> String {
        format!("{}{}", self.base, self.sell_quote).to_lowercase()
    }

    /// Pair as VALR expects it in order bodies, e.g. `BTCZAR`.
    pub fn valr_order_pair(&self) -> String {
        self.valr_path_pair().to_uppercase()
    }

    pub fn bitstamp_balance_currency(&self) -> String {
        self.buy_quote.to_lowercase()
    }

    pub fn valr_balance_currency(&self) -> String {
        self.base.to_uppercase()
    }
}

/// One row of the accounts file.
#[derive(Debug, Clone)]
pub struct AccountConfig {
    pub bitstamp: BitstampCredentials,
    pub valr: ValrCredentials,
    /// Units of VALR quote per unit of Bitstamp quote.
    pub exchange_rate: f64,
    /// Minimum profit fraction, e.g. 0.015 for 1.5%.
    pub profit_margin: f64,
    pub execute_trade: bool,
}

const ACCOUNT_FIELDS: usize = 8;

impl AccountConfig {
    /// Columns: bitstamp key, secret, customer id, valr key, secret,
    /// exchange rate, profit margin, execute flag.
    pub fn from_record(row: usize, record: &csv::StringRecord) -> Result<Self> {
        if record.len() != ACCOUNT_FIELDS {
            return Err(AppError::Config(format!(
                "account row {row}: expected {ACCOUNT_FIELDS} fields, found {}",
                record.len()
            )));
        }
        let exchange_rate = parse_number(row, "exchange rate", &record[5])?;
        if exchange_rate <= 0.0 {
            return Err(AppError::Config(format!(
                "account row {row}: exchange rate must be positive, got {exchange_rate}"
            )));
        }
        let profit_margin = parse_number(row, "profit margin", &record[6])?;
        let execute_trade = parse_flag(&record[7]).ok_or_else(|| {
            AppError::Config(format!(
                "account row {row}: execute flag {:?} is not a boolean",
                &record[7]
            ))
        })?;

        Ok(Self {
            bitstamp: BitstampCredentials {
                key: record[0].to_string(),
                secret: record[1].to_string(),
                customer_id: record[2].to_string(),
            },
            valr: ValrCredentials {
                key: record[3].to_string(),
                secret: record[4].to_string(),
            },
            exchange_rate,
            profit_margin,
            execute_trade,
        })
    }
}

fn parse_number(row: usize, what: &str, raw: &str) -> Result<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| AppError::Config(format!("account row {row}: {what} {raw:?} is not a number")))
}

/// Accepts the usual spellings: 1/0, t/f, true/false in lower, upper or title case.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Read every account row from a headerless CSV file, in file order.
///
/// Only an unreadable file fails as a whole. Each row is parsed on its
/// own, so a malformed row comes back as that account's `Err` and the
/// rows around it are unaffected.
pub fn load_accounts(path: impl AsRef<Path>) -> Result<Vec<Result<AccountConfig>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;
    Ok(reader
        .records()
        .enumerate()
        .map(|(i, record)| AccountConfig::from_record(i + 1, &record?))
        .collect())
}
