//! Turns venue wire formats into venue-agnostic depths and balances.

use crate::cex::Venue;
use crate::cex::bitstamp::{BitstampBalance, BitstampOrderBook};
use crate::cex::valr::{ValrBalance, ValrOrderBook};
use crate::errors::{AppError, Result};
use crate::models::{Depth, Level, Side};
use tracing::warn;

/// Parse a decimal string; an unparseable value is fatal to the cycle.
pub fn parse_decimal(field: &'static str, raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| AppError::InvalidNumber {
            field,
            value: raw.to_string(),
        })
}

/// Bitstamp asks as a buy-side depth.
pub fn bitstamp_buyable(book: &BitstampOrderBook, base: &str, quote: &str) -> Result<Depth> {
    let levels = book
        .asks
        .iter()
        .map(|[price, amount]| {
            Ok(Level::new(
                parse_decimal("bitstamp ask amount", amount)?,
                parse_decimal("bitstamp ask price", price)?,
            ))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Depth::new(Side::Ask, base, quote).with_levels(levels))
}

/// VALR bids as a sell-side depth.
pub fn valr_sellable(book: &ValrOrderBook, base: &str, quote: &str) -> Result<Depth> {
    let levels = book
        .bids
        .iter()
        .map(|entry| {
            Ok(Level::new(
                parse_decimal("valr bid quantity", &entry.quantity)?,
                parse_decimal("valr bid price", &entry.price)?,
            ))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Depth::new(Side::Bid, base, quote).with_levels(levels))
}

pub fn bitstamp_available(balance: &BitstampBalance) -> Result<f64> {
    parse_decimal("bitstamp available balance", &balance.available)
}

/// `<currency>_available` from a legacy balance response, which lists
/// every currency in one flat object.
pub fn bitstamp_legacy_available(
    balance: &serde_json::Map<String, serde_json::Value>,
    currency: &str,
) -> Result<f64> {
    let field = format!("{}_available", currency.to_lowercase());
    match balance.get(&field) {
        Some(serde_json::Value::String(raw)) => parse_decimal("bitstamp legacy balance", raw),
        Some(serde_json::Value::Number(n)) => n.as_f64().ok_or_else(|| AppError::InvalidNumber {
            field: "bitstamp legacy balance",
            value: n.to_string(),
        }),
        Some(other) => Err(AppError::InvalidNumber {
            field: "bitstamp legacy balance",
            value: other.to_string(),
        }),
        None => Err(AppError::MissingField {
            venue: Venue::Bitstamp,
            field,
        }),
    }
}

/// Available amount of `currency`; a currency the account has never held
/// is simply absent from the list and counts as zero.
pub fn valr_available(balances: &[ValrBalance], currency: &str) -> Result<f64> {
    match balances
        .iter()
        .find(|b| b.currency.eq_ignore_ascii_case(currency))
    {
        Some(balance) => parse_decimal("valr available balance", &balance.available),
        None => {
            warn!(currency, "[VALR] currency missing from balance list");
            Ok(0.0)
        }
    }
}
