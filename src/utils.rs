//! Miscellaneous helper utilities.

use std::time::{SystemTime, UNIX_EPOCH};
use tracing_subscriber::{EnvFilter, fmt};

/// Initialize `tracing` subscriber with env-based filter.
///
/// If `RUST_LOG` is not set, defaults to `info` level.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

/// Milliseconds since the Unix epoch, as sent in venue auth headers.
pub fn timestamp_ms() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
        .to_string()
}

/// Seconds since the Unix epoch.
pub fn timestamp_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Round `value` to `digits` significant digits and render it in plain
/// decimal notation (never exponent form), trimming trailing zeros.
///
/// Order quantities are submitted this way; venues reject `1e-05`.
pub fn format_significant(value: f64, digits: u32) -> String {
    if value == 0.0 || !value.is_finite() || digits == 0 {
        return "0".to_string();
    }
    let exponent = value.abs().log10().floor() as i32;
    let decimals = digits as i32 - 1 - exponent;
    if decimals > 0 {
        let rendered = format!("{:.*}", decimals as usize, value);
        return rendered
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string();
    }
    let scale = 10f64.powi(-decimals);
    format!("{:.0}", (value / scale).round() * scale)
}

/// Quote prices go out with exactly two decimals.
pub fn format_price(value: f64) -> String {
    format!("{:.2}", value)
}
