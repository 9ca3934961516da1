use crate::cex::Venue;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{venue} transport error: {message}")]
    Transport { venue: Venue, message: String },

    /// Non-success status; `body` is the venue's response, uninterpreted.
    #[error("{venue} rejected request ({status}): {body}")]
    Venue {
        venue: Venue,
        status: u16,
        body: String,
    },

    #[error("{venue} returned malformed {what}: {source}")]
    Decode {
        venue: Venue,
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{venue} response has no {field}")]
    MissingField { venue: Venue, field: String },

    #[error("Invalid decimal in {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Signing error: {0}")]
    Signing(String),
}
