//! Authenticated REST adapters for the two venues.
//!
//! Responsibilities:
//! • Sign each request with the venue's MAC scheme.
//! • Execute exactly one HTTP round trip per call.
//! • Fold every outcome (success, venue rejection, transport failure) into
//!   an [`Envelope`] so nothing escapes the adapter boundary.

use crate::errors::{AppError, Result};
use reqwest::{Client, Method, StatusCode, header};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::fmt;
use tracing::warn;

pub mod bitstamp;
pub mod valr;

pub use bitstamp::BitstampClient;
pub use valr::ValrClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Venue {
    Bitstamp,
    Valr,
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Venue::Bitstamp => f.write_str("Bitstamp"),
            Venue::Valr => f.write_str("VALR"),
        }
    }
}

/// Where a venue lives. `host` is signed verbatim by Bitstamp, so it
/// carries no scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenueEndpoint {
    pub scheme: String,
    pub host: String,
}

impl VenueEndpoint {
    pub fn https(host: &str) -> Self {
        Self {
            scheme: "https".to_string(),
            host: host.to_string(),
        }
    }

    /// Full request URL. Venues expect it lower-cased.
    pub fn url(&self, path: &str, query: &str) -> String {
        format!("{}://{}{}{}", self.scheme, self.host, path, query).to_lowercase()
    }
}

/// Outcome of one signed round trip: either the raw success body or the
/// raw failure text. Never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    Body(String),
    Failure {
        /// `None` when no response was received at all.
        status: Option<u16>,
        message: String,
    },
}

impl Envelope {
    pub fn transport(message: impl Into<String>) -> Self {
        Envelope::Failure {
            status: None,
            message: message.into(),
        }
    }

    pub fn into_body(self, venue: Venue) -> Result<String> {
        match self {
            Envelope::Body(body) => Ok(body),
            Envelope::Failure {
                status: Some(status),
                message,
            } => Err(AppError::Venue {
                venue,
                status,
                body: message,
            }),
            Envelope::Failure {
                status: None,
                message,
            } => Err(AppError::Transport { venue, message }),
        }
    }

    /// Decode a success body into `T`; failures short-circuit before any
    /// decoding is attempted.
    pub fn decode<T: DeserializeOwned>(self, venue: Venue, what: &'static str) -> Result<T> {
        let body = self.into_body(venue)?;
        serde_json::from_str(&body).map_err(|source| AppError::Decode {
            venue,
            what,
            source,
        })
    }
}

/// Execute a prepared request and fold the result into an [`Envelope`].
///
/// Only 200 and 202 count as success; any other status hands back the
/// response body untouched.
pub(crate) async fn dispatch(
    http: &Client,
    venue: Venue,
    method: Method,
    url: &str,
    headers: Vec<(&'static str, String)>,
    content_type: Option<&str>,
    body: String,
) -> Envelope {
    let mut request = http
        .request(method, url)
        .header(header::ACCEPT, "application/json");
    if let Some(content_type) = content_type {
        request = request.header(header::CONTENT_TYPE, content_type);
    }
    for (name, value) in headers {
        request = request.header(name, value);
    }

    let response = match request.body(body).send().await {
        Ok(response) => response,
        Err(e) => {
            warn!(%venue, error = %e, "request failed");
            return Envelope::transport(e.to_string());
        }
    };

    let status = response.status();
    let text = match response.text().await {
        Ok(text) => text,
        Err(e) => {
            warn!(%venue, error = %e, "response body unreadable");
            return Envelope::Failure {
                status: Some(status.as_u16()),
                message: e.to_string(),
            };
        }
    };

    if status != StatusCode::OK && status != StatusCode::ACCEPTED {
        warn!(%venue, status = status.as_u16(), body = %text, "venue returned error");
        return Envelope::Failure {
            status: Some(status.as_u16()),
            message: text,
        };
    }
    Envelope::Body(text)
}

/// Accepts `"123"`, `123` or `null`, yielding a string.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Probe {
        #[serde(deserialize_with = "string_or_number")]
        id: String,
    }

    #[test]
    fn url_is_lowercased() {
        let endpoint = VenueEndpoint::https("api.VALR.com");
        assert_eq!(
            endpoint.url("/v1/orders/BTCZAR/orderid/ABC", ""),
            "https://api.valr.com/v1/orders/btczar/orderid/abc"
        );
        let endpoint = VenueEndpoint::https("www.bitstamp.net");
        assert_eq!(
            endpoint.url("/api/v2/order_book/btcusd/", "?group=1"),
            "https://www.bitstamp.net/api/v2/order_book/btcusd/?group=1"
        );
    }

    #[test]
    fn failure_envelope_maps_to_typed_errors() {
        let rejected = Envelope::Failure {
            status: Some(400),
            message: r#"{"reason":"nope"}"#.into(),
        };
        match rejected.into_body(Venue::Valr) {
            Err(AppError::Venue { status, body, .. }) => {
                assert_eq!(status, 400);
                assert_eq!(body, r#"{"reason":"nope"}"#);
            }
            other => panic!("unexpected {other:?}"),
        }

        let dropped = Envelope::transport("connection reset");
        assert!(matches!(
            dropped.into_body(Venue::Bitstamp),
            Err(AppError::Transport { .. })
        ));
    }

    #[test]
    fn malformed_body_is_a_decode_error() {
        let env = Envelope::Body("{not json".into());
        let res: Result<Probe> = env.decode(Venue::Bitstamp, "order");
        assert!(matches!(res, Err(AppError::Decode { what: "order", .. })));
    }

    #[test]
    fn ids_accept_strings_and_numbers() {
        let a: Probe = serde_json::from_str(r#"{"id":"42"}"#).unwrap();
        let b: Probe = serde_json::from_str(r#"{"id":42}"#).unwrap();
        let c: Probe = serde_json::from_str(r#"{"id":null}"#).unwrap();
        assert_eq!(a.id, "42");
        assert_eq!(b.id, "42");
        assert_eq!(c.id, "");
    }
}
