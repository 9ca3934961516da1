use super::{Envelope, Venue, VenueEndpoint, dispatch, string_or_number};
use crate::errors::{AppError, Result};
use crate::utils::timestamp_ms;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use std::fmt;
use tracing::debug;

type HmacSha512 = Hmac<Sha512>;

const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Clone)]
pub struct ValrCredentials {
    pub key: String,
    pub secret: String,
}

impl fmt::Debug for ValrCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValrCredentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ValrRequest {
    pub method: Method,
    pub path: String,
    pub body: String,
    pub content_type: Option<&'static str>,
}

impl ValrRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: String::new(),
            content_type: None,
        }
    }

    pub fn post_json(path: impl Into<String>, body: String) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body,
            content_type: Some(JSON_CONTENT_TYPE),
        }
    }
}

/// HMAC-SHA512 over `timestamp + method + path + body`, lower-case hex.
pub fn sign(secret: &str, timestamp: &str, method: &str, path: &str, body: &[u8]) -> Result<String> {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Signing(format!("invalid VALR secret: {e}")))?;
    mac.update(timestamp.as_bytes());
    mac.update(method.as_bytes());
    mac.update(path.as_bytes());
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValrBalance {
    pub currency: String,
    #[serde(deserialize_with = "string_or_number")]
    pub available: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub reserved: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub total: String,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValrBookEntry {
    #[serde(default)]
    pub side: String,
    pub quantity: String,
    pub price: String,
    #[serde(default)]
    pub currency_pair: String,
    #[serde(default)]
    pub order_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValrOrderBook {
    #[serde(rename = "Bids")]
    pub bids: Vec<ValrBookEntry>,
    #[serde(rename = "Asks")]
    pub asks: Vec<ValrBookEntry>,
    #[serde(rename = "LastChange", default)]
    pub last_change: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValrLimitOrder {
    pub side: String,
    pub quantity: String,
    pub price: String,
    pub pair: String,
    pub post_only: bool,
    pub customer_order_id: String,
    pub time_in_force: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValrOrderId {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValrOrderStatus {
    pub order_id: String,
    #[serde(default)]
    pub order_status_type: String,
    #[serde(default)]
    pub currency_pair: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub original_price: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub remaining_quantity: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub original_quantity: String,
    #[serde(default)]
    pub order_side: String,
    #[serde(default)]
    pub order_type: String,
    #[serde(default)]
    pub failed_reason: String,
    #[serde(default)]
    pub customer_order_id: String,
    #[serde(default)]
    pub order_updated_at: String,
    #[serde(default)]
    pub order_created_at: String,
    #[serde(default)]
    pub time_in_force: String,
}

/// VALR REST adapter bound to one account's credentials.
#[derive(Debug, Clone)]
pub struct ValrClient {
    http: Client,
    endpoint: VenueEndpoint,
    credentials: ValrCredentials,
}

impl ValrClient {
    pub fn new(http: Client, endpoint: VenueEndpoint, credentials: ValrCredentials) -> Self {
        Self {
            http,
            endpoint,
            credentials,
        }
    }

    pub async fn send(&self, request: ValrRequest) -> Envelope {
        let timestamp = timestamp_ms();
        let signature = match sign(
            &self.credentials.secret,
            &timestamp,
            request.method.as_str(),
            &request.path,
            request.body.as_bytes(),
        ) {
            Ok(signature) => signature,
            Err(e) => return Envelope::transport(e.to_string()),
        };
        let headers = vec![
            ("X-VALR-API-KEY", self.credentials.key.clone()),
            ("X-VALR-SIGNATURE", signature),
            ("X-VALR-TIMESTAMP", timestamp),
        ];

        let url = self.endpoint.url(&request.path, "");
        debug!(method = %request.method, %url, "[VALR] request");
        dispatch(
            &self.http,
            Venue::Valr,
            request.method,
            &url,
            headers,
            request.content_type,
            request.body,
        )
        .await
    }

    pub async fn balances(&self) -> Result<Vec<ValrBalance>> {
        self.send(ValrRequest::get("/v1/account/balances"))
            .await
            .decode(Venue::Valr, "balances")
    }

    pub async fn order_book(&self, pair: &str) -> Result<ValrOrderBook> {
        let path = format!("/v1/marketdata/{}/orderbook", pair);
        self.send(ValrRequest::get(path))
            .await
            .decode(Venue::Valr, "order book")
    }

    pub async fn place_limit_order(&self, order: &ValrLimitOrder) -> Result<ValrOrderId> {
        let body = serde_json::to_string(order).map_err(|source| AppError::Decode {
            venue: Venue::Valr,
            what: "limit order",
            source,
        })?;
        self.send(ValrRequest::post_json("/v1/orders/limit", body))
            .await
            .decode(Venue::Valr, "order id")
    }

    pub async fn order_status(&self, pair: &str, order_id: &str) -> Result<ValrOrderStatus> {
        let path = format!("/v1/orders/{}/orderid/{}", pair, order_id);
        self.send(ValrRequest::get(path))
            .await
            .decode(Venue::Valr, "order status")
    }
}
