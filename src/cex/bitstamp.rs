use super::{Envelope, Venue, VenueEndpoint, dispatch, string_or_number};
use crate::errors::{AppError, Result};
use crate::utils::{format_price, format_significant, timestamp_ms, timestamp_secs};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method};
use serde::Deserialize;
use sha2::Sha256;
use std::fmt;
use tracing::debug;
use url::form_urlencoded;

type HmacSha256 = Hmac<Sha256>;

const AUTH_SCHEME: &str = "BITSTAMP";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Clone)]
pub struct BitstampCredentials {
    pub key: String,
    pub secret: String,
    pub customer_id: String,
}

impl fmt::Debug for BitstampCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitstampCredentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .field("customer_id", &self.customer_id)
            .finish()
    }
}

/// Unsigned request descriptor; credentials and host come from the client.
#[derive(Debug, Clone)]
pub struct BitstampRequest {
    pub method: Method,
    pub path: String,
    /// Either empty or starting with `?`.
    pub query: String,
    pub body: String,
    pub content_type: Option<&'static str>,
}

impl BitstampRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: String::new(),
            body: String::new(),
            content_type: None,
        }
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self {
            method: Method::POST,
            ..Self::get(path)
        }
    }

    pub fn with_query(mut self, pairs: &[(&str, &str)]) -> Self {
        self.query = format!("?{}", encode_form(pairs));
        self
    }

    /// Pairs must already be in key order; they are encoded as given.
    pub fn with_form(mut self, pairs: &[(&str, &str)]) -> Self {
        self.body = encode_form(pairs);
        self.content_type = Some(FORM_CONTENT_TYPE);
        self
    }
}

fn encode_form(pairs: &[(&str, &str)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

/// Every input of the v2 signature, in signing order.
#[derive(Debug, Clone, Copy)]
pub struct SigningInput<'a> {
    pub authorization: &'a str,
    pub method: &'a str,
    pub host: &'a str,
    pub path: &'a str,
    pub query: &'a str,
    pub content_type: &'a str,
    pub nonce: &'a str,
    pub timestamp: &'a str,
    pub version: &'a str,
    pub body: &'a [u8],
}

/// HMAC-SHA256 over the concatenated inputs, upper-case hex.
pub fn sign_v2(secret: &str, input: &SigningInput<'_>) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Signing(format!("invalid Bitstamp secret: {e}")))?;
    for part in [
        input.authorization,
        input.method,
        input.host,
        input.path,
        input.query,
        input.content_type,
        input.nonce,
        input.timestamp,
        input.version,
    ] {
        mac.update(part.as_bytes());
    }
    mac.update(input.body);
    Ok(hex::encode_upper(mac.finalize().into_bytes()))
}

/// Render 16 random bytes as an RFC 4122 version-4 UUID string.
pub fn nonce_from_bytes(bytes: [u8; 16]) -> String {
    uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .hyphenated()
        .to_string()
}

fn fresh_nonce() -> String {
    nonce_from_bytes(rand::random())
}

/// `v2` for paths in the v2 API family, `v1` for everything else.
pub fn api_version(path: &str) -> &'static str {
    if path.contains("/v2/") { "v2" } else { "v1" }
}

/// Strictly increasing nonce for the legacy signature scheme. Callers own
/// it and pass it into every legacy call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyNonce {
    last: u64,
}

impl LegacyNonce {
    pub fn starting_at(last: u64) -> Self {
        Self { last }
    }

    /// Seeded from the wall clock so restarts never reuse a nonce.
    pub fn from_clock() -> Self {
        Self::starting_at(timestamp_secs())
    }

    pub fn advance(&mut self) -> u64 {
        self.last += 1;
        self.last
    }
}

/// Legacy signature: HMAC-SHA256 over `nonce + customer_id + key`, upper-case hex.
pub fn legacy_signature(secret: &str, nonce: u64, customer_id: &str, key: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Signing(format!("invalid Bitstamp secret: {e}")))?;
    mac.update(nonce.to_string().as_bytes());
    mac.update(customer_id.as_bytes());
    mac.update(key.as_bytes());
    Ok(hex::encode_upper(mac.finalize().into_bytes()))
}

#[derive(Debug, Clone, Deserialize)]
pub struct BitstampBalance {
    #[serde(default)]
    pub currency: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub total: String,
    #[serde(deserialize_with = "string_or_number")]
    pub available: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub reserved: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BitstampOrderBook {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub microtimestamp: String,
    /// `[price, amount]` pairs, best first.
    pub bids: Vec<[String; 2]>,
    pub asks: Vec<[String; 2]>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BitstampOrder {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub datetime: String,
    #[serde(default, rename = "type", deserialize_with = "string_or_number")]
    pub order_type: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub price: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub amount: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub client_order_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BitstampOrderStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub transactions: Vec<BitstampTransaction>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub amount_remaining: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub client_order_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BitstampTransaction {
    #[serde(default, deserialize_with = "string_or_number")]
    pub tid: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub usd: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub price: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub fee: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub btc: String,
    #[serde(default)]
    pub datetime: String,
    #[serde(default, rename = "type", deserialize_with = "string_or_number")]
    pub transaction_type: String,
}

/// Time-in-force switches of a Bitstamp limit order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderFlags {
    pub daily: bool,
    pub ioc: bool,
    pub fok: bool,
}

/// Bitstamp REST adapter bound to one account's credentials.
#[derive(Debug, Clone)]
pub struct BitstampClient {
    http: Client,
    endpoint: VenueEndpoint,
    credentials: BitstampCredentials,
}

impl BitstampClient {
    pub fn new(http: Client, endpoint: VenueEndpoint, credentials: BitstampCredentials) -> Self {
        Self {
            http,
            endpoint,
            credentials,
        }
    }

    /// Sign and execute one request. All failures land in the envelope.
    pub async fn send(&self, request: BitstampRequest) -> Envelope {
        let authorization = format!("{} {}", AUTH_SCHEME, self.credentials.key);
        let version = api_version(&request.path);

        let mut headers = Vec::new();
        if version == "v2" {
            let nonce = fresh_nonce();
            let timestamp = timestamp_ms();
            let input = SigningInput {
                authorization: &authorization,
                method: request.method.as_str(),
                host: &self.endpoint.host,
                path: &request.path,
                query: &request.query,
                content_type: request.content_type.unwrap_or(""),
                nonce: &nonce,
                timestamp: &timestamp,
                version,
                body: request.body.as_bytes(),
            };
            let signature = match sign_v2(&self.credentials.secret, &input) {
                Ok(signature) => signature,
                Err(e) => return Envelope::transport(e.to_string()),
            };
            headers.push(("X-Auth", authorization.clone()));
            headers.push(("X-Auth-Signature", signature));
            headers.push(("X-Auth-Nonce", nonce));
            headers.push(("X-Auth-Timestamp", timestamp));
            headers.push(("X-Auth-Version", version.to_string()));
        }

        let url = self.endpoint.url(&request.path, &request.query);
        debug!(method = %request.method, %url, "[BITSTAMP] request");
        dispatch(
            &self.http,
            Venue::Bitstamp,
            request.method,
            &url,
            headers,
            request.content_type,
            request.body,
        )
        .await
    }

    pub async fn account_balance(&self, currency: &str) -> Result<BitstampBalance> {
        let path = format!("/api/v2/account_balances/{}/", currency);
        self.send(BitstampRequest::post(path))
            .await
            .decode(Venue::Bitstamp, "account balance")
    }

    pub async fn order_book(&self, pair: &str) -> Result<BitstampOrderBook> {
        let path = format!("/api/v2/order_book/{}/", pair);
        self.send(BitstampRequest::get(path).with_query(&[("group", "1")]))
            .await
            .decode(Venue::Bitstamp, "order book")
    }

    /// Amount goes out with one significant digit, price with two decimals.
    pub async fn buy_limit_order(
        &self,
        pair: &str,
        amount: f64,
        price: f64,
        flags: OrderFlags,
    ) -> Result<BitstampOrder> {
        let amount = format_significant(amount, 1);
        let price = format_price(price);
        let daily = flags.daily.to_string();
        let ioc = flags.ioc.to_string();
        let fok = flags.fok.to_string();
        let path = format!("/api/v2/buy/{}/", pair);
        let request = BitstampRequest::post(path).with_form(&[
            ("amount", amount.as_str()),
            ("daily_order", daily.as_str()),
            ("fok_order", fok.as_str()),
            ("ioc_order", ioc.as_str()),
            ("price", price.as_str()),
        ]);
        self.send(request).await.decode(Venue::Bitstamp, "order")
    }

    pub async fn order_status(&self, id: &str) -> Result<BitstampOrderStatus> {
        let request = BitstampRequest::post("/api/v2/order_status/").with_form(&[("id", id)]);
        self.send(request)
            .await
            .decode(Venue::Bitstamp, "order status")
    }

    /// Balance call on the legacy API, authenticated with form fields
    /// rather than `X-Auth` headers.
    pub async fn legacy_balance(
        &self,
        nonce: &mut LegacyNonce,
    ) -> Result<serde_json::Map<String, serde_json::Value>> {
        let nonce = nonce.advance();
        let signature = legacy_signature(
            &self.credentials.secret,
            nonce,
            &self.credentials.customer_id,
            &self.credentials.key,
        )?;
        let nonce = nonce.to_string();
        let request = BitstampRequest::post("/api/balance/").with_form(&[
            ("key", self.credentials.key.as_str()),
            ("signature", signature.as_str()),
            ("nonce", nonce.as_str()),
        ]);
        self.send(request)
            .await
            .decode(Venue::Bitstamp, "legacy balance")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> BitstampCredentials {
        BitstampCredentials {
            key: "key123".into(),
            secret: "secret456".into(),
            customer_id: "cust789".into(),
        }
    }

    fn client_for(server: &MockServer) -> BitstampClient {
        let endpoint = VenueEndpoint {
            scheme: "http".into(),
            host: server.address().to_string(),
        };
        BitstampClient::new(Client::new(), endpoint, credentials())
    }

    fn sample_input<'a>(body: &'a [u8]) -> SigningInput<'a> {
        SigningInput {
            authorization: "BITSTAMP key123",
            method: "POST",
            host: "www.bitstamp.net",
            path: "/api/v2/buy/btcusd/",
            query: "",
            content_type: FORM_CONTENT_TYPE,
            nonce: "f93c979d-b00d-43a9-9b9c-fd4cd9547fa6",
            timestamp: "1567755304968",
            version: "v2",
            body,
        }
    }

    #[test]
    fn nonce_has_uuid_v4_shape() {
        let nonce = nonce_from_bytes([0xff; 16]);
        assert_eq!(nonce, "ffffffff-ffff-4fff-bfff-ffffffffffff");
        let nonce = nonce_from_bytes([0x00; 16]);
        assert_eq!(nonce, "00000000-0000-4000-8000-000000000000");
        assert_ne!(fresh_nonce(), fresh_nonce());
    }

    #[test]
    fn version_follows_path_family() {
        assert_eq!(api_version("/api/v2/order_book/btcusd/"), "v2");
        assert_eq!(api_version("/api/balance/"), "v1");
    }

    #[test]
    fn v2_signature_matches_concatenated_message() {
        let body = b"amount=0.01&price=100.00";
        let sig = sign_v2("secret456", &sample_input(body)).unwrap();

        let mut mac = HmacSha256::new_from_slice(b"secret456").unwrap();
        mac.update(
            b"BITSTAMP key123POSTwww.bitstamp.net/api/v2/buy/btcusd/application/x-www-form-urlencoded\
f93c979d-b00d-43a9-9b9c-fd4cd9547fa61567755304968v2amount=0.01&price=100.00",
        );
        let expected = hex::encode_upper(mac.finalize().into_bytes());

        assert_eq!(sig, expected);
        assert_eq!(sig.len(), 64);
        assert_eq!(sig, sig.to_uppercase());
    }

    #[test]
    fn v2_signature_covers_every_field() {
        let base = sign_v2("secret456", &sample_input(b"a=1")).unwrap();
        let other_body = sign_v2("secret456", &sample_input(b"a=2")).unwrap();
        let mut moved = sample_input(b"a=1");
        moved.query = "?group=1";
        let other_query = sign_v2("secret456", &moved).unwrap();
        let other_secret = sign_v2("secret457", &sample_input(b"a=1")).unwrap();
        assert_ne!(base, other_body);
        assert_ne!(base, other_query);
        assert_ne!(base, other_secret);
    }

    #[test]
    fn legacy_nonce_is_strictly_increasing() {
        let mut nonce = LegacyNonce::starting_at(41);
        assert_eq!(nonce.advance(), 42);
        assert_eq!(nonce.advance(), 43);
        assert!(LegacyNonce::from_clock().advance() > 1_600_000_000);
    }

    #[test]
    fn credentials_debug_hides_secret() {
        let rendered = format!("{:?}", credentials());
        assert!(!rendered.contains("secret456"));
        assert!(rendered.contains("key123"));
    }

    #[test]
    fn order_book_shape() {
        let raw = r#"{"timestamp":"1","microtimestamp":"1000","bids":[["100.0","1.0"]],"asks":[["101.0","2.0"]]}"#;
        let book: BitstampOrderBook = serde_json::from_str(raw).expect("json should parse");
        assert_eq!(book.asks[0], ["101.0".to_string(), "2.0".to_string()]);
    }

    #[tokio::test]
    async fn order_book_request_is_signed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/order_book/btcusd/"))
            .and(query_param("group", "1"))
            .and(header("accept", "application/json"))
            .and(header("x-auth", "BITSTAMP key123"))
            .and(header("x-auth-version", "v2"))
            .and(header_exists("x-auth-signature"))
            .and(header_exists("x-auth-nonce"))
            .and(header_exists("x-auth-timestamp"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"timestamp":"1","microtimestamp":"1","bids":[],"asks":[["100.00","1.5"]]}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let book = client_for(&server).order_book("btcusd").await.unwrap();
        assert_eq!(book.asks.len(), 1);

        let received = server.received_requests().await.unwrap();
        let req = &received[0];
        assert!(req.headers.get("content-type").is_none());
        let get = |name: &str| req.headers.get(name).unwrap().to_str().unwrap().to_string();
        let host = server.address().to_string();
        let nonce = get("x-auth-nonce");
        let timestamp = get("x-auth-timestamp");
        let expected = sign_v2(
            "secret456",
            &SigningInput {
                authorization: "BITSTAMP key123",
                method: "GET",
                host: &host,
                path: "/api/v2/order_book/btcusd/",
                query: "?group=1",
                content_type: "",
                nonce: &nonce,
                timestamp: &timestamp,
                version: "v2",
                body: b"",
            },
        )
        .unwrap();
        assert_eq!(get("x-auth-signature"), expected);
    }

    #[tokio::test]
    async fn buy_order_form_is_ordered_and_formatted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/buy/btcusd/"))
            .and(header("content-type", FORM_CONTENT_TYPE))
            .and(body_string(
                "amount=0.01&daily_order=false&fok_order=false&ioc_order=true&price=61234.50",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"id":1234,"datetime":"2024-01-01 00:00:00","type":"0","price":"61234.50","amount":"0.01"}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let flags = OrderFlags {
            daily: false,
            ioc: true,
            fok: false,
        };
        let order = client_for(&server)
            .buy_limit_order("btcusd", 0.0123, 61234.5, flags)
            .await
            .unwrap();
        assert_eq!(order.id, "1234");
        assert_eq!(order.order_type, "0");
    }

    #[tokio::test]
    async fn rejection_keeps_body_verbatim() {
        let server = MockServer::start().await;
        let body = r#"{"status":"error","reason":"Invalid signature","code":"API0005"}"#;
        Mock::given(method("POST"))
            .and(path("/api/v2/account_balances/usd/"))
            .respond_with(ResponseTemplate::new(403).set_body_string(body))
            .mount(&server)
            .await;

        let err = client_for(&server).account_balance("usd").await.unwrap_err();
        match err {
            AppError::Venue {
                venue,
                status,
                body: got,
            } => {
                assert_eq!(venue, Venue::Bitstamp);
                assert_eq!(status, 403);
                assert_eq!(got, body);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn accepted_status_counts_as_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/order_status/"))
            .and(body_string("id=1234"))
            .respond_with(ResponseTemplate::new(202).set_body_string(
                r#"{"status":"Finished","id":1234,"amount_remaining":"0","transactions":[{"tid":9,"usd":"612.34","price":"61234.50","fee":"1.2","btc":"0.01","datetime":"x","type":2}]}"#,
            ))
            .mount(&server)
            .await;

        let status = client_for(&server).order_status("1234").await.unwrap();
        assert_eq!(status.status, "Finished");
        assert_eq!(status.transactions[0].tid, "9");
        assert_eq!(status.transactions[0].transaction_type, "2");
    }

    #[tokio::test]
    async fn legacy_balance_uses_form_auth_without_headers() {
        let server = MockServer::start().await;
        let mut nonce = LegacyNonce::starting_at(99);
        let signature = legacy_signature("secret456", 100, "cust789", "key123").unwrap();
        Mock::given(method("POST"))
            .and(path("/api/balance/"))
            .and(body_string(format!(
                "key=key123&signature={}&nonce=100",
                signature
            )))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"usd_available":"10.00"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let balance = client_for(&server).legacy_balance(&mut nonce).await.unwrap();
        assert_eq!(balance["usd_available"], "10.00");
        assert_eq!(nonce.advance(), 101);

        let received = server.received_requests().await.unwrap();
        assert!(received[0].headers.get("x-auth").is_none());
        assert!(received[0].headers.get("x-auth-signature").is_none());
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        let endpoint = VenueEndpoint {
            scheme: "http".into(),
            host: "127.0.0.1:1".into(),
        };
        let client = BitstampClient::new(Client::new(), endpoint, credentials());
        let envelope = client.send(BitstampRequest::get("/api/v2/order_book/btcusd/")).await;
        assert!(matches!(envelope, Envelope::Failure { status: None, .. }));
    }
}
