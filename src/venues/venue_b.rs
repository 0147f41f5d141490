use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, instrument, warn};

use crate::error::ArbError;
use crate::types::{Balance, OrderResult, PriceQuote, Venue};
use crate::venues::VenueClient;

type HmacSha256 = Hmac<Sha256>;

const SYMBOL: &str = "BTCUSDT";

const FALLBACK_URLS: &[&str] = &[
    "https://api1.binance.com/api/v3",
    "https://api2.binance.com/api/v3",
    "https://api3.binance.com/api/v3",
    "https://api4.binance.com/api/v3",
];

/// USDT-quoted venue client, shaped on Binance's `bookTicker`/`price`,
/// `/account` and `/order` endpoints: HMAC-SHA256 request signing and a
/// list of fallback hosts probed on first use.
pub struct VenueBClient {
    api_key: String,
    api_secret: String,
    base_url: String,
    client: reqwest::Client,
    working_url: tokio::sync::Mutex<Option<String>>,
}

#[derive(Deserialize)]
struct BookTicker {
    #[serde(rename = "bidPrice")]
    bid_price: String,
    #[serde(rename = "askPrice")]
    ask_price: String,
}

#[derive(Deserialize)]
struct PriceTicker {
    price: String,
}

#[derive(Deserialize)]
struct AccountBalanceEntry {
    asset: String,
    free: String,
    locked: String,
}

#[derive(Deserialize)]
struct AccountResponse {
    balances: Vec<AccountBalanceEntry>,
}

#[derive(Deserialize)]
struct FillEntry {
    price: String,
}

#[derive(Deserialize)]
struct OrderResponse {
    #[serde(rename = "orderId")]
    order_id: Option<i64>,
    #[serde(rename = "executedQty")]
    executed_qty: Option<String>,
    fills: Option<Vec<FillEntry>>,
}

impl VenueBClient {
    pub fn new(api_key: String, api_secret: String, base_url: String) -> Self {
        Self {
            api_key,
            api_secret,
            base_url,
            client: reqwest::Client::new(),
            working_url: tokio::sync::Mutex::new(None),
        }
    }

    fn has_credentials(&self) -> bool {
        !self.api_key.is_empty() && !self.api_secret.is_empty()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Probe the configured URL, then each fallback host's `/ping` in
    /// order, 5s timeout each. The first 200 response wins and is cached
    /// for the rest of this client's life.
    async fn get_working_url(&self) -> String {
        {
            let cached = self.working_url.lock().await;
            if let Some(url) = cached.as_ref() {
                return url.clone();
            }
        }

        let probe_client = match reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
        {
            Ok(c) => c,
            Err(_) => return self.base_url.clone(),
        };

        let mut urls_to_try = vec![self.base_url.clone()];
        urls_to_try.extend(fallback_urls().iter().map(|s| s.to_string()));

        for url in urls_to_try {
            let ping_url = format!("{url}/ping");
            if let Ok(resp) = probe_client.get(&ping_url).send().await {
                if resp.status().as_u16() == 200 {
                    debug!(url = %url, "venue_b endpoint probe succeeded");
                    *self.working_url.lock().await = Some(url.clone());
                    return url;
                }
            }
        }

        warn!("no working venue_b endpoint found, using configured default");
        self.base_url.clone()
    }

    fn timestamp_ms() -> u128 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_millis()
    }

    fn sign(&self, query: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .expect("hmac accepts a key of any length");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Build a signed query string: params, timestamp and recvWindow, then
    /// a trailing `signature` computed over everything before it.
    fn signed_query(&self, params: &[(&str, String)]) -> String {
        let mut query = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(&format!("timestamp={}&recvWindow=5000", Self::timestamp_ms()));
        let signature = self.sign(&query);
        format!("{query}&signature={signature}")
    }

    fn headers(&self) -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Ok(v) = reqwest::header::HeaderValue::from_str(&self.api_key) {
            headers.insert("X-MBX-APIKEY", v);
        }
        headers
    }

    async fn list_balances(&self) -> Result<Vec<AccountBalanceEntry>, ArbError> {
        if !self.has_credentials() {
            return Ok(Vec::new());
        }
        let query = self.signed_query(&[]);
        let url = format!("{}/account?{}", self.get_working_url().await, query);
        let resp = self
            .client
            .get(&url)
            .headers(self.headers())
            .send()
            .await?;
        if resp.status().as_u16() == 429 {
            return Err(ArbError::RateLimit("venue_b account".to_string()));
        }
        if resp.status().as_u16() == 401 {
            return Err(ArbError::Auth("venue_b signature rejected".to_string()));
        }
        if !resp.status().is_success() {
            return Err(ArbError::Transient(format!(
                "venue_b account http {}",
                resp.status()
            )));
        }
        let body: AccountResponse = resp.json().await?;
        Ok(body.balances)
    }

    async fn balance_for(&self, asset: &str) -> Result<Balance, ArbError> {
        let entries = self.list_balances().await?;
        match entries.into_iter().find(|b| b.asset == asset) {
            Some(e) => Ok(Balance {
                available: e.free.parse().unwrap_or(0.0),
                reserved: e.locked.parse().unwrap_or(0.0),
            }),
            None => Ok(Balance::default()),
        }
    }
}

#[async_trait]
impl VenueClient for VenueBClient {
    #[instrument(skip(self))]
    async fn get_price(&self) -> Result<PriceQuote, ArbError> {
        let working_url = self.get_working_url().await;
        let book_url = format!("{}/ticker/bookTicker?symbol={}", working_url, SYMBOL);
        let price_url = format!("{}/ticker/price?symbol={}", working_url, SYMBOL);

        let book_resp = self.client.get(&book_url).send().await?;
        if book_resp.status().as_u16() == 429 {
            return Err(ArbError::RateLimit("venue_b bookTicker".to_string()));
        }
        if !book_resp.status().is_success() {
            return Err(ArbError::Transient(format!(
                "venue_b bookTicker http {}",
                book_resp.status()
            )));
        }
        let book: BookTicker = book_resp.json().await?;

        let price_resp = self.client.get(&price_url).send().await?;
        let last = if price_resp.status().is_success() {
            price_resp
                .json::<PriceTicker>()
                .await
                .ok()
                .and_then(|p| p.price.parse().ok())
                .unwrap_or(0.0)
        } else {
            0.0
        };

        let quote = PriceQuote {
            bid: book
                .bid_price
                .parse()
                .map_err(|_| ArbError::DataValidity("venue_b bid not numeric".to_string()))?,
            ask: book
                .ask_price
                .parse()
                .map_err(|_| ArbError::DataValidity("venue_b ask not numeric".to_string()))?,
            last,
            venue: Venue::B,
        };
        if !quote.is_valid() {
            return Err(ArbError::DataValidity("venue_b bid/ask out of order".to_string()));
        }
        debug!(bid = quote.bid, ask = quote.ask, "venue_b price");
        Ok(quote)
    }

    async fn get_base_balance(&self) -> Result<Balance, ArbError> {
        self.balance_for("BTC").await
    }

    async fn get_counter_balance(&self) -> Result<Balance, ArbError> {
        self.balance_for("USDT").await
    }

    #[instrument(skip(self))]
    async fn place_market_buy(&self, base_amount: f64) -> Result<OrderResult, ArbError> {
        if !self.has_credentials() {
            return Ok(OrderResult::failed("venue_b credentials not configured"));
        }
        let params = [
            ("symbol", SYMBOL.to_string()),
            ("side", "BUY".to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", base_amount.to_string()),
        ];
        let query = self.signed_query(&params);
        let url = format!("{}/order?{}", self.get_working_url().await, query);
        let resp = self
            .client
            .post(&url)
            .headers(self.headers())
            .send()
            .await?;
        self.parse_order_response(resp).await
    }

    #[instrument(skip(self))]
    async fn place_market_sell(&self, base_amount: f64) -> Result<OrderResult, ArbError> {
        if !self.has_credentials() {
            return Ok(OrderResult::failed("venue_b credentials not configured"));
        }
        let params = [
            ("symbol", SYMBOL.to_string()),
            ("side", "SELL".to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", base_amount.to_string()),
        ];
        let query = self.signed_query(&params);
        let url = format!("{}/order?{}", self.get_working_url().await, query);
        let resp = self
            .client
            .post(&url)
            .headers(self.headers())
            .send()
            .await?;
        self.parse_order_response(resp).await
    }
}

impl VenueBClient {
    async fn parse_order_response(&self, resp: reqwest::Response) -> Result<OrderResult, ArbError> {
        if resp.status().as_u16() == 429 {
            return Err(ArbError::RateLimit("venue_b order".to_string()));
        }
        if resp.status().as_u16() == 401 {
            return Err(ArbError::Auth("venue_b signature rejected".to_string()));
        }
        if !resp.status().is_success() {
            warn!(status = %resp.status(), "venue_b order rejected");
            return Ok(OrderResult::failed(format!("http {}", resp.status())));
        }
        let body: OrderResponse = resp.json().await?;
        let filled_price = body
            .fills
            .and_then(|f| f.first().map(|e| e.price.parse().unwrap_or(0.0)))
            .unwrap_or(0.0);
        let filled_amount = body
            .executed_qty
            .and_then(|q| q.parse().ok())
            .unwrap_or(0.0);
        match body.order_id {
            Some(id) => Ok(OrderResult::ok(id.to_string(), filled_amount, filled_price)),
            None => Ok(OrderResult::failed("venue_b response missing orderId")),
        }
    }
}

pub fn fallback_urls() -> &'static [&'static str] {
    FALLBACK_URLS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_deterministic() {
        let client = VenueBClient::new(
            "key".to_string(),
            "secret".to_string(),
            "https://api.binance.com/api/v3".to_string(),
        );
        let a = client.sign("symbol=BTCUSDT&timestamp=1");
        let b = client.sign("symbol=BTCUSDT&timestamp=1");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn signed_query_appends_signature() {
        let client = VenueBClient::new(
            "key".to_string(),
            "secret".to_string(),
            "https://api.binance.com/api/v3".to_string(),
        );
        let query = client.signed_query(&[("symbol", "BTCUSDT".to_string())]);
        assert!(query.starts_with("symbol=BTCUSDT&timestamp="));
        assert!(query.contains("&signature="));
    }

    #[tokio::test]
    async fn sell_without_credentials_fails_structurally() {
        let client = VenueBClient::new(
            String::new(),
            String::new(),
            "https://api.binance.com/api/v3".to_string(),
        );
        let result = client.place_market_sell(0.001).await.unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn buy_without_credentials_fails_structurally() {
        let client = VenueBClient::new(
            String::new(),
            String::new(),
            "https://api.binance.com/api/v3".to_string(),
        );
        let result = client.place_market_buy(0.001).await.unwrap();
        assert!(!result.success);
    }

    #[test]
    fn fallback_urls_are_nonempty_and_distinct_from_default() {
        let urls = fallback_urls();
        assert!(!urls.is_empty());
        assert!(urls.iter().all(|u| u.starts_with("https://")));
    }

    #[tokio::test]
    async fn working_url_caches_after_first_resolution() {
        let client = VenueBClient::new(
            String::new(),
            String::new(),
            "https://api.binance.com/api/v3".to_string(),
        );
        *client.working_url.lock().await = Some("https://cached.example/api/v3".to_string());
        assert_eq!(client.get_working_url().await, "https://cached.example/api/v3");
    }
}
