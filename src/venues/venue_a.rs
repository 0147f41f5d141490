use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::error::ArbError;
use crate::types::{Balance, OrderResult, PriceQuote, Venue};
use crate::venues::VenueClient;

const BASE_URL: &str = "https://api.luno.com/api/1";
const PAIR: &str = "XBTZAR";

/// ZAR-quoted venue client, shaped on Luno's `/ticker`, `/balance` and
/// `/marketorder` endpoints: HTTP basic auth, `counter_volume` for buys,
/// `base_volume` for sells.
pub struct VenueAClient {
    api_key: String,
    api_secret: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct TickerResponse {
    bid: String,
    ask: String,
    last_trade: String,
}

#[derive(Deserialize)]
struct BalanceEntry {
    asset: String,
    balance: String,
    reserved: String,
}

#[derive(Deserialize)]
struct BalanceResponse {
    balance: Vec<BalanceEntry>,
}

#[derive(Deserialize)]
struct OrderResponse {
    order_id: Option<String>,
}

impl VenueAClient {
    pub fn new(api_key: String, api_secret: String) -> Self {
        Self {
            api_key,
            api_secret,
            base_url: BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn has_credentials(&self) -> bool {
        !self.api_key.is_empty() && !self.api_secret.is_empty()
    }

    fn auth_header(&self) -> Option<String> {
        if !self.has_credentials() {
            return None;
        }
        let raw = format!("{}:{}", self.api_key, self.api_secret);
        Some(format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(raw)
        ))
    }

    async fn balance_for(&self, asset: &str) -> Result<Balance, ArbError> {
        if !self.has_credentials() {
            return Ok(Balance::default());
        }
        let url = format!("{}/balance", self.base_url);
        let mut req = self.client.get(&url);
        if let Some(h) = self.auth_header() {
            req = req.header("Authorization", h);
        }
        let resp = req.send().await?;
        if resp.status().as_u16() == 429 {
            return Err(ArbError::RateLimit("venue_a balance".to_string()));
        }
        if !resp.status().is_success() {
            return Err(ArbError::Transient(format!(
                "venue_a balance http {}",
                resp.status()
            )));
        }
        let body: BalanceResponse = resp.json().await?;
        let entry = body.balance.into_iter().find(|b| b.asset == asset);
        match entry {
            Some(e) => Ok(Balance {
                available: e.balance.parse().unwrap_or(0.0) - e.reserved.parse().unwrap_or(0.0),
                reserved: e.reserved.parse().unwrap_or(0.0),
            }),
            None => Ok(Balance::default()),
        }
    }
}

#[async_trait]
impl VenueClient for VenueAClient {
    #[instrument(skip(self))]
    async fn get_price(&self) -> Result<PriceQuote, ArbError> {
        let url = format!("{}/ticker?pair={}", self.base_url, PAIR);
        let resp = self.client.get(&url).send().await?;
        if resp.status().as_u16() == 429 {
            return Err(ArbError::RateLimit("venue_a ticker".to_string()));
        }
        if !resp.status().is_success() {
            return Err(ArbError::Transient(format!(
                "venue_a ticker http {}",
                resp.status()
            )));
        }
        let body: TickerResponse = resp.json().await?;
        let quote = PriceQuote {
            bid: body
                .bid
                .parse()
                .map_err(|_| ArbError::DataValidity("venue_a bid not numeric".to_string()))?,
            ask: body
                .ask
                .parse()
                .map_err(|_| ArbError::DataValidity("venue_a ask not numeric".to_string()))?,
            last: body.last_trade.parse().unwrap_or(0.0),
            venue: Venue::A,
        };
        if !quote.is_valid() {
            return Err(ArbError::DataValidity("venue_a bid/ask out of order".to_string()));
        }
        debug!(bid = quote.bid, ask = quote.ask, "venue_a price");
        Ok(quote)
    }

    async fn get_base_balance(&self) -> Result<Balance, ArbError> {
        self.balance_for("XBT").await
    }

    async fn get_counter_balance(&self) -> Result<Balance, ArbError> {
        self.balance_for("ZAR").await
    }

    #[instrument(skip(self))]
    async fn place_market_buy(&self, counter_amount: f64) -> Result<OrderResult, ArbError> {
        if !self.has_credentials() {
            return Ok(OrderResult::failed("venue_a credentials not configured"));
        }
        let url = format!("{}/marketorder", self.base_url);
        let mut req = self.client.post(&url).form(&[
            ("pair", PAIR),
            ("type", "BUY"),
            ("counter_volume", &counter_amount.to_string()),
        ]);
        if let Some(h) = self.auth_header() {
            req = req.header("Authorization", h);
        }
        let resp = req.send().await?;
        if resp.status().as_u16() == 429 {
            return Err(ArbError::RateLimit("venue_a marketorder buy".to_string()));
        }
        if !resp.status().is_success() {
            warn!(status = %resp.status(), "venue_a buy rejected");
            return Ok(OrderResult::failed(format!("http {}", resp.status())));
        }
        let body: OrderResponse = resp.json().await?;
        match body.order_id {
            Some(id) => Ok(OrderResult::ok(id, 0.0, 0.0)),
            None => Ok(OrderResult::failed("venue_a response missing order_id")),
        }
    }

    #[instrument(skip(self))]
    async fn place_market_sell(&self, base_amount: f64) -> Result<OrderResult, ArbError> {
        if !self.has_credentials() {
            return Ok(OrderResult::failed("venue_a credentials not configured"));
        }
        let url = format!("{}/marketorder", self.base_url);
        let mut req = self.client.post(&url).form(&[
            ("pair", PAIR),
            ("type", "SELL"),
            ("base_volume", &base_amount.to_string()),
        ]);
        if let Some(h) = self.auth_header() {
            req = req.header("Authorization", h);
        }
        let resp = req.send().await?;
        if resp.status().as_u16() == 429 {
            return Err(ArbError::RateLimit("venue_a marketorder sell".to_string()));
        }
        if !resp.status().is_success() {
            warn!(status = %resp.status(), "venue_a sell rejected");
            return Ok(OrderResult::failed(format!("http {}", resp.status())));
        }
        let body: OrderResponse = resp.json().await?;
        match body.order_id {
            Some(id) => Ok(OrderResult::ok(id, base_amount, 0.0)),
            None => Ok(OrderResult::failed("venue_a response missing order_id")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_header_absent_without_credentials() {
        let client = VenueAClient::new(String::new(), String::new());
        assert!(client.auth_header().is_none());
        assert!(!client.has_credentials());
    }

    #[test]
    fn auth_header_present_with_credentials() {
        let client = VenueAClient::new("key".to_string(), "secret".to_string());
        let header = client.auth_header().unwrap();
        assert!(header.starts_with("Basic "));
    }

    #[tokio::test]
    async fn buy_without_credentials_fails_structurally() {
        let client = VenueAClient::new(String::new(), String::new());
        let result = client.place_market_buy(100.0).await.unwrap();
        assert!(!result.success);
        assert!(result.error.is_some());
    }
}
