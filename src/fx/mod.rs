use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{instrument, warn};

use crate::error::ArbError;
use crate::venues::venue_b::VenueBClient;

const USD_ZAR_CACHE_TTL: Duration = Duration::from_secs(300);
const USDT_USD_CACHE_TTL: Duration = Duration::from_secs(60);
const FALLBACK_USD_ZAR: f64 = 17.0;

#[derive(Debug, Clone, Copy)]
struct Cached {
    rate: f64,
    fetched_at: Instant,
}

/// Cross-rate service: USD/ZAR from three free REST providers with
/// failover, USDT/USD synthesised from a Binance stablecoin pair.
/// Both rates are cached independently since they move on very different
/// timescales.
pub struct FxService {
    client: reqwest::Client,
    usd_zar_cache: Option<Cached>,
    usdt_usd_cache: Option<Cached>,
}

#[derive(Deserialize)]
struct ExchangeRateApiResponse {
    rates: std::collections::HashMap<String, f64>,
}

#[derive(Deserialize)]
struct FrankfurterResponse {
    rates: std::collections::HashMap<String, f64>,
}

#[derive(Deserialize)]
struct FixerResponse {
    rates: std::collections::HashMap<String, f64>,
}

#[derive(Deserialize)]
struct BinancePriceResponse {
    price: String,
}

impl FxService {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            usd_zar_cache: None,
            usdt_usd_cache: None,
        }
    }

    /// USD/ZAR, refreshed every 5 minutes. Falls through
    /// exchangerate-api -> frankfurter -> fixer, keeps the previous cached
    /// value on total failure, and only gives up in favour of the
    /// hardcoded 17.0 fallback when there has never been a cached value.
    #[instrument(skip(self))]
    pub async fn get_usd_zar_rate(&mut self) -> f64 {
        if let Some(c) = self.usd_zar_cache {
            if c.fetched_at.elapsed() < USD_ZAR_CACHE_TTL {
                return c.rate;
            }
        }

        type FetchFut<'a> =
            std::pin::Pin<Box<dyn std::future::Future<Output = Result<f64, ArbError>> + 'a>>;
        let fetches: [FetchFut; 3] = [
            Box::pin(Self::fetch_from_exchangerate_api(&self.client)),
            Box::pin(Self::fetch_from_frankfurter(&self.client)),
            Box::pin(Self::fetch_from_fixer_free(&self.client)),
        ];

        for fetch in fetches {
            match fetch.await {
                Ok(rate) if (10.0..30.0).contains(&rate) => {
                    self.usd_zar_cache = Some(Cached {
                        rate,
                        fetched_at: Instant::now(),
                    });
                    return rate;
                }
                Ok(rate) => warn!(rate, "usd/zar rate outside sanity band, rejecting"),
                Err(err) => warn!(%err, "usd/zar provider failed"),
            }
        }

        if let Some(c) = self.usd_zar_cache {
            warn!("all usd/zar providers failed, using stale cache");
            return c.rate;
        }

        warn!(rate = FALLBACK_USD_ZAR, "all usd/zar providers failed, using hardcoded fallback");
        FALLBACK_USD_ZAR
    }

    async fn fetch_from_exchangerate_api(client: &reqwest::Client) -> Result<f64, ArbError> {
        let resp = client
            .get("https://api.exchangerate-api.com/v4/latest/USD")
            .send()
            .await?;
        let body: ExchangeRateApiResponse = resp.json().await?;
        body.rates
            .get("ZAR")
            .copied()
            .ok_or_else(|| ArbError::DataValidity("exchangerate-api missing ZAR".to_string()))
    }

    async fn fetch_from_frankfurter(client: &reqwest::Client) -> Result<f64, ArbError> {
        let resp = client
            .get("https://api.frankfurter.app/latest?from=USD&to=ZAR")
            .send()
            .await?;
        let body: FrankfurterResponse = resp.json().await?;
        body.rates
            .get("ZAR")
            .copied()
            .ok_or_else(|| ArbError::DataValidity("frankfurter missing ZAR".to_string()))
    }

    async fn fetch_from_fixer_free(client: &reqwest::Client) -> Result<f64, ArbError> {
        let resp = client
            .get("https://open.er-api.com/v6/latest/USD")
            .send()
            .await?;
        let body: FixerResponse = resp.json().await?;
        body.rates
            .get("ZAR")
            .copied()
            .ok_or_else(|| ArbError::DataValidity("fixer missing ZAR".to_string()))
    }

    /// USDT/USD, refreshed every minute from a stablecoin cross on venue B
    /// (USDC/USDT, falling back to FDUSD/USDT), inverted because the
    /// quoted pair is USDT-denominated.
    #[instrument(skip(self, venue_b))]
    pub async fn get_usdt_usd_rate(&mut self, venue_b: &VenueBClient) -> f64 {
        if let Some(c) = self.usdt_usd_cache {
            if c.fetched_at.elapsed() < USDT_USD_CACHE_TTL {
                return c.rate;
            }
        }

        let rate = match self.fetch_usdt_usd_from_venue_b(venue_b, "USDCUSDT").await {
            Ok(r) => Some(r),
            Err(err) => {
                warn!(%err, "usdc/usdt cross failed, trying fdusd/usdt");
                self.fetch_usdt_usd_from_venue_b(venue_b, "FDUSDUSDT")
                    .await
                    .ok()
            }
        };

        match rate {
            Some(r) => {
                self.usdt_usd_cache = Some(Cached {
                    rate: r,
                    fetched_at: Instant::now(),
                });
                r
            }
            None => self.usdt_usd_cache.map(|c| c.rate).unwrap_or(1.0),
        }
    }

    async fn fetch_usdt_usd_from_venue_b(
        &self,
        venue_b: &VenueBClient,
        symbol: &str,
    ) -> Result<f64, ArbError> {
        let url = format!("{}/ticker/price?symbol={}", venue_b.base_url(), symbol);
        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(ArbError::Transient(format!(
                "venue_b {symbol} http {}",
                resp.status()
            )));
        }
        let body: BinancePriceResponse = resp.json().await?;
        let price: f64 = body
            .price
            .parse()
            .map_err(|_| ArbError::DataValidity(format!("{symbol} price not numeric")))?;
        if price <= 0.0 {
            return Err(ArbError::DataValidity(format!("{symbol} price non-positive")));
        }
        Ok(1.0 / price)
    }

    /// USDT/ZAR = USD/ZAR * USDT/USD.
    pub async fn get_usdt_zar_rate(&mut self, venue_b: &VenueBClient) -> f64 {
        let usd_zar = self.get_usd_zar_rate().await;
        let usdt_usd = self.get_usdt_usd_rate(venue_b).await;
        usd_zar * usdt_usd
    }
}

impl Default for FxService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_rate_is_within_sanity_band() {
        assert!((10.0..30.0).contains(&FALLBACK_USD_ZAR));
    }

    #[test]
    fn cache_starts_empty() {
        let fx = FxService::new();
        assert!(fx.usd_zar_cache.is_none());
        assert!(fx.usdt_usd_cache.is_none());
    }
}
