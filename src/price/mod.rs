use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::types::{PriceQuote, Venue};
use crate::venues::venue_a::VenueAClient;

const WS_URL: &str = "wss://stream.binance.com:9443/ws/btcusdt@bookTicker";
const RECONNECT_INITIAL: Duration = Duration::from_secs(1);
const RECONNECT_MAX: Duration = Duration::from_secs(30);
const VENUE_A_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_MAX_AGE: Duration = Duration::from_secs(5);

/// A timestamped quote from one venue. `is_fresh` guards every read so the
/// engine never trades on data that has gone stale because a feed stalled.
#[derive(Debug, Clone, Copy)]
pub struct PriceSnapshot {
    pub quote: Option<PriceQuote>,
    pub updated_at: Instant,
}

impl PriceSnapshot {
    fn empty() -> Self {
        Self {
            quote: None,
            updated_at: Instant::now(),
        }
    }

    pub fn is_fresh(&self, max_age: Duration) -> bool {
        self.quote.is_some() && self.updated_at.elapsed() < max_age
    }
}

/// A coherent pair of per-venue snapshots as consumed by the edge engine.
#[derive(Debug, Clone, Copy)]
pub struct MarketSnapshot {
    pub a: PriceSnapshot,
    pub b: PriceSnapshot,
}

impl MarketSnapshot {
    pub fn is_ready(&self, max_age: Duration) -> bool {
        self.a.is_fresh(max_age) && self.b.is_fresh(max_age)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PriceServiceStats {
    pub venue_a_updates: u64,
    pub venue_b_updates: u64,
    pub venue_a_errors: u64,
    pub ws_reconnects: u64,
}

struct Inner {
    venue_a: RwLock<PriceSnapshot>,
    venue_b: RwLock<PriceSnapshot>,
    stats: RwLock<PriceServiceStats>,
}

/// Streams venue B quotes over its public WebSocket and polls venue A over
/// REST, both writing into shared snapshots any reader can consult without
/// making a network call of its own.
#[derive(Clone)]
pub struct PriceService {
    inner: Arc<Inner>,
    max_age: Duration,
}

#[derive(Deserialize)]
struct BookTickerEvent {
    #[serde(rename = "b")]
    bid: String,
    #[serde(rename = "a")]
    ask: String,
}

impl PriceService {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                venue_a: RwLock::new(PriceSnapshot::empty()),
                venue_b: RwLock::new(PriceSnapshot::empty()),
                stats: RwLock::new(PriceServiceStats::default()),
            }),
            max_age: DEFAULT_MAX_AGE,
        }
    }

    pub async fn venue_a_snapshot(&self) -> PriceSnapshot {
        *self.inner.venue_a.read().await
    }

    pub async fn venue_b_snapshot(&self) -> PriceSnapshot {
        *self.inner.venue_b.read().await
    }

    pub async fn is_ready(&self) -> bool {
        self.venue_a_snapshot().await.is_fresh(self.max_age)
            && self.venue_b_snapshot().await.is_fresh(self.max_age)
    }

    /// Copy both sides atomically for a coherent view. Under cooperative
    /// scheduling the two reads cannot interleave a writer, so no lock
    /// spans both — each venue's snapshot is still read under its own
    /// short-lived guard.
    pub async fn market_snapshot(&self) -> MarketSnapshot {
        MarketSnapshot {
            a: self.venue_a_snapshot().await,
            b: self.venue_b_snapshot().await,
        }
    }

    pub async fn stats(&self) -> PriceServiceStats {
        *self.inner.stats.read().await
    }

    /// Poll venue A's REST ticker once a second. Errors bump a counter and
    /// keep looping rather than tearing the task down.
    pub async fn run_venue_a_poller(&self, client: Arc<VenueAClient>) {
        use crate::venues::VenueClient;
        loop {
            match client.get_price().await {
                Ok(quote) => {
                    let mut snap = self.inner.venue_a.write().await;
                    *snap = PriceSnapshot {
                        quote: Some(quote),
                        updated_at: Instant::now(),
                    };
                    drop(snap);
                    let mut stats = self.inner.stats.write().await;
                    stats.venue_a_updates += 1;
                }
                Err(err) => {
                    warn!(%err, "venue_a poll failed");
                    let mut stats = self.inner.stats.write().await;
                    stats.venue_a_errors += 1;
                }
            }
            tokio::time::sleep(VENUE_A_POLL_INTERVAL).await;
        }
    }

    /// Stream venue B's bookTicker over WebSocket with exponential backoff
    /// reconnect (1s doubling to a 30s cap) whenever the socket drops.
    pub async fn run_venue_b_streamer(&self) {
        let mut backoff = RECONNECT_INITIAL;
        loop {
            match self.venue_b_stream_once().await {
                Ok(()) => {
                    info!("venue_b stream closed cleanly, reconnecting");
                }
                Err(err) => {
                    error!(%err, "venue_b stream error, reconnecting");
                }
            }
            {
                let mut stats = self.inner.stats.write().await;
                stats.ws_reconnects += 1;
            }
            tokio::time::sleep(backoff).await;
            backoff = std::cmp::min(backoff * 2, RECONNECT_MAX);
        }
    }

    async fn venue_b_stream_once(&self) -> Result<(), crate::error::ArbError> {
        let (ws_stream, _) = connect_async(WS_URL).await?;
        let (_write, mut read) = ws_stream.split();

        while let Some(msg) = read.next().await {
            let msg = msg?;
            if let Message::Text(text) = msg {
                let event: BookTickerEvent = match serde_json::from_str(&text) {
                    Ok(e) => e,
                    Err(err) => {
                        debug!(%err, "venue_b stream message not a bookTicker event, skipping");
                        continue;
                    }
                };
                let bid: f64 = event.bid.parse().unwrap_or(0.0);
                let ask: f64 = event.ask.parse().unwrap_or(0.0);
                if bid <= 0.0 || ask <= 0.0 || bid > ask {
                    continue;
                }
                let quote = PriceQuote {
                    bid,
                    ask,
                    last: (bid + ask) / 2.0,
                    venue: Venue::B,
                };
                let mut snap = self.inner.venue_b.write().await;
                *snap = PriceSnapshot {
                    quote: Some(quote),
                    updated_at: Instant::now(),
                };
                drop(snap);
                let mut stats = self.inner.stats.write().await;
                stats.venue_b_updates += 1;
            }
        }
        Ok(())
    }
}

impl Default for PriceService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_is_not_fresh_when_empty() {
        let snap = PriceSnapshot::empty();
        assert!(!snap.is_fresh(Duration::from_secs(5)));
    }

    #[test]
    fn snapshot_is_fresh_immediately_after_write() {
        let snap = PriceSnapshot {
            quote: Some(PriceQuote {
                bid: 100.0,
                ask: 101.0,
                last: 100.5,
                venue: Venue::A,
            }),
            updated_at: Instant::now(),
        };
        assert!(snap.is_fresh(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn service_not_ready_before_any_update() {
        let svc = PriceService::new();
        assert!(!svc.is_ready().await);
    }
}
