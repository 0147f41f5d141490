pub mod venue_a;
pub mod venue_b;

use crate::error::ArbError;
use crate::types::{Balance, OrderResult, PriceQuote};
use async_trait::async_trait;

/// Common shape of a venue REST client. Both venues quote the same base
/// asset (BTC) against a different counter currency, but each has its own
/// native order-sizing unit: implementations take the amount in whatever
/// unit their own exchange's market-order API expects (venue A's buy is
/// counter-denominated, venue B's is base-denominated like its sell).
#[async_trait]
pub trait VenueClient: Send + Sync {
    /// Top-of-book bid/ask/last for the BTC pair this venue quotes.
    async fn get_price(&self) -> Result<PriceQuote, ArbError>;

    /// Available/reserved balance of the base asset (BTC).
    async fn get_base_balance(&self) -> Result<Balance, ArbError>;

    /// Available/reserved balance of the counter currency (ZAR or USDT).
    async fn get_counter_balance(&self) -> Result<Balance, ArbError>;

    /// Market-buy BTC. `amount` is in whichever unit this venue's own
    /// market-buy order takes (see implementers for the exact unit).
    async fn place_market_buy(&self, amount: f64) -> Result<OrderResult, ArbError>;

    /// Market-sell `base_amount` BTC for the counter currency.
    async fn place_market_sell(&self, base_amount: f64) -> Result<OrderResult, ArbError>;
}
