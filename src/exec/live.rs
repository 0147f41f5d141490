use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::engine::edge::EdgeResult;
use crate::persistence::Trade;
use crate::types::{Direction, OrderResult, TradeStatus};
use crate::venues::VenueClient;

/// Dispatch the buy and sell legs concurrently and await both. Neither
/// leg's failure unwinds the other; the caller only gets a `Trade` back
/// when both legs succeeded.
pub async fn execute_hedged_pair(
    venue_a: &dyn VenueClient,
    venue_b: &dyn VenueClient,
    edge: EdgeResult,
    btc_amount: f64,
    zar_notional: f64,
    cfg: &Config,
) -> Option<Trade> {
    let started = Instant::now();

    let (buy_result, sell_result) = match edge.direction {
        Direction::AToB => {
            tokio::join!(
                venue_a.place_market_buy(zar_notional),
                venue_b.place_market_sell(btc_amount)
            )
        }
        Direction::BToA => {
            tokio::join!(
                venue_a.place_market_sell(btc_amount),
                venue_b.place_market_buy(btc_amount)
            )
        }
    };

    let elapsed_ms = started.elapsed().as_millis();
    info!(elapsed_ms, direction = edge.direction.as_str(), "hedged pair dispatched");

    let (buy, sell) = match edge.direction {
        Direction::AToB => (buy_result, sell_result),
        Direction::BToA => (sell_result, buy_result),
    };

    match (buy, sell) {
        (Ok(buy), Ok(sell)) if buy.success && sell.success => {
            let buy_price = buy.filled_price.unwrap_or(edge.buy_price);
            let sell_price = sell.filled_price.unwrap_or(edge.sell_price);
            let amount = sell.filled_amount.unwrap_or(btc_amount);

            let profit_zar = zar_notional * edge.net_edge_bps / 10_000.0;
            let profit_usd = profit_zar / edge.sell_price.max(1.0);

            info!(buy_price, sell_price, "hedged pair filled");

            Some(Trade {
                id: Uuid::new_v4(),
                at: Utc::now(),
                direction: edge.direction,
                btc_amount: amount,
                buy_price,
                sell_price,
                spread_percent: edge.gross_edge_bps / 100.0,
                profit_usd,
                profit_zar,
                buy_venue: edge.direction.buy_venue().as_str(),
                sell_venue: edge.direction.sell_venue().as_str(),
                status: TradeStatus::Completed,
            })
        }
        (buy, sell) => {
            log_failed_leg("buy", &buy);
            log_failed_leg("sell", &sell);
            None
        }
    }
}

fn log_failed_leg(label: &str, result: &Result<OrderResult, crate::error::ArbError>) {
    match result {
        Ok(r) if !r.success => warn!(leg = label, error = ?r.error, "leg rejected"),
        Ok(_) => {}
        Err(err) => warn!(leg = label, %err, "leg errored"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ArbError;
    use crate::types::{Balance, PriceQuote, Venue};
    use async_trait::async_trait;

    struct StubVenue {
        price: PriceQuote,
        order: OrderResult,
    }

    #[async_trait]
    impl VenueClient for StubVenue {
        async fn get_price(&self) -> Result<PriceQuote, ArbError> {
            Ok(self.price)
        }
        async fn get_base_balance(&self) -> Result<Balance, ArbError> {
            Ok(Balance::default())
        }
        async fn get_counter_balance(&self) -> Result<Balance, ArbError> {
            Ok(Balance::default())
        }
        async fn place_market_buy(&self, _amount: f64) -> Result<OrderResult, ArbError> {
            Ok(self.order.clone())
        }
        async fn place_market_sell(&self, _amount: f64) -> Result<OrderResult, ArbError> {
            Ok(self.order.clone())
        }
    }

    fn edge() -> EdgeResult {
        EdgeResult {
            direction: Direction::AToB,
            buy_price: 900_000.0,
            sell_price: 50_100.0,
            gross_edge_bps: 60.0,
            net_edge_bps: 40.0,
            is_profitable: true,
        }
    }

    #[tokio::test]
    async fn both_legs_succeeding_yields_completed_trade() {
        let venue_a = StubVenue {
            price: PriceQuote { bid: 900_000.0, ask: 900_100.0, last: 900_050.0, venue: Venue::A },
            order: OrderResult::ok("a1", 0.005, 900_000.0),
        };
        let venue_b = StubVenue {
            price: PriceQuote { bid: 50_000.0, ask: 50_100.0, last: 50_050.0, venue: Venue::B },
            order: OrderResult::ok("b1", 0.005, 50_100.0),
        };
        let trade = execute_hedged_pair(&venue_a, &venue_b, edge(), 0.005, 4500.0, &Config::default()).await;
        assert!(trade.is_some());
        assert_eq!(trade.unwrap().status, TradeStatus::Completed);
    }

    #[tokio::test]
    async fn a_failed_leg_yields_no_trade() {
        let venue_a = StubVenue {
            price: PriceQuote { bid: 900_000.0, ask: 900_100.0, last: 900_050.0, venue: Venue::A },
            order: OrderResult::failed("rejected"),
        };
        let venue_b = StubVenue {
            price: PriceQuote { bid: 50_000.0, ask: 50_100.0, last: 50_050.0, venue: Venue::B },
            order: OrderResult::ok("b1", 0.005, 50_100.0),
        };
        let trade = execute_hedged_pair(&venue_a, &venue_b, edge(), 0.005, 4500.0, &Config::default()).await;
        assert!(trade.is_none());
    }
}
