use tracing::instrument;

use crate::price::MarketSnapshot;
use crate::types::Direction;

/// Per-direction slippage-adjusted spread and fee-netted edge. Both
/// directions are always computed so the selector can compare them.
#[derive(Debug, Clone, Copy)]
pub struct EdgeResult {
    pub direction: Direction,
    /// Buy price in the buy venue's quote currency (ZAR or USDT).
    pub buy_price: f64,
    /// Sell price in the sell venue's quote currency.
    pub sell_price: f64,
    pub gross_edge_bps: f64,
    pub net_edge_bps: f64,
    pub is_profitable: bool,
}

/// Scalar knobs the edge computation needs, pulled out of `Config` so this
/// module stays independent of the config representation.
#[derive(Debug, Clone, Copy)]
pub struct EdgeParams {
    pub slippage_bps: f64,
    pub fee_a: f64,
    pub fee_b: f64,
    pub min_net_edge_bps: f64,
}

fn fee_bps(params: EdgeParams) -> f64 {
    (params.fee_a + params.fee_b) * 10_000.0
}

/// Compute both directions' edges from a coherent snapshot, or `None` if
/// either venue has no quote yet or either `last` price is zero.
#[instrument(skip(snapshot))]
pub fn compute_edges(
    snapshot: &MarketSnapshot,
    usdt_zar: f64,
    params: EdgeParams,
) -> Option<(EdgeResult, EdgeResult)> {
    let a = snapshot.a.quote?;
    let b = snapshot.b.quote?;
    if a.last == 0.0 || b.last == 0.0 {
        return None;
    }

    let s = params.slippage_bps / 10_000.0;

    // A -> B: buy base on A (ZAR), sell base on B (USDT).
    let a_to_b_buy = a.ask * (1.0 + s);
    let a_to_b_sell = b.bid * (1.0 - s);
    let a_to_b_gross = (a_to_b_sell - a_to_b_buy / usdt_zar) / (a_to_b_buy / usdt_zar);
    let a_to_b_net_bps = a_to_b_gross * 10_000.0 - fee_bps(params);
    let a_to_b = EdgeResult {
        direction: Direction::AToB,
        buy_price: a_to_b_buy,
        sell_price: a_to_b_sell,
        gross_edge_bps: a_to_b_gross * 10_000.0,
        net_edge_bps: a_to_b_net_bps,
        is_profitable: a_to_b_net_bps >= params.min_net_edge_bps,
    };

    // B -> A: buy base on B (USDT), sell base on A (ZAR).
    let b_to_a_buy = b.ask * (1.0 + s);
    let b_to_a_sell = a.bid * (1.0 - s);
    let b_to_a_gross = (b_to_a_sell / usdt_zar - b_to_a_buy) / b_to_a_buy;
    let b_to_a_net_bps = b_to_a_gross * 10_000.0 - fee_bps(params);
    let b_to_a = EdgeResult {
        direction: Direction::BToA,
        buy_price: b_to_a_buy,
        sell_price: b_to_a_sell,
        gross_edge_bps: b_to_a_gross * 10_000.0,
        net_edge_bps: b_to_a_net_bps,
        is_profitable: b_to_a_net_bps >= params.min_net_edge_bps,
    };

    Some((a_to_b, b_to_a))
}

/// The higher-`net_edge_bps` of the two, ties breaking to A->B.
pub fn best_direction(a_to_b: EdgeResult, b_to_a: EdgeResult) -> EdgeResult {
    if b_to_a.net_edge_bps > a_to_b.net_edge_bps {
        b_to_a
    } else {
        a_to_b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price::PriceSnapshot;
    use crate::types::{PriceQuote, Venue};
    use tokio::time::Instant;

    fn params() -> EdgeParams {
        EdgeParams {
            slippage_bps: 5.0,
            fee_a: 0.001,
            fee_b: 0.001,
            min_net_edge_bps: 40.0,
        }
    }

    fn snapshot(a_bid: f64, a_ask: f64, b_bid: f64, b_ask: f64) -> MarketSnapshot {
        MarketSnapshot {
            a: PriceSnapshot {
                quote: Some(PriceQuote {
                    bid: a_bid,
                    ask: a_ask,
                    last: (a_bid + a_ask) / 2.0,
                    venue: Venue::A,
                }),
                updated_at: Instant::now(),
            },
            b: PriceSnapshot {
                quote: Some(PriceQuote {
                    bid: b_bid,
                    ask: b_ask,
                    last: (b_bid + b_ask) / 2.0,
                    venue: Venue::B,
                }),
                updated_at: Instant::now(),
            },
        }
    }

    #[test]
    fn net_equals_gross_minus_fees() {
        let snap = snapshot(900_000.0, 900_100.0, 50_000.0, 50_010.0);
        let (a_to_b, b_to_a) = compute_edges(&snap, 17.0, params()).unwrap();
        let fees = fee_bps(params());
        assert!((a_to_b.net_edge_bps - (a_to_b.gross_edge_bps - fees)).abs() < 0.01);
        assert!((b_to_a.net_edge_bps - (b_to_a.gross_edge_bps - fees)).abs() < 0.01);
    }

    #[test]
    fn zero_last_price_yields_no_edge() {
        let mut snap = snapshot(900_000.0, 900_100.0, 50_000.0, 50_010.0);
        snap.a.quote.as_mut().unwrap().last = 0.0;
        assert!(compute_edges(&snap, 17.0, params()).is_none());
    }

    #[test]
    fn ties_break_to_a_to_b() {
        let a_to_b = EdgeResult {
            direction: Direction::AToB,
            buy_price: 1.0,
            sell_price: 1.0,
            gross_edge_bps: 100.0,
            net_edge_bps: 80.0,
            is_profitable: true,
        };
        let b_to_a = EdgeResult {
            net_edge_bps: 80.0,
            direction: Direction::BToA,
            ..a_to_b
        };
        assert_eq!(best_direction(a_to_b, b_to_a).direction, Direction::AToB);
    }
}
