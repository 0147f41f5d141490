use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::engine::edge::EdgeResult;
use crate::engine::inventory::Floats;
use crate::persistence::Trade;
use crate::types::{Direction, TradeStatus};

/// Mutate the paper floats for one hedged pair and build the resulting
/// Trade record. Caller has already re-checked executability and size.
pub fn apply_paper_trade(
    floats: &mut Floats,
    edge: EdgeResult,
    btc_amount: f64,
    zar_notional: f64,
    usdt_zar: f64,
    cfg: &Config,
) -> Trade {
    match edge.direction {
        Direction::AToB => {
            floats.a_zar -= zar_notional;
            floats.a_btc += btc_amount * (1.0 - cfg.luno_trading_fee);
            floats.b_btc -= btc_amount;
            floats.b_usdt += btc_amount * edge.sell_price * (1.0 - cfg.binance_trading_fee);
        }
        Direction::BToA => {
            floats.b_usdt -= btc_amount * edge.buy_price;
            floats.b_btc += btc_amount * (1.0 - cfg.binance_trading_fee);
            floats.a_btc -= btc_amount;
            floats.a_zar += btc_amount * edge.sell_price * (1.0 - cfg.luno_trading_fee);
        }
    }

    let profit_zar = zar_notional * edge.net_edge_bps / 10_000.0;
    let profit_usd = profit_zar / usdt_zar;

    floats.last_direction = Some(edge.direction);
    floats.accumulated_profit_zar += profit_zar;
    floats.accumulated_profit_usd += profit_usd;
    floats.trades_completed += 1;

    info!(
        direction = edge.direction.as_str(),
        btc_amount,
        profit_zar,
        "paper trade executed"
    );

    Trade {
        id: Uuid::new_v4(),
        at: Utc::now(),
        direction: edge.direction,
        btc_amount,
        buy_price: edge.buy_price,
        sell_price: edge.sell_price,
        spread_percent: edge.gross_edge_bps / 100.0,
        profit_usd,
        profit_zar,
        buy_venue: edge.direction.buy_venue().as_str(),
        sell_venue: edge.direction.sell_venue().as_str(),
        status: TradeStatus::Paper,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(direction: Direction) -> EdgeResult {
        EdgeResult {
            direction,
            buy_price: 900_000.0,
            sell_price: 50_100.0,
            gross_edge_bps: 60.0,
            net_edge_bps: 40.0,
            is_profitable: true,
        }
    }

    #[test]
    fn a_to_b_mutates_both_legs_and_stays_non_negative() {
        let mut floats = Floats {
            a_zar: 5000.0,
            b_btc: 1.0,
            ..Floats::default()
        };
        let trade = apply_paper_trade(&mut floats, edge(Direction::AToB), 0.005, 4500.0, 17.0, &Config::default());
        assert!(floats.a_zar >= 0.0);
        assert!(floats.a_btc >= 0.0);
        assert!(floats.b_btc >= 0.0);
        assert!(floats.b_usdt >= 0.0);
        assert_eq!(trade.status, TradeStatus::Paper);
        assert_eq!(floats.trades_completed, 1);
    }

    #[test]
    fn profit_zar_matches_notional_times_net_bps() {
        let mut floats = Floats {
            a_zar: 5000.0,
            b_btc: 1.0,
            ..Floats::default()
        };
        let e = edge(Direction::AToB);
        let trade = apply_paper_trade(&mut floats, e, 0.005, 4500.0, 17.0, &Config::default());
        let expected = 4500.0 * e.net_edge_bps / 10_000.0;
        assert!((trade.profit_zar - expected).abs() < 1e-9);
    }
}
