use std::time::Duration;

use tokio::time::Instant;
use tracing::info;

use crate::config::{Config, SafetyBuffers};
use crate::engine::edge::EdgeResult;
use crate::engine::inventory::{is_executable, Floats};
use crate::types::{Direction, TradeType};

/// Tracks the state the selector needs across ticks: cooldown, the
/// consecutive-same-direction counter, and whether rebalance is armed.
pub struct SelectorState {
    last_trade_at: Option<Instant>,
    consecutive_same_direction: u32,
    last_profitable_direction: Option<Direction>,
    rebalance_armed: bool,
}

impl SelectorState {
    pub fn new() -> Self {
        Self {
            last_trade_at: None,
            consecutive_same_direction: 0,
            last_profitable_direction: None,
            rebalance_armed: false,
        }
    }

    fn in_cooldown(&self, min_interval: Duration) -> bool {
        match self.last_trade_at {
            Some(t) => t.elapsed() < min_interval,
            None => false,
        }
    }

    fn record_trade(&mut self) {
        self.last_trade_at = Some(Instant::now());
    }

    /// Called once per tick with the best direction's profitability, before
    /// the executability check, so the counter tracks repeated opportunity
    /// direction even across ticks where the trade could not execute.
    fn observe_direction(&mut self, direction: Direction, is_profitable: bool, trigger_count: u32) {
        if !is_profitable {
            return;
        }
        if self.last_profitable_direction == Some(direction) {
            self.consecutive_same_direction += 1;
        } else {
            self.consecutive_same_direction = 1;
            self.last_profitable_direction = Some(direction);
        }
        if self.consecutive_same_direction >= trigger_count {
            self.rebalance_armed = true;
        }
    }

    fn disarm_rebalance(&mut self) {
        self.rebalance_armed = false;
    }
}

impl Default for SelectorState {
    fn default() -> Self {
        Self::new()
    }
}

/// What the selector decided, naming the direction and edge it picked.
#[derive(Debug, Clone, Copy)]
pub struct Decision {
    pub trade_type: TradeType,
    pub edge: EdgeResult,
}

/// Decide whether to trade this tick. `best` and `opposite` are the two
/// precomputed `EdgeResult`s for this snapshot; `best` has the higher
/// `net_edge_bps` (see `engine::edge::best_direction`).
pub fn select(
    state: &mut SelectorState,
    floats: &Floats,
    buffers: &SafetyBuffers,
    best: EdgeResult,
    opposite: EdgeResult,
    cfg: &Config,
) -> Option<Decision> {
    let rebalance_trigger_count = cfg.get_setting("REBALANCE_TRIGGER_COUNT", cfg.rebalance_trigger_count as f64) as u32;
    let keepalive_threshold_bps = cfg.get_setting("KEEPALIVE_THRESHOLD_BPS", cfg.keepalive_threshold_bps);
    let rebalance_threshold_bps = cfg.get_setting("REBALANCE_THRESHOLD_BPS", cfg.rebalance_threshold_bps);
    let min_trade_interval_s = cfg.get_setting("MIN_TRADE_INTERVAL_S", cfg.min_trade_interval_s);

    state.observe_direction(best.direction, best.is_profitable, rebalance_trigger_count);

    if state.in_cooldown(Duration::from_secs_f64(min_trade_interval_s)) {
        return None;
    }

    let best_executable = is_executable(floats, buffers, best.direction);
    let opposite_executable = is_executable(floats, buffers, opposite.direction);

    let decision = if best.is_profitable && best_executable {
        Some(Decision {
            trade_type: TradeType::Profitable,
            edge: best,
        })
    } else if best.is_profitable
        && !best_executable
        && opposite_executable
        && opposite.net_edge_bps >= keepalive_threshold_bps
    {
        Some(Decision {
            trade_type: TradeType::Keepalive,
            edge: opposite,
        })
    } else if cfg.rebalance_enabled
        && state.rebalance_armed
        && opposite.net_edge_bps >= rebalance_threshold_bps
        && opposite_executable
    {
        Some(Decision {
            trade_type: TradeType::Rebalance,
            edge: opposite,
        })
    } else {
        None
    };

    if let Some(d) = decision {
        if d.trade_type == TradeType::Rebalance {
            state.disarm_rebalance();
        }
        state.record_trade();
        info!(trade_type = d.trade_type.as_str(), direction = d.edge.direction.as_str(), net_bps = d.edge.net_edge_bps, "trade selected");
    }

    decision
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn buffers() -> SafetyBuffers {
        SafetyBuffers {
            a_zar: 1000.0,
            a_btc: 0.0005,
            b_btc: 0.001,
            b_usdt: 50.0,
        }
    }

    fn edge(direction: Direction, net_bps: f64, profitable: bool) -> EdgeResult {
        EdgeResult {
            direction,
            buy_price: 1.0,
            sell_price: 1.0,
            gross_edge_bps: net_bps + 20.0,
            net_edge_bps: net_bps,
            is_profitable: profitable,
        }
    }

    fn funded_floats() -> Floats {
        Floats {
            a_zar: 5000.0,
            b_btc: 1.0,
            a_btc: 1.0,
            b_usdt: 5000.0,
            ..Floats::default()
        }
    }

    #[test]
    fn profitable_and_executable_executes_as_profitable() {
        let mut state = SelectorState::new();
        let cfg = Config::default();
        let best = edge(Direction::AToB, 60.0, true);
        let opposite = edge(Direction::BToA, -60.0, false);
        let decision = select(&mut state, &funded_floats(), &buffers(), best, opposite, &cfg).unwrap();
        assert_eq!(decision.trade_type, TradeType::Profitable);
    }

    #[test]
    fn blocked_best_falls_back_to_keepalive() {
        let mut state = SelectorState::new();
        let cfg = Config::default();
        let mut floats = funded_floats();
        floats.a_zar = 0.0;
        let best = edge(Direction::AToB, 60.0, true);
        let opposite = edge(Direction::BToA, -5.0, false);
        let decision = select(&mut state, &floats, &buffers(), best, opposite, &cfg).unwrap();
        assert_eq!(decision.trade_type, TradeType::Keepalive);
    }

    #[test]
    fn cooldown_blocks_immediate_retrade() {
        let mut state = SelectorState::new();
        let cfg = Config::default();
        let best = edge(Direction::AToB, 60.0, true);
        let opposite = edge(Direction::BToA, -60.0, false);
        let first = select(&mut state, &funded_floats(), &buffers(), best, opposite, &cfg);
        assert!(first.is_some());
        let second = select(&mut state, &funded_floats(), &buffers(), best, opposite, &cfg);
        assert!(second.is_none());
    }

    #[test]
    fn rebalance_arms_after_trigger_count() {
        let mut state = SelectorState::new();
        let mut cfg = Config::default();
        cfg.rebalance_trigger_count = 2;
        cfg.rebalance_threshold_bps = -1000.0;
        let mut floats = funded_floats();
        floats.a_zar = 0.0;
        floats.b_btc = 0.0;
        let best = edge(Direction::AToB, 5.0, false);
        let opposite = edge(Direction::BToA, -10.0, false);
        state.observe_direction(Direction::AToB, true, 2);
        state.observe_direction(Direction::AToB, true, 2);
        assert!(state.rebalance_armed);
        let decision = select(&mut state, &floats, &buffers(), best, opposite, &cfg).unwrap();
        assert_eq!(decision.trade_type, TradeType::Rebalance);
        assert!(!state.rebalance_armed);
    }
}
