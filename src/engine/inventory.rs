use tracing::info;

use crate::config::SafetyBuffers;
use crate::types::Direction;

/// Synthetic paper-mode inventory. Mutated only by the execution path;
/// destroyed only by an explicit reset, never by a failed trade.
#[derive(Debug, Clone, Copy, Default)]
pub struct Floats {
    pub a_btc: f64,
    pub a_zar: f64,
    pub b_btc: f64,
    pub b_usdt: f64,
    pub last_direction: Option<Direction>,
    pub accumulated_profit_zar: f64,
    pub accumulated_profit_usd: f64,
    pub trades_completed: u64,
    pub initialized: bool,
}

impl Floats {
    /// Pre-fund both legs symmetrically on the first valid venue-A price
    /// so either direction can open the book without a real transfer.
    pub fn initialize(&mut self, a_last_price: f64, max_trade_zar: f64) {
        if self.initialized {
            return;
        }
        self.a_zar = max_trade_zar;
        self.a_btc = 0.0;
        self.b_btc = max_trade_zar / a_last_price;
        self.b_usdt = 0.0;
        self.initialized = true;
        info!(a_zar = self.a_zar, b_btc = self.b_btc, "paper floats initialised");
    }

    pub fn reset(&mut self) {
        *self = Floats::default();
    }
}

/// `max(0, balance - buffer)`.
fn tradeable(balance: f64, buffer: f64) -> f64 {
    (balance - buffer).max(0.0)
}

/// A direction is executable iff both legs have strictly positive
/// tradeable amounts in the currency that leg consumes.
pub fn is_executable(floats: &Floats, buffers: &SafetyBuffers, direction: Direction) -> bool {
    match direction {
        Direction::AToB => {
            tradeable(floats.a_zar, buffers.a_zar) > 0.0
                && tradeable(floats.b_btc, buffers.b_btc) > 0.0
        }
        Direction::BToA => {
            tradeable(floats.b_usdt, buffers.b_usdt) > 0.0
                && tradeable(floats.a_btc, buffers.a_btc) > 0.0
        }
    }
}

/// Trade size in BTC (plus its ZAR-equivalent notional), clamped by the
/// configured ceilings and by whatever is actually tradeable on both legs.
/// Returns 0 if the clamped size falls below `min_trade_size_btc`.
pub fn trade_size(
    floats: &Floats,
    buffers: &SafetyBuffers,
    direction: Direction,
    a_last_price: f64,
    b_last_price: f64,
    max_trade_zar: f64,
    max_trade_size_btc: f64,
    min_trade_size_btc: f64,
) -> (f64, f64) {
    let mut btc = (max_trade_zar / a_last_price).min(max_trade_size_btc);

    match direction {
        Direction::AToB => {
            let zar_available = tradeable(floats.a_zar, buffers.a_zar);
            let btc_from_zar = zar_available / a_last_price;
            let btc_available = tradeable(floats.b_btc, buffers.b_btc);
            btc = btc.min(btc_from_zar).min(btc_available);
        }
        Direction::BToA => {
            let btc_available = tradeable(floats.a_btc, buffers.a_btc);
            let usdt_available = tradeable(floats.b_usdt, buffers.b_usdt);
            let btc_from_usdt = usdt_available / b_last_price;
            btc = btc.min(btc_available).min(btc_from_usdt);
        }
    }

    if btc < min_trade_size_btc {
        return (0.0, 0.0);
    }
    (btc, btc * a_last_price)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffers() -> SafetyBuffers {
        SafetyBuffers {
            a_zar: 1000.0,
            a_btc: 0.0005,
            b_btc: 0.001,
            b_usdt: 50.0,
        }
    }

    #[test]
    fn initialize_prefunds_symmetrically() {
        let mut floats = Floats::default();
        floats.initialize(900_000.0, 5000.0);
        assert_eq!(floats.a_zar, 5000.0);
        assert_eq!(floats.a_btc, 0.0);
        assert!((floats.b_btc - 5000.0 / 900_000.0).abs() < 1e-12);
        assert_eq!(floats.b_usdt, 0.0);
        assert!(floats.initialized);
    }

    #[test]
    fn initialize_is_idempotent() {
        let mut floats = Floats::default();
        floats.initialize(900_000.0, 5000.0);
        floats.initialize(100.0, 1.0);
        assert_eq!(floats.a_zar, 5000.0);
    }

    #[test]
    fn not_executable_when_balance_under_buffer() {
        let mut floats = Floats::default();
        floats.a_zar = 999.0;
        floats.b_btc = 1.0;
        assert!(!is_executable(&floats, &buffers(), Direction::AToB));
    }

    #[test]
    fn executable_when_both_legs_above_buffer() {
        let mut floats = Floats::default();
        floats.a_zar = 2000.0;
        floats.b_btc = 1.0;
        assert!(is_executable(&floats, &buffers(), Direction::AToB));
    }

    #[test]
    fn trade_size_below_minimum_returns_zero() {
        let mut floats = Floats::default();
        floats.a_zar = 1000.0005;
        floats.b_btc = 1.0;
        let (btc, zar) = trade_size(&floats, &buffers(), Direction::AToB, 900_000.0, 50_000.0, 5000.0, 0.01, 0.0001);
        assert_eq!(btc, 0.0);
        assert_eq!(zar, 0.0);
    }

    #[test]
    fn trade_size_clamped_by_ceiling() {
        let mut floats = Floats::default();
        floats.a_zar = 1_000_000.0;
        floats.b_btc = 10.0;
        let (btc, _) = trade_size(&floats, &buffers(), Direction::AToB, 900_000.0, 50_000.0, 5000.0, 0.01, 0.0001);
        assert!(btc <= 0.01);
    }

    #[test]
    fn trade_size_b_to_a_clamps_by_venue_b_price_not_venue_a() {
        let mut floats = Floats::default();
        floats.a_btc = 10.0;
        floats.b_usdt = 100.0;
        // At a_last_price=900_000 but b_last_price=50_000, the USDT leg
        // should clamp to 100/50_000 BTC, not 100/900_000.
        let (btc, _) = trade_size(&floats, &buffers(), Direction::BToA, 900_000.0, 50_000.0, 5_000_000.0, 10.0, 0.0001);
        let expected = (100.0 - buffers().b_usdt).max(0.0) / 50_000.0;
        assert!((btc - expected).abs() < 1e-9);
    }
}
