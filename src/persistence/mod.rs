use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::ArbError;
use crate::pipeline::TickRecord;
use crate::types::{Direction, Timestamp, TradeStatus};

/// A realised execution: direction, amount, buy/sell prices, P&L, status.
#[derive(Debug, Clone)]
pub struct Trade {
    pub id: Uuid,
    pub at: Timestamp,
    pub direction: Direction,
    pub btc_amount: f64,
    pub buy_price: f64,
    pub sell_price: f64,
    pub spread_percent: f64,
    pub profit_usd: f64,
    pub profit_zar: f64,
    pub buy_venue: &'static str,
    pub sell_venue: &'static str,
    pub status: TradeStatus,
}

/// What was considered and what was done with it.
#[derive(Debug, Clone)]
pub struct Opportunity {
    pub id: Uuid,
    pub at: Timestamp,
    pub direction: Direction,
    pub sell_price: f64,
    pub buy_price: f64,
    pub gross_edge_bps: f64,
    pub net_edge_bps: f64,
    pub size_btc_estimate: f64,
    pub size_zar_estimate: f64,
    pub was_executed: bool,
    pub reason_skipped: Option<String>,
}

/// Persisted row mirroring one decision tick.
#[derive(Debug, Clone)]
pub struct ArbTick {
    pub id: Uuid,
    pub at: Timestamp,
    pub direction: Direction,
    pub net_edge_bps: f64,
    pub gross_edge_bps: f64,
    pub is_profitable: bool,
    pub usdt_zar_rate: f64,
}

/// Current-only balance row, upserted per (venue, currency).
#[derive(Debug, Clone)]
pub struct FloatBalance {
    pub venue: &'static str,
    pub currency: &'static str,
    pub balance: f64,
    pub updated_at: Timestamp,
}

/// Daily P&L rollup.
#[derive(Debug, Clone)]
pub struct PnLRecord {
    pub at: Timestamp,
    pub daily_pnl: f64,
    pub cumulative_pnl: f64,
    pub trade_count: u64,
}

/// Audit row recorded whenever a runtime override changes a tunable.
#[derive(Debug, Clone)]
pub struct ConfigHistory {
    pub at: Timestamp,
    pub config_json: String,
    pub updated_by: String,
    pub change_description: String,
}

impl ArbTick {
    pub fn from_tick_record(record: TickRecord) -> Self {
        Self {
            id: Uuid::new_v4(),
            at: record.at,
            direction: record.edge.direction,
            net_edge_bps: record.edge.net_edge_bps,
            gross_edge_bps: record.edge.gross_edge_bps,
            is_profitable: record.edge.is_profitable,
            usdt_zar_rate: record.usdt_zar,
        }
    }
}

/// Persistence surface the core depends on. Connection management, ORM
/// mechanics and the relational schema itself are out of scope; this
/// trait only carries the shape of what must be written.
#[async_trait]
pub trait Store: Send + Sync {
    async fn save_tick(&self, record: TickRecord) -> Result<(), ArbError>;
    async fn save_opportunity(&self, opportunity: Opportunity) -> Result<(), ArbError>;
    async fn save_trade(&self, trade: Trade) -> Result<(), ArbError>;
    async fn upsert_float_balance(&self, balance: FloatBalance) -> Result<(), ArbError>;
    async fn save_pnl(&self, record: PnLRecord) -> Result<(), ArbError>;
    async fn save_config_history(&self, entry: ConfigHistory) -> Result<(), ArbError>;
}

/// In-memory stand-in for the out-of-scope relational store. Good enough
/// for tests and for running without a database configured.
#[derive(Default)]
pub struct InMemoryStore {
    ticks: Mutex<Vec<ArbTick>>,
    opportunities: Mutex<Vec<Opportunity>>,
    trades: Mutex<Vec<Trade>>,
    float_balances: Mutex<Vec<FloatBalance>>,
    pnl_records: Mutex<Vec<PnLRecord>>,
    config_history: Mutex<Vec<ConfigHistory>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick_count(&self) -> usize {
        self.ticks.lock().expect("tick store lock poisoned").len()
    }

    pub fn trade_count(&self) -> usize {
        self.trades.lock().expect("trade store lock poisoned").len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn save_tick(&self, record: TickRecord) -> Result<(), ArbError> {
        self.ticks
            .lock()
            .expect("tick store lock poisoned")
            .push(ArbTick::from_tick_record(record));
        Ok(())
    }

    async fn save_opportunity(&self, opportunity: Opportunity) -> Result<(), ArbError> {
        self.opportunities
            .lock()
            .expect("opportunity store lock poisoned")
            .push(opportunity);
        Ok(())
    }

    async fn save_trade(&self, trade: Trade) -> Result<(), ArbError> {
        self.trades
            .lock()
            .expect("trade store lock poisoned")
            .push(trade);
        Ok(())
    }

    async fn upsert_float_balance(&self, balance: FloatBalance) -> Result<(), ArbError> {
        let mut balances = self.float_balances.lock().expect("float balance lock poisoned");
        if let Some(existing) = balances
            .iter_mut()
            .find(|b| b.venue == balance.venue && b.currency == balance.currency)
        {
            *existing = balance;
        } else {
            balances.push(balance);
        }
        Ok(())
    }

    async fn save_pnl(&self, record: PnLRecord) -> Result<(), ArbError> {
        self.pnl_records
            .lock()
            .expect("pnl store lock poisoned")
            .push(record);
        Ok(())
    }

    async fn save_config_history(&self, entry: ConfigHistory) -> Result<(), ArbError> {
        self.config_history
            .lock()
            .expect("config history lock poisoned")
            .push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::edge::EdgeResult;
    use chrono::Utc;

    fn tick() -> TickRecord {
        TickRecord {
            at: Utc::now(),
            edge: EdgeResult {
                direction: Direction::AToB,
                buy_price: 1.0,
                sell_price: 1.0,
                gross_edge_bps: 60.0,
                net_edge_bps: 40.0,
                is_profitable: true,
            },
            usdt_zar: 17.0,
        }
    }

    #[tokio::test]
    async fn save_tick_increments_count() {
        let store = InMemoryStore::new();
        store.save_tick(tick()).await.unwrap();
        store.save_tick(tick()).await.unwrap();
        assert_eq!(store.tick_count(), 2);
    }

    #[tokio::test]
    async fn upsert_replaces_existing_balance() {
        let store = InMemoryStore::new();
        store
            .upsert_float_balance(FloatBalance {
                venue: "venue_a",
                currency: "ZAR",
                balance: 100.0,
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
        store
            .upsert_float_balance(FloatBalance {
                venue: "venue_a",
                currency: "ZAR",
                balance: 200.0,
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
        let balances = store.float_balances.lock().unwrap();
        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0].balance, 200.0);
    }
}
