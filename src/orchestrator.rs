use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Notify};
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::engine::edge::{best_direction, compute_edges, EdgeParams};
use crate::engine::inventory::{is_executable, trade_size, Floats};
use crate::engine::selector::{self, SelectorState};
use crate::exec::{live, paper};
use crate::persistence::{Opportunity, Store};
use crate::pipeline::{self, now, TickQueue, TickRecord, TickRing};
use crate::price::PriceService;
use crate::venues::venue_a::VenueAClient;
use crate::venues::venue_b::VenueBClient;
use crate::venues::VenueClient;
use crate::fx::FxService;

const WARMUP: Duration = Duration::from_secs(2);
const BALANCE_SYNC_EVERY: u64 = 60;
const HEARTBEAT_EVERY: u64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Stats {
    pub checks: u64,
    pub opportunities_found: u64,
    pub trades_executed: u64,
    pub avg_check_time_ms: f64,
}

/// The fixed-period control loop (C9): reads the price snapshot, computes
/// edges, records ticks, runs the trade selector, dispatches execution and
/// enforces the consecutive-error circuit breaker.
pub struct Orchestrator {
    cfg: Config,
    price_service: PriceService,
    venue_a: Arc<VenueAClient>,
    venue_b: Arc<VenueBClient>,
    fx: Mutex<FxService>,
    store: Arc<dyn Store>,

    floats: Floats,
    selector_state: SelectorState,
    ring: TickRing,
    queue: TickQueue,

    consecutive_errors: u32,
    iteration: u64,
    stats: Stats,
    state: OrchestratorState,
    shutdown: Arc<Notify>,
}

/// Cheaply cloneable handle for requesting shutdown from outside the task
/// running `Orchestrator::run()`, which holds the orchestrator by `&mut`.
#[derive(Clone)]
pub struct OrchestratorHandle {
    shutdown: Arc<Notify>,
}

impl OrchestratorHandle {
    /// Requests a graceful stop. Safe to call before `run()` starts
    /// awaiting the signal, before or after shutdown has already been
    /// requested, and from a different task than the one running `run()`.
    pub fn stop(&self) {
        self.shutdown.notify_one();
    }
}

impl Orchestrator {
    pub fn new(
        cfg: Config,
        venue_a: Arc<VenueAClient>,
        venue_b: Arc<VenueBClient>,
        store: Arc<dyn Store>,
    ) -> Self {
        Self {
            cfg,
            price_service: PriceService::new(),
            venue_a,
            venue_b,
            fx: Mutex::new(FxService::new()),
            store,
            floats: Floats::default(),
            selector_state: SelectorState::new(),
            ring: TickRing::new(),
            queue: TickQueue::new(),
            consecutive_errors: 0,
            iteration: 0,
            stats: Stats::default(),
            state: OrchestratorState::Stopped,
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn price_service(&self) -> PriceService {
        self.price_service.clone()
    }

    /// A cloneable handle whose `stop()` requests that `run()` return.
    pub fn handle(&self) -> OrchestratorHandle {
        OrchestratorHandle {
            shutdown: self.shutdown.clone(),
        }
    }

    pub fn get_status(&self) -> Stats {
        self.stats
    }

    pub fn reset_paper_floats(&mut self) {
        self.floats.reset();
        info!("paper floats reset");
    }

    /// Runs until the circuit breaker trips, shutdown is requested via an
    /// `OrchestratorHandle`, or the caller drops the future. Spawning the
    /// price-service tasks is the caller's responsibility (see `main`),
    /// since they outlive a single `run()` call's cancellation semantics;
    /// the tick queue's draining, by contrast, is owned here end to end so
    /// shutdown can flush it before returning.
    pub async fn run(&mut self) {
        self.state = OrchestratorState::Starting;
        tokio::time::sleep(WARMUP).await;
        self.state = OrchestratorState::Running;

        let mut rx = self
            .queue
            .take_receiver()
            .expect("tick receiver taken exactly once, by run()");
        let shutdown = self.shutdown.clone();
        let mut ticker = interval(Duration::from_millis(self.cfg.check_interval_ms));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let started = Instant::now();

                    match self.run_iteration().await {
                        Ok(()) => {
                            self.consecutive_errors = 0;
                        }
                        Err(err) => {
                            self.consecutive_errors += 1;
                            warn!(%err, consecutive_errors = self.consecutive_errors, "iteration error");
                        }
                    }

                    let check_ms = started.elapsed().as_secs_f64() * 1000.0;
                    self.stats.avg_check_time_ms = self.stats.avg_check_time_ms * 0.9 + check_ms * 0.1;
                    self.stats.checks += 1;
                    self.iteration += 1;

                    if self.iteration % BALANCE_SYNC_EVERY == 0 {
                        self.spawn_balance_sync();
                    }
                    if self.iteration % HEARTBEAT_EVERY == 0 {
                        info!(
                            checks = self.stats.checks,
                            opportunities = self.stats.opportunities_found,
                            trades = self.stats.trades_executed,
                            avg_check_ms = self.stats.avg_check_time_ms,
                            "heartbeat"
                        );
                    }

                    if self.consecutive_errors >= self.cfg.error_stop_count {
                        error!("consecutive error threshold reached, stopping orchestrator");
                        break;
                    }
                }
                Some(record) = rx.recv() => {
                    if let Err(err) = self.store.save_tick(record).await {
                        warn!(%err, "tick persistence failed");
                    }
                }
                _ = shutdown.notified() => {
                    info!("shutdown requested, stopping orchestrator");
                    self.state = OrchestratorState::Stopping;
                    break;
                }
            }
        }

        pipeline::drain_on_shutdown(&mut rx, &self.store).await;
        self.state = OrchestratorState::Stopped;
    }

    async fn run_iteration(&mut self) -> Result<(), crate::error::ArbError> {
        let snapshot = self.price_service.market_snapshot().await;
        if !snapshot.is_ready(Duration::from_secs_f64(self.cfg.snapshot_max_age_s)) {
            return Ok(());
        }

        let usdt_zar = self.fx.lock().await.get_usdt_zar_rate(&self.venue_b).await;

        let params = EdgeParams {
            slippage_bps: self.cfg.slippage_bps_buffer,
            fee_a: self.cfg.luno_trading_fee,
            fee_b: self.cfg.binance_trading_fee,
            min_net_edge_bps: self.cfg.get_setting("MIN_NET_EDGE_BPS", self.cfg.min_net_edge_bps),
        };

        let (a_to_b, b_to_a) = compute_edges(&snapshot, usdt_zar, params)
            .ok_or_else(|| crate::error::ArbError::DataValidity("zero price in snapshot".to_string()))?;

        for edge in [a_to_b, b_to_a] {
            let record = TickRecord {
                at: now(),
                edge,
                usdt_zar,
            };
            if let Some(evicted) = self.ring.push(record) {
                self.queue.try_enqueue(evicted);
            }
        }

        if self.cfg.exec_mode.is_paper() && !self.floats.initialized {
            let a_last = snapshot.a.quote.map(|q| q.last).unwrap_or(0.0);
            if a_last > 0.0 {
                self.floats.initialize(a_last, self.cfg.max_trade_zar);
            }
        }

        let best = best_direction(a_to_b, b_to_a);
        let opposite = if best.direction == a_to_b.direction { b_to_a } else { a_to_b };

        if best.is_profitable {
            self.stats.opportunities_found += 1;
        }

        let buffers = self.cfg.safety_buffers;
        let decision = selector::select(
            &mut self.selector_state,
            &self.floats,
            &buffers,
            best,
            opposite,
            &self.cfg,
        );

        let Some(decision) = decision else {
            return Ok(());
        };

        let a_last = snapshot.a.quote.map(|q| q.last).unwrap_or(0.0);
        let b_last = snapshot.b.quote.map(|q| q.last).unwrap_or(0.0);
        if a_last <= 0.0 || b_last <= 0.0 {
            return Ok(());
        }

        let (btc_amount, zar_notional) = trade_size(
            &self.floats,
            &buffers,
            decision.edge.direction,
            a_last,
            b_last,
            self.cfg.get_setting("MAX_TRADE_ZAR", self.cfg.max_trade_zar),
            self.cfg.get_setting("MAX_TRADE_SIZE_BTC", self.cfg.max_trade_size_btc),
            self.cfg.get_setting("MIN_TRADE_SIZE_BTC", self.cfg.min_trade_size_btc),
        );

        if btc_amount <= 0.0 {
            let opportunity = Opportunity {
                id: uuid::Uuid::new_v4(),
                at: now(),
                direction: decision.edge.direction,
                sell_price: decision.edge.sell_price,
                buy_price: decision.edge.buy_price,
                gross_edge_bps: decision.edge.gross_edge_bps,
                net_edge_bps: decision.edge.net_edge_bps,
                size_btc_estimate: 0.0,
                size_zar_estimate: 0.0,
                was_executed: false,
                reason_skipped: Some("insufficient_inventory".to_string()),
            };
            let _ = self.store.save_opportunity(opportunity).await;
            return Ok(());
        }

        if !is_executable(&self.floats, &buffers, decision.edge.direction) {
            return Ok(());
        }

        let trade = if self.cfg.exec_mode.is_paper() {
            Some(paper::apply_paper_trade(
                &mut self.floats,
                decision.edge,
                btc_amount,
                zar_notional,
                usdt_zar,
                &self.cfg,
            ))
        } else {
            live::execute_hedged_pair(
                self.venue_a.as_ref(),
                self.venue_b.as_ref(),
                decision.edge,
                btc_amount,
                zar_notional,
                &self.cfg,
            )
            .await
        };

        let opportunity = Opportunity {
            id: uuid::Uuid::new_v4(),
            at: now(),
            direction: decision.edge.direction,
            sell_price: decision.edge.sell_price,
            buy_price: decision.edge.buy_price,
            gross_edge_bps: decision.edge.gross_edge_bps,
            net_edge_bps: decision.edge.net_edge_bps,
            size_btc_estimate: btc_amount,
            size_zar_estimate: zar_notional,
            was_executed: trade.is_some(),
            reason_skipped: if trade.is_none() {
                Some("execution_failed".to_string())
            } else {
                None
            },
        };
        let _ = self.store.save_opportunity(opportunity).await;

        if let Some(trade) = trade {
            self.stats.trades_executed += 1;
            let _ = self.store.save_trade(trade).await;
        }

        Ok(())
    }

    fn spawn_balance_sync(&self) {
        let venue_a = self.venue_a.clone();
        let venue_b = self.venue_b.clone();
        tokio::spawn(async move {
            if let Err(err) = venue_a.get_counter_balance().await {
                warn!(%err, "venue_a balance sync failed");
            }
            if let Err(err) = venue_b.get_counter_balance().await {
                warn!(%err, "venue_b balance sync failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryStore;

    fn orchestrator() -> Orchestrator {
        let cfg = Config::default();
        let venue_a = Arc::new(VenueAClient::new(String::new(), String::new()));
        let venue_b = Arc::new(VenueBClient::new(
            String::new(),
            String::new(),
            cfg.venue_b_base_url.clone(),
        ));
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        Orchestrator::new(cfg, venue_a, venue_b, store)
    }

    #[tokio::test]
    async fn iteration_is_noop_before_snapshot_is_ready() {
        let mut orch = orchestrator();
        let result = orch.run_iteration().await;
        assert!(result.is_ok());
        assert_eq!(orch.stats.trades_executed, 0);
    }

    #[test]
    fn reset_clears_floats() {
        let mut orch = orchestrator();
        orch.floats.a_zar = 1234.0;
        orch.reset_paper_floats();
        assert_eq!(orch.floats.a_zar, 0.0);
    }

    #[tokio::test]
    async fn stop_unwinds_run_to_stopped() {
        let mut orch = orchestrator();
        let handle = orch.handle();
        handle.stop();

        let run = tokio::time::timeout(Duration::from_secs(10), orch.run()).await;
        assert!(run.is_ok(), "run() did not return after stop()");
        assert_eq!(orch.state, OrchestratorState::Stopped);
    }
}
