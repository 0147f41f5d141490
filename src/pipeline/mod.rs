use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::warn;

use crate::engine::edge::EdgeResult;
use crate::types::Timestamp;

const RING_CAPACITY: usize = 6;
const QUEUE_CAPACITY: usize = 100;
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Snapshot of one direction's decision inputs and edge, immutable once
/// added to the ring.
#[derive(Debug, Clone, Copy)]
pub struct TickRecord {
    pub at: Timestamp,
    pub edge: EdgeResult,
    pub usdt_zar: f64,
}

/// Fixed-capacity ring of the last `RING_CAPACITY` ticks. When full, the
/// oldest record is either dropped (dedup rule) or handed to the bounded
/// queue for persistence.
pub struct TickRing {
    records: VecDeque<TickRecord>,
}

impl TickRing {
    pub fn new() -> Self {
        Self {
            records: VecDeque::with_capacity(RING_CAPACITY),
        }
    }

    /// Push a new tick. Returns the oldest record if the ring was full and
    /// it survived the dedup rule (i.e. should be enqueued for persistence).
    pub fn push(&mut self, record: TickRecord) -> Option<TickRecord> {
        if self.records.len() < RING_CAPACITY {
            self.records.push_back(record);
            return None;
        }

        let oldest = self.records.pop_front().unwrap();
        let second_oldest = self.records.front().copied();
        self.records.push_back(record);

        match second_oldest {
            Some(second) if round1(oldest.edge.net_edge_bps) == round1(second.edge.net_edge_bps) => {
                None
            }
            _ => Some(oldest),
        }
    }

    /// Flush all remaining records, oldest first, for a shutdown drain.
    pub fn drain(&mut self) -> Vec<TickRecord> {
        self.records.drain(..).collect()
    }
}

impl Default for TickRing {
    fn default() -> Self {
        Self::new()
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

pub fn now() -> Timestamp {
    Utc::now()
}

/// Bounded async handoff between the decision loop and persistence.
/// Enqueue never blocks: a full queue drops the record and warns.
pub struct TickQueue {
    tx: mpsc::Sender<TickRecord>,
    rx: Option<mpsc::Receiver<TickRecord>>,
}

impl TickQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        Self { tx, rx: Some(rx) }
    }

    pub fn try_enqueue(&self, record: TickRecord) {
        if self.tx.try_send(record).is_err() {
            warn!("tick queue full, dropping record");
        }
    }

    /// Takes ownership of the receiving half; callable once, by the
    /// orchestrator loop that drains it.
    pub fn take_receiver(&mut self) -> Option<mpsc::Receiver<TickRecord>> {
        self.rx.take()
    }
}

impl Default for TickQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain whatever remains in the queue within the shutdown window.
pub async fn drain_on_shutdown(rx: &mut mpsc::Receiver<TickRecord>, store: &Arc<dyn crate::persistence::Store>) {
    let deadline = tokio::time::Instant::now() + WRITER_DRAIN_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        match timeout(Duration::from_millis(100), rx.recv()).await {
            Ok(Some(record)) => {
                let _ = store.save_tick(record).await;
            }
            Ok(None) => break,
            Err(_) => continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;

    fn record(net_bps: f64) -> TickRecord {
        TickRecord {
            at: now(),
            edge: EdgeResult {
                direction: Direction::AToB,
                buy_price: 1.0,
                sell_price: 1.0,
                gross_edge_bps: net_bps + 20.0,
                net_edge_bps: net_bps,
                is_profitable: net_bps >= 40.0,
            },
            usdt_zar: 17.0,
        }
    }

    #[test]
    fn ring_does_not_evict_below_capacity() {
        let mut ring = TickRing::new();
        for i in 0..RING_CAPACITY {
            assert!(ring.push(record(i as f64)).is_none());
        }
    }

    #[test]
    fn dedup_drops_unchanged_oldest() {
        let mut ring = TickRing::new();
        for _ in 0..RING_CAPACITY {
            ring.push(record(50.0));
        }
        // Ring full of identical values; oldest vs second-oldest are equal.
        let evicted = ring.push(record(50.0));
        assert!(evicted.is_none());
    }

    #[test]
    fn changed_oldest_is_enqueued() {
        let mut ring = TickRing::new();
        ring.push(record(10.0));
        for _ in 1..RING_CAPACITY {
            ring.push(record(50.0));
        }
        let evicted = ring.push(record(50.0));
        assert!(evicted.is_some());
        assert_eq!(evicted.unwrap().edge.net_edge_bps, 10.0);
    }

    #[tokio::test]
    async fn enqueue_drops_when_queue_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let queue = TickQueue { tx, rx: None };
        queue.try_enqueue(record(1.0));
        queue.try_enqueue(record(2.0));
        let first = rx.recv().await.unwrap();
        assert_eq!(first.edge.net_edge_bps, 1.0);
        assert!(rx.try_recv().is_err());
    }
}
