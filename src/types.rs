use chrono::{DateTime, Utc};

/// A venue in the pair. Venue A is ZAR-quoted (Luno-shaped contract), Venue
/// B is USDT-quoted (Binance-shaped contract).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Venue {
    A,
    B,
}

impl Venue {
    pub fn as_str(self) -> &'static str {
        match self {
            Venue::A => "venue_a",
            Venue::B => "venue_b",
        }
    }
}

/// Which way the hedged pair runs: buy the cheap leg, sell the expensive one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Buy base on Venue A, sell base on Venue B.
    AToB,
    /// Buy base on Venue B, sell base on Venue A.
    BToA,
}

impl Direction {
    pub fn buy_venue(self) -> Venue {
        match self {
            Direction::AToB => Venue::A,
            Direction::BToA => Venue::B,
        }
    }

    pub fn sell_venue(self) -> Venue {
        match self {
            Direction::AToB => Venue::B,
            Direction::BToA => Venue::A,
        }
    }

    pub fn other(self) -> Direction {
        match self {
            Direction::AToB => Direction::BToA,
            Direction::BToA => Direction::AToB,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::AToB => "a_to_b",
            Direction::BToA => "b_to_a",
        }
    }
}

/// Top-of-book quote for one venue. `bid <= ask` and both are strictly
/// positive when the quote is valid; zero means "no data".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceQuote {
    pub bid: f64,
    pub ask: f64,
    pub last: f64,
    pub venue: Venue,
}

impl PriceQuote {
    pub fn is_valid(&self) -> bool {
        self.bid > 0.0 && self.ask > 0.0 && self.bid <= self.ask
    }
}

/// Result of a venue order-placement call. Structural, never an exception:
/// a missing API key yields `success = false` with an explanatory `error`
/// rather than a network call.
#[derive(Debug, Clone, Default)]
pub struct OrderResult {
    pub success: bool,
    pub order_id: Option<String>,
    pub filled_amount: Option<f64>,
    pub filled_price: Option<f64>,
    pub error: Option<String>,
}

impl OrderResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn ok(order_id: impl Into<String>, filled_amount: f64, filled_price: f64) -> Self {
        Self {
            success: true,
            order_id: Some(order_id.into()),
            filled_amount: Some(filled_amount),
            filled_price: Some(filled_price),
            error: None,
        }
    }
}

/// A balance for a single currency on a single venue.
#[derive(Debug, Clone, Copy, Default)]
pub struct Balance {
    pub available: f64,
    pub reserved: f64,
}

impl Balance {
    pub fn total(&self) -> f64 {
        self.available + self.reserved
    }
}

/// What kind of trade the selector chose to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeType {
    Profitable,
    Keepalive,
    Rebalance,
}

impl TradeType {
    pub fn as_str(self) -> &'static str {
        match self {
            TradeType::Profitable => "profitable",
            TradeType::Keepalive => "keepalive",
            TradeType::Rebalance => "rebalance",
        }
    }
}

/// Status of a persisted trade record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeStatus {
    Paper,
    Completed,
    Failed,
}

impl TradeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TradeStatus::Paper => "paper",
            TradeStatus::Completed => "completed",
            TradeStatus::Failed => "failed",
        }
    }
}

pub type Timestamp = DateTime<Utc>;
