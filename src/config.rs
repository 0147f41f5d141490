use std::collections::HashMap;
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    Live,
    Paper,
}

impl ExecMode {
    pub fn is_paper(self) -> bool {
        matches!(self, ExecMode::Paper)
    }

    fn from_str(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "live" => ExecMode::Live,
            _ => ExecMode::Paper,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SafetyBuffers {
    pub a_zar: f64,
    pub a_btc: f64,
    pub b_btc: f64,
    pub b_usdt: f64,
}

impl Default for SafetyBuffers {
    fn default() -> Self {
        Self {
            a_zar: 1000.0,
            a_btc: 0.0005,
            b_btc: 0.001,
            b_usdt: 50.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub exec_mode: ExecMode,

    pub venue_a_api_key: String,
    pub venue_a_api_secret: String,
    pub venue_b_api_key: String,
    pub venue_b_api_secret: String,
    pub venue_b_base_url: String,

    pub min_net_edge_bps: f64,
    pub max_trade_size_btc: f64,
    pub min_trade_size_btc: f64,
    pub max_trade_zar: f64,

    pub luno_trading_fee: f64,
    pub binance_trading_fee: f64,
    pub slippage_bps_buffer: f64,

    pub safety_buffers: SafetyBuffers,

    pub keepalive_threshold_bps: f64,
    pub rebalance_enabled: bool,
    pub rebalance_trigger_count: u32,
    pub rebalance_threshold_bps: f64,

    pub error_stop_count: u32,

    pub check_interval_ms: u64,
    pub min_trade_interval_s: f64,
    pub snapshot_max_age_s: f64,

    pub clear_db_on_startup: bool,

    /// Narrow escape hatch mirroring the original's `_runtime_overrides`:
    /// lets an external control surface (out of scope here) retune a
    /// threshold without a restart. `get_setting` consults this first.
    runtime_overrides: HashMap<String, f64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exec_mode: ExecMode::Paper,

            venue_a_api_key: String::new(),
            venue_a_api_secret: String::new(),
            venue_b_api_key: String::new(),
            venue_b_api_secret: String::new(),
            venue_b_base_url: "https://api.binance.com/api/v3".to_string(),

            min_net_edge_bps: 40.0,
            max_trade_size_btc: 0.01,
            min_trade_size_btc: 0.0001,
            max_trade_zar: 5000.0,

            luno_trading_fee: 0.001,
            binance_trading_fee: 0.001,
            slippage_bps_buffer: 10.0,

            safety_buffers: SafetyBuffers::default(),

            keepalive_threshold_bps: -20.0,
            rebalance_enabled: true,
            rebalance_trigger_count: 10,
            rebalance_threshold_bps: 0.0,

            error_stop_count: 5,

            check_interval_ms: 500,
            min_trade_interval_s: 2.0,
            snapshot_max_age_s: 5.0,

            clear_db_on_startup: false,

            runtime_overrides: HashMap::new(),
        }
    }
}

impl Config {
    /// Overlay environment variables onto the defaults. Malformed values
    /// are logged and the default is kept rather than failing startup.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(mode) = env::var("MODE") {
            cfg.exec_mode = ExecMode::from_str(&mode);
        }

        cfg.venue_a_api_key = env::var("LUNO_API_KEY").unwrap_or_default();
        cfg.venue_a_api_secret = env::var("LUNO_API_SECRET").unwrap_or_default();
        cfg.venue_b_api_key = env::var("BINANCE_API_KEY").unwrap_or_default();
        cfg.venue_b_api_secret = env::var("BINANCE_API_SECRET").unwrap_or_default();
        if let Ok(url) = env::var("BINANCE_BASE_URL") {
            cfg.venue_b_base_url = url;
        }

        Self::overlay_f64(&mut cfg.min_net_edge_bps, "MIN_NET_EDGE_BPS");
        Self::overlay_f64(&mut cfg.max_trade_size_btc, "MAX_TRADE_SIZE_BTC");
        Self::overlay_f64(&mut cfg.min_trade_size_btc, "MIN_TRADE_SIZE_BTC");
        Self::overlay_f64(&mut cfg.max_trade_zar, "MAX_TRADE_ZAR");
        Self::overlay_f64(&mut cfg.luno_trading_fee, "LUNO_TRADING_FEE");
        Self::overlay_f64(&mut cfg.binance_trading_fee, "BINANCE_TRADING_FEE");
        Self::overlay_f64(&mut cfg.slippage_bps_buffer, "SLIPPAGE_BPS_BUFFER");
        Self::overlay_f64(&mut cfg.safety_buffers.a_zar, "MIN_REMAINING_ZAR_LUNO");
        Self::overlay_f64(&mut cfg.safety_buffers.a_btc, "MIN_REMAINING_BTC_LUNO");
        Self::overlay_f64(&mut cfg.safety_buffers.b_btc, "MIN_REMAINING_BTC_BINANCE");
        Self::overlay_f64(&mut cfg.safety_buffers.b_usdt, "MIN_REMAINING_USDT_BINANCE");
        Self::overlay_f64(&mut cfg.keepalive_threshold_bps, "KEEPALIVE_THRESHOLD_BPS");
        Self::overlay_f64(&mut cfg.rebalance_threshold_bps, "REBALANCE_THRESHOLD_BPS");

        if let Ok(v) = env::var("REBALANCE_ENABLED") {
            cfg.rebalance_enabled = v.eq_ignore_ascii_case("true") || v == "1";
        }
        if let Ok(v) = env::var("REBALANCE_TRIGGER_COUNT") {
            if let Ok(parsed) = v.parse() {
                cfg.rebalance_trigger_count = parsed;
            }
        }
        if let Ok(v) = env::var("ERROR_STOP_COUNT") {
            if let Ok(parsed) = v.parse() {
                cfg.error_stop_count = parsed;
            }
        }
        if let Ok(v) = env::var("CLEAR_DB_ON_STARTUP") {
            cfg.clear_db_on_startup = v.eq_ignore_ascii_case("true") || v == "1";
        }

        cfg
    }

    fn overlay_f64(field: &mut f64, key: &str) {
        if let Ok(v) = env::var(key) {
            if let Ok(parsed) = v.parse::<f64>() {
                *field = parsed;
            }
        }
    }

    pub fn set_override(&mut self, key: &str, value: f64) {
        self.runtime_overrides.insert(key.to_string(), value);
    }

    /// Look up a tunable, preferring a runtime override over the static
    /// field passed in by the caller.
    pub fn get_setting(&self, key: &str, default: f64) -> f64 {
        *self.runtime_overrides.get(key).unwrap_or(&default)
    }
}
