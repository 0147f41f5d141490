use thiserror::Error;

/// The error kinds from the design's error-handling model. Transient I/O,
/// rate limiting and data validity problems are expected to happen
/// continuously in production and are handled by the orchestrator's
/// consecutive-error counter rather than by unwinding the process.
#[derive(Debug, Error)]
pub enum ArbError {
    #[error("transient I/O error: {0}")]
    Transient(String),

    #[error("invalid market data: {0}")]
    DataValidity(String),

    #[error("rate limited: {0}")]
    RateLimit(String),

    #[error("authorisation failed: {0}")]
    Auth(String),

    #[error("insufficient inventory: {0}")]
    InsufficientInventory(String),
}

impl From<reqwest::Error> for ArbError {
    fn from(err: reqwest::Error) -> Self {
        if err.status().map(|s| s.as_u16()) == Some(429) {
            ArbError::RateLimit(err.to_string())
        } else {
            ArbError::Transient(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ArbError {
    fn from(err: serde_json::Error) -> Self {
        ArbError::DataValidity(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ArbError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ArbError::Transient(err.to_string())
    }
}
