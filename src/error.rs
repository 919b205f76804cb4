use thiserror::Error;

/// Error taxonomy for the trading loop.
///
/// Retry policy is attached to the variant, not the call site:
/// - `Connection` is retried with a fixed backoff at connect time only.
/// - `Fetch` is retried within the tick by the sync coordinator.
/// - The `Invalid*` variants are caller/config errors and never retried.
/// - `OrderNotFound` is non-fatal; predicates log it and answer `false`.
/// - `StaleData` aborts the tick, not the process.
/// - `Setup` is fatal and stops the process before the loop starts.
#[derive(Debug, Error)]
pub enum TradingError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("no data retrieved for feed {feed}")]
    Fetch { feed: String },

    #[error("invalid interval: {0}")]
    InvalidInterval(String),

    #[error("invalid instrument (expected SYMBOL-CURRENCY-TRADETYPE): {0}")]
    InvalidInstrument(String),

    #[error("unknown trade type: {0}")]
    UnknownTradeType(String),

    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("order {0} not found")]
    OrderNotFound(String),

    #[error("stale data on feeds: {feeds:?}")]
    StaleData { feeds: Vec<String> },

    #[error("setup error: {0}")]
    Setup(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_context() {
        let err = TradingError::InvalidInstrument("SOXL/USD".into());
        assert!(err.to_string().contains("SOXL/USD"));

        let err = TradingError::StaleData { feeds: vec!["quote".into()] };
        assert!(err.to_string().contains("quote"));
    }
}
