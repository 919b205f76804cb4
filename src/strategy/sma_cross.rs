use std::collections::HashMap;

use super::Strategy;
use crate::error::TradingError;
use crate::models::{Bar, Instrument, OrderInstruction};
use crate::Result;

/// Simple moving-average crossover strategy over a single quote feed.
///
/// Emits one market buy when the fast SMA crosses above the slow SMA on the
/// latest bar, one market sell on the cross below, and nothing otherwise.
#[derive(Debug, Clone)]
pub struct SmaCrossStrategy {
    feed_name: String,
    instrument: Instrument,
    quantity: f64,
    fast: usize,
    slow: usize,
}

impl SmaCrossStrategy {
    pub fn new(feed_name: &str, instrument: Instrument, quantity: f64) -> Self {
        Self {
            feed_name: feed_name.to_string(),
            instrument,
            quantity,
            fast: 10,
            slow: 30,
        }
    }

    pub fn with_windows(mut self, fast: usize, slow: usize) -> Self {
        self.fast = fast;
        self.slow = slow;
        self
    }

    fn sma(closes: &[f64], window: usize) -> f64 {
        let tail = &closes[closes.len() - window..];
        tail.iter().sum::<f64>() / window as f64
    }

    /// Fast-minus-slow spread over the last `len` closes.
    fn spread(&self, closes: &[f64]) -> f64 {
        Self::sma(closes, self.fast) - Self::sma(closes, self.slow)
    }
}

impl Strategy for SmaCrossStrategy {
    fn decide(&self, feeds: &HashMap<String, Vec<Bar>>) -> Result<Vec<OrderInstruction>> {
        let bars = feeds.get(&self.feed_name).ok_or_else(|| {
            TradingError::Setup(format!("feed {} not registered", self.feed_name))
        })?;
        if bars.len() < self.min_bars_required() {
            tracing::debug!(
                feed = %self.feed_name,
                bars = bars.len(),
                needed = self.min_bars_required(),
                "Collecting data"
            );
            return Ok(Vec::new());
        }

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let spread_now = self.spread(&closes);
        let spread_prev = self.spread(&closes[..closes.len() - 1]);

        let instructions = if spread_prev <= 0.0 && spread_now > 0.0 {
            tracing::info!(feed = %self.feed_name, "SMA cross up");
            vec![OrderInstruction::market(self.instrument.clone(), self.quantity)]
        } else if spread_prev >= 0.0 && spread_now < 0.0 {
            tracing::info!(feed = %self.feed_name, "SMA cross down");
            vec![OrderInstruction::market(self.instrument.clone(), -self.quantity)]
        } else {
            Vec::new()
        };
        Ok(instructions)
    }

    fn name(&self) -> &str {
        "SmaCrossStrategy"
    }

    fn min_bars_required(&self) -> usize {
        self.slow + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
        let start = Utc::now() - Duration::minutes(closes.len() as i64);
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                timestamp: start + Duration::minutes(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1_000.0,
            })
            .collect()
    }

    fn strategy() -> SmaCrossStrategy {
        SmaCrossStrategy::new("quote", "SOXL-USD-SPOT".parse().unwrap(), 50.0)
            .with_windows(2, 3)
    }

    fn feeds(closes: &[f64]) -> HashMap<String, Vec<Bar>> {
        HashMap::from([("quote".to_string(), bars_from_closes(closes))])
    }

    #[test]
    fn test_cross_up_emits_buy() {
        // Flat then a jump: fast SMA overtakes slow on the last bar.
        let instructions = strategy().decide(&feeds(&[10.0, 10.0, 10.0, 14.0])).unwrap();
        assert_eq!(instructions.len(), 1);
        assert_eq!(instructions[0].quantity, 50.0);
    }

    #[test]
    fn test_cross_down_emits_sell() {
        let instructions = strategy().decide(&feeds(&[10.0, 10.0, 10.0, 6.0])).unwrap();
        assert_eq!(instructions.len(), 1);
        assert_eq!(instructions[0].quantity, -50.0);
    }

    #[test]
    fn test_no_cross_is_quiet() {
        let instructions = strategy().decide(&feeds(&[10.0, 10.0, 10.0, 10.0])).unwrap();
        assert!(instructions.is_empty());
    }

    #[test]
    fn test_short_frame_is_quiet() {
        let instructions = strategy().decide(&feeds(&[10.0, 11.0])).unwrap();
        assert!(instructions.is_empty());
    }

    #[test]
    fn test_missing_feed_is_setup_error() {
        let err = strategy().decide(&HashMap::new()).unwrap_err();
        assert!(matches!(err, TradingError::Setup(_)));
    }
}
