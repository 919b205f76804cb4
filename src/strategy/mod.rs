// Trading strategy module
pub mod sma_cross;

pub use sma_cross::SmaCrossStrategy;

use std::collections::HashMap;

use crate::models::{Bar, OrderInstruction};
use crate::Result;

/// Base trait for all trading strategies.
///
/// The loop hands the strategy every feed's cached frame once per fresh
/// tick; the strategy answers with an ordered list of order instructions,
/// possibly empty. Strategies hold no broker handle: order routing is the
/// loop's job.
pub trait Strategy: Send + Sync {
    /// Decide on order instructions given the current per-feed frames,
    /// keyed by feed name.
    fn decide(&self, feeds: &HashMap<String, Vec<Bar>>) -> Result<Vec<OrderInstruction>>;

    /// Strategy name for logs.
    fn name(&self) -> &str;

    /// Minimum bars required in a frame before this strategy can decide.
    fn min_bars_required(&self) -> usize {
        1
    }
}
