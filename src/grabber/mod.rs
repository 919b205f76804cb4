// Market data retrieval seam
pub mod synthetic;

pub use synthetic::SyntheticGrabber;

use async_trait::async_trait;

use crate::models::Bar;
use crate::Result;

/// Capability interface for historical market data retrieval.
///
/// Implementations wrap one provider (exchange REST API, vendor SDK, flat
/// files). The loop only ever sees ordered OHLCV rows; an empty result is
/// surfaced by the freshness tracker as a fetch error and retried within
/// the tick.
#[async_trait]
pub trait DataGrabber: Send + Sync {
    /// Provider name used in logs.
    fn name(&self) -> &str;

    /// Fetch historical bars for `symbol` at `interval` over `period`,
    /// ordered by timestamp ascending.
    async fn fetch_historical(
        &self,
        symbol: &str,
        interval: &str,
        period: &str,
    ) -> Result<Vec<Bar>>;
}
