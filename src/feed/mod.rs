// Data freshness and per-tick synchronization
pub mod freshness;
pub mod interval;
pub mod sync;

pub use freshness::{Feed, FeedTracker, FreshnessResult};
pub use interval::interval_to_seconds;
pub use sync::{DataSyncCoordinator, SyncOutcome};
