// Core modules
pub mod broker;
pub mod config;
pub mod error;
pub mod feed;
pub mod grabber;
pub mod models;
pub mod orders;
pub mod strategy;
pub mod trader;

// Re-export commonly used types
pub use broker::{map_broker_status, Broker, PaperBroker};
pub use config::TraderConfig;
pub use error::TradingError;
pub use feed::{DataSyncCoordinator, Feed, FreshnessResult, SyncOutcome};
pub use grabber::{DataGrabber, SyntheticGrabber};
pub use models::*;
pub use orders::OrderLifecycleManager;
pub use strategy::Strategy;
pub use trader::{LoopState, StopHandle, Trader};

// Error handling
pub type Result<T> = std::result::Result<T, error::TradingError>;
