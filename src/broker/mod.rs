// Brokerage seam
pub mod paper;
pub mod status;

pub use paper::PaperBroker;
pub use status::map_broker_status;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Order, OrderSide, OrderType, Position, TimeInForce, TradeType};
use crate::Result;

/// A validated order ready for the wire. Quantity is always positive here;
/// direction lives in `side`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub currency: String,
    pub trade_type: TradeType,
    pub side: OrderSide,
    pub quantity: f64,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub limit_price: Option<f64>,
    pub stop_price: Option<f64>,
}

/// Broker acknowledgement for a placed order.
///
/// Brokers report soft failures through `error_code`/`message` without
/// failing the call; the lifecycle manager logs those as warnings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub order_id: String,
    /// Broker-native status string at acceptance time.
    pub status: String,
    pub avg_fill_price: Option<f64>,
    pub error_code: i64,
    pub message: String,
}

/// Capability interface for a brokerage account.
///
/// The loop treats the broker as the single source of truth for order and
/// position state; every query goes back to the wire.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Connect and prepare the account. Transport failures are retried with
    /// a fixed backoff up to a bounded attempt count here, never mid-tick.
    async fn start(&self) -> Result<()>;

    /// Disconnect. Idempotent.
    async fn stop(&self) -> Result<()>;

    /// Current time as the broker sees it (UTC).
    fn now(&self) -> DateTime<Utc>;

    async fn get_cash(&self) -> Result<f64>;

    /// Positions for the given symbols; empty slice means all held symbols.
    /// Symbols the broker has no record of map to flat positions.
    async fn get_positions(&self, symbols: &[String]) -> Result<HashMap<String, Position>>;

    async fn place_order(&self, request: &OrderRequest) -> Result<PlacedOrder>;

    async fn cancel_order(&self, order_id: &str) -> Result<()>;

    /// Broker-native status string, or `None` when the broker has no record
    /// of the id (never seen, or aged out of its retention).
    async fn order_status(&self, order_id: &str) -> Result<Option<String>>;

    async fn open_orders(&self) -> Result<Vec<Order>>;
}
