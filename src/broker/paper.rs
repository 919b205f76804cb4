use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::{sleep, Duration};
use uuid::Uuid;

use super::{Broker, OrderRequest, PlacedOrder};
use crate::error::TradingError;
use crate::models::{Order, OrderSide, OrderType, Position};
use crate::Result;

const CONNECT_ATTEMPTS: u32 = 5;

struct OrderRecord {
    order: Order,
    status: String,
    avg_fill_price: Option<f64>,
}

struct Inner {
    connected: bool,
    cash: f64,
    positions: HashMap<String, Position>,
    orders: HashMap<String, OrderRecord>,
    marks: HashMap<String, f64>,
    /// Simulated connect failures remaining, for exercising start() retries.
    connect_failures: u32,
    /// Pinned clock for tests; None means wall clock.
    fixed_now: Option<DateTime<Utc>>,
}

/// In-memory brokerage account for paper trading and tests.
///
/// Market orders fill immediately at the symbol's mark price and mutate the
/// position table; limit and stop orders rest as Submitted until cancelled.
/// Statuses are reported in the TWS-style vocabulary the status mapper
/// understands.
pub struct PaperBroker {
    inner: Mutex<Inner>,
    connect_backoff: Duration,
}

impl PaperBroker {
    pub fn new(cash: f64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                connected: false,
                cash,
                positions: HashMap::new(),
                orders: HashMap::new(),
                marks: HashMap::new(),
                connect_failures: 0,
                fixed_now: None,
            }),
            connect_backoff: Duration::from_secs(1),
        }
    }

    pub fn with_connect_backoff(mut self, backoff: Duration) -> Self {
        self.connect_backoff = backoff;
        self
    }

    /// Fail the next `n` connect attempts.
    pub fn fail_next_connects(&self, n: u32) {
        self.inner.lock().unwrap().connect_failures = n;
    }

    pub fn set_mark_price(&self, symbol: &str, price: f64) {
        self.inner
            .lock()
            .unwrap()
            .marks
            .insert(symbol.to_ascii_uppercase(), price);
    }

    /// Pin the broker clock, so tests can place ticks inside the action
    /// window deterministically.
    pub fn set_now(&self, now: DateTime<Utc>) {
        self.inner.lock().unwrap().fixed_now = Some(now);
    }

    /// Seed a holding directly, bypassing order flow.
    pub fn set_position(&self, symbol: &str, currency: &str, quantity: f64, avg_cost: f64) {
        let symbol = symbol.to_ascii_uppercase();
        self.inner.lock().unwrap().positions.insert(
            symbol.clone(),
            Position {
                symbol,
                currency: currency.to_string(),
                quantity,
                avg_cost,
                unrealized_pnl: 0.0,
            },
        );
    }

    fn fill(inner: &mut Inner, request: &OrderRequest, price: f64) {
        let signed_qty = match request.side {
            OrderSide::Buy => request.quantity,
            OrderSide::Sell => -request.quantity,
        };
        let entry = inner
            .positions
            .entry(request.symbol.clone())
            .or_insert_with(|| Position {
                symbol: request.symbol.clone(),
                currency: request.currency.clone(),
                quantity: 0.0,
                avg_cost: 0.0,
                unrealized_pnl: 0.0,
            });

        let new_qty = entry.quantity + signed_qty;
        if entry.quantity.signum() != new_qty.signum() || entry.quantity == 0.0 {
            entry.avg_cost = price;
        } else if new_qty.abs() > entry.quantity.abs() {
            // Adding to the position: blend the cost basis.
            entry.avg_cost = (entry.avg_cost * entry.quantity.abs()
                + price * signed_qty.abs())
                / new_qty.abs();
        }
        entry.quantity = new_qty;
        entry.unrealized_pnl = (price - entry.avg_cost) * entry.quantity;
        inner.cash -= signed_qty * price;
    }
}

#[async_trait]
impl Broker for PaperBroker {
    async fn start(&self) -> Result<()> {
        for attempt in 1..=CONNECT_ATTEMPTS {
            let connected = {
                let mut inner = self.inner.lock().unwrap();
                if inner.connect_failures > 0 {
                    inner.connect_failures -= 1;
                    false
                } else {
                    inner.connected = true;
                    true
                }
            };
            if connected {
                tracing::info!(attempt, "Paper broker connected");
                return Ok(());
            }
            tracing::warn!(attempt, "Paper broker connect failed, retrying");
            sleep(self.connect_backoff).await;
        }
        Err(TradingError::Connection(
            "failed to connect to paper broker".to_string(),
        ))
    }

    async fn stop(&self) -> Result<()> {
        self.inner.lock().unwrap().connected = false;
        tracing::info!("Paper broker disconnected");
        Ok(())
    }

    fn now(&self) -> DateTime<Utc> {
        self.inner.lock().unwrap().fixed_now.unwrap_or_else(Utc::now)
    }

    async fn get_cash(&self) -> Result<f64> {
        Ok(self.inner.lock().unwrap().cash)
    }

    async fn get_positions(&self, symbols: &[String]) -> Result<HashMap<String, Position>> {
        let inner = self.inner.lock().unwrap();
        if symbols.is_empty() {
            return Ok(inner.positions.clone());
        }
        Ok(symbols
            .iter()
            .map(|s| {
                let symbol = s.to_ascii_uppercase();
                let position = inner
                    .positions
                    .get(&symbol)
                    .cloned()
                    .unwrap_or_else(|| Position::flat(&symbol));
                (symbol, position)
            })
            .collect())
    }

    async fn place_order(&self, request: &OrderRequest) -> Result<PlacedOrder> {
        let mut inner = self.inner.lock().unwrap();
        let order_id = Uuid::new_v4().to_string();
        let now = inner.fixed_now.unwrap_or_else(Utc::now);

        let (status, avg_fill_price) = match request.order_type {
            OrderType::Market => {
                let mark = inner.marks.get(&request.symbol).copied().unwrap_or(100.0);
                Self::fill(&mut inner, request, mark);
                ("Filled".to_string(), Some(mark))
            }
            _ => ("Submitted".to_string(), None),
        };

        inner.orders.insert(
            order_id.clone(),
            OrderRecord {
                order: Order {
                    order_id: order_id.clone(),
                    instrument: crate::models::Instrument::new(
                        &request.symbol,
                        &request.currency,
                        request.trade_type,
                    ),
                    side: request.side,
                    quantity: request.quantity,
                    order_type: request.order_type,
                    time_in_force: request.time_in_force,
                    limit_price: request.limit_price,
                    stop_price: request.stop_price,
                    submitted_at: now,
                },
                status: status.clone(),
                avg_fill_price,
            },
        );

        Ok(PlacedOrder {
            order_id,
            status,
            avg_fill_price,
            error_code: 0,
            message: String::new(),
        })
    }

    async fn cancel_order(&self, order_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let record = inner
            .orders
            .get_mut(order_id)
            .ok_or_else(|| TradingError::OrderNotFound(order_id.to_string()))?;
        if super::map_broker_status(&record.status).is_terminal() {
            return Ok(());
        }
        record.status = "Cancelled".to_string();
        Ok(())
    }

    async fn order_status(&self, order_id: &str) -> Result<Option<String>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .orders
            .get(order_id)
            .map(|r| r.status.clone()))
    }

    async fn open_orders(&self) -> Result<Vec<Order>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .orders
            .values()
            .filter(|r| !super::map_broker_status(&r.status).is_terminal())
            .map(|r| r.order.clone())
            .collect())
    }
}
