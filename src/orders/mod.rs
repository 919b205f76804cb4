use std::collections::HashMap;
use std::sync::Arc;

use tokio::time::{sleep, Duration};

use crate::broker::{map_broker_status, Broker, OrderRequest};
use crate::error::TradingError;
use crate::models::{Instrument, Order, OrderInstruction, OrderState, OrderType};
use crate::Result;

/// Submits orders, maps broker status onto the canonical state machine and
/// serves point/bulk queries.
///
/// The manager never caches authoritative state: every status query goes
/// back to the broker, so out-of-band fills and cancellations are always
/// visible. The local journal only records what this session submitted,
/// for logging and debugging.
pub struct OrderLifecycleManager {
    broker: Arc<dyn Broker>,
    journal: HashMap<String, Order>,
    cancel_delay: Duration,
}

impl OrderLifecycleManager {
    pub fn new(broker: Arc<dyn Broker>, cancel_delay: Duration) -> Self {
        Self {
            broker,
            journal: HashMap::new(),
            cancel_delay,
        }
    }

    /// Orders submitted through this session, keyed by broker order id.
    pub fn journal(&self) -> &HashMap<String, Order> {
        &self.journal
    }

    /// Validate and submit one instruction; returns the broker-assigned
    /// order id.
    ///
    /// Direction is derived from the quantity sign. A zero quantity fails
    /// with `InvalidOrder` before any broker call. A broker-reported soft
    /// error (non-zero error code without a failed call) is logged as a
    /// warning, not raised.
    pub async fn submit(&mut self, instruction: &OrderInstruction) -> Result<String> {
        if instruction.quantity == 0.0 {
            return Err(TradingError::InvalidOrder(format!(
                "zero quantity for {}",
                instruction.instrument
            )));
        }

        let request = OrderRequest {
            symbol: instruction.instrument.symbol.clone(),
            currency: instruction.instrument.currency.clone(),
            trade_type: instruction.instrument.trade_type,
            side: instruction.side(),
            quantity: instruction.quantity.abs(),
            order_type: instruction.order_type,
            time_in_force: instruction.time_in_force,
            limit_price: instruction.limit_price,
            stop_price: instruction.stop_price,
        };
        let placed = self.broker.place_order(&request).await?;

        match placed.avg_fill_price {
            Some(price) => tracing::info!(
                order_id = %placed.order_id,
                status = %placed.status,
                avg_fill_price = price,
                "Order {} {} at price {}", placed.order_id, placed.status, price
            ),
            None => tracing::info!(
                order_id = %placed.order_id,
                status = %placed.status,
                "Order {} {}", placed.order_id, placed.status
            ),
        }
        if placed.error_code != 0 {
            tracing::warn!(
                order_id = %placed.order_id,
                error_code = placed.error_code,
                "{}", placed.message
            );
        }

        self.journal.insert(
            placed.order_id.clone(),
            Order {
                order_id: placed.order_id.clone(),
                instrument: instruction.instrument.clone(),
                side: instruction.side(),
                quantity: instruction.quantity.abs(),
                order_type: instruction.order_type,
                time_in_force: instruction.time_in_force,
                limit_price: instruction.limit_price,
                stop_price: instruction.stop_price,
                submitted_at: self.broker.now(),
            },
        );
        Ok(placed.order_id)
    }

    /// Canonical state of an order, re-read from the broker. Fails with
    /// `OrderNotFound` when the broker has no record, whether it never saw
    /// the id or the id aged out of its retention.
    pub async fn status(&self, order_id: &str) -> Result<OrderState> {
        match self.broker.order_status(order_id).await? {
            Some(raw) => Ok(map_broker_status(&raw)),
            None => Err(TradingError::OrderNotFound(order_id.to_string())),
        }
    }

    /// True while the order could still fill (Pending, Submitted or
    /// PartiallyFilled). Unknown ids answer false with a logged error.
    pub async fn is_pending(&self, order_id: &str) -> bool {
        self.predicate(order_id, |state| {
            matches!(
                state,
                OrderState::Pending | OrderState::Submitted | OrderState::PartiallyFilled
            )
        })
        .await
    }

    pub async fn is_filled(&self, order_id: &str) -> bool {
        self.predicate(order_id, |state| state == OrderState::Filled).await
    }

    pub async fn is_cancelled(&self, order_id: &str) -> bool {
        self.predicate(order_id, |state| state == OrderState::Cancelled).await
    }

    async fn predicate(&self, order_id: &str, check: impl Fn(OrderState) -> bool) -> bool {
        match self.status(order_id).await {
            Ok(state) => check(state),
            Err(e) => {
                tracing::error!(order_id, error = %e, "Order lookup failed");
                false
            }
        }
    }

    /// Cancel the given order ids, or every open order when `order_ids` is
    /// empty. Only ids the broker still reports as open are cancelled; a
    /// small delay spaces out the cancel calls to respect broker rate
    /// limits.
    pub async fn cancel(&self, order_ids: &[String]) -> Result<()> {
        let open = self.broker.open_orders().await?;
        for order in &open {
            if !order_ids.is_empty() && !order_ids.contains(&order.order_id) {
                continue;
            }
            self.broker.cancel_order(&order.order_id).await?;
            tracing::warn!(order_id = %order.order_id, "Cancelled order {}", order.order_id);
            sleep(self.cancel_delay).await;
        }
        Ok(())
    }

    /// Flatten holdings: for each nonzero position submit an offsetting
    /// market order sized to exactly zero it out. Symbols with zero or
    /// unknown holdings are silently skipped. Empty `symbols` flattens
    /// everything. Returns the submitted order ids.
    pub async fn close_position(&mut self, symbols: &[String]) -> Result<Vec<String>> {
        let positions = self.broker.get_positions(symbols).await?;
        let mut order_ids = Vec::new();

        for (symbol, position) in positions {
            if position.quantity == 0.0 {
                continue;
            }
            let instruction = OrderInstruction {
                instrument: Instrument::spot(&symbol, &position.currency),
                quantity: -position.quantity,
                order_type: OrderType::Market,
                time_in_force: Default::default(),
                limit_price: None,
                stop_price: None,
            };
            tracing::info!(
                symbol = %symbol,
                quantity = -position.quantity,
                "Closing position"
            );
            order_ids.push(self.submit(&instruction).await?);
        }
        Ok(order_ids)
    }
}
