use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TradingError;

/// Instrument class: cash equity or perpetual future.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TradeType {
    Spot,
    Perp,
}

impl FromStr for TradeType {
    type Err = TradingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SPOT" => Ok(TradeType::Spot),
            "PERP" => Ok(TradeType::Perp),
            other => Err(TradingError::UnknownTradeType(other.to_string())),
        }
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeType::Spot => write!(f, "SPOT"),
            TradeType::Perp => write!(f, "PERP"),
        }
    }
}

/// An instrument identity, always expressed as SYMBOL-CURRENCY-TRADETYPE
/// (e.g. "SOXL-USD-SPOT").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instrument {
    pub symbol: String,
    pub currency: String,
    pub trade_type: TradeType,
}

impl Instrument {
    pub fn new(symbol: &str, currency: &str, trade_type: TradeType) -> Self {
        Self {
            symbol: symbol.to_ascii_uppercase(),
            currency: currency.to_ascii_uppercase(),
            trade_type,
        }
    }

    /// Spot instrument in the given currency, defaulting to USD when the
    /// broker reports none. Used when flattening positions.
    pub fn spot(symbol: &str, currency: &str) -> Self {
        let currency = if currency.is_empty() { "USD" } else { currency };
        Self::new(symbol, currency, TradeType::Spot)
    }
}

impl FromStr for Instrument {
    type Err = TradingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('-').collect();
        let [symbol, currency, trade_type] = parts.as_slice() else {
            return Err(TradingError::InvalidInstrument(s.to_string()));
        };
        if symbol.is_empty() || currency.is_empty() {
            return Err(TradingError::InvalidInstrument(s.to_string()));
        }
        Ok(Instrument::new(symbol, currency, trade_type.parse()?))
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.symbol, self.currency, self.trade_type)
    }
}

/// Order execution type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
}

/// Time in force. GTC is the default, matching the live-broker behavior
/// the loop was written against.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimeInForce {
    Day,
    #[default]
    Gtc,
    Ioc,
    Gtd,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// One order instruction produced by a strategy. Quantity is signed:
/// positive buys, negative sells.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderInstruction {
    pub instrument: Instrument,
    pub quantity: f64,
    pub order_type: OrderType,
    #[serde(default)]
    pub time_in_force: TimeInForce,
    pub limit_price: Option<f64>,
    pub stop_price: Option<f64>,
}

impl OrderInstruction {
    pub fn market(instrument: Instrument, quantity: f64) -> Self {
        Self {
            instrument,
            quantity,
            order_type: OrderType::Market,
            time_in_force: TimeInForce::default(),
            limit_price: None,
            stop_price: None,
        }
    }

    pub fn side(&self) -> OrderSide {
        if self.quantity > 0.0 {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        }
    }
}

/// A brokerage order as the broker reports it. `order_id` is broker-assigned
/// and opaque to the loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub instrument: Instrument,
    pub side: OrderSide,
    pub quantity: f64,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub limit_price: Option<f64>,
    pub stop_price: Option<f64>,
    pub submitted_at: DateTime<Utc>,
}

/// Canonical order state every broker-native vocabulary is mapped onto.
///
/// Transitions: Pending -> Submitted -> {PartiallyFilled -> Filled | Filled |
/// Cancelled | Rejected}. Filled/Cancelled/Rejected are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderState {
    Pending,
    Submitted,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
    Unknown,
}

impl OrderState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderState::Filled | OrderState::Cancelled | OrderState::Rejected
        )
    }
}

/// Per-symbol holding, always a read-through projection of the broker's
/// authoritative position table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub currency: String,
    pub quantity: f64,
    pub avg_cost: f64,
    pub unrealized_pnl: f64,
}

impl Position {
    /// Flat position for a symbol the broker has no record of.
    pub fn flat(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            currency: String::new(),
            quantity: 0.0,
            avg_cost: 0.0,
            unrealized_pnl: 0.0,
        }
    }
}

/// One OHLCV row from a data grabber. Grabbers return rows ordered by
/// timestamp ascending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instrument_parsing() {
        let inst: Instrument = "SOXL-USD-SPOT".parse().unwrap();
        assert_eq!(inst.symbol, "SOXL");
        assert_eq!(inst.currency, "USD");
        assert_eq!(inst.trade_type, TradeType::Spot);
        assert_eq!(inst.to_string(), "SOXL-USD-SPOT");
    }

    #[test]
    fn test_instrument_parsing_is_case_insensitive() {
        let inst: Instrument = "googl-usd-perp".parse().unwrap();
        assert_eq!(inst.symbol, "GOOGL");
        assert_eq!(inst.trade_type, TradeType::Perp);
    }

    #[test]
    fn test_malformed_instrument_rejected() {
        for bad in ["SOXL", "SOXL-USD", "SOXL-USD-SPOT-X", "-USD-SPOT"] {
            let err = bad.parse::<Instrument>().unwrap_err();
            assert!(matches!(err, TradingError::InvalidInstrument(_)), "{bad}");
        }
    }

    #[test]
    fn test_unknown_trade_type_rejected() {
        let err = "SOXL-USD-SWAP".parse::<Instrument>().unwrap_err();
        assert!(matches!(err, TradingError::UnknownTradeType(t) if t == "SWAP"));
    }

    #[test]
    fn test_side_from_quantity_sign() {
        let inst: Instrument = "AAPL-USD-SPOT".parse().unwrap();
        assert_eq!(OrderInstruction::market(inst.clone(), 50.0).side(), OrderSide::Buy);
        assert_eq!(OrderInstruction::market(inst, -10.0).side(), OrderSide::Sell);
    }

    #[test]
    fn test_terminal_states() {
        assert!(OrderState::Filled.is_terminal());
        assert!(OrderState::Cancelled.is_terminal());
        assert!(OrderState::Rejected.is_terminal());
        assert!(!OrderState::Submitted.is_terminal());
        assert!(!OrderState::PartiallyFilled.is_terminal());
        assert!(!OrderState::Unknown.is_terminal());
    }
}
