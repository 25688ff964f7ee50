//! Broker boundary.
//!
//! The policy only needs five capabilities from a broker: account cash, a
//! last trade price, the broker's clock, bracket-order submission, and
//! full liquidation. Two implementations:
//! - [`AlpacaBroker`]: live or paper trading over Alpaca's REST API
//! - [`SimulatedBroker`]: daily-bar replay for backtests

pub mod alpaca;
pub mod simulated;

pub use alpaca::{AlpacaBroker, MarketClock};
pub use simulated::{EquityPoint, ExitReason, SimulatedBroker, SimulationReport, TradeRecord};

use crate::domain::BracketOrder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from order routing and account queries.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("broker returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("order rejected: {0}")]
    Rejected(String),

    #[error("no price available for {symbol}")]
    NoPrice { symbol: String },

    #[error("liquidation not confirmed: {open_positions} position(s) still open")]
    LiquidationUnconfirmed { open_positions: usize },

    #[error("malformed broker response: {0}")]
    Malformed(String),

    #[error("replay has no bars")]
    NoBars,
}

/// Broker acknowledgement of a submitted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub id: String,
    pub status: String,
}

/// What the trading policy needs from a broker.
pub trait Broker {
    /// Human-readable name of this broker.
    fn name(&self) -> &str;

    /// Cash available in the account.
    fn cash(&self) -> Result<f64, BrokerError>;

    /// Most recent trade price for `symbol`.
    fn last_price(&self, symbol: &str) -> Result<f64, BrokerError>;

    /// The broker's current time (simulated in backtests).
    fn now(&self) -> Result<DateTime<Utc>, BrokerError>;

    /// Submit a bracket order.
    fn submit_order(&mut self, order: &BracketOrder) -> Result<OrderAck, BrokerError>;

    /// Close every open position and cancel open orders.
    ///
    /// Must not return `Ok` until the account is flat, so an order submitted
    /// right after sees settled cash.
    fn sell_all(&mut self) -> Result<(), BrokerError>;
}
