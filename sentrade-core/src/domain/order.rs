//! Bracket orders handed to the broker.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Entry side of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }

    /// +1 for buys, -1 for sells.
    pub fn sign(&self) -> f64 {
        match self {
            OrderSide::Buy => 1.0,
            OrderSide::Sell => -1.0,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A market entry with an attached take-profit and stop-loss exit.
///
/// The policy does not track the order after submission; fills, partial
/// fills and rejections belong to the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketOrder {
    pub symbol: String,
    pub quantity: u64,
    pub side: OrderSide,
    pub take_profit_price: f64,
    pub stop_loss_price: f64,
}

impl BracketOrder {
    /// Buy entry with exits at `last_price * take_profit` and `last_price * stop_loss`.
    pub fn long(
        symbol: impl Into<String>,
        quantity: u64,
        last_price: f64,
        take_profit: f64,
        stop_loss: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
            side: OrderSide::Buy,
            take_profit_price: last_price * take_profit,
            stop_loss_price: last_price * stop_loss,
        }
    }

    /// Sell entry; for a short the target sits below and the stop above the price.
    pub fn short(
        symbol: impl Into<String>,
        quantity: u64,
        last_price: f64,
        take_profit: f64,
        stop_loss: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
            side: OrderSide::Sell,
            take_profit_price: last_price * take_profit,
            stop_loss_price: last_price * stop_loss,
        }
    }
}
