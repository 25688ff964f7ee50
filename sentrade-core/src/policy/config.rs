//! Policy parameters.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PolicyConfigError {
    #[error("cash_at_risk must be in (0, 1], got {0}")]
    CashAtRisk(f64),

    #[error("confidence_threshold must be in [0, 1), got {0}")]
    Threshold(f64),

    #[error("{name} must be positive and finite, got {value}")]
    Multiplier { name: &'static str, value: f64 },

    #[error("symbol must not be empty")]
    EmptySymbol,
}

/// Tunable constants of the sentiment policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub symbol: String,
    /// Fraction of cash committed to each new entry.
    pub cash_at_risk: f64,
    /// A trade needs strictly greater confidence than this.
    pub confidence_threshold: f64,
    /// Headline window length ending today.
    pub lookback_days: u32,
    pub long_take_profit: f64,
    pub long_stop_loss: f64,
    pub short_take_profit: f64,
    pub short_stop_loss: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            symbol: "SPY".to_string(),
            cash_at_risk: 0.5,
            confidence_threshold: 0.999,
            lookback_days: 3,
            long_take_profit: 1.20,
            long_stop_loss: 0.95,
            short_take_profit: 0.80,
            short_stop_loss: 1.05,
        }
    }
}

impl PolicyConfig {
    /// Default parameters for `symbol` with the given cash at risk.
    pub fn new(symbol: impl Into<String>, cash_at_risk: f64) -> Self {
        Self {
            symbol: symbol.into(),
            cash_at_risk,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), PolicyConfigError> {
        if self.symbol.trim().is_empty() {
            return Err(PolicyConfigError::EmptySymbol);
        }
        if !(self.cash_at_risk > 0.0 && self.cash_at_risk <= 1.0) {
            return Err(PolicyConfigError::CashAtRisk(self.cash_at_risk));
        }
        if !(0.0..1.0).contains(&self.confidence_threshold) {
            return Err(PolicyConfigError::Threshold(self.confidence_threshold));
        }
        for (name, value) in [
            ("long_take_profit", self.long_take_profit),
            ("long_stop_loss", self.long_stop_loss),
            ("short_take_profit", self.short_take_profit),
            ("short_stop_loss", self.short_stop_loss),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(PolicyConfigError::Multiplier { name, value });
            }
        }
        Ok(())
    }
}
