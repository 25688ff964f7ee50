//! Position sizing: a fixed fraction of cash, in whole shares.

use serde::{Deserialize, Serialize};

/// Inputs and output of one sizing pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSizing {
    pub cash: f64,
    pub last_price: f64,
    pub quantity: u64,
}

impl PositionSizing {
    pub fn compute(cash: f64, last_price: f64, cash_at_risk: f64) -> Self {
        Self {
            cash,
            last_price,
            quantity: quantity(cash, last_price, cash_at_risk),
        }
    }

    /// Whether at least one share is affordable.
    pub fn can_afford_one(&self) -> bool {
        self.cash > self.last_price
    }
}

/// `round(cash * cash_at_risk / last_price)` with ties to even.
///
/// Zero is a legitimate result. A non-positive or non-finite price, or a
/// non-positive notional, yields zero.
pub fn quantity(cash: f64, last_price: f64, cash_at_risk: f64) -> u64 {
    if !(last_price.is_finite() && last_price > 0.0) {
        return 0;
    }
    let shares = (cash * cash_at_risk / last_price).round_ties_even();
    if shares.is_finite() && shares > 0.0 {
        shares as u64
    } else {
        0
    }
}
