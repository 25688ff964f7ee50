//! Daily-bar replay broker for backtests.
//!
//! One trading iteration per bar, at the open:
//! - `now()` is the bar date, `last_price()` the bar open
//! - entries fill immediately at the open
//! - each filled entry becomes a lot with its own stop-loss / take-profit
//!   pair (one-cancels-other)
//!
//! Per bar the host calls, in order:
//! 1. [`SimulatedBroker::settle_open`]: lots whose stop or target was gapped
//!    through close at the open, so the iteration sees settled cash
//! 2. the policy iteration
//! 3. [`SimulatedBroker::settle_day`]: remaining children are checked against
//!    the bar's range and equity is marked at the close
//!
//! Children are never eligible on their entry bar. When both levels are
//! touched inside one bar the stop wins.

use super::{Broker, BrokerError, OrderAck};
use crate::domain::{Bar, BracketOrder, OrderSide};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Why a lot was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    Liquidation,
    EndOfBacktest,
}

/// A closed round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: u64,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub exit_date: NaiveDate,
    pub exit_price: f64,
    pub pnl: f64,
    pub exit_reason: ExitReason,
}

impl TradeRecord {
    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }
}

/// Account state at a bar close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub cash: f64,
    /// Net signed share count.
    pub position: i64,
    pub equity: f64,
}

/// Everything the replay produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
    pub final_cash: f64,
}

/// An open entry and its exit levels.
#[derive(Debug, Clone)]
struct Lot {
    side: OrderSide,
    quantity: u64,
    entry_price: f64,
    entry_date: NaiveDate,
    take_profit: f64,
    stop_loss: f64,
    opened_at: usize,
}

pub struct SimulatedBroker {
    symbol: String,
    bars: Vec<Bar>,
    cursor: usize,
    cash: f64,
    lots: Vec<Lot>,
    trades: Vec<TradeRecord>,
    equity_curve: Vec<EquityPoint>,
    next_order_id: u64,
}

impl SimulatedBroker {
    /// Bars must be sorted by date ascending.
    pub fn new(
        symbol: impl Into<String>,
        bars: Vec<Bar>,
        initial_cash: f64,
    ) -> Result<Self, BrokerError> {
        if bars.is_empty() {
            return Err(BrokerError::NoBars);
        }
        Ok(Self {
            symbol: symbol.into(),
            bars,
            cursor: 0,
            cash: initial_cash,
            lots: Vec::new(),
            trades: Vec::new(),
            equity_curve: Vec::new(),
            next_order_id: 1,
        })
    }

    pub fn current_bar(&self) -> &Bar {
        &self.bars[self.cursor]
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    /// Net signed share count across open lots.
    pub fn position(&self) -> i64 {
        self.lots
            .iter()
            .map(|l| match l.side {
                OrderSide::Buy => l.quantity as i64,
                OrderSide::Sell => -(l.quantity as i64),
            })
            .sum()
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    /// Move to the next bar. Returns false when the replay is exhausted.
    pub fn advance(&mut self) -> bool {
        if self.cursor + 1 < self.bars.len() {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    /// Close eligible lots whose stop or target lies beyond the current open.
    pub fn settle_open(&mut self) {
        let bar = self.bars[self.cursor].clone();
        let mut still_open = Vec::with_capacity(self.lots.len());

        for lot in std::mem::take(&mut self.lots) {
            if lot.opened_at < self.cursor {
                if let Some(reason) = gap_exit(&lot, bar.open) {
                    self.close_lot(lot, bar.open, bar.date, reason);
                    continue;
                }
            }
            still_open.push(lot);
        }
        self.lots = still_open;
    }

    /// Trigger eligible exits on the current bar, then mark equity at its close.
    pub fn settle_day(&mut self) {
        let bar = self.bars[self.cursor].clone();
        let mut still_open = Vec::with_capacity(self.lots.len());

        for lot in std::mem::take(&mut self.lots) {
            if lot.opened_at >= self.cursor {
                still_open.push(lot);
                continue;
            }
            match exit_for(&lot, &bar) {
                Some((price, reason)) => self.close_lot(lot, price, bar.date, reason),
                None => still_open.push(lot),
            }
        }
        self.lots = still_open;

        let position = self.position();
        self.equity_curve.push(EquityPoint {
            date: bar.date,
            cash: self.cash,
            position,
            equity: self.cash + position as f64 * bar.close,
        });
    }

    /// Close whatever is still open at the last close and hand back the results.
    pub fn finish(mut self) -> SimulationReport {
        let bar = self.bars[self.cursor].clone();
        for lot in std::mem::take(&mut self.lots) {
            self.close_lot(lot, bar.close, bar.date, ExitReason::EndOfBacktest);
        }
        if let Some(last) = self.equity_curve.last_mut() {
            if last.date == bar.date {
                last.cash = self.cash;
                last.position = 0;
                last.equity = self.cash;
            }
        }
        SimulationReport {
            trades: self.trades,
            equity_curve: self.equity_curve,
            final_cash: self.cash,
        }
    }

    fn close_lot(&mut self, lot: Lot, price: f64, date: NaiveDate, reason: ExitReason) {
        let qty = lot.quantity as f64;
        // Long exits sell (cash in), short exits buy to cover (cash out).
        self.cash += lot.side.sign() * qty * price;
        let pnl = lot.side.sign() * qty * (price - lot.entry_price);
        debug!(side = %lot.side, qty = lot.quantity, price, pnl, ?reason, %date, "lot closed");
        self.trades.push(TradeRecord {
            symbol: self.symbol.clone(),
            side: lot.side,
            quantity: lot.quantity,
            entry_date: lot.entry_date,
            entry_price: lot.entry_price,
            exit_date: date,
            exit_price: price,
            pnl,
            exit_reason: reason,
        });
    }
}

/// Exit reason when the open is already past a level.
fn gap_exit(lot: &Lot, open: f64) -> Option<ExitReason> {
    let (stopped, targeted) = match lot.side {
        OrderSide::Buy => (open <= lot.stop_loss, open >= lot.take_profit),
        OrderSide::Sell => (open >= lot.stop_loss, open <= lot.take_profit),
    };
    if stopped {
        Some(ExitReason::StopLoss)
    } else if targeted {
        Some(ExitReason::TakeProfit)
    } else {
        None
    }
}

/// Exit price and reason for a lot on this bar, if any level is reached.
fn exit_for(lot: &Lot, bar: &Bar) -> Option<(f64, ExitReason)> {
    if let Some(reason) = gap_exit(lot, bar.open) {
        return Some((bar.open, reason));
    }
    match lot.side {
        OrderSide::Buy => {
            if bar.low <= lot.stop_loss {
                Some((lot.stop_loss, ExitReason::StopLoss))
            } else if bar.high >= lot.take_profit {
                Some((lot.take_profit, ExitReason::TakeProfit))
            } else {
                None
            }
        }
        OrderSide::Sell => {
            if bar.high >= lot.stop_loss {
                Some((lot.stop_loss, ExitReason::StopLoss))
            } else if bar.low <= lot.take_profit {
                Some((lot.take_profit, ExitReason::TakeProfit))
            } else {
                None
            }
        }
    }
}

impl Broker for SimulatedBroker {
    fn name(&self) -> &str {
        "simulated"
    }

    fn cash(&self) -> Result<f64, BrokerError> {
        Ok(self.cash)
    }

    fn last_price(&self, symbol: &str) -> Result<f64, BrokerError> {
        let open = self.current_bar().open;
        if symbol != self.symbol || !open.is_finite() {
            return Err(BrokerError::NoPrice {
                symbol: symbol.to_string(),
            });
        }
        Ok(open)
    }

    fn now(&self) -> Result<DateTime<Utc>, BrokerError> {
        let date = self.current_bar().date;
        date.and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .ok_or_else(|| BrokerError::Malformed(format!("invalid bar date {date}")))
    }

    fn submit_order(&mut self, order: &BracketOrder) -> Result<OrderAck, BrokerError> {
        if order.symbol != self.symbol {
            return Err(BrokerError::Rejected(format!(
                "replay only trades {}, got {}",
                self.symbol, order.symbol
            )));
        }

        let id = self.next_order_id.to_string();
        self.next_order_id += 1;

        if order.quantity == 0 {
            return Ok(OrderAck {
                id,
                status: "filled".to_string(),
            });
        }

        let price = self.last_price(&order.symbol)?;
        let notional = order.quantity as f64 * price;
        if notional > self.cash {
            return Err(BrokerError::Rejected(format!(
                "insufficient cash: need {notional:.2}, have {:.2}",
                self.cash
            )));
        }

        // Buying spends cash; selling short receives it.
        self.cash -= order.side.sign() * notional;
        self.lots.push(Lot {
            side: order.side,
            quantity: order.quantity,
            entry_price: price,
            entry_date: self.current_bar().date,
            take_profit: order.take_profit_price,
            stop_loss: order.stop_loss_price,
            opened_at: self.cursor,
        });

        Ok(OrderAck {
            id,
            status: "filled".to_string(),
        })
    }

    fn sell_all(&mut self) -> Result<(), BrokerError> {
        let price = self.last_price(&self.symbol)?;
        let date = self.current_bar().date;
        for lot in std::mem::take(&mut self.lots) {
            self.close_lot(lot, price, date, ExitReason::Liquidation);
        }
        Ok(())
    }
}
