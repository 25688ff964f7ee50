//! The sentiment trading policy.
//!
//! Each iteration sizes a position from live cash and price, pulls the last
//! few days of headlines, estimates aggregate sentiment and decides between
//! three outcomes:
//! - strongly positive → (liquidate a short) then buy bracket
//! - strongly negative → (liquidate a long) then sell bracket
//! - anything else → hold
//!
//! [`TradingPolicy::decide`] is pure; [`TradingPolicy::on_trading_iteration`]
//! gathers its inputs from the injected collaborators and executes the
//! result. The host (backtest replay or live loop) owns the cadence.

pub mod config;
pub mod sizing;

pub use config::{PolicyConfig, PolicyConfigError};
pub use sizing::PositionSizing;

use crate::broker::{Broker, BrokerError, OrderAck};
use crate::domain::news::headlines;
use crate::domain::{BracketOrder, OrderSide};
use crate::news::{NewsError, NewsSource};
use crate::sentiment::{SentimentError, SentimentEstimator, SentimentLabel, SentimentResult};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that end a trading iteration. Nothing is retried.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid policy config: {0}")]
    Config(#[from] PolicyConfigError),

    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("news error: {0}")]
    News(#[from] NewsError),

    #[error("sentiment error: {0}")]
    Sentiment(#[from] SentimentError),
}

/// Why an iteration placed no order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldReason {
    /// Cash does not exceed the last price.
    InsufficientCash,
    /// The broker price is not a positive number.
    InvalidPrice,
    /// Neutral, or not confident enough.
    NoSignal,
}

/// Outcome of [`TradingPolicy::decide`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Hold { reason: HoldReason },
    Enter { liquidate_first: bool, order: BracketOrder },
}

impl Action {
    pub fn order(&self) -> Option<&BracketOrder> {
        match self {
            Action::Enter { order, .. } => Some(order),
            Action::Hold { .. } => None,
        }
    }
}

/// What one iteration saw and did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationReport {
    pub date: NaiveDate,
    pub window_start: NaiveDate,
    pub sizing: PositionSizing,
    pub headline_count: usize,
    pub sentiment: SentimentResult,
    pub action: Action,
    pub ack: Option<OrderAck>,
}

/// Headline window `[today - lookback_days, today]`.
pub fn lookback_window(now: DateTime<Utc>, lookback_days: u32) -> (NaiveDate, NaiveDate) {
    let today = now.date_naive();
    (today - Duration::days(i64::from(lookback_days)), today)
}

/// Sentiment policy bound to its collaborators.
pub struct TradingPolicy<B> {
    config: PolicyConfig,
    estimator: SentimentEstimator,
    news: Arc<dyn NewsSource>,
    broker: B,
    last_trade: Option<OrderSide>,
}

impl<B: Broker> TradingPolicy<B> {
    pub fn new(
        config: PolicyConfig,
        estimator: SentimentEstimator,
        news: Arc<dyn NewsSource>,
        broker: B,
    ) -> Result<Self, PolicyError> {
        config.validate()?;
        info!(
            symbol = %config.symbol,
            cash_at_risk = config.cash_at_risk,
            model = estimator.model_name(),
            news = news.name(),
            broker = broker.name(),
            "policy initialized"
        );
        Ok(Self {
            config,
            estimator,
            news,
            broker,
            last_trade: None,
        })
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Side of the last submitted entry, if any.
    pub fn last_trade(&self) -> Option<OrderSide> {
        self.last_trade
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn broker_mut(&mut self) -> &mut B {
        &mut self.broker
    }

    pub fn into_broker(self) -> B {
        self.broker
    }

    /// Map sizing and sentiment to an action. Reads `last_trade`, never writes it.
    pub fn decide(&self, sizing: &PositionSizing, sentiment: &SentimentResult) -> Action {
        let price = sizing.last_price;
        if !(price.is_finite() && price > 0.0) {
            return Action::Hold {
                reason: HoldReason::InvalidPrice,
            };
        }
        if !sizing.can_afford_one() {
            return Action::Hold {
                reason: HoldReason::InsufficientCash,
            };
        }

        let confident = sentiment.probability > self.config.confidence_threshold;
        let c = &self.config;
        match sentiment.label {
            SentimentLabel::Positive if confident => Action::Enter {
                liquidate_first: self.last_trade == Some(OrderSide::Sell),
                order: BracketOrder::long(
                    &c.symbol,
                    sizing.quantity,
                    price,
                    c.long_take_profit,
                    c.long_stop_loss,
                ),
            },
            SentimentLabel::Negative if confident => Action::Enter {
                liquidate_first: self.last_trade == Some(OrderSide::Buy),
                order: BracketOrder::short(
                    &c.symbol,
                    sizing.quantity,
                    price,
                    c.short_take_profit,
                    c.short_stop_loss,
                ),
            },
            _ => Action::Hold {
                reason: HoldReason::NoSignal,
            },
        }
    }

    /// Run one decision cycle against the collaborators.
    pub fn on_trading_iteration(&mut self) -> Result<IterationReport, PolicyError> {
        let symbol = self.config.symbol.clone();

        let now = self.broker.now()?;
        let cash = self.broker.cash()?;
        let last_price = self.broker.last_price(&symbol)?;
        let sizing = PositionSizing::compute(cash, last_price, self.config.cash_at_risk);

        let (start, end) = lookback_window(now, self.config.lookback_days);
        let events = self.news.fetch(&symbol, start, end)?;
        let texts = headlines(&events);
        let sentiment = self.estimator.estimate(&texts)?;

        let action = self.decide(&sizing, &sentiment);
        debug!(
            date = %end,
            cash,
            last_price,
            quantity = sizing.quantity,
            headlines = texts.len(),
            label = %sentiment.label,
            probability = sentiment.probability,
            ?action,
            "iteration decided"
        );

        let ack = self.execute(&action)?;

        Ok(IterationReport {
            date: end,
            window_start: start,
            sizing,
            headline_count: texts.len(),
            sentiment,
            action,
            ack,
        })
    }

    /// Liquidate if asked, submit, and only then record the side.
    fn execute(&mut self, action: &Action) -> Result<Option<OrderAck>, PolicyError> {
        let Action::Enter {
            liquidate_first,
            order,
        } = action
        else {
            return Ok(None);
        };

        if *liquidate_first {
            self.broker.sell_all()?;
            info!(symbol = %order.symbol, "liquidated opposing position");
        }

        let ack = self.broker.submit_order(order)?;
        self.last_trade = Some(order.side);
        info!(
            symbol = %order.symbol,
            side = %order.side,
            qty = order.quantity,
            take_profit = order.take_profit_price,
            stop_loss = order.stop_loss_price,
            order_id = %ack.id,
            "entered position"
        );
        Ok(Some(ack))
    }
}
