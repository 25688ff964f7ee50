//! Live host loop: one policy iteration per interval while the market is open.

use std::time::Duration;

use thiserror::Error;
use tracing::info;

use sentrade_core::broker::{AlpacaBroker, Broker, BrokerError, MarketClock};
use sentrade_core::policy::{PolicyError, TradingPolicy};

/// Minimum wait when the clock reports closed, so a stale `next_open` cannot spin.
const MIN_CLOSED_WAIT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum LiveError {
    #[error("market clock unavailable: {0}")]
    Clock(#[from] BrokerError),
    #[error("iteration failed: {0}")]
    Policy(#[from] PolicyError),
}

/// Brokers that can report market hours.
pub trait MarketCalendar {
    fn market_clock(&self) -> Result<MarketClock, BrokerError>;
}

impl MarketCalendar for AlpacaBroker {
    fn market_clock(&self) -> Result<MarketClock, BrokerError> {
        self.clock()
    }
}

#[derive(Debug, Clone)]
pub struct LiveOptions {
    /// Sleep after each iteration.
    pub interval: Duration,
    /// Stop after this many iterations; `None` runs until an error.
    pub max_iterations: Option<usize>,
}

/// How long to wait for the next open, given a closed clock.
pub fn wait_until_open(clock: &MarketClock) -> Duration {
    (clock.next_open - clock.timestamp)
        .to_std()
        .unwrap_or(Duration::ZERO)
        .max(MIN_CLOSED_WAIT)
}

/// Drive the policy. Returns the number of completed iterations.
///
/// `sleep` is injected so tests can run the loop without waiting.
pub fn run_live<B, S>(
    policy: &mut TradingPolicy<B>,
    opts: &LiveOptions,
    mut sleep: S,
) -> Result<usize, LiveError>
where
    B: Broker + MarketCalendar,
    S: FnMut(Duration),
{
    let mut completed = 0;
    loop {
        if opts.max_iterations.is_some_and(|max| completed >= max) {
            return Ok(completed);
        }

        let clock = policy.broker().market_clock()?;
        if !clock.is_open {
            let wait = wait_until_open(&clock);
            info!(next_open = %clock.next_open, wait_secs = wait.as_secs(), "market closed, waiting for open");
            sleep(wait);
            continue;
        }

        let report = policy.on_trading_iteration()?;
        completed += 1;
        info!(
            date = %report.date,
            cash = report.sizing.cash,
            last_price = report.sizing.last_price,
            headlines = report.headline_count,
            label = %report.sentiment.label,
            probability = report.sentiment.probability,
            action = ?report.action,
            "iteration complete"
        );
        sleep(opts.interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use sentrade_core::broker::OrderAck;
    use sentrade_core::domain::{BracketOrder, NewsEvent};
    use sentrade_core::news::{NewsError, NewsSource};
    use sentrade_core::policy::PolicyConfig;
    use sentrade_core::sentiment::{LexiconClassifier, SentimentEstimator};
    use std::cell::Cell;
    use std::sync::Arc;

    struct NoNews;

    impl NewsSource for NoNews {
        fn name(&self) -> &str {
            "none"
        }
        fn fetch(
            &self,
            _symbol: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<NewsEvent>, NewsError> {
            Ok(vec![])
        }
    }

    /// Closed on the first clock read, open afterwards.
    struct ScriptedBroker {
        clock_reads: Cell<usize>,
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    impl MarketCalendar for ScriptedBroker {
        fn market_clock(&self) -> Result<MarketClock, BrokerError> {
            let n = self.clock_reads.get();
            self.clock_reads.set(n + 1);
            Ok(MarketClock {
                timestamp: at(12),
                is_open: n > 0,
                next_open: at(14),
                next_close: at(21),
            })
        }
    }

    impl Broker for ScriptedBroker {
        fn name(&self) -> &str {
            "scripted"
        }
        fn cash(&self) -> Result<f64, BrokerError> {
            Ok(10_000.0)
        }
        fn last_price(&self, _symbol: &str) -> Result<f64, BrokerError> {
            Ok(400.0)
        }
        fn now(&self) -> Result<DateTime<Utc>, BrokerError> {
            Ok(at(15))
        }
        fn submit_order(&mut self, _order: &BracketOrder) -> Result<OrderAck, BrokerError> {
            Err(BrokerError::Rejected("no orders expected".into()))
        }
        fn sell_all(&mut self) -> Result<(), BrokerError> {
            Ok(())
        }
    }

    #[test]
    fn waits_for_open_then_iterates_on_interval() {
        let mut policy = TradingPolicy::new(
            PolicyConfig::default(),
            SentimentEstimator::new(Arc::new(LexiconClassifier::new())),
            Arc::new(NoNews),
            ScriptedBroker {
                clock_reads: Cell::new(0),
            },
        )
        .unwrap();
        let opts = LiveOptions {
            interval: Duration::from_secs(86_400),
            max_iterations: Some(2),
        };

        let mut sleeps = Vec::new();
        let completed = run_live(&mut policy, &opts, |d| sleeps.push(d)).unwrap();

        assert_eq!(completed, 2);
        assert_eq!(
            sleeps,
            vec![
                Duration::from_secs(2 * 3600),
                Duration::from_secs(86_400),
                Duration::from_secs(86_400),
            ]
        );
    }

    #[test]
    fn stale_next_open_waits_a_minimum() {
        let clock = MarketClock {
            timestamp: at(14),
            is_open: false,
            next_open: at(14),
            next_close: at(21),
        };
        assert_eq!(wait_until_open(&clock), MIN_CLOSED_WAIT);
    }
}
