//! Sentrade Core: sentiment estimator, trading policy, and its collaborators.
//!
//! This crate contains everything one trading decision needs:
//! - Domain types (bars, news events, bracket orders)
//! - Sentiment estimation over a batch of headlines (logit sum → softmax → arg-max)
//! - The trading policy: sizing, the confidence gate, and liquidate-then-reverse
//! - News retrieval with an on-disk memo
//! - Broker boundary with a live Alpaca implementation and a bar-replay simulator
//! - Daily bar download and CSV caching for backtests

pub mod broker;
pub mod data;
pub mod domain;
pub mod news;
pub mod policy;
pub mod sentiment;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: shared types are Send + Sync.
    ///
    /// The sweep runs policies on rayon worker threads; if any of these
    /// stops being thread-safe the build breaks here first.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::NewsEvent>();
        require_sync::<domain::NewsEvent>();
        require_send::<domain::BracketOrder>();
        require_sync::<domain::BracketOrder>();

        // Estimator and classifiers
        require_send::<sentiment::SentimentEstimator>();
        require_sync::<sentiment::SentimentEstimator>();
        require_send::<sentiment::LexiconClassifier>();
        require_sync::<sentiment::LexiconClassifier>();
        require_send::<sentiment::InferenceClient>();
        require_sync::<sentiment::InferenceClient>();

        // News
        require_send::<news::AlpacaNewsClient>();
        require_sync::<news::AlpacaNewsClient>();
        require_send::<news::CachedNews<news::AlpacaNewsClient>>();
        require_sync::<news::CachedNews<news::AlpacaNewsClient>>();

        // Brokers and the policy over the simulator
        require_send::<broker::SimulatedBroker>();
        require_sync::<broker::SimulatedBroker>();
        require_send::<broker::AlpacaBroker>();
        require_send::<policy::TradingPolicy<broker::SimulatedBroker>>();

        // Policy values and reports
        require_send::<policy::PolicyConfig>();
        require_sync::<policy::PolicyConfig>();
        require_send::<policy::IterationReport>();
        require_sync::<policy::IterationReport>();
    }

    /// Architecture contract: `decide` sees sizing and sentiment only.
    ///
    /// It takes no broker, news or clock argument, so a decision cannot
    /// depend on anything but its two inputs and the last traded side.
    #[test]
    fn decide_takes_only_sizing_and_sentiment() {
        fn _check_signature(
            policy: &policy::TradingPolicy<broker::SimulatedBroker>,
            sizing: &policy::PositionSizing,
            sentiment: &sentiment::SentimentResult,
        ) -> policy::Action {
            policy.decide(sizing, sentiment)
        }
    }
}
