//! Backtest runner: replays daily bars through the trading policy.
//!
//! Two entry points:
//! - `run_single_backtest()`: loads bars (cache or download), then runs. Used by the CLI.
//! - `run_backtest_from_bars()`: takes pre-loaded bars. Used by the sweep.
//!
//! Each bar: exits gapped through at the open settle first, then exactly one
//! policy iteration runs at the open, then the simulated broker settles
//! intraday exits and marks equity at the close.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use sentrade_core::broker::{BrokerError, EquityPoint, SimulatedBroker, TradeRecord};
use sentrade_core::data::{BarCache, DataProvider};
use sentrade_core::domain::Bar;
use sentrade_core::news::NewsSource;
use sentrade_core::policy::{IterationReport, PolicyConfig, PolicyError, TradingPolicy};
use sentrade_core::sentiment::SentimentEstimator;

use crate::data_loader::{load_bars, BarSource, LoadError, LoadOptions};
use crate::metrics::PerformanceMetrics;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),
    #[error("policy error on {date}: {source}")]
    Policy {
        date: chrono::NaiveDate,
        source: PolicyError,
    },
    #[error("setup error: {0}")]
    Setup(String),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// BLAKE3 over config, model, range and dataset.
    pub run_id: String,
    pub symbol: String,
    pub start_date: String,
    pub end_date: String,
    pub initial_cash: f64,
    pub final_cash: f64,
    pub config: PolicyConfig,
    pub model: String,
    pub dataset_hash: String,
    pub bar_source: Option<BarSource>,
    pub bar_count: usize,
    pub metrics: PerformanceMetrics,
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
    pub iterations: Vec<IterationReport>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestResult {
    /// Number of iterations that submitted an order.
    pub fn order_count(&self) -> usize {
        self.iterations
            .iter()
            .filter(|r| r.action.order().is_some())
            .count()
    }
}

/// Load bars for the configured symbol, then run.
pub fn run_single_backtest(
    config: &PolicyConfig,
    initial_cash: f64,
    cache: &BarCache,
    provider: Option<&dyn DataProvider>,
    opts: &LoadOptions,
    estimator: SentimentEstimator,
    news: Arc<dyn NewsSource>,
) -> Result<BacktestResult, RunError> {
    let loaded = load_bars(&config.symbol, cache, provider, opts)?;
    let mut result = run_backtest_from_bars(
        config,
        loaded.bars,
        initial_cash,
        estimator,
        news,
        &loaded.dataset_hash,
    )?;
    result.bar_source = Some(loaded.source);
    Ok(result)
}

/// Run a backtest over pre-loaded bars. No bar I/O.
pub fn run_backtest_from_bars(
    config: &PolicyConfig,
    bars: Vec<Bar>,
    initial_cash: f64,
    estimator: SentimentEstimator,
    news: Arc<dyn NewsSource>,
    dataset_hash: &str,
) -> Result<BacktestResult, RunError> {
    let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
        return Err(RunError::Broker(BrokerError::NoBars));
    };
    let start_date = first.date.to_string();
    let end_date = last.date.to_string();
    let bar_count = bars.len();
    let model = estimator.model_name().to_string();

    let broker = SimulatedBroker::new(config.symbol.clone(), bars, initial_cash)?;
    let mut policy = TradingPolicy::new(config.clone(), estimator, news, broker)
        .map_err(|e| RunError::Setup(e.to_string()))?;

    let mut iterations = Vec::with_capacity(bar_count);
    loop {
        let date = policy.broker().current_bar().date;
        policy.broker_mut().settle_open();
        let report = policy
            .on_trading_iteration()
            .map_err(|source| RunError::Policy { date, source })?;
        iterations.push(report);

        policy.broker_mut().settle_day();
        if !policy.broker_mut().advance() {
            break;
        }
    }

    let sim = policy.into_broker().finish();
    let equity: Vec<f64> = std::iter::once(initial_cash)
        .chain(sim.equity_curve.iter().map(|p| p.equity))
        .collect();
    let metrics = PerformanceMetrics::compute(&equity, &sim.trades);

    let run_id = run_id(config, &model, &start_date, &end_date, initial_cash, dataset_hash);
    info!(
        symbol = %config.symbol,
        run_id = %&run_id[..12],
        trades = sim.trades.len(),
        total_return = metrics.total_return,
        "backtest complete"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id,
        symbol: config.symbol.clone(),
        start_date,
        end_date,
        initial_cash,
        final_cash: sim.final_cash,
        config: config.clone(),
        model,
        dataset_hash: dataset_hash.to_string(),
        bar_source: None,
        bar_count,
        metrics,
        trades: sim.trades,
        equity_curve: sim.equity_curve,
        iterations,
    })
}

/// Deterministic identifier for a run's inputs.
pub fn run_id(
    config: &PolicyConfig,
    model: &str,
    start_date: &str,
    end_date: &str,
    initial_cash: f64,
    dataset_hash: &str,
) -> String {
    let canonical = serde_json::json!({
        "config": config,
        "model": model,
        "start": start_date,
        "end": end_date,
        "initial_cash": initial_cash,
        "dataset_hash": dataset_hash,
    });
    blake3::hash(canonical.to_string().as_bytes())
        .to_hex()
        .to_string()
}
