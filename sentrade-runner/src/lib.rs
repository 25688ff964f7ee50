//! Sentrade Runner: hosts for the trading policy.
//!
//! This crate builds on `sentrade-core` to provide:
//! - Bot configuration (TOML plus environment credentials)
//! - Bar loading with cache/download fallback
//! - Backtest runner over the simulated broker, with metrics
//! - Cash-at-risk sweeps in parallel
//! - The live loop against Alpaca's market clock
//! - JSON/CSV/Markdown export of results

pub mod config;
pub mod data_loader;
pub mod export;
pub mod live;
pub mod metrics;
pub mod runner;
pub mod setup;
pub mod sweep;

pub use config::{BotConfig, ConfigError, Credentials, SentimentBackend};
pub use data_loader::{load_bars, BarSource, LoadError, LoadOptions, LoadedBars};
pub use live::{run_live, LiveError, LiveOptions, MarketCalendar};
pub use metrics::PerformanceMetrics;
pub use runner::{run_backtest_from_bars, run_single_backtest, BacktestResult, RunError};
pub use setup::{build_broker, build_estimator, build_news};
pub use sweep::{ParamSweep, SweepGrid, SweepResults};
