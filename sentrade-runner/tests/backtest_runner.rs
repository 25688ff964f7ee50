//! Integration tests for the runner: the policy over synthetic bars and headlines.

use chrono::NaiveDate;
use sentrade_core::broker::ExitReason;
use sentrade_core::data::BarCache;
use sentrade_core::domain::{Bar, NewsEvent, OrderSide};
use sentrade_core::news::{NewsError, NewsSource};
use sentrade_core::policy::PolicyConfig;
use sentrade_core::sentiment::{LexiconClassifier, SentimentEstimator};
use sentrade_runner::data_loader::{BarSource, LoadError, LoadOptions};
use sentrade_runner::export::{generate_report, load_artifacts, save_artifacts};
use sentrade_runner::runner::{run_backtest_from_bars, run_single_backtest, RunError};
use sentrade_runner::sweep::{ParamSweep, SweepGrid};
use std::sync::Arc;

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
}

fn flat_bars(days: &[u32]) -> Vec<Bar> {
    days.iter()
        .map(|&day| Bar {
            date: d(day),
            open: 100.0,
            high: 101.0,
            low: 99.0,
            close: 100.0,
            volume: 50_000,
        })
        .collect()
}

/// Returns the same bullish headlines for every window that contains day 2.
struct EarlyRally;

impl NewsSource for EarlyRally {
    fn name(&self) -> &str {
        "early-rally"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NewsEvent>, NewsError> {
        if d(2) < start || d(2) > end {
            return Ok(Vec::new());
        }
        Ok([
            "Stocks surge as earnings beat estimates",
            "Shares rally to record gains on strong growth",
        ]
        .iter()
        .enumerate()
        .map(|(i, headline)| NewsEvent {
            id: i as u64,
            headline: headline.to_string(),
            summary: String::new(),
            source: "test".into(),
            author: String::new(),
            created_at: d(2).and_hms_opt(12, 0, 0).unwrap().and_utc(),
            symbols: vec![symbol.to_string()],
            url: None,
        })
        .collect())
    }
}

fn estimator() -> SentimentEstimator {
    SentimentEstimator::new(Arc::new(LexiconClassifier::new()))
}

#[test]
fn backtest_reports_trades_metrics_and_equity() {
    let config = PolicyConfig::new("SPY", 0.5);
    let bars = flat_bars(&[2, 3, 4, 5]);
    let result = run_backtest_from_bars(
        &config,
        bars,
        10_000.0,
        estimator(),
        Arc::new(EarlyRally),
        "fixture",
    )
    .unwrap();

    assert_eq!(result.symbol, "SPY");
    assert_eq!(result.start_date, "2024-01-02");
    assert_eq!(result.end_date, "2024-01-05");
    assert_eq!(result.bar_count, 4);
    assert_eq!(result.iterations.len(), 4);
    assert_eq!(result.equity_curve.len(), 4);
    assert_eq!(result.model, "lexicon");

    // Day 2 enters long; flat prices never reach either bracket leg.
    let first = &result.iterations[0];
    let order = first.action.order().expect("day 2 should enter");
    assert_eq!(order.side, OrderSide::Buy);
    assert_eq!(order.quantity, 50);
    assert!(result.order_count() >= 1);

    assert!(!result.trades.is_empty());
    assert!(result
        .trades
        .iter()
        .all(|t| t.exit_reason == ExitReason::EndOfBacktest));
    assert_eq!(result.metrics.trade_count, result.trades.len());
    // Entry and exit at 100, so nothing was made or lost.
    assert!(result.metrics.total_return.abs() < 1e-9);
    assert!((result.final_cash - 10_000.0).abs() < 1e-9);
}

#[test]
fn identical_inputs_give_identical_run_ids() {
    let config = PolicyConfig::new("SPY", 0.5);
    let run = || {
        run_backtest_from_bars(
            &config,
            flat_bars(&[2, 3]),
            10_000.0,
            estimator(),
            Arc::new(EarlyRally),
            "fixture",
        )
        .unwrap()
    };
    let a = run();
    let b = run();
    assert_eq!(a.run_id, b.run_id);
    assert_eq!(a.metrics, b.metrics);
}

#[test]
fn empty_bars_are_rejected() {
    let config = PolicyConfig::new("SPY", 0.5);
    let err = run_backtest_from_bars(
        &config,
        Vec::new(),
        10_000.0,
        estimator(),
        Arc::new(EarlyRally),
        "fixture",
    )
    .unwrap_err();
    assert!(matches!(err, RunError::Broker(_)));
}

#[test]
fn artifacts_round_trip_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let config = PolicyConfig::new("SPY", 0.5);
    let result = run_backtest_from_bars(
        &config,
        flat_bars(&[2, 3, 4]),
        10_000.0,
        estimator(),
        Arc::new(EarlyRally),
        "fixture",
    )
    .unwrap();

    let run_dir = save_artifacts(&result, dir.path()).unwrap();
    for file in ["manifest.json", "trades.csv", "equity.csv", "decisions.csv"] {
        assert!(run_dir.join(file).exists(), "missing {file}");
    }

    let loaded = load_artifacts(&run_dir).unwrap();
    assert_eq!(loaded.run_id, result.run_id);
    assert_eq!(loaded.trades.len(), result.trades.len());
    assert_eq!(loaded.iterations.len(), result.iterations.len());
    assert_eq!(loaded.config, result.config);

    let report = generate_report(&loaded);
    assert!(report.contains("SPY"));
}

#[test]
fn sweep_keeps_grid_order_and_scales_quantity() {
    let base = PolicyConfig::new("SPY", 0.5);
    let grid = SweepGrid {
        cash_at_risk: vec![0.25, 0.5],
    };
    let bars = flat_bars(&[2, 3]);
    let sweep = ParamSweep::new(estimator(), Arc::new(EarlyRally));
    let results = sweep.sweep(&grid, &base, &bars, 10_000.0, "fixture").unwrap();

    assert_eq!(results.len(), 2);
    let quantities: Vec<u64> = results
        .all()
        .iter()
        .map(|r| r.iterations[0].action.order().unwrap().quantity)
        .collect();
    assert_eq!(quantities, vec![25, 50]);
    assert_eq!(results.all()[0].config.cash_at_risk, 0.25);
}

#[test]
fn parallel_and_sequential_sweeps_agree() {
    let base = PolicyConfig::new("SPY", 0.5);
    let grid = SweepGrid {
        cash_at_risk: vec![0.1, 0.3, 0.6, 0.9],
    };
    let bars = flat_bars(&[2, 3, 4]);

    let parallel = ParamSweep::new(estimator(), Arc::new(EarlyRally))
        .sweep(&grid, &base, &bars, 10_000.0, "fixture")
        .unwrap();
    let sequential = ParamSweep::new(estimator(), Arc::new(EarlyRally))
        .with_parallelism(false)
        .sweep(&grid, &base, &bars, 10_000.0, "fixture")
        .unwrap();

    let ids = |r: &sentrade_runner::sweep::SweepResults| {
        r.all().iter().map(|b| b.run_id.clone()).collect::<Vec<_>>()
    };
    assert_eq!(ids(&parallel), ids(&sequential));
}

#[test]
fn single_backtest_reads_from_cache_offline() {
    let dir = tempfile::tempdir().unwrap();
    let cache = BarCache::new(dir.path());
    let bars = flat_bars(&[2, 3, 4, 5]);
    cache.write("SPY", d(1), d(31), &bars, "fixture").unwrap();

    let opts = LoadOptions {
        start: d(3),
        end: d(5),
        offline: true,
        force: false,
    };
    let result = run_single_backtest(
        &PolicyConfig::new("SPY", 0.5),
        10_000.0,
        &cache,
        None,
        &opts,
        estimator(),
        Arc::new(EarlyRally),
    )
    .unwrap();

    assert_eq!(result.bar_source, Some(BarSource::Cache));
    assert_eq!(result.bar_count, 3);
    assert_eq!(result.start_date, "2024-01-03");
}

#[test]
fn single_backtest_offline_without_cache_fails() {
    let dir = tempfile::tempdir().unwrap();
    let cache = BarCache::new(dir.path());
    let opts = LoadOptions {
        start: d(2),
        end: d(5),
        offline: true,
        force: false,
    };
    let err = run_single_backtest(
        &PolicyConfig::new("SPY", 0.5),
        10_000.0,
        &cache,
        None,
        &opts,
        estimator(),
        Arc::new(EarlyRally),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        RunError::Data(LoadError::NoCachedDataOffline { .. })
    ));
}

/// Bullish headlines on day 2, bearish ones on day 8.
struct RallyThenSlump;

impl NewsSource for RallyThenSlump {
    fn name(&self) -> &str {
        "rally-then-slump"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NewsEvent>, NewsError> {
        let mut headlines: Vec<(NaiveDate, &str)> = Vec::new();
        if d(2) >= start && d(2) <= end {
            headlines.push((d(2), "Stocks surge as earnings beat estimates"));
            headlines.push((d(2), "Shares rally to record gains on strong growth"));
        }
        if d(8) >= start && d(8) <= end {
            headlines.push((
                d(8),
                "Stocks plunge and crash as losses mount in recession selloff",
            ));
            headlines.push((d(8), "Shares slump on weak outlook and layoffs"));
        }
        Ok(headlines
            .into_iter()
            .enumerate()
            .map(|(i, (day, headline))| NewsEvent {
                id: i as u64,
                headline: headline.to_string(),
                summary: String::new(),
                source: "test".into(),
                author: String::new(),
                created_at: day.and_hms_opt(12, 0, 0).unwrap().and_utc(),
                symbols: vec![symbol.to_string()],
                url: None,
            })
            .collect())
    }
}

#[test]
fn gap_through_stop_settles_before_a_reversal() {
    let bars = vec![
        Bar {
            date: d(2),
            open: 100.0,
            high: 101.0,
            low: 99.0,
            close: 100.0,
            volume: 50_000,
        },
        // Opens below the 95 stop of the day 2 long.
        Bar {
            date: d(8),
            open: 90.0,
            high: 91.0,
            low: 89.0,
            close: 90.0,
            volume: 50_000,
        },
    ];
    let result = run_backtest_from_bars(
        &PolicyConfig::new("SPY", 0.5),
        bars,
        10_000.0,
        estimator(),
        Arc::new(RallyThenSlump),
        "fixture",
    )
    .unwrap();

    // The iteration sees cash after the stop filled at the open.
    let reversal = &result.iterations[1];
    assert!((reversal.sizing.cash - 9_500.0).abs() < 1e-9);
    assert_eq!(reversal.action.order().unwrap().side, OrderSide::Sell);

    let long = result
        .trades
        .iter()
        .find(|t| t.side == OrderSide::Buy)
        .unwrap();
    assert_eq!(long.exit_reason, ExitReason::StopLoss);
    assert_eq!(long.exit_date, d(8));
    assert!((long.exit_price - 90.0).abs() < 1e-9);
    assert!(result
        .trades
        .iter()
        .all(|t| t.exit_reason != ExitReason::Liquidation));
}
