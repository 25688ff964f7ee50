//! Cash-at-risk sweep: the same backtest over several sizing fractions.

use rayon::prelude::*;
use std::sync::Arc;

use sentrade_core::domain::Bar;
use sentrade_core::news::NewsSource;
use sentrade_core::policy::PolicyConfig;
use sentrade_core::sentiment::SentimentEstimator;

use crate::runner::{run_backtest_from_bars, BacktestResult, RunError};

/// Values to sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepGrid {
    pub cash_at_risk: Vec<f64>,
}

impl SweepGrid {
    /// 0.1 through 1.0 in steps of 0.1.
    pub fn default_grid() -> Self {
        Self {
            cash_at_risk: (1..=10).map(|i| i as f64 / 10.0).collect(),
        }
    }

    pub fn size(&self) -> usize {
        self.cash_at_risk.len()
    }

    /// One config per grid value, in grid order.
    pub fn generate_configs(&self, base: &PolicyConfig) -> Vec<PolicyConfig> {
        self.cash_at_risk
            .iter()
            .map(|&car| PolicyConfig {
                cash_at_risk: car,
                ..base.clone()
            })
            .collect()
    }
}

/// Sweep executor over pre-loaded bars.
pub struct ParamSweep {
    estimator: SentimentEstimator,
    news: Arc<dyn NewsSource>,
    parallel: bool,
}

impl ParamSweep {
    pub fn new(estimator: SentimentEstimator, news: Arc<dyn NewsSource>) -> Self {
        Self {
            estimator,
            news,
            parallel: true,
        }
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Run every grid value. Results keep grid order; the first error aborts.
    pub fn sweep(
        &self,
        grid: &SweepGrid,
        base: &PolicyConfig,
        bars: &[Bar],
        initial_cash: f64,
        dataset_hash: &str,
    ) -> Result<SweepResults, RunError> {
        let configs = grid.generate_configs(base);
        let run = |config: &PolicyConfig| {
            run_backtest_from_bars(
                config,
                bars.to_vec(),
                initial_cash,
                self.estimator.clone(),
                Arc::clone(&self.news),
                dataset_hash,
            )
        };

        let results = if self.parallel {
            configs.par_iter().map(run).collect::<Result<Vec<_>, _>>()?
        } else {
            configs.iter().map(run).collect::<Result<Vec<_>, _>>()?
        };
        Ok(SweepResults { results })
    }
}

/// Results from a sweep, in grid order.
#[derive(Debug)]
pub struct SweepResults {
    results: Vec<BacktestResult>,
}

impl SweepResults {
    pub fn all(&self) -> &[BacktestResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Result with the highest total return; ties go to the earlier grid value.
    pub fn best_by_total_return(&self) -> Option<&BacktestResult> {
        self.results.iter().reduce(|best, r| {
            if r.metrics.total_return > best.metrics.total_return {
                r
            } else {
                best
            }
        })
    }
}
