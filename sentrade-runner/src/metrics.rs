//! Performance metrics: pure functions that compute strategy statistics.
//!
//! Every metric is a pure function: equity curve and/or trade list in, scalar out.
//! No dependencies on the runner, data pipeline, or policy.

use sentrade_core::broker::TradeRecord;
use serde::{Deserialize, Serialize};

/// Trading days per year used for annualization.
pub const TRADING_DAYS: f64 = 252.0;

/// Aggregate performance metrics for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub cagr: f64,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub trade_count: usize,
    pub max_consecutive_losses: usize,
}

impl PerformanceMetrics {
    /// Compute all metrics from an equity curve and trade list.
    pub fn compute(equity_curve: &[f64], trades: &[TradeRecord]) -> Self {
        Self {
            total_return: total_return(equity_curve),
            cagr: cagr(equity_curve),
            sharpe: sharpe_ratio(equity_curve, 0.0),
            max_drawdown: max_drawdown(equity_curve),
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
            trade_count: trades.len(),
            max_consecutive_losses: max_consecutive_losses(trades),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    let (Some(&initial), Some(&final_eq)) = (equity_curve.first(), equity_curve.last()) else {
        return 0.0;
    };
    if equity_curve.len() < 2 || initial <= 0.0 {
        return 0.0;
    }
    (final_eq - initial) / initial
}

/// Compound annual growth rate over the curve's length in trading days.
///
/// Returns 0.0 for single-bar curves or non-positive endpoints.
pub fn cagr(equity_curve: &[f64]) -> f64 {
    let (Some(&initial), Some(&final_eq)) = (equity_curve.first(), equity_curve.last()) else {
        return 0.0;
    };
    if equity_curve.len() < 2 || initial <= 0.0 || final_eq <= 0.0 {
        return 0.0;
    }
    let years = (equity_curve.len() - 1) as f64 / TRADING_DAYS;
    (final_eq / initial).powf(1.0 / years) - 1.0
}

/// Annualized Sharpe ratio from daily returns.
///
/// Sharpe = mean(daily returns - rf) / std(daily returns) * sqrt(252).
/// Returns 0.0 if variance is zero or fewer than 2 returns.
pub fn sharpe_ratio(equity_curve: &[f64], risk_free_rate: f64) -> f64 {
    let returns = daily_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / TRADING_DAYS;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let std = std_dev(&excess);
    if std < 1e-15 {
        return 0.0;
    }
    (mean_f64(&excess) / std) * TRADING_DAYS.sqrt()
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        peak = peak.max(eq);
        if peak > 0.0 {
            max_dd = max_dd.min((eq - peak) / peak);
        }
    }
    max_dd
}

/// Fraction of trades that made money.
pub fn win_rate(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64
}

/// Gross profits / gross losses, capped at 100.0.
pub fn profit_factor(trades: &[TradeRecord]) -> f64 {
    let gross_profit: f64 = trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.pnl < 0.0)
        .map(|t| t.pnl.abs())
        .sum();

    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

/// Longest run of non-winning trades.
pub fn max_consecutive_losses(trades: &[TradeRecord]) -> usize {
    let mut max_streak = 0;
    let mut current = 0;
    for trade in trades {
        if trade.is_winner() {
            current = 0;
        } else {
            current += 1;
            max_streak = max_streak.max(current);
        }
    }
    max_streak
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Simple returns between consecutive equity points.
pub fn daily_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use sentrade_core::broker::ExitReason;
    use sentrade_core::domain::OrderSide;

    fn make_trade(pnl: f64) -> TradeRecord {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        TradeRecord {
            symbol: "SPY".into(),
            side: OrderSide::Buy,
            quantity: 10,
            entry_date: date,
            entry_price: 100.0,
            exit_date: date,
            exit_price: 100.0 + pnl / 10.0,
            pnl,
            exit_reason: ExitReason::TakeProfit,
        }
    }

    #[test]
    fn total_return_positive() {
        assert!((total_return(&[100.0, 110.0, 120.0]) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn total_return_degenerate() {
        assert_eq!(total_return(&[]), 0.0);
        assert_eq!(total_return(&[100.0]), 0.0);
    }

    #[test]
    fn cagr_one_year() {
        // 253 points = 252 daily steps = one year.
        let mut curve = vec![100.0; 253];
        curve[252] = 110.0;
        assert!((cagr(&curve) - 0.10).abs() < 1e-9);
    }

    #[test]
    fn cagr_constant_equity() {
        assert_eq!(cagr(&[100.0; 10]), 0.0);
    }

    #[test]
    fn sharpe_constant_equity_is_zero() {
        assert_eq!(sharpe_ratio(&[100.0; 10], 0.0), 0.0);
    }

    #[test]
    fn sharpe_positive_for_rising_noisy_curve() {
        let curve = [100.0, 101.0, 100.5, 102.0, 103.0, 102.5, 104.0];
        assert!(sharpe_ratio(&curve, 0.0) > 0.0);
    }

    #[test]
    fn max_drawdown_known() {
        let dd = max_drawdown(&[100.0, 120.0, 90.0, 130.0]);
        assert!((dd - (-0.25)).abs() < 1e-12);
    }

    #[test]
    fn max_drawdown_monotonic_increase() {
        assert_eq!(max_drawdown(&[100.0, 101.0, 102.0]), 0.0);
    }

    #[test]
    fn win_rate_mixed() {
        let trades = vec![make_trade(50.0), make_trade(-20.0), make_trade(10.0), make_trade(0.0)];
        assert!((win_rate(&trades) - 0.5).abs() < 1e-12);
        assert_eq!(win_rate(&[]), 0.0);
    }

    #[test]
    fn profit_factor_mixed() {
        let trades = vec![make_trade(60.0), make_trade(-20.0), make_trade(-10.0)];
        assert!((profit_factor(&trades) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn profit_factor_all_winners_capped() {
        assert_eq!(profit_factor(&[make_trade(10.0)]), 100.0);
        assert_eq!(profit_factor(&[]), 0.0);
    }

    #[test]
    fn consecutive_losses() {
        let trades = vec![
            make_trade(-1.0),
            make_trade(-1.0),
            make_trade(5.0),
            make_trade(-1.0),
            make_trade(-1.0),
            make_trade(-1.0),
        ];
        assert_eq!(max_consecutive_losses(&trades), 3);
    }

    #[test]
    fn compute_all_metrics_no_trades() {
        let m = PerformanceMetrics::compute(&[100.0, 100.0], &[]);
        assert_eq!(m.trade_count, 0);
        assert_eq!(m.total_return, 0.0);
        assert_eq!(m.win_rate, 0.0);
        assert_eq!(m.max_drawdown, 0.0);
    }
}
