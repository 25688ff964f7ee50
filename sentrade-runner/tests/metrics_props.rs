//! Property tests for the performance metrics.

use chrono::NaiveDate;
use proptest::prelude::*;
use sentrade_core::broker::{ExitReason, TradeRecord};
use sentrade_core::domain::OrderSide;
use sentrade_runner::metrics::{max_drawdown, profit_factor, total_return, win_rate};

fn trade(pnl: f64) -> TradeRecord {
    let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    TradeRecord {
        symbol: "SPY".into(),
        side: OrderSide::Buy,
        quantity: 1,
        entry_date: date,
        entry_price: 100.0,
        exit_date: date,
        exit_price: 100.0 + pnl,
        pnl,
        exit_reason: ExitReason::EndOfBacktest,
    }
}

fn equity_curve() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1.0f64..1_000_000.0, 2..60)
}

proptest! {
    #[test]
    fn drawdown_is_a_nonpositive_fraction(curve in equity_curve()) {
        let dd = max_drawdown(&curve);
        prop_assert!(dd <= 0.0);
        prop_assert!(dd > -1.0);
    }

    #[test]
    fn monotone_curve_has_no_drawdown(mut curve in equity_curve()) {
        curve.sort_by(f64::total_cmp);
        prop_assert_eq!(max_drawdown(&curve), 0.0);
        prop_assert!(total_return(&curve) >= 0.0);
    }

    #[test]
    fn win_rate_is_a_fraction(pnls in prop::collection::vec(-500.0f64..500.0, 0..40)) {
        let trades: Vec<TradeRecord> = pnls.iter().copied().map(trade).collect();
        let rate = win_rate(&trades);
        prop_assert!((0.0..=1.0).contains(&rate));
    }

    #[test]
    fn profit_factor_is_bounded(pnls in prop::collection::vec(-500.0f64..500.0, 0..40)) {
        let trades: Vec<TradeRecord> = pnls.iter().copied().map(trade).collect();
        let pf = profit_factor(&trades);
        prop_assert!(pf.is_finite());
        prop_assert!((0.0..=100.0).contains(&pf));
    }
}
