//! Reporting and export: JSON, CSV, and Markdown artifact generation.
//!
//! - **JSON**: full round-trip serialization with schema versioning
//! - **CSV**: trade tape, equity curve, and the per-day decision log
//! - **Markdown**: a human-readable single-run summary
//!
//! All persisted artifacts include a `schema_version` field. Unknown versions
//! are rejected on load.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use sentrade_core::broker::{EquityPoint, TradeRecord};
use sentrade_core::policy::{Action, HoldReason, IterationReport};

use crate::runner::{BacktestResult, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Trade tape, one row per closed lot.
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "symbol",
        "side",
        "quantity",
        "entry_date",
        "entry_price",
        "exit_date",
        "exit_price",
        "pnl",
        "exit_reason",
    ])?;

    for t in trades {
        wtr.write_record([
            t.symbol.clone(),
            t.side.to_string(),
            t.quantity.to_string(),
            t.entry_date.to_string(),
            format!("{:.4}", t.entry_price),
            t.exit_date.to_string(),
            format!("{:.4}", t.exit_price),
            format!("{:.2}", t.pnl),
            exit_reason_str(t).to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

fn exit_reason_str(t: &TradeRecord) -> &'static str {
    use sentrade_core::broker::ExitReason;
    match t.exit_reason {
        ExitReason::TakeProfit => "take_profit",
        ExitReason::StopLoss => "stop_loss",
        ExitReason::Liquidation => "liquidation",
        ExitReason::EndOfBacktest => "end_of_backtest",
    }
}

/// Equity marked at each close.
pub fn export_equity_csv(equity_curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "cash", "position", "equity"])?;
    for p in equity_curve {
        wtr.write_record([
            p.date.to_string(),
            format!("{:.2}", p.cash),
            p.position.to_string(),
            format!("{:.2}", p.equity),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// One row per iteration: inputs, sentiment, and what was done.
pub fn export_decisions_csv(iterations: &[IterationReport]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "date",
        "cash",
        "last_price",
        "quantity",
        "headlines",
        "label",
        "probability",
        "action",
        "side",
        "liquidated",
    ])?;
    for r in iterations {
        let (action, side, liquidated) = match &r.action {
            Action::Hold { reason } => (format!("hold:{}", hold_reason_str(*reason)), "", false),
            Action::Enter {
                liquidate_first,
                order,
            } => ("enter".to_string(), order.side.as_str(), *liquidate_first),
        };
        wtr.write_record([
            r.date.to_string(),
            format!("{:.2}", r.sizing.cash),
            format!("{:.4}", r.sizing.last_price),
            r.sizing.quantity.to_string(),
            r.headline_count.to_string(),
            r.sentiment.label.to_string(),
            format!("{:.6}", r.sentiment.probability),
            action,
            side.to_string(),
            liquidated.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

fn hold_reason_str(reason: HoldReason) -> &'static str {
    match reason {
        HoldReason::InsufficientCash => "insufficient_cash",
        HoldReason::InvalidPrice => "invalid_price",
        HoldReason::NoSignal => "no_signal",
    }
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a single backtest run.
///
/// Creates `{symbol}_{run_id prefix}/` under `output_dir` containing
/// `manifest.json`, `trades.csv`, `equity.csv` and `decisions.csv`.
/// Returns the path to the created directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let prefix = result.run_id.get(..12).unwrap_or(&result.run_id);
    let run_dir = output_dir.join(format!("{}_{prefix}", result.symbol));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("manifest.json"), export_json(result)?)?;
    std::fs::write(run_dir.join("trades.csv"), export_trades_csv(&result.trades)?)?;
    std::fs::write(run_dir.join("equity.csv"), export_equity_csv(&result.equity_curve)?)?;
    std::fs::write(
        run_dir.join("decisions.csv"),
        export_decisions_csv(&result.iterations)?,
    )?;

    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory's manifest.json.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}

// ─── Markdown report ────────────────────────────────────────────────

/// Markdown summary of a single backtest run.
pub fn generate_report(result: &BacktestResult) -> String {
    let m = &result.metrics;
    let mut md = String::with_capacity(1024);

    md.push_str("# Backtest Report\n\n");
    md.push_str("| Field | Value |\n| --- | --- |\n");
    let _ = writeln!(md, "| Symbol | {} |", result.symbol);
    let _ = writeln!(md, "| Period | {} to {} |", result.start_date, result.end_date);
    let _ = writeln!(md, "| Bars | {} |", result.bar_count);
    let _ = writeln!(md, "| Model | {} |", result.model);
    let _ = writeln!(md, "| Cash at risk | {} |", result.config.cash_at_risk);
    let _ = writeln!(md, "| Initial cash | {:.2} |", result.initial_cash);
    let _ = writeln!(md, "| Final cash | {:.2} |", result.final_cash);
    let _ = writeln!(md, "| Run ID | `{}` |", result.run_id);

    md.push_str("\n## Performance\n\n| Metric | Value |\n| --- | --- |\n");
    let _ = writeln!(md, "| Total return | {} |", pct(m.total_return));
    let _ = writeln!(md, "| CAGR | {} |", pct(m.cagr));
    let _ = writeln!(md, "| Sharpe | {:.3} |", m.sharpe);
    let _ = writeln!(md, "| Max drawdown | {} |", pct(m.max_drawdown));
    let _ = writeln!(md, "| Win rate | {} |", pct(m.win_rate));
    let _ = writeln!(md, "| Profit factor | {:.2} |", m.profit_factor);
    let _ = writeln!(md, "| Trades | {} |", m.trade_count);
    let _ = writeln!(md, "| Orders submitted | {} |", result.order_count());
    md
}

fn pct(v: f64) -> String {
    format!("{:.2}%", v * 100.0)
}
