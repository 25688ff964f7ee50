//! Sentrade CLI: backtest, sweep, live trading and cache management.
//!
//! Commands:
//! - `backtest`: replay the policy over cached or downloaded daily bars
//! - `sweep`: backtest a grid of cash-at-risk values in parallel
//! - `live`: drive the policy against Alpaca until stopped
//! - `sentiment`: score headlines with the configured estimator
//! - `news`: fetch (and memoize) headlines for a symbol and window
//! - `cache status` / `cache clear`: inspect or empty the on-disk caches

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sentrade_core::data::{BarCache, DataProvider, YahooProvider};
use sentrade_core::domain::news::headlines;
use sentrade_core::news::{CachedNews, OfflineNews};
use sentrade_core::policy::TradingPolicy;
use sentrade_runner::config::inference_token_from_env;
use sentrade_runner::export::{generate_report, save_artifacts};
use sentrade_runner::{
    build_broker, build_estimator, build_news, load_bars, run_live, run_single_backtest,
    BacktestResult, BotConfig, Credentials, LiveOptions, LoadOptions, ParamSweep, SweepGrid,
};

#[derive(Parser)]
#[command(
    name = "sentrade",
    version,
    about = "News-sentiment bracket-order trading bot"
)]
struct Cli {
    /// Path to the TOML config. Defaults apply when the file is absent.
    #[arg(long, global = true, default_value = "sentrade.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay the policy over daily bars with the simulated broker.
    Backtest {
        /// Override the configured start date (YYYY-MM-DD).
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Override the configured end date (YYYY-MM-DD).
        #[arg(long)]
        end: Option<NaiveDate>,

        /// No network access: bars and news come from the caches only.
        #[arg(long, default_value_t = false)]
        offline: bool,

        /// Re-download bars even if cached.
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Output directory for artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Backtest a grid of cash-at-risk values.
    Sweep {
        /// Cash-at-risk values to try. Defaults to 0.1 through 1.0.
        #[arg(long, value_delimiter = ',')]
        cash_at_risk: Vec<f64>,

        /// No network access.
        #[arg(long, default_value_t = false)]
        offline: bool,

        /// Run the grid on one thread.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Output directory for the best run's artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Trade against Alpaca. Credentials come from the environment.
    Live {
        /// Stop after this many iterations.
        #[arg(long)]
        max_iterations: Option<usize>,
    },
    /// Score headlines with the configured estimator.
    Sentiment {
        #[arg(required = true)]
        headlines: Vec<String>,
    },
    /// Fetch headlines for a symbol over an inclusive date window.
    News {
        symbol: String,

        #[arg(long)]
        start: NaiveDate,

        #[arg(long)]
        end: NaiveDate,

        /// Serve from the memo only.
        #[arg(long, default_value_t = false)]
        offline: bool,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report cached bars and memoized news windows.
    Status,
    /// Remove every cached bar file and news window.
    Clear,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Backtest {
            start,
            end,
            offline,
            force,
            output_dir,
        } => run_backtest_cmd(config, start, end, offline, force, &output_dir),
        Commands::Sweep {
            cash_at_risk,
            offline,
            sequential,
            output_dir,
        } => run_sweep_cmd(config, cash_at_risk, offline, sequential, &output_dir),
        Commands::Live { max_iterations } => run_live_cmd(config, max_iterations),
        Commands::Sentiment { headlines } => run_sentiment_cmd(&config, &headlines),
        Commands::News {
            symbol,
            start,
            end,
            offline,
        } => run_news_cmd(&config, &symbol, start, end, offline),
        Commands::Cache { action } => match action {
            CacheAction::Status => run_cache_status(&config.cache_root()),
            CacheAction::Clear => run_cache_clear(&config.cache_root()),
        },
    }
}

fn load_config(path: &Path) -> Result<BotConfig> {
    if path.exists() {
        let config = BotConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?;
        info!(path = %path.display(), "loaded config");
        Ok(config)
    } else {
        warn!(path = %path.display(), "config not found, using defaults");
        Ok(BotConfig::default())
    }
}

/// Credentials are optional for offline commands.
fn optional_credentials() -> Option<Credentials> {
    match Credentials::from_env() {
        Ok(creds) => Some(creds),
        Err(e) => {
            warn!(error = %e, "no Alpaca credentials");
            None
        }
    }
}

fn run_backtest_cmd(
    mut config: BotConfig,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    offline: bool,
    force: bool,
    output_dir: &Path,
) -> Result<()> {
    if let Some(start) = start {
        config.backtest.start = start;
    }
    if let Some(end) = end {
        config.backtest.end = end;
    }
    config.validate()?;

    let credentials = if offline { None } else { optional_credentials() };
    let estimator = build_estimator(&config.sentiment, inference_token_from_env())?;
    let news = build_news(&config, credentials.as_ref(), offline)?;

    let cache = BarCache::new(config.cache_root());
    let provider = YahooProvider::new()?;
    let provider_ref: Option<&dyn DataProvider> = if offline { None } else { Some(&provider) };
    let opts = LoadOptions {
        start: config.backtest.start,
        end: config.backtest.end,
        offline,
        force,
    };

    let result = run_single_backtest(
        &config.strategy,
        config.backtest.initial_cash,
        &cache,
        provider_ref,
        &opts,
        estimator,
        news,
    )?;

    print_summary(&result);
    let run_dir = save_artifacts(&result, output_dir)?;
    std::fs::write(run_dir.join("report.md"), generate_report(&result))?;
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn run_sweep_cmd(
    config: BotConfig,
    cash_at_risk: Vec<f64>,
    offline: bool,
    sequential: bool,
    output_dir: &Path,
) -> Result<()> {
    let grid = if cash_at_risk.is_empty() {
        SweepGrid::default_grid()
    } else {
        SweepGrid { cash_at_risk }
    };
    for config in grid.generate_configs(&config.strategy) {
        config.validate()?;
    }

    let credentials = if offline { None } else { optional_credentials() };
    let estimator = build_estimator(&config.sentiment, inference_token_from_env())?;
    let news = build_news(&config, credentials.as_ref(), offline)?;

    let cache = BarCache::new(config.cache_root());
    let provider = YahooProvider::new()?;
    let provider_ref: Option<&dyn DataProvider> = if offline { None } else { Some(&provider) };
    let opts = LoadOptions {
        start: config.backtest.start,
        end: config.backtest.end,
        offline,
        force: false,
    };
    let loaded = load_bars(&config.strategy.symbol, &cache, provider_ref, &opts)?;

    info!(runs = grid.size(), bars = loaded.bars.len(), "starting sweep");
    let results = ParamSweep::new(estimator, news)
        .with_parallelism(!sequential)
        .sweep(
            &grid,
            &config.strategy,
            &loaded.bars,
            config.backtest.initial_cash,
            &loaded.dataset_hash,
        )?;

    println!();
    println!(
        "{:<8} {:>10} {:>10} {:>10} {:>8} {:>8}",
        "CaR", "Return", "Sharpe", "MaxDD", "Trades", "Orders"
    );
    println!("{}", "-".repeat(60));
    for r in results.all() {
        println!(
            "{:<8.2} {:>9.2}% {:>10.3} {:>9.2}% {:>8} {:>8}",
            r.config.cash_at_risk,
            r.metrics.total_return * 100.0,
            r.metrics.sharpe,
            r.metrics.max_drawdown * 100.0,
            r.metrics.trade_count,
            r.order_count(),
        );
    }

    if let Some(best) = results.best_by_total_return() {
        println!();
        println!(
            "Best cash at risk: {:.2} ({:.2}% total return)",
            best.config.cash_at_risk,
            best.metrics.total_return * 100.0
        );
        let run_dir = save_artifacts(best, output_dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn run_live_cmd(config: BotConfig, max_iterations: Option<usize>) -> Result<()> {
    let credentials = Credentials::from_env().context("live trading needs Alpaca credentials")?;
    let estimator = build_estimator(&config.sentiment, inference_token_from_env())?;
    let news = build_news(&config, Some(&credentials), false)?;
    let broker = build_broker(&config, &credentials)?;

    info!(
        symbol = %config.strategy.symbol,
        paper = config.broker.paper,
        interval_secs = config.live.interval_secs,
        "starting live trading"
    );
    let mut policy = TradingPolicy::new(config.strategy.clone(), estimator, news, broker)?;
    let opts = LiveOptions {
        interval: config.live.interval(),
        max_iterations,
    };
    let completed = run_live(&mut policy, &opts, std::thread::sleep)?;
    println!("Completed {completed} iteration(s).");
    Ok(())
}

fn run_sentiment_cmd(config: &BotConfig, texts: &[String]) -> Result<()> {
    let estimator = build_estimator(&config.sentiment, inference_token_from_env())?;
    let result = estimator.estimate(texts)?;
    println!("Model:       {}", estimator.model_name());
    println!("Headlines:   {}", texts.len());
    println!("Label:       {}", result.label);
    println!("Probability: {:.4}", result.probability);
    println!(
        "Tradeable:   {}",
        result.probability > config.strategy.confidence_threshold
    );
    Ok(())
}

fn run_news_cmd(
    config: &BotConfig,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    offline: bool,
) -> Result<()> {
    let credentials = if offline { None } else { optional_credentials() };
    let news = build_news(config, credentials.as_ref(), offline)?;
    let events = news
        .fetch(symbol, start, end)
        .with_context(|| format!("failed to fetch news for {symbol}"))?;

    println!("{} headline(s) for {symbol} from {start} to {end}", events.len());
    for event in &events {
        println!(
            "{}  {:<12} {}",
            event.created_at.format("%Y-%m-%d %H:%M"),
            event.source,
            event.headline
        );
    }
    if !events.is_empty() {
        let estimator = build_estimator(&config.sentiment, inference_token_from_env())?;
        let result = estimator.estimate(&headlines(&events))?;
        println!();
        println!("Aggregate: {} ({:.4})", result.label, result.probability);
    }
    Ok(())
}

fn run_cache_status(cache_root: &Path) -> Result<()> {
    let bars = BarCache::new(cache_root);
    let metas = bars.list()?;

    println!("Cache: {}", cache_root.display());
    println!();
    if metas.is_empty() {
        println!("No cached bars.");
    } else {
        println!("{:<8} {:<25} {:>8} {:<10}", "Symbol", "Bars cover", "Count", "Source");
        println!("{}", "-".repeat(55));
        for meta in &metas {
            println!(
                "{:<8} {:<25} {:>8} {:<10}",
                meta.symbol,
                format!("{} to {}", meta.first_bar, meta.last_bar),
                meta.bar_count,
                meta.source
            );
        }
    }

    let news = CachedNews::new(OfflineNews, cache_root).status()?;
    println!();
    println!(
        "News windows: {} ({} headlines, {})",
        news.entries,
        news.events,
        format_size(news.bytes)
    );
    for (symbol, windows) in &news.symbols {
        println!("  {symbol}: {windows} window(s)");
    }
    Ok(())
}

fn run_cache_clear(cache_root: &Path) -> Result<()> {
    let bars = BarCache::new(cache_root).clear()?;
    let news = CachedNews::new(OfflineNews, cache_root).clear()?;
    println!("Removed {bars} bar file(s) and {news} news window(s).");
    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    println!();
    println!("=== Backtest Result ===");
    println!("Symbol:         {}", result.symbol);
    println!("Period:         {} to {}", result.start_date, result.end_date);
    println!("Bars:           {}", result.bar_count);
    println!("Model:          {}", result.model);
    println!("Cash at risk:   {}", result.config.cash_at_risk);
    println!("Orders:         {}", result.order_count());
    println!("Trades:         {}", m.trade_count);
    println!();
    println!("--- Performance ---");
    println!("Final cash:     {:.2}", result.final_cash);
    println!("Total Return:   {:.2}%", m.total_return * 100.0);
    println!("CAGR:           {:.2}%", m.cagr * 100.0);
    println!("Sharpe:         {:.3}", m.sharpe);
    println!("Max Drawdown:   {:.2}%", m.max_drawdown * 100.0);
    println!("Win Rate:       {:.1}%", m.win_rate * 100.0);
    println!("Profit Factor:  {:.2}", m.profit_factor);
    println!("Max Consec Loss:{}", m.max_consecutive_losses);
    println!();
}
