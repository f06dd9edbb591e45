// =============================================================================
// Confluence Bot — Main Entry Point
// =============================================================================
//
// One subcommand per stage of the experiment.  `cycle` is the cron target:
// each invocation runs a single pass of the confluence strategy and exits,
// with all state persisted to disk between runs.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod backtest;
mod binance;
mod config;
mod cycle;
mod execution;
mod features;
mod indicators;
mod market_data;
mod model;
mod notifier;
mod portfolio;
mod report;
mod risk;
mod sentiment;
mod signals;
mod simulate;
mod trade_log;
mod types;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::binance::client::BinanceClient;
use crate::config::BotConfig;
use crate::market_data::history;

#[derive(Parser, Debug)]
#[command(version, about = "BTC confluence trading bot: model + sentiment signals, cron-cycle execution")]
struct Cli {
    /// Path to the bot configuration file.
    #[arg(long, default_value = "bot_config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download kline history into the CSV archive (resumable).
    Fetch {
        /// How many days of history to cover when starting from scratch.
        #[arg(long, default_value_t = 60)]
        days: u32,
    },
    /// Grid-search and fit the classifier on the stored history.
    Train {
        /// RNG seed for reproducible subsampling.
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Print the model's signal for the latest complete candle.
    Predict,
    /// Run one trading cycle (the cron target).
    Cycle,
    /// SMA-crossover backtest over the stored history.
    Backtest,
    /// Extract SMA+RSI signals with simulated returns and CSV export.
    Simulate {
        /// Suppress buys when RSI is at or above this level.
        #[arg(long, default_value_t = 70.0)]
        rsi_buy_max: f64,
        /// Suppress sells when RSI is at or below this level.
        #[arg(long, default_value_t = 30.0)]
        rsi_sell_min: f64,
        /// Drop candles whose volume sits below this quantile.
        #[arg(long, default_value_t = 0.2)]
        volume_quantile: f64,
        /// Where to write the extracted signal rows.
        #[arg(long, default_value = "signals.csv")]
        out: PathBuf,
    },
    /// Performance metrics from the trade journal.
    Report,
    /// Collect and print every sentiment signal (diagnostic).
    Sentiment,
    /// Send a test Telegram notification.
    NotifyTest,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let cfg = BotConfig::load(&cli.config).unwrap_or_else(|e| {
        warn!(error = %e, "failed to load config — using defaults");
        BotConfig::default()
    });

    match cli.command {
        Command::Fetch { days } => run_fetch(&cfg, days).await,
        Command::Train { seed } => run_train(&cfg, seed),
        Command::Predict => run_predict(&cfg).await,
        Command::Cycle => cycle::execute(&cfg).await,
        Command::Backtest => run_backtest(&cfg),
        Command::Simulate {
            rsi_buy_max,
            rsi_sell_min,
            volume_quantile,
            out,
        } => run_simulate(&cfg, rsi_buy_max, rsi_sell_min, volume_quantile, &out),
        Command::Report => run_report(&cfg),
        Command::Sentiment => run_sentiment(&cfg).await,
        Command::NotifyTest => run_notify_test().await,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Subcommand orchestration
// ─────────────────────────────────────────────────────────────────────────────

/// Download (or extend) the kline archive.
async fn run_fetch(cfg: &BotConfig, days: u32) -> Result<()> {
    let client = BinanceClient::public();

    // Resume from the stored history when possible; otherwise go back `days`.
    let default_start = Utc::now().timestamp_millis() - days as i64 * 86_400_000;
    let start_ms = if cfg.history_path.exists() {
        let existing = history::load(&cfg.history_path)?;
        existing
            .last()
            .map(|c| c.open_time + 1)
            .unwrap_or(default_start)
    } else {
        default_start
    };

    info!(
        symbol = %cfg.symbol,
        interval = %cfg.interval,
        start_ms,
        "downloading kline history"
    );

    let candles = client
        .get_klines_range(&cfg.symbol, &cfg.interval, start_ms)
        .await?;
    let appended = history::append_new(&cfg.history_path, &candles)?;

    println!(
        "Fetched {} candles, appended {} new rows to {}",
        candles.len(),
        appended,
        cfg.history_path.display()
    );
    Ok(())
}

/// Grid-search, refit, persist, and log the classifier.
fn run_train(cfg: &BotConfig, seed: u64) -> Result<()> {
    let candles = history::load(&cfg.history_path)
        .context("no candle history — run `fetch` first")?;

    let frame = features::build(&candles, true)?;
    info!(
        rows = frame.n_rows(),
        positive_rate = format!("{:.4}", frame.positive_rate()),
        "training frame assembled"
    );

    let outcome = model::trainer::grid_search(&frame, &model::trainer::default_grid(), 5, seed)?;
    outcome.model.save(&cfg.model_path)?;
    model::trainer::append_training_log(&cfg.training_log_path, &outcome.report)?;

    println!("Best parameters:       {:?}", outcome.report.best_params);
    println!("Best CV accuracy:      {:.4}", outcome.report.best_cv_accuracy);
    println!(
        "Full-data accuracy:    {:.4}",
        outcome.report.final_accuracy_on_full_data
    );
    println!("Model saved to:        {}", cfg.model_path.display());

    println!("\nFeature importance:");
    for (name, weight) in outcome.model.feature_importance() {
        println!("  {name:<18} {weight:.3}");
    }
    Ok(())
}

/// One-shot model prediction on fresh data.
async fn run_predict(cfg: &BotConfig) -> Result<()> {
    let client = BinanceClient::public();
    let class =
        model::latest_prediction(&client, &cfg.symbol, &cfg.interval, &cfg.model_path).await?;

    if class == 1 {
        println!("RESULT: BUY signal (model predicts the next candle closes higher)");
    } else {
        println!("RESULT: SELL signal (model predicts the next candle closes lower)");
    }
    Ok(())
}

fn run_backtest(cfg: &BotConfig) -> Result<()> {
    let candles = history::load(&cfg.history_path)
        .context("no candle history — run `fetch` first")?;
    let result = backtest::run(&candles, cfg.initial_capital)?;
    backtest::print_report(&result);
    Ok(())
}

fn run_simulate(
    cfg: &BotConfig,
    rsi_buy_max: f64,
    rsi_sell_min: f64,
    volume_quantile: f64,
    out: &PathBuf,
) -> Result<()> {
    let candles = history::load(&cfg.history_path)
        .context("no candle history — run `fetch` first")?;
    let result = simulate::run(&candles, rsi_buy_max, rsi_sell_min, volume_quantile)?;

    println!(
        "Simulated total return: {:.4} ({:.2}%)",
        result.total_return,
        result.total_return * 100.0
    );
    println!(
        "Mean return per signal: {:.4} ({:.2}%)",
        result.mean_return,
        result.mean_return * 100.0
    );
    println!("Signals extracted:      {}", result.signals.len());

    simulate::export_csv(out, &result.signals)?;
    println!("Signals written to:     {}", out.display());
    Ok(())
}

fn run_report(cfg: &BotConfig) -> Result<()> {
    let records = trade_log::read_all(&cfg.trade_log_path)?;
    match report::analyze(&records, cfg.initial_capital) {
        Some(result) => report::print_report(&result),
        None => println!("No completed sells in the journal yet — nothing to report."),
    }
    Ok(())
}

async fn run_sentiment(cfg: &BotConfig) -> Result<()> {
    let snapshot = sentiment::collect_all(&cfg.cache_path).await;
    println!("Collected sentiment signals:");
    println!("  Twitter/X:     {}", snapshot.twitter);
    println!("  Fear & Greed:  {}", snapshot.fear_greed);
    println!("  News:          {}", snapshot.news);
    Ok(())
}

async fn run_notify_test() -> Result<()> {
    let telegram = notifier::TelegramNotifier::from_env();
    let sent = telegram
        .send("Hello! This is a test notification from your *confluence trading bot*.")
        .await;

    if sent {
        println!("Test notification delivered — check your Telegram chat.");
    } else {
        println!("Delivery failed — check the logs and your Telegram credentials in .env.");
    }
    Ok(())
}
