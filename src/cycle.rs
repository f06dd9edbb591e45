// =============================================================================
// Trading Cycle — one cron-triggered pass of the confluence strategy
// =============================================================================
//
// Order of operations, unchanged from the experiment:
//   1. Acquire the lock file (abort if a cycle is already running).
//   2. Load (or initialize) the portfolio state.
//   3. Stop if the lifetime trade cap is reached and nothing is open.
//   4. Fetch the current ticker price — no price, no cycle.
//   5. If in a position, evaluate SL/TP first; a hit sells and ends the
//      cycle without consulting any signal.
//   6. Collect the technical prediction (fatal on failure) and the sentiment
//      snapshot (never fails — sources degrade to neutral).
//   7. Score the confluence and apply the threshold rule.
//   8. Route the verdict through the risk gate and the execution engine.
//   9. Persist state, journal the trade, notify.
//
// The lock is released on every path out of this function, including errors.
// =============================================================================

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::binance::client::BinanceClient;
use crate::config::BotConfig;
use crate::execution::ExecutionEngine;
use crate::model;
use crate::notifier::{self, TelegramNotifier};
use crate::portfolio::{CycleLock, PortfolioState};
use crate::risk::{self, RiskGate};
use crate::sentiment;
use crate::signals::{ConfluenceScorer, Verdict};
use crate::trade_log::{self, TradeRecord};
use crate::types::{AccountMode, ExitReason};

/// Run one full trading cycle.
pub async fn execute(cfg: &BotConfig) -> Result<()> {
    let _lock = CycleLock::acquire(&cfg.lock_path)?;

    info!(
        symbol = %cfg.symbol,
        mode = %cfg.account_mode,
        testnet = cfg.testnet,
        "==================== cycle start ===================="
    );

    let mut state = PortfolioState::load_or_init(&cfg.state_path, cfg.initial_capital)?;

    // The experiment halts at the trade cap, but an open position must still
    // be managed down to its exit.
    if state.total_trades >= cfg.risk.max_total_trades && !state.in_position {
        info!(
            total_trades = state.total_trades,
            cap = cfg.risk.max_total_trades,
            "trade cap reached — experiment finished"
        );
        return Ok(());
    }

    let client = match cfg.account_mode {
        AccountMode::Paper => Arc::new(BinanceClient::public()),
        AccountMode::Live => Arc::new(BinanceClient::from_env(cfg.testnet)?),
    };
    let engine = ExecutionEngine::new(client.clone(), cfg.account_mode);
    let telegram = TelegramNotifier::from_env();

    let price = client
        .get_ticker_price(&cfg.symbol)
        .await
        .context("aborting cycle: could not fetch the current price")?;

    info!(
        price,
        cash = format!("{:.2}", state.cash_usd),
        equity = format!("{:.2}", state.equity(price)),
        total_trades = state.total_trades,
        "portfolio snapshot"
    );

    let today = Utc::now().format("%Y-%m-%d").to_string();

    // ── Open-position management ────────────────────────────────────────────
    if state.in_position {
        info!(
            price,
            stop_loss = state.stop_loss_price,
            take_profit = state.take_profit_price,
            "managing open position"
        );

        if let Some(reason) = risk::check_exit(&state, price) {
            close_position(cfg, &engine, &telegram, &mut state, price, reason, &today).await?;
            info!("==================== cycle end ====================");
            return Ok(());
        }
    }

    // ── Signal collection ───────────────────────────────────────────────────
    info!("searching for a confluence entry signal");

    let tech_class = model::latest_prediction(&client, &cfg.symbol, &cfg.interval, &cfg.model_path)
        .await
        .context("aborting cycle: technical prediction failed")?;
    let snapshot = sentiment::collect_all(&cfg.cache_path).await;

    // ── Scoring & decision ──────────────────────────────────────────────────
    let scorer = ConfluenceScorer::new(cfg.weights.clone(), cfg.buy_threshold, cfg.sell_threshold);
    let breakdown = scorer.score(tech_class, &snapshot);
    let verdict = scorer.decide(&breakdown, state.in_position);

    match verdict {
        Verdict::Buy => {
            let gate = RiskGate::new(cfg.risk.clone(), cfg.initial_capital);
            let (allowed, reason) = gate.can_enter(&state, &today);
            if !allowed {
                info!(
                    reason = reason.as_deref().unwrap_or("unknown"),
                    "buy signal suppressed by the risk gate"
                );
                return Ok(());
            }

            info!(
                score = format!("{:+.2}", breakdown.total_score),
                "buy threshold reached — executing entry"
            );

            let result = engine.execute_buy(&cfg.symbol, price, cfg.trade_size_usd).await;
            if !result.is_fill() {
                warn!(result = %result, "buy was not filled — state unchanged");
                return Ok(());
            }

            let quantity = state.apply_buy(
                price,
                cfg.trade_size_usd,
                cfg.risk.stop_loss_pct,
                cfg.risk.take_profit_pct,
            );
            state.save(&cfg.state_path)?;

            trade_log::append(
                &cfg.trade_log_path,
                &TradeRecord {
                    timestamp: Utc::now().to_rfc3339(),
                    action: "BUY".to_string(),
                    symbol: cfg.symbol.clone(),
                    price,
                    quantity,
                    value_usd: cfg.trade_size_usd,
                    pnl: None,
                    reason: Some("confluence".to_string()),
                    mode: cfg.account_mode.to_string(),
                },
            )?;

            telegram
                .send(&notifier::format_buy_message(
                    &cfg.symbol,
                    price,
                    state.stop_loss_price,
                    state.take_profit_price,
                ))
                .await;
        }
        Verdict::Sell => {
            info!(
                score = format!("{:+.2}", breakdown.total_score),
                "sell threshold reached — closing position on confluence"
            );
            close_position(
                cfg,
                &engine,
                &telegram,
                &mut state,
                price,
                ExitReason::ConfluenceSell,
                &today,
            )
            .await?;
        }
        Verdict::Hold => {
            info!(
                score = format!("{:+.2}", breakdown.total_score),
                in_position = state.in_position,
                "no actionable confluence — holding"
            );
        }
    }

    info!("==================== cycle end ====================");
    Ok(())
}

/// Sell the whole open position at `price` and settle the books.
///
/// A failed live order leaves the position (and its SL/TP levels) armed for
/// the next cycle.
async fn close_position(
    cfg: &BotConfig,
    engine: &ExecutionEngine,
    telegram: &TelegramNotifier,
    state: &mut PortfolioState,
    price: f64,
    reason: ExitReason,
    today: &str,
) -> Result<()> {
    let quantity = state.asset_holding;

    let result = engine.execute_sell(&cfg.symbol, price, quantity).await;
    if !result.is_fill() {
        warn!(result = %result, "sell was not filled — position stays open");
        return Ok(());
    }

    let pnl = state.apply_sell(price);
    state.record_trade_result(pnl, today);
    state.save(&cfg.state_path)?;

    trade_log::append(
        &cfg.trade_log_path,
        &TradeRecord {
            timestamp: Utc::now().to_rfc3339(),
            action: "SELL".to_string(),
            symbol: cfg.symbol.clone(),
            price,
            quantity,
            value_usd: quantity * price,
            pnl: Some(pnl),
            reason: Some(reason.to_string()),
            mode: cfg.account_mode.to_string(),
        },
    )?;

    telegram
        .send(&notifier::format_sell_message(
            &cfg.symbol,
            price,
            &reason.to_string(),
            pnl,
        ))
        .await;

    Ok(())
}
