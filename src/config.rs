// =============================================================================
// Bot Configuration — tunable settings with atomic save
// =============================================================================
//
// Every tunable parameter of the bot lives here so that a cron deployment can
// be adjusted without recompiling.  Secrets (exchange keys, Telegram and news
// API credentials) are NOT part of this file; they come from the environment.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
// =============================================================================

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::AccountMode;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbol() -> String {
    "BTCUSDT".to_string()
}

fn default_interval() -> String {
    "15m".to_string()
}

fn default_true() -> bool {
    true
}

fn default_trade_size_usd() -> f64 {
    20.0
}

fn default_initial_capital() -> f64 {
    1000.0
}

fn default_buy_threshold() -> f64 {
    3.0
}

fn default_sell_threshold() -> f64 {
    -3.0
}

fn default_stop_loss_pct() -> f64 {
    1.5
}

fn default_take_profit_pct() -> f64 {
    3.0
}

fn default_max_total_trades() -> u32 {
    50
}

fn default_max_daily_loss_pct() -> f64 {
    3.0
}

fn default_max_consecutive_losses() -> u32 {
    5
}

fn default_technical_weight() -> f64 {
    2.0
}

fn default_twitter_weight() -> f64 {
    1.5
}

fn default_fear_greed_weight() -> f64 {
    1.0
}

fn default_news_weight() -> f64 {
    0.5
}

fn default_history_path() -> PathBuf {
    PathBuf::from("data/btc_history.csv")
}

fn default_model_path() -> PathBuf {
    PathBuf::from("models/model.json")
}

fn default_state_path() -> PathBuf {
    PathBuf::from("portfolio_state.json")
}

fn default_lock_path() -> PathBuf {
    PathBuf::from("bot.lock")
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("sentiment_cache.json")
}

fn default_trade_log_path() -> PathBuf {
    PathBuf::from("logs/trades.jsonl")
}

fn default_training_log_path() -> PathBuf {
    PathBuf::from("training_log.jsonl")
}

// =============================================================================
// ConfluenceWeights
// =============================================================================

/// Weight of each signal source in the confluence score.
///
/// The technical model carries the most weight, followed by trader sentiment
/// on X, the Fear & Greed index, and finally the news headlines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfluenceWeights {
    #[serde(default = "default_technical_weight")]
    pub technical: f64,

    #[serde(default = "default_twitter_weight")]
    pub twitter: f64,

    #[serde(default = "default_fear_greed_weight")]
    pub fear_greed: f64,

    #[serde(default = "default_news_weight")]
    pub news: f64,
}

impl Default for ConfluenceWeights {
    fn default() -> Self {
        Self {
            technical: default_technical_weight(),
            twitter: default_twitter_weight(),
            fear_greed: default_fear_greed_weight(),
            news: default_news_weight(),
        }
    }
}

// =============================================================================
// RiskParams
// =============================================================================

/// Position-exit distances and the hard caps that gate new entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskParams {
    /// Stop-loss distance as a percentage below the entry price.
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: f64,

    /// Take-profit distance as a percentage above the entry price.
    #[serde(default = "default_take_profit_pct")]
    pub take_profit_pct: f64,

    /// Lifetime cap on the number of trades the experiment may execute.
    #[serde(default = "default_max_total_trades")]
    pub max_total_trades: u32,

    /// Maximum realized loss per calendar day, as a percentage of the
    /// initial capital.
    #[serde(default = "default_max_daily_loss_pct")]
    pub max_daily_loss_pct: f64,

    /// Maximum consecutive losing trades before entries are blocked.
    #[serde(default = "default_max_consecutive_losses")]
    pub max_consecutive_losses: u32,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            stop_loss_pct: default_stop_loss_pct(),
            take_profit_pct: default_take_profit_pct(),
            max_total_trades: default_max_total_trades(),
            max_daily_loss_pct: default_max_daily_loss_pct(),
            max_consecutive_losses: default_max_consecutive_losses(),
        }
    }
}

// =============================================================================
// BotConfig
// =============================================================================

/// Top-level configuration for the confluence bot.
///
/// Every field has a serde default so that older JSON files missing new
/// fields will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    // --- Market -------------------------------------------------------------
    /// Trading pair on Binance.
    #[serde(default = "default_symbol")]
    pub symbol: String,

    /// Kline interval used for features and the trading cycle.
    #[serde(default = "default_interval")]
    pub interval: String,

    // --- Operational modes --------------------------------------------------
    /// Whether orders are simulated (Paper) or sent to the exchange (Live).
    #[serde(default)]
    pub account_mode: AccountMode,

    /// Use the Binance testnet endpoints for live orders.
    #[serde(default = "default_true")]
    pub testnet: bool,

    // --- Sizing & thresholds ------------------------------------------------
    /// Fixed USD amount committed on every buy.
    #[serde(default = "default_trade_size_usd")]
    pub trade_size_usd: f64,

    /// Starting virtual capital for a fresh portfolio.
    #[serde(default = "default_initial_capital")]
    pub initial_capital: f64,

    /// Confluence score at or above which a buy is triggered.
    #[serde(default = "default_buy_threshold")]
    pub buy_threshold: f64,

    /// Confluence score at or below which an open position is sold.
    #[serde(default = "default_sell_threshold")]
    pub sell_threshold: f64,

    /// Signal-source weights for the confluence score.
    #[serde(default)]
    pub weights: ConfluenceWeights,

    /// Exit distances and entry caps.
    #[serde(default)]
    pub risk: RiskParams,

    // --- Paths --------------------------------------------------------------
    /// CSV file holding the downloaded kline history.
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,

    /// Serialized classifier produced by `train`.
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Portfolio state carried between cron invocations.
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,

    /// Lock file preventing overlapping cycles.
    #[serde(default = "default_lock_path")]
    pub lock_path: PathBuf,

    /// Disk-backed sentiment cache shared between invocations.
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,

    /// Trade journal (one JSON record per executed trade).
    #[serde(default = "default_trade_log_path")]
    pub trade_log_path: PathBuf,

    /// Append-only log of training runs.
    #[serde(default = "default_training_log_path")]
    pub training_log_path: PathBuf,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            interval: default_interval(),
            account_mode: AccountMode::Paper,
            testnet: true,
            trade_size_usd: default_trade_size_usd(),
            initial_capital: default_initial_capital(),
            buy_threshold: default_buy_threshold(),
            sell_threshold: default_sell_threshold(),
            weights: ConfluenceWeights::default(),
            risk: RiskParams::default(),
            history_path: default_history_path(),
            model_path: default_model_path(),
            state_path: default_state_path(),
            lock_path: default_lock_path(),
            cache_path: default_cache_path(),
            trade_log_path: default_trade_log_path(),
            training_log_path: default_training_log_path(),
        }
    }
}

impl BotConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read bot config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse bot config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbol = %config.symbol,
            account_mode = %config.account_mode,
            "bot config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content =
            serde_json::to_string_pretty(self).context("failed to serialise bot config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "bot config saved (atomic)");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = BotConfig::default();
        assert_eq!(cfg.symbol, "BTCUSDT");
        assert_eq!(cfg.interval, "15m");
        assert_eq!(cfg.account_mode, AccountMode::Paper);
        assert!(cfg.testnet);
        assert!((cfg.trade_size_usd - 20.0).abs() < f64::EPSILON);
        assert!((cfg.buy_threshold - 3.0).abs() < f64::EPSILON);
        assert!((cfg.sell_threshold + 3.0).abs() < f64::EPSILON);
        assert!((cfg.weights.technical - 2.0).abs() < f64::EPSILON);
        assert!((cfg.weights.news - 0.5).abs() < f64::EPSILON);
        assert_eq!(cfg.risk.max_total_trades, 50);
        assert!((cfg.risk.stop_loss_pct - 1.5).abs() < f64::EPSILON);
        assert!((cfg.risk.take_profit_pct - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: BotConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.symbol, "BTCUSDT");
        assert_eq!(cfg.account_mode, AccountMode::Paper);
        assert_eq!(cfg.risk.max_consecutive_losses, 5);
        assert_eq!(cfg.state_path, PathBuf::from("portfolio_state.json"));
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "symbol": "ETHUSDT", "buy_threshold": 2.5 }"#;
        let cfg: BotConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.symbol, "ETHUSDT");
        assert!((cfg.buy_threshold - 2.5).abs() < f64::EPSILON);
        assert!((cfg.sell_threshold + 3.0).abs() < f64::EPSILON);
        assert_eq!(cfg.risk.max_total_trades, 50);
    }

    #[test]
    fn save_and_reload_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot_config.json");

        let mut cfg = BotConfig::default();
        cfg.symbol = "SOLUSDT".to_string();
        cfg.trade_size_usd = 35.0;
        cfg.save(&path).unwrap();

        let reloaded = BotConfig::load(&path).unwrap();
        assert_eq!(reloaded.symbol, "SOLUSDT");
        assert!((reloaded.trade_size_usd - 35.0).abs() < f64::EPSILON);
        assert!(!path.with_extension("json.tmp").exists());
    }
}
