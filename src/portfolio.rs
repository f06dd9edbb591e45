// =============================================================================
// Portfolio State — the virtual book carried between cron invocations
// =============================================================================
//
// Each run is a single cycle, so everything the next cycle needs lives in
// `portfolio_state.json`: cash, holding, the entry price of the open position
// and its stop-loss / take-profit levels, plus the daily risk counters.
// Writes use the atomic tmp + rename pattern.
//
// A lock file guards against overlapping cron invocations; it is removed on
// drop, including every early-return path of the cycle.
// =============================================================================

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// The persisted portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioState {
    pub cash_usd: f64,
    pub asset_holding: f64,
    pub in_position: bool,
    pub total_trades: u32,
    pub initial_value: f64,
    pub entry_price: f64,
    pub stop_loss_price: f64,
    pub take_profit_price: f64,

    // --- Daily risk counters (reset when the date rolls over) ---------------
    #[serde(default)]
    pub risk_date: String,
    #[serde(default)]
    pub daily_pnl: f64,
    #[serde(default)]
    pub consecutive_losses: u32,
}

impl PortfolioState {
    /// A fresh portfolio holding only cash.
    pub fn new(initial_capital: f64) -> Self {
        Self {
            cash_usd: initial_capital,
            asset_holding: 0.0,
            in_position: false,
            total_trades: 0,
            initial_value: initial_capital,
            entry_price: 0.0,
            stop_loss_price: 0.0,
            take_profit_price: 0.0,
            risk_date: String::new(),
            daily_pnl: 0.0,
            consecutive_losses: 0,
        }
    }

    /// Load the state from `path`, initializing (and saving) a fresh
    /// portfolio when the file does not exist yet.
    pub fn load_or_init(path: impl AsRef<Path>, initial_capital: f64) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            let state = Self::new(initial_capital);
            state.save(path)?;
            info!(
                path = %path.display(),
                initial_capital,
                "virtual portfolio initialized"
            );
            return Ok(state);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read portfolio state from {}", path.display()))?;
        let state: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse portfolio state from {}", path.display()))?;

        Ok(state)
    }

    /// Persist the state to `path` (atomic tmp + rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise portfolio state")?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp state to {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp state to {}", path.display()))?;

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Trade mutations
    // -------------------------------------------------------------------------

    /// Enter a position: spend `trade_size_usd` at `price` and arm the
    /// stop-loss / take-profit levels.  Returns the acquired quantity.
    pub fn apply_buy(
        &mut self,
        price: f64,
        trade_size_usd: f64,
        stop_loss_pct: f64,
        take_profit_pct: f64,
    ) -> f64 {
        let quantity = trade_size_usd / price;

        self.asset_holding = quantity;
        self.cash_usd -= trade_size_usd;
        self.in_position = true;
        self.total_trades += 1;
        self.entry_price = price;
        self.stop_loss_price = price * (1.0 - stop_loss_pct / 100.0);
        self.take_profit_price = price * (1.0 + take_profit_pct / 100.0);

        info!(
            price,
            quantity = format!("{quantity:.8}"),
            stop_loss = format!("{:.2}", self.stop_loss_price),
            take_profit = format!("{:.2}", self.take_profit_price),
            "position opened"
        );

        quantity
    }

    /// Close the open position at `price`, realizing the proceeds.  Returns
    /// the PnL against the cost basis.
    pub fn apply_sell(&mut self, price: f64) -> f64 {
        let proceeds = self.asset_holding * price;
        let cost_basis = self.asset_holding * self.entry_price;
        let pnl = proceeds - cost_basis;

        self.cash_usd += proceeds;
        self.asset_holding = 0.0;
        self.in_position = false;
        self.entry_price = 0.0;
        self.stop_loss_price = 0.0;
        self.take_profit_price = 0.0;

        info!(price, pnl = format!("{pnl:.2}"), "position closed");
        pnl
    }

    /// Fold a realized PnL into the daily risk counters, resetting them when
    /// the calendar date has rolled over.
    pub fn record_trade_result(&mut self, pnl: f64, today: &str) {
        if self.risk_date != today {
            if !self.risk_date.is_empty() {
                info!(
                    old_date = %self.risk_date,
                    new_date = today,
                    "date rolled — resetting daily risk counters"
                );
            }
            self.risk_date = today.to_string();
            self.daily_pnl = 0.0;
        }

        self.daily_pnl += pnl;
        if pnl < 0.0 {
            self.consecutive_losses += 1;
        } else {
            self.consecutive_losses = 0;
        }
    }

    /// Mark-to-market portfolio value at `price`.
    pub fn equity(&self, price: f64) -> f64 {
        self.cash_usd + self.asset_holding * price
    }
}

// ---------------------------------------------------------------------------
// Cycle lock
// ---------------------------------------------------------------------------

/// Exclusive lock file preventing overlapping cycles.  Holds the PID for
/// post-mortem inspection; released on drop.
pub struct CycleLock {
    path: PathBuf,
}

impl CycleLock {
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                use std::io::Write;
                let _ = write!(file, "{}", std::process::id());
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                bail!(
                    "another cycle is already running (lock file at {})",
                    path.display()
                );
            }
            Err(e) => Err(e).with_context(|| format!("failed to create lock at {}", path.display())),
        }
    }
}

impl Drop for CycleLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove lock file");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_load_initializes_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portfolio_state.json");

        let state = PortfolioState::load_or_init(&path, 1000.0).unwrap();
        assert!(path.exists());
        assert!((state.cash_usd - 1000.0).abs() < 1e-12);
        assert!(!state.in_position);
        assert_eq!(state.total_trades, 0);
    }

    #[test]
    fn buy_arms_stop_loss_and_take_profit() {
        let mut state = PortfolioState::new(1000.0);
        let qty = state.apply_buy(50_000.0, 20.0, 1.5, 3.0);

        assert!((qty - 0.0004).abs() < 1e-12);
        assert!(state.in_position);
        assert_eq!(state.total_trades, 1);
        assert!((state.cash_usd - 980.0).abs() < 1e-12);
        assert!((state.stop_loss_price - 49_250.0).abs() < 1e-9);
        assert!((state.take_profit_price - 51_500.0).abs() < 1e-9);
    }

    #[test]
    fn sell_realizes_pnl_and_clears_levels() {
        let mut state = PortfolioState::new(1000.0);
        state.apply_buy(50_000.0, 20.0, 1.5, 3.0);

        // +3% move: proceeds 20.60, cost 20.00.
        let pnl = state.apply_sell(51_500.0);
        assert!((pnl - 0.6).abs() < 1e-9);
        assert!(!state.in_position);
        assert!((state.cash_usd - 1000.6).abs() < 1e-9);
        assert_eq!(state.asset_holding, 0.0);
        assert_eq!(state.stop_loss_price, 0.0);
        assert_eq!(state.take_profit_price, 0.0);
    }

    #[test]
    fn losing_sell_reduces_equity() {
        let mut state = PortfolioState::new(1000.0);
        state.apply_buy(50_000.0, 20.0, 1.5, 3.0);
        let pnl = state.apply_sell(49_250.0);
        assert!(pnl < 0.0);
        assert!(state.cash_usd < 1000.0);
    }

    #[test]
    fn daily_counters_track_losses_and_reset_on_rollover() {
        let mut state = PortfolioState::new(1000.0);

        state.record_trade_result(-5.0, "2024-06-01");
        state.record_trade_result(-3.0, "2024-06-01");
        assert_eq!(state.consecutive_losses, 2);
        assert!((state.daily_pnl + 8.0).abs() < 1e-12);

        // Winning trade resets the streak but not the daily PnL.
        state.record_trade_result(4.0, "2024-06-01");
        assert_eq!(state.consecutive_losses, 0);
        assert!((state.daily_pnl + 4.0).abs() < 1e-12);

        // New day resets the PnL; the loss streak spans days.
        state.record_trade_result(-1.0, "2024-06-02");
        assert_eq!(state.risk_date, "2024-06-02");
        assert!((state.daily_pnl + 1.0).abs() < 1e-12);
        assert_eq!(state.consecutive_losses, 1);
    }

    #[test]
    fn state_survives_a_save_load_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portfolio_state.json");

        let mut state = PortfolioState::load_or_init(&path, 1000.0).unwrap();
        state.apply_buy(40_000.0, 20.0, 1.5, 3.0);
        state.save(&path).unwrap();

        let reloaded = PortfolioState::load_or_init(&path, 1000.0).unwrap();
        assert!(reloaded.in_position);
        assert!((reloaded.entry_price - 40_000.0).abs() < 1e-12);
        assert!((reloaded.stop_loss_price - 39_400.0).abs() < 1e-9);
    }

    #[test]
    fn lock_is_exclusive_and_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.lock");

        let lock = CycleLock::acquire(&path).unwrap();
        assert!(path.exists());
        assert!(CycleLock::acquire(&path).is_err());

        drop(lock);
        assert!(!path.exists());
        assert!(CycleLock::acquire(&path).is_ok());
    }
}
