// =============================================================================
// Risk Gate — exit triggers and the breakers protecting capital
// =============================================================================
//
// Two layers:
//   1. `check_exit` — evaluates the armed stop-loss / take-profit levels of
//      an open position against the current price.  Runs before anything
//      else in a cycle; a hit short-circuits signal collection entirely.
//   2. `RiskGate::can_enter` — breakers consulted before any new entry:
//        - Lifetime trade cap (the experiment stops at a fixed trade count).
//        - Daily loss cap as a percentage of initial capital.
//        - Consecutive-loss cap.
//      Daily counters live in the portfolio state and reset on date rollover.
// =============================================================================

use tracing::warn;

use crate::config::RiskParams;
use crate::portfolio::PortfolioState;
use crate::types::ExitReason;

/// Evaluate the stop-loss / take-profit levels of an open position.
///
/// Returns `None` when no position is open or neither level is hit.
/// Stop-loss wins when a degenerate state has both levels crossed.
pub fn check_exit(state: &PortfolioState, price: f64) -> Option<ExitReason> {
    if !state.in_position {
        return None;
    }

    if price <= state.stop_loss_price {
        warn!(
            price,
            stop_loss = state.stop_loss_price,
            "stop-loss hit"
        );
        return Some(ExitReason::StopLoss);
    }

    if price >= state.take_profit_price {
        return Some(ExitReason::TakeProfit);
    }

    None
}

/// Pre-entry breakers.
#[derive(Debug, Clone)]
pub struct RiskGate {
    params: RiskParams,
    initial_capital: f64,
}

impl RiskGate {
    pub fn new(params: RiskParams, initial_capital: f64) -> Self {
        Self {
            params,
            initial_capital,
        }
    }

    /// Check whether a new entry is currently allowed.
    ///
    /// Returns `(true, None)` if all breakers are clear, or `(false,
    /// Some(reason))` if a breaker has tripped.  `today` is compared against
    /// the state's risk date so stale daily counters are ignored.
    pub fn can_enter(&self, state: &PortfolioState, today: &str) -> (bool, Option<String>) {
        // 1. Lifetime trade cap
        if state.total_trades >= self.params.max_total_trades {
            let msg = format!(
                "trade cap reached: {} trades (limit {})",
                state.total_trades, self.params.max_total_trades
            );
            warn!("{}", msg);
            return (false, Some(msg));
        }

        // Counters from a previous day no longer apply.
        let same_day = state.risk_date == today;

        // 2. Daily loss cap
        if same_day && self.initial_capital > 0.0 {
            let daily_loss_pct = (-state.daily_pnl / self.initial_capital) * 100.0;
            if daily_loss_pct >= self.params.max_daily_loss_pct {
                let msg = format!(
                    "daily loss breaker tripped: {:.2}% lost (limit {:.2}%)",
                    daily_loss_pct, self.params.max_daily_loss_pct
                );
                warn!("{}", msg);
                return (false, Some(msg));
            }
        }

        // 3. Consecutive losses
        if state.consecutive_losses >= self.params.max_consecutive_losses {
            let msg = format!(
                "consecutive-loss breaker tripped: {} losses (limit {})",
                state.consecutive_losses, self.params.max_consecutive_losses
            );
            warn!("{}", msg);
            return (false, Some(msg));
        }

        (true, None)
    }
}
