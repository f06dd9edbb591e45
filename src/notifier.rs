// =============================================================================
// Telegram Notifier — trade alerts via the Bot API
// =============================================================================
//
// Missing credentials log a warning and skip sending; a delivery failure is
// reported as `false` but never propagates — notifications must not be able
// to break a trading cycle.
// =============================================================================

use serde_json::json;
use tracing::{info, warn};

const TOKEN_VAR: &str = "TELEGRAM_BOT_TOKEN";
const CHAT_ID_VAR: &str = "TELEGRAM_CHAT_ID";

/// Telegram Bot API client.
pub struct TelegramNotifier {
    credentials: Option<(String, String)>,
    client: reqwest::Client,
}

impl TelegramNotifier {
    /// Build from `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID`; either missing
    /// produces a disabled notifier.
    pub fn from_env() -> Self {
        let credentials = match (std::env::var(TOKEN_VAR), std::env::var(CHAT_ID_VAR)) {
            (Ok(token), Ok(chat_id)) => Some((token, chat_id)),
            _ => {
                warn!("Telegram credentials not configured — notifications disabled");
                None
            }
        };

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");

        Self {
            credentials,
            client,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    /// Send a Markdown message.  Returns `true` only on confirmed delivery.
    pub async fn send(&self, message: &str) -> bool {
        let Some((token, chat_id)) = &self.credentials else {
            return false;
        };

        let url = format!("https://api.telegram.org/bot{token}/sendMessage");
        let body = json!({
            "chat_id": chat_id,
            "text": message,
            "parse_mode": "Markdown",
        });

        match self.client.post(&url).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("Telegram notification sent");
                true
            }
            Ok(resp) => {
                warn!(status = %resp.status(), "Telegram API rejected the notification");
                false
            }
            Err(e) => {
                warn!(error = %e, "failed to send Telegram notification");
                false
            }
        }
    }
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("configured", &self.is_configured())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Message formatting
// ---------------------------------------------------------------------------

/// Buy alert: entry price plus the armed protection levels.
pub fn format_buy_message(symbol: &str, price: f64, stop_loss: f64, take_profit: f64) -> String {
    format!(
        "✅ *BUY EXECUTED*\n\n\
         *Asset:* `{symbol}`\n\
         *Entry Price:* `${price:.2}`\n\n\
         *Stop-Loss:* `${stop_loss:.2}`\n\
         *Take-Profit:* `${take_profit:.2}`"
    )
}

/// Sell alert: exit price, the reason, and the signed PnL.
pub fn format_sell_message(symbol: &str, price: f64, reason: &str, pnl: f64) -> String {
    let outcome = if pnl >= 0.0 {
        format!("*Profit:* `${pnl:.2}`")
    } else {
        format!("*Loss:* `${pnl:.2}`")
    };
    format!(
        "🔔 *SELL EXECUTED*\n\n\
         *Asset:* `{symbol}`\n\
         *Reason:* _{reason}_\n\
         *Exit Price:* `${price:.2}`\n\
         *Result (P&L):* {outcome}"
    )
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_message_contains_levels() {
        let msg = format_buy_message("BTCUSDT", 50_000.0, 49_250.0, 51_500.0);
        assert!(msg.contains("BTCUSDT"));
        assert!(msg.contains("$50000.00"));
        assert!(msg.contains("$49250.00"));
        assert!(msg.contains("$51500.00"));
    }

    #[test]
    fn sell_message_distinguishes_profit_and_loss() {
        let win = format_sell_message("BTCUSDT", 51_500.0, "Take-Profit", 0.60);
        assert!(win.contains("Profit"));
        assert!(win.contains("Take-Profit"));

        let loss = format_sell_message("BTCUSDT", 49_250.0, "Stop-Loss", -0.30);
        assert!(loss.contains("Loss"));
        assert!(loss.contains("-0.30"));
    }

    #[tokio::test]
    async fn unconfigured_notifier_skips_sending() {
        // Build with explicitly empty credentials rather than relying on the
        // test environment.
        let notifier = TelegramNotifier {
            credentials: None,
            client: reqwest::Client::new(),
        };
        assert!(!notifier.is_configured());
        assert!(!notifier.send("test").await);
    }
}
