// =============================================================================
// Execution Engine — routes trade decisions to the exchange or the simulator
// =============================================================================
//
// In **paper mode** the order is simulated locally: no request reaches
// Binance, and a synthetic fill with a UUID id is produced at the observed
// ticker price.
//
// In **live mode** the decision becomes a MARKET order through the signed
// REST client — buys spend a fixed quote amount, sells liquidate the held
// base quantity.  An exchange error is reported to the caller, which must
// then leave the portfolio state untouched.
// =============================================================================

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::binance::client::BinanceClient;
use crate::types::AccountMode;

// ---------------------------------------------------------------------------
// Result type
// ---------------------------------------------------------------------------

/// Outcome of an execution attempt.
#[derive(Debug, Clone)]
pub enum ExecutionResult {
    /// Order was simulated locally (paper mode).
    Simulated(String),
    /// Order was placed on the exchange (live mode).
    Placed(serde_json::Value),
    /// An error occurred during execution.
    Error(String),
}

impl ExecutionResult {
    /// Whether the portfolio state should be mutated after this outcome.
    pub fn is_fill(&self) -> bool {
        matches!(self, Self::Simulated(_) | Self::Placed(_))
    }
}

impl std::fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simulated(msg) => write!(f, "Simulated({msg})"),
            Self::Placed(v) => write!(f, "Placed({v})"),
            Self::Error(err) => write!(f, "Error({err})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Ties the Binance client and the account mode together.
pub struct ExecutionEngine {
    client: Arc<BinanceClient>,
    mode: AccountMode,
}

impl ExecutionEngine {
    pub fn new(client: Arc<BinanceClient>, mode: AccountMode) -> Self {
        Self { client, mode }
    }

    /// Execute a buy spending `quote_usd` at the observed `price`.
    pub async fn execute_buy(&self, symbol: &str, price: f64, quote_usd: f64) -> ExecutionResult {
        info!(symbol, price, quote_usd, mode = %self.mode, "buy execution requested");

        match self.mode {
            AccountMode::Paper => {
                let fill_id = Uuid::new_v4().to_string();
                let quantity = quote_usd / price;
                let msg = format!(
                    "paper fill: symbol={symbol} side=BUY price={price} qty={quantity:.8} fill_id={fill_id}"
                );
                info!("{}", msg);
                ExecutionResult::Simulated(msg)
            }
            AccountMode::Live => {
                debug!(symbol, quote_usd, "sending live market buy to Binance");
                match self.client.market_buy_quote(symbol, quote_usd).await {
                    Ok(order) => {
                        info!(
                            symbol,
                            order_id = order.get("orderId").and_then(|v| v.as_u64()).unwrap_or(0),
                            "live market buy accepted"
                        );
                        ExecutionResult::Placed(order)
                    }
                    Err(e) => {
                        warn!(symbol, error = %e, "live market buy failed");
                        ExecutionResult::Error(format!("buy order failed: {e}"))
                    }
                }
            }
        }
    }

    /// Execute a sell of `quantity` base units at the observed `price`.
    pub async fn execute_sell(&self, symbol: &str, price: f64, quantity: f64) -> ExecutionResult {
        info!(symbol, price, quantity, mode = %self.mode, "sell execution requested");

        match self.mode {
            AccountMode::Paper => {
                let fill_id = Uuid::new_v4().to_string();
                let msg = format!(
                    "paper fill: symbol={symbol} side=SELL price={price} qty={quantity:.8} fill_id={fill_id}"
                );
                info!("{}", msg);
                ExecutionResult::Simulated(msg)
            }
            AccountMode::Live => {
                debug!(symbol, quantity, "sending live market sell to Binance");
                match self.client.market_sell(symbol, quantity).await {
                    Ok(order) => {
                        info!(
                            symbol,
                            order_id = order.get("orderId").and_then(|v| v.as_u64()).unwrap_or(0),
                            "live market sell accepted"
                        );
                        ExecutionResult::Placed(order)
                    }
                    Err(e) => {
                        warn!(symbol, error = %e, "live market sell failed");
                        ExecutionResult::Error(format!("sell order failed: {e}"))
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("client", &"<BinanceClient>")
            .field("mode", &self.mode)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn paper_engine() -> ExecutionEngine {
        ExecutionEngine::new(Arc::new(BinanceClient::public()), AccountMode::Paper)
    }

    #[tokio::test]
    async fn paper_buy_is_simulated_without_network() {
        let engine = paper_engine();
        let result = engine.execute_buy("BTCUSDT", 50_000.0, 20.0).await;
        assert!(result.is_fill());
        match result {
            ExecutionResult::Simulated(msg) => {
                assert!(msg.contains("side=BUY"));
                assert!(msg.contains("qty=0.00040000"));
            }
            other => panic!("expected simulated fill, got {other}"),
        }
    }

    #[tokio::test]
    async fn paper_sell_is_simulated_without_network() {
        let engine = paper_engine();
        let result = engine.execute_sell("BTCUSDT", 51_000.0, 0.0004).await;
        assert!(result.is_fill());
        match result {
            ExecutionResult::Simulated(msg) => assert!(msg.contains("side=SELL")),
            other => panic!("expected simulated fill, got {other}"),
        }
    }

    #[test]
    fn errors_are_not_fills() {
        assert!(!ExecutionResult::Error("boom".to_string()).is_fill());
        assert!(ExecutionResult::Placed(serde_json::json!({})).is_fill());
    }
}
