// =============================================================================
// Shared types used across the confluence trading bot
// =============================================================================

use serde::{Deserialize, Serialize};

/// Whether orders are simulated against the virtual portfolio or sent to the
/// exchange for real.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountMode {
    Paper,
    Live,
}

impl Default for AccountMode {
    fn default() -> Self {
        Self::Paper
    }
}

impl std::fmt::Display for AccountMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Paper => write!(f, "Paper"),
            Self::Live => write!(f, "Live"),
        }
    }
}

/// Standardized sentiment signal emitted by every intelligence source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    Bullish,
    Neutral,
    Bearish,
}

impl Signal {
    /// Direction as a score multiplier: +1, 0, or -1.
    pub fn direction(self) -> f64 {
        match self {
            Self::Bullish => 1.0,
            Self::Neutral => 0.0,
            Self::Bearish => -1.0,
        }
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::Neutral
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "BULLISH"),
            Self::Neutral => write!(f, "NEUTRAL"),
            Self::Bearish => write!(f, "BEARISH"),
        }
    }
}

/// Why an open position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    ConfluenceSell,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StopLoss => write!(f, "Stop-Loss"),
            Self::TakeProfit => write!(f, "Take-Profit"),
            Self::ConfluenceSell => write!(f, "Confluence Sell"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_directions() {
        assert_eq!(Signal::Bullish.direction(), 1.0);
        assert_eq!(Signal::Neutral.direction(), 0.0);
        assert_eq!(Signal::Bearish.direction(), -1.0);
    }

    #[test]
    fn defaults_are_safe() {
        assert_eq!(AccountMode::default(), AccountMode::Paper);
        assert_eq!(Signal::default(), Signal::Neutral);
    }
}
