// =============================================================================
// Confluence Scorer — weighted aggregation of the technical and sentiment signals
// =============================================================================
//
// The decision core of the bot.  Four independent sources each contribute
// `direction * weight` to a single score:
//
//   technical model    direction ±1   weight 2.0   (the anchor signal)
//   trader sentiment   direction ±1/0 weight 1.5
//   fear & greed       direction ±1/0 weight 1.0
//   news headlines     direction ±1/0 weight 0.5
//
// A buy requires strong agreement (score >= +3.0 — the model alone cannot
// reach it); a sell of an open position requires equally strong disagreement
// (score <= -3.0).  Everything in between holds the current position.
// =============================================================================

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ConfluenceWeights;
use crate::sentiment::SentimentSnapshot;

/// The contribution of a single source to the final score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalContribution {
    pub name: String,
    pub weight: f64,
    /// +1.0 bullish, -1.0 bearish, 0.0 neutral.
    pub direction: f64,
    pub contribution: f64,
}

/// Result of the scoring pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub total_score: f64,
    pub contributions: Vec<SignalContribution>,
}

/// What the scored cycle should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Buy,
    Sell,
    Hold,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
            Self::Hold => write!(f, "HOLD"),
        }
    }
}

/// The weighted scoring engine.
#[derive(Debug, Clone)]
pub struct ConfluenceScorer {
    weights: ConfluenceWeights,
    buy_threshold: f64,
    sell_threshold: f64,
}

impl ConfluenceScorer {
    pub fn new(weights: ConfluenceWeights, buy_threshold: f64, sell_threshold: f64) -> Self {
        Self {
            weights,
            buy_threshold,
            sell_threshold,
        }
    }

    /// Combine the model class and the sentiment snapshot into a score with
    /// its full per-source breakdown.
    ///
    /// The technical model always takes a side: class 1 contributes
    /// `+technical_weight`, class 0 contributes `-technical_weight`.
    pub fn score(&self, tech_class: u8, sentiment: &SentimentSnapshot) -> ScoreBreakdown {
        let tech_direction = if tech_class == 1 { 1.0 } else { -1.0 };

        let contributions = vec![
            SignalContribution {
                name: "technical".to_string(),
                weight: self.weights.technical,
                direction: tech_direction,
                contribution: tech_direction * self.weights.technical,
            },
            SignalContribution {
                name: "twitter".to_string(),
                weight: self.weights.twitter,
                direction: sentiment.twitter.direction(),
                contribution: sentiment.twitter.direction() * self.weights.twitter,
            },
            SignalContribution {
                name: "fear_and_greed".to_string(),
                weight: self.weights.fear_greed,
                direction: sentiment.fear_greed.direction(),
                contribution: sentiment.fear_greed.direction() * self.weights.fear_greed,
            },
            SignalContribution {
                name: "news".to_string(),
                weight: self.weights.news,
                direction: sentiment.news.direction(),
                contribution: sentiment.news.direction() * self.weights.news,
            },
        ];

        let total_score: f64 = contributions.iter().map(|c| c.contribution).sum();

        let parts: Vec<String> = contributions
            .iter()
            .map(|c| format!("{}={:+.2}", c.name, c.contribution))
            .collect();
        info!(
            breakdown = parts.join(" "),
            total = format!("{total_score:+.2}"),
            "confluence score computed"
        );

        ScoreBreakdown {
            total_score,
            contributions,
        }
    }

    /// Apply the threshold rule to a scored cycle.
    ///
    /// Buys only trigger while flat, confluence sells only while in a
    /// position; otherwise the verdict is Hold.
    pub fn decide(&self, breakdown: &ScoreBreakdown, in_position: bool) -> Verdict {
        if breakdown.total_score >= self.buy_threshold && !in_position {
            Verdict::Buy
        } else if breakdown.total_score <= self.sell_threshold && in_position {
            Verdict::Sell
        } else {
            Verdict::Hold
        }
    }
}
