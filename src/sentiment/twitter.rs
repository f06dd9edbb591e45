// =============================================================================
// Trader Sentiment on X — weighted keyword scoring of a curated account list
// =============================================================================
//
// Pulls the latest posts from a fixed set of well-followed traders and scores
// each one against bullish/bearish keyword lists, weighted per account.  A
// strong consensus is required before the source leaves neutral:
//
//   weighted total >= +3  => bullish
//   weighted total <= -3  => bearish
//
// The free API tier rate-limits aggressively; on HTTP 429 the last cached
// signal is reused when it is younger than 30 minutes.
// =============================================================================

use anyhow::{Context, Result};
use chrono::Duration;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::sentiment::cache::SentimentCache;
use crate::types::Signal;

const API_BASE: &str = "https://api.twitter.com/2";
const BEARER_VAR: &str = "X_BEARER_TOKEN";

const CACHE_SOURCE: &str = "twitter";
const CACHE_TTL_MINUTES: i64 = 30;

const BULLISH_SCORE: f64 = 3.0;
const BEARISH_SCORE: f64 = -3.0;

/// (user id, display name, weight) — heavier accounts move the score more.
const TOP_TRADERS: [(&str, &str, f64); 6] = [
    ("254333617", "Benjamin Cowen", 3.0),
    ("833521223354900480", "Will Clemente", 2.5),
    ("1044558696", "PlanB", 2.0),
    ("2361225846", "TechDev", 1.5),
    ("971162236", "Rekt Capital", 1.5),
    ("27647228", "Peter Brandt", 1.0),
];

const POSITIVE_WORDS: [&str; 14] = [
    "bullish",
    "buy",
    "buying",
    "opportunity",
    "support",
    "rally",
    "breakout",
    "optimistic",
    "long",
    "undervalued",
    "strong",
    "growth",
    "accumulating",
    "dip buying",
];

const NEGATIVE_WORDS: [&str; 14] = [
    "bearish",
    "sell",
    "selling",
    "risk",
    "resistance",
    "correction",
    "bubble",
    "pessimistic",
    "short",
    "overvalued",
    "dump",
    "weak",
    "crash",
    "scam",
];

#[derive(Debug, Deserialize)]
struct TweetsResponse {
    #[serde(default)]
    data: Vec<Tweet>,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    text: String,
}

/// Score a batch of posts from one account: +1 per bullish keyword hit, -1
/// per bearish.  Retweets are skipped — they are someone else's opinion.
pub fn score_tweets<S: AsRef<str>>(texts: &[S]) -> i64 {
    let mut score = 0;
    for text in texts {
        let lowered = text.as_ref().to_lowercase();
        if lowered.starts_with("rt @") {
            continue;
        }
        score += POSITIVE_WORDS.iter().filter(|w| lowered.contains(*w)).count() as i64;
        score -= NEGATIVE_WORDS.iter().filter(|w| lowered.contains(*w)).count() as i64;
    }
    score
}

fn signal_from_score(weighted_total: f64) -> Signal {
    if weighted_total >= BULLISH_SCORE {
        Signal::Bullish
    } else if weighted_total <= BEARISH_SCORE {
        Signal::Bearish
    } else {
        Signal::Neutral
    }
}

/// Fetch and score the trader accounts, falling back to the cache on rate
/// limits.  A missing bearer token degrades to neutral with a warning.
pub async fn get_signal(client: &reqwest::Client, cache: &SentimentCache) -> Result<Signal> {
    let Ok(bearer) = std::env::var(BEARER_VAR) else {
        warn!("{BEARER_VAR} is not set — trader sentiment disabled");
        return Ok(Signal::Neutral);
    };

    let mut weighted_total = 0.0;

    for (user_id, name, weight) in TOP_TRADERS {
        let url =
            format!("{API_BASE}/users/{user_id}/tweets?max_results=5&exclude=replies,retweets");

        let resp = client
            .get(&url)
            .bearer_auth(&bearer)
            .send()
            .await
            .with_context(|| format!("X API request for {name} failed"))?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("X API rate limit reached");
            return match cache.get_fresh(CACHE_SOURCE, Duration::minutes(CACHE_TTL_MINUTES)) {
                Some(cached) => {
                    info!(signal = %cached, "using cached trader sentiment");
                    Ok(cached)
                }
                None => {
                    warn!("trader sentiment cache is empty or stale — returning neutral");
                    Ok(Signal::Neutral)
                }
            };
        }

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("X API returned {status} for {name}");
        }

        let tweets: TweetsResponse = resp
            .json()
            .await
            .with_context(|| format!("failed to parse tweets for {name}"))?;

        if tweets.data.is_empty() {
            continue;
        }

        let texts: Vec<&str> = tweets.data.iter().map(|t| t.text.as_str()).collect();
        let base = score_tweets(&texts);
        weighted_total += base as f64 * weight;

        debug!(account = name, base_score = base, weight, "account scored");
    }

    let signal = signal_from_score(weighted_total);
    info!(
        weighted_total = format!("{weighted_total:.2}"),
        signal = %signal,
        "trader sentiment analysed"
    );

    cache.put(CACHE_SOURCE, signal);
    Ok(signal)
}
