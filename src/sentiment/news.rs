// =============================================================================
// News Headline Sentiment — NewsAPI keyword scoring
// =============================================================================
//
// Pulls the last 24 hours of Bitcoin coverage from a fixed set of financial
// outlets and scores the headlines against keyword lists.  Simple but
// effective; a clear positive or negative consensus is required before the
// source leaves neutral:
//
//   total >= +2  => bullish
//   total <= -2  => bearish
// =============================================================================

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::types::Signal;

const API_URL: &str = "https://newsapi.org/v2/everything";
const API_KEY_VAR: &str = "NEWS_API_KEY";

/// Finance-focused outlets keep the noise down.
const SOURCES: &str =
    "bloomberg,reuters,financial-post,the-wall-street-journal,business-insider";

const BULLISH_SCORE: i64 = 2;
const BEARISH_SCORE: i64 = -2;

const POSITIVE_WORDS: [&str; 14] = [
    "approves",
    "adoption",
    "invests",
    "optimistic",
    "momentum",
    "record",
    "rises",
    "support",
    "innovation",
    "halving",
    "institutional",
    "launch",
    "partnership",
    "inflows",
];

const NEGATIVE_WORDS: [&str; 14] = [
    "bans",
    "fraud",
    "risk",
    "falls",
    "investigation",
    "lawsuit",
    "hack",
    "volatility",
    "bubble",
    "crackdown",
    "prohibition",
    "scam",
    "collapse",
    "losses",
];

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    #[serde(default)]
    title: Option<String>,
}

/// Score a batch of headlines: +1 per positive keyword hit, -1 per negative.
pub fn score_headlines<S: AsRef<str>>(titles: &[S]) -> i64 {
    let mut score = 0;
    for title in titles {
        let lowered = title.as_ref().to_lowercase();
        if lowered.is_empty() {
            continue;
        }
        for word in POSITIVE_WORDS {
            if lowered.contains(word) {
                score += 1;
            }
        }
        for word in NEGATIVE_WORDS {
            if lowered.contains(word) {
                score -= 1;
            }
        }
    }
    score
}

fn signal_from_score(score: i64) -> Signal {
    if score >= BULLISH_SCORE {
        Signal::Bullish
    } else if score <= BEARISH_SCORE {
        Signal::Bearish
    } else {
        Signal::Neutral
    }
}

/// Fetch recent Bitcoin headlines and reduce them to a signal.
///
/// A missing API key degrades to neutral with a warning instead of failing —
/// the bot must keep trading on the remaining sources.
pub async fn get_signal(client: &reqwest::Client) -> Result<Signal> {
    let Ok(api_key) = std::env::var(API_KEY_VAR) else {
        warn!("{API_KEY_VAR} is not set — news sentiment disabled");
        return Ok(Signal::Neutral);
    };

    let from_date = (Utc::now() - Duration::days(1)).format("%Y-%m-%d").to_string();

    let response: NewsResponse = client
        .get(API_URL)
        .header("X-Api-Key", api_key)
        .query(&[
            ("q", "Bitcoin OR BTC"),
            ("sources", SOURCES),
            ("from", from_date.as_str()),
            ("language", "en"),
            ("sortBy", "relevancy"),
        ])
        .send()
        .await
        .context("NewsAPI request failed")?
        .error_for_status()
        .context("NewsAPI returned an error status")?
        .json()
        .await
        .context("failed to parse NewsAPI response")?;

    if response.articles.is_empty() {
        info!("no relevant Bitcoin news in the last 24h");
        return Ok(Signal::Neutral);
    }

    let titles: Vec<String> = response
        .articles
        .iter()
        .filter_map(|a| a.title.clone())
        .collect();

    let score = score_headlines(&titles);
    let signal = signal_from_score(score);

    info!(
        articles = response.articles.len(),
        score,
        signal = %signal,
        "news sentiment analysed"
    );

    Ok(signal)
}
