// =============================================================================
// Fear & Greed Index — market-wide sentiment from alternative.me
// =============================================================================
//
// The index condenses crypto market sentiment into 0..100:
//   > 65  => greed        => bullish signal
//   < 25  => extreme fear => bearish signal
//   else  => neutral
//
// Readings barely move intra-hour, so a 10-minute cache avoids hammering the
// API from overlapping cron schedules.
// =============================================================================

use anyhow::{Context, Result};
use chrono::Duration;
use serde::Deserialize;
use tracing::{debug, info};

use crate::sentiment::cache::SentimentCache;
use crate::types::Signal;

const API_URL: &str = "https://api.alternative.me/fng/?limit=2";
const CACHE_SOURCE: &str = "fear_and_greed";
const CACHE_TTL_MINUTES: i64 = 10;

const GREED_THRESHOLD: i64 = 65;
const FEAR_THRESHOLD: i64 = 25;

#[derive(Debug, Deserialize)]
struct FngResponse {
    data: Vec<FngEntry>,
}

#[derive(Debug, Deserialize)]
struct FngEntry {
    value: String,
    value_classification: String,
}

/// Map an index value onto the standardized signal.
pub fn classify(value: i64) -> Signal {
    if value > GREED_THRESHOLD {
        Signal::Bullish
    } else if value < FEAR_THRESHOLD {
        Signal::Bearish
    } else {
        Signal::Neutral
    }
}

/// Fetch the latest Fear & Greed reading, consulting the cache first.
pub async fn get_signal(client: &reqwest::Client, cache: &SentimentCache) -> Result<Signal> {
    if let Some(cached) = cache.get_fresh(CACHE_SOURCE, Duration::minutes(CACHE_TTL_MINUTES)) {
        return Ok(cached);
    }

    debug!("fetching Fear & Greed index");
    let response: FngResponse = client
        .get(API_URL)
        .send()
        .await
        .context("Fear & Greed request failed")?
        .error_for_status()
        .context("Fear & Greed API returned an error status")?
        .json()
        .await
        .context("failed to parse Fear & Greed response")?;

    let latest = response
        .data
        .first()
        .context("Fear & Greed response contained no data")?;

    let value: i64 = latest
        .value
        .parse()
        .with_context(|| format!("non-numeric index value '{}'", latest.value))?;

    let signal = classify(value);
    info!(
        value,
        classification = %latest.value_classification,
        signal = %signal,
        "Fear & Greed index analysed"
    );

    cache.put(CACHE_SOURCE, signal);
    Ok(signal)
}
