// =============================================================================
// Intelligence Aggregator — collects every sentiment source, never fails
// =============================================================================
//
// The hard invariant inherited from the experiment: a broken source yields a
// neutral signal for that source and the cycle continues.  Only the technical
// model is allowed to abort a cycle.
// =============================================================================

use std::path::Path;

use tracing::{error, info, warn};

use crate::types::Signal;

pub mod cache;
pub mod fear_greed;
pub mod news;
pub mod twitter;

use cache::SentimentCache;

/// The standardized signal from every intelligence source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SentimentSnapshot {
    pub twitter: Signal,
    pub fear_greed: Signal,
    pub news: Signal,
}

/// Query all sources concurrently and assemble the snapshot.
///
/// Failures are logged and degraded to [`Signal::Neutral`] per source; the
/// disk cache is refreshed afterwards so the next invocation can fall back
/// to recent readings.
pub async fn collect_all(cache_path: &Path) -> SentimentSnapshot {
    info!("collecting sentiment signals");

    let cache = SentimentCache::open(cache_path);
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .expect("failed to build reqwest client");

    let (twitter_result, fng_result, news_result) = tokio::join!(
        twitter::get_signal(&client, &cache),
        fear_greed::get_signal(&client, &cache),
        news::get_signal(&client),
    );

    let twitter = twitter_result.unwrap_or_else(|e| {
        error!(error = %e, "trader sentiment failed — using neutral");
        Signal::Neutral
    });
    let fear_greed = fng_result.unwrap_or_else(|e| {
        error!(error = %e, "Fear & Greed failed — using neutral");
        Signal::Neutral
    });
    let news = news_result.unwrap_or_else(|e| {
        error!(error = %e, "news sentiment failed — using neutral");
        Signal::Neutral
    });

    if let Err(e) = cache.save() {
        warn!(error = %e, "failed to persist sentiment cache");
    }

    let snapshot = SentimentSnapshot {
        twitter,
        fear_greed,
        news,
    };

    info!(
        twitter = %snapshot.twitter,
        fear_greed = %snapshot.fear_greed,
        news = %snapshot.news,
        "sentiment signals collected"
    );

    snapshot
}
