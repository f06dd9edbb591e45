pub mod gbm;
pub mod trainer;

use anyhow::{Context, Result};
use tracing::info;

use crate::binance::client::BinanceClient;
use crate::features;
use crate::model::gbm::GbmClassifier;

/// Candles requested when building the live feature frame; enough to cover
/// the SMA-50 warm-up with a wide margin.
const LIVE_LOOKBACK_CANDLES: u32 = 500;

/// Fetch fresh candles, rebuild the feature frame, and classify the latest
/// complete row with the persisted model.
///
/// Returns the predicted class: 1 (next candle up — buy signal) or 0 (down —
/// sell signal).
pub async fn latest_prediction(
    client: &BinanceClient,
    symbol: &str,
    interval: &str,
    model_path: &std::path::Path,
) -> Result<u8> {
    let model = GbmClassifier::load(model_path)
        .with_context(|| format!("no trained model at {} — run `train` first", model_path.display()))?;

    let candles = client
        .get_klines(symbol, interval, LIVE_LOOKBACK_CANDLES)
        .await
        .context("failed to download candles for prediction")?;

    let frame = features::build(&candles, false)?;
    let latest = frame.rows.last().context("feature frame has no usable rows")?;

    let proba = model.predict_proba(latest)?;
    let class = if proba >= 0.5 { 1 } else { 0 };

    info!(
        symbol,
        interval,
        candle_open_time = frame.open_times.last().copied().unwrap_or_default(),
        last_close = frame.closes.last().copied().unwrap_or_default(),
        probability = format!("{proba:.4}"),
        class,
        "technical prediction computed"
    );

    Ok(class)
}
