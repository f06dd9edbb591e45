// =============================================================================
// Signal Simulation — SMA cross filtered by RSI, with CSV export
// =============================================================================
//
// The exploratory variant of the strategy:
//   - rows below a volume quantile are discarded first (thin candles produce
//     unreliable crosses);
//   - BUY on a golden cross with RSI below the overbought ceiling;
//   - SELL on a death cross with RSI above the oversold floor;
//   - consecutive duplicate signals are dropped;
//   - each signal's return is measured to the close of the *next* signal,
//     counted positive for buys and negated for sells.
// =============================================================================

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::features::{RSI_WINDOW, SMA_LONG, SMA_SHORT};
use crate::indicators::rsi::calculate_rsi;
use crate::indicators::sma::calculate_sma;
use crate::market_data::Candle;

/// One extracted signal row.
#[derive(Debug, Clone, Serialize)]
pub struct SimSignal {
    pub date: String,
    pub close: f64,
    pub sma_20: f64,
    pub sma_50: f64,
    pub rsi: f64,
    pub action: String,
    /// Return to the next signal's close; the last signal has none.
    pub next_return: Option<f64>,
}

/// Simulation summary.
#[derive(Debug, Clone)]
pub struct SimReport {
    pub signals: Vec<SimSignal>,
    /// Sum of per-signal returns, sells negated.
    pub total_return: f64,
    /// Mean per-signal return (unsigned direction).
    pub mean_return: f64,
}

/// Linear-interpolated quantile of `values` (matching the convention the
/// thresholds were tuned against).
fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return Some(sorted[lo]);
    }
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Run the signal extraction over `candles` (oldest first).
pub fn run(
    candles: &[Candle],
    rsi_buy_max: f64,
    rsi_sell_min: f64,
    volume_quantile: f64,
) -> Result<SimReport> {
    if candles.len() <= SMA_LONG {
        bail!(
            "need more than {} candles to simulate, got {}",
            SMA_LONG,
            candles.len()
        );
    }

    // --- Volume filter -------------------------------------------------------
    let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();
    let threshold = quantile(&volumes, volume_quantile).unwrap_or(0.0);
    let filtered: Vec<&Candle> = candles.iter().filter(|c| c.volume > threshold).collect();

    if filtered.len() <= SMA_LONG {
        bail!("volume filter left too few candles ({})", filtered.len());
    }

    info!(
        total = candles.len(),
        kept = filtered.len(),
        volume_threshold = format!("{threshold:.2}"),
        "volume filter applied"
    );

    // --- Indicators on the filtered series -----------------------------------
    let closes: Vec<f64> = filtered.iter().map(|c| c.close).collect();
    let sma_short = calculate_sma(&closes, SMA_SHORT);
    let sma_long = calculate_sma(&closes, SMA_LONG);
    let rsi = calculate_rsi(&closes, RSI_WINDOW);

    // --- Cross detection ------------------------------------------------------
    let mut signals: Vec<SimSignal> = Vec::new();

    for i in 1..filtered.len() {
        let window = [
            sma_short[i - 1],
            sma_long[i - 1],
            sma_short[i],
            sma_long[i],
            rsi[i],
        ];
        if window.iter().any(|v| !v.is_finite()) {
            continue;
        }

        let crossed_up = sma_short[i - 1] < sma_long[i - 1] && sma_short[i] > sma_long[i];
        let crossed_down = sma_short[i - 1] > sma_long[i - 1] && sma_short[i] < sma_long[i];

        let action = if crossed_up && rsi[i] < rsi_buy_max {
            "BUY"
        } else if crossed_down && rsi[i] > rsi_sell_min {
            "SELL"
        } else {
            continue;
        };

        // Drop consecutive duplicates — repeated same-direction crosses are
        // noise.
        if signals.last().map(|s| s.action == action).unwrap_or(false) {
            continue;
        }

        signals.push(SimSignal {
            date: DateTime::<Utc>::from_timestamp_millis(filtered[i].open_time)
                .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| filtered[i].open_time.to_string()),
            close: closes[i],
            sma_20: sma_short[i],
            sma_50: sma_long[i],
            rsi: rsi[i],
            action: action.to_string(),
            next_return: None,
        });
    }

    // --- Per-signal returns ---------------------------------------------------
    for i in 0..signals.len() {
        if i + 1 < signals.len() {
            let r = signals[i + 1].close / signals[i].close - 1.0;
            signals[i].next_return = Some(r);
        }
    }

    let mut total_return = 0.0;
    let mut return_sum = 0.0;
    let mut return_count = 0usize;
    for signal in &signals {
        if let Some(r) = signal.next_return {
            total_return += if signal.action == "BUY" { r } else { -r };
            return_sum += r;
            return_count += 1;
        }
    }
    let mean_return = if return_count > 0 {
        return_sum / return_count as f64
    } else {
        0.0
    };

    info!(
        signals = signals.len(),
        total_return = format!("{:.4} ({:.2}%)", total_return, total_return * 100.0),
        mean_return = format!("{mean_return:.4}"),
        "signal simulation complete"
    );

    Ok(SimReport {
        signals,
        total_return,
        mean_return,
    })
}

/// Export the signal rows to CSV.
pub fn export_csv(path: impl AsRef<Path>, signals: &[SimSignal]) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for signal in signals {
        writer.serialize(signal).context("failed to write signal row")?;
    }
    writer.flush().context("failed to flush signal export")?;

    info!(path = %path.display(), rows = signals.len(), "signals exported");
    Ok(())
}
