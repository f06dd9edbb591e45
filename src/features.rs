// =============================================================================
// Feature Frame — classifier inputs assembled from the indicator set
// =============================================================================
//
// The column order is fixed and shared between training and prediction; a
// model trained on one order must never be scored against another.  Rows
// containing any non-finite value (indicator warm-up regions) are dropped
// uniformly, so the first usable row sits after the longest look-back
// (SMA-50).
// =============================================================================

use anyhow::{bail, Result};
use tracing::debug;

use crate::indicators::atr::calculate_atr;
use crate::indicators::bollinger::calculate_bb_width;
use crate::indicators::macd::calculate_macd;
use crate::indicators::momentum::calculate_momentum;
use crate::indicators::obv::calculate_obv;
use crate::indicators::rsi::calculate_rsi;
use crate::indicators::sma::calculate_sma;
use crate::indicators::stoch_rsi::calculate_stoch_rsi;
use crate::market_data::Candle;

// --- Indicator parameters (shared by train / predict / cycle) ---------------

pub const SMA_SHORT: usize = 20;
pub const SMA_LONG: usize = 50;
pub const RSI_WINDOW: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const STOCH_RSI_WINDOW: usize = 14;
pub const BB_WINDOW: usize = 20;
pub const BB_NUM_STD: f64 = 2.0;
pub const ATR_WINDOW: usize = 14;
pub const MOMENTUM_WINDOW: usize = 14;

/// Fixed feature-column order.
pub const FEATURE_NAMES: [&str; 12] = [
    "sma_20",
    "sma_50",
    "rsi",
    "macd",
    "macd_signal",
    "macd_diff",
    "stochrsi",
    "obv",
    "bb_width",
    "atr",
    "momentum",
    "strategy_context",
];

/// A cleaned feature matrix plus (optionally) binary targets.
#[derive(Debug, Clone)]
pub struct FeatureFrame {
    /// One row per usable candle, columns in [`FEATURE_NAMES`] order.
    pub rows: Vec<Vec<f64>>,
    /// Target label per row: 1 if the next candle closed higher, else 0.
    /// Empty when the frame was built for prediction.
    pub targets: Vec<u8>,
    /// Open time of the candle behind each row.
    pub open_times: Vec<i64>,
    /// Close price of the candle behind each row.
    pub closes: Vec<f64>,
}

impl FeatureFrame {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Fraction of rows labelled 1 (class balance diagnostic).
    pub fn positive_rate(&self) -> f64 {
        if self.targets.is_empty() {
            return 0.0;
        }
        self.targets.iter().filter(|&&t| t == 1).count() as f64 / self.targets.len() as f64
    }
}

/// Build the feature frame from `candles` (oldest first).
///
/// With `with_targets` the last candle is dropped (its outcome is unknown)
/// and each row carries the up/down label of the following close.  Without
/// targets every usable candle produces a row; the final row is the one to
/// classify live.
pub fn build(candles: &[Candle], with_targets: bool) -> Result<FeatureFrame> {
    if candles.len() <= SMA_LONG {
        bail!(
            "need more than {} candles to compute features, got {}",
            SMA_LONG,
            candles.len()
        );
    }

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();

    let sma_20 = calculate_sma(&closes, SMA_SHORT);
    let sma_50 = calculate_sma(&closes, SMA_LONG);
    let rsi = calculate_rsi(&closes, RSI_WINDOW);
    let macd = calculate_macd(&closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
    let stochrsi = calculate_stoch_rsi(&rsi, STOCH_RSI_WINDOW);
    let obv = calculate_obv(&closes, &volumes);
    let bb_width = calculate_bb_width(&closes, BB_WINDOW, BB_NUM_STD);
    let atr = calculate_atr(candles, ATR_WINDOW);
    let momentum = calculate_momentum(&closes, MOMENTUM_WINDOW);

    let last_index = if with_targets {
        candles.len() - 1 // the final candle has no next close to label with
    } else {
        candles.len()
    };

    let mut rows = Vec::new();
    let mut targets = Vec::new();
    let mut open_times = Vec::new();
    let mut row_closes = Vec::new();

    for i in 0..last_index {
        let row = vec![
            sma_20[i],
            sma_50[i],
            rsi[i],
            macd.macd[i],
            macd.signal[i],
            macd.histogram[i],
            stochrsi[i],
            obv[i],
            bb_width[i],
            atr[i],
            momentum[i],
            // Curated strategy context — currently always neutral.
            0.0,
        ];

        if row.iter().any(|v| !v.is_finite()) {
            continue;
        }

        if with_targets {
            let label = if candles[i + 1].close > candles[i].close {
                1
            } else {
                0
            };
            targets.push(label);
        }

        open_times.push(candles[i].open_time);
        row_closes.push(candles[i].close);
        rows.push(row);
    }

    if rows.is_empty() {
        bail!("every row was dropped while cleaning non-finite values");
    }

    debug!(
        candles = candles.len(),
        rows = rows.len(),
        with_targets,
        "feature frame assembled"
    );

    Ok(FeatureFrame {
        rows,
        targets,
        open_times,
        closes: row_closes,
    })
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let base = 100.0 + (i as f64 * 0.35).sin() * 8.0 + i as f64 * 0.05;
                Candle::new(
                    i as i64 * 900_000,
                    base,
                    base + 1.5,
                    base - 1.5,
                    base + (i as f64 * 0.9).cos() * 0.8,
                    50.0 + (i % 7) as f64,
                    i as i64 * 900_000 + 899_999,
                )
            })
            .collect()
    }

    #[test]
    fn too_few_candles_is_an_error() {
        let candles = synthetic_candles(50);
        assert!(build(&candles, true).is_err());
    }

    #[test]
    fn warmup_rows_are_dropped() {
        let candles = synthetic_candles(120);
        let frame = build(&candles, true).unwrap();

        // The SMA-50 warm-up dominates: the first usable row is candle 49.
        assert_eq!(frame.open_times[0], candles[49].open_time);
        // 120 candles − 49 warm-up − 1 unlabelled tail.
        assert_eq!(frame.n_rows(), 120 - 49 - 1);
        assert_eq!(frame.targets.len(), frame.n_rows());
    }

    #[test]
    fn rows_have_fixed_width_and_are_finite() {
        let candles = synthetic_candles(150);
        let frame = build(&candles, true).unwrap();
        for row in &frame.rows {
            assert_eq!(row.len(), FEATURE_NAMES.len());
            assert!(row.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn prediction_frame_keeps_the_latest_candle() {
        let candles = synthetic_candles(120);
        let frame = build(&candles, false).unwrap();
        assert!(frame.targets.is_empty());
        assert_eq!(
            *frame.open_times.last().unwrap(),
            candles.last().unwrap().open_time
        );
    }

    #[test]
    fn targets_encode_next_close_direction() {
        let candles = synthetic_candles(120);
        let frame = build(&candles, true).unwrap();

        for (i, &t) in frame.targets.iter().enumerate() {
            let candle_idx = frame.open_times[i] as usize / 900_000;
            let went_up = candles[candle_idx + 1].close > candles[candle_idx].close;
            assert_eq!(t == 1, went_up);
        }
    }

    #[test]
    fn positive_rate_is_a_fraction() {
        let candles = synthetic_candles(200);
        let frame = build(&candles, true).unwrap();
        let rate = frame.positive_rate();
        assert!((0.0..=1.0).contains(&rate));
    }
}
