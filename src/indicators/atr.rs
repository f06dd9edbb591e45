// =============================================================================
// Average True Range (ATR) — exponential smoothing
// =============================================================================
//
// ATR measures volatility by decomposing the entire range of a bar.
//
// True Range (TR) for each bar:
//   TR = max(H - L, |H - prevClose|, |L - prevClose|)
//
// The series is smoothed with alpha = 1 / period from the first bar (whose
// TR is simply H - L), matching the recursive exponential form the features
// were trained with:
//   ATR_0 = TR_0
//   ATR_t = (1 - alpha) * ATR_{t-1} + alpha * TR_t
// =============================================================================

use crate::market_data::Candle;

/// Compute the ATR series for `candles` (oldest first).
///
/// The result has the same length as the input and is defined from index 0.
///
/// # Edge cases
/// - `period == 0` => all-NaN series
/// - A non-finite OHLC value poisons the series from that bar on.
pub fn calculate_atr(candles: &[Candle], period: usize) -> Vec<f64> {
    let mut result = vec![f64::NAN; candles.len()];
    if period == 0 || candles.is_empty() {
        return result;
    }

    let alpha = 1.0 / period as f64;

    let mut atr = candles[0].high - candles[0].low;
    result[0] = atr;

    for i in 1..candles.len() {
        let high = candles[i].high;
        let low = candles[i].low;
        let prev_close = candles[i - 1].close;

        let tr = (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs());

        atr = (1.0 - alpha) * atr + alpha * tr;
        result[i] = atr;
    }

    result
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    /// Build a test candle with the given OHLC values.
    fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle::new(0, open, high, low, close, 100.0, 0)
    }

    #[test]
    fn atr_period_zero_is_all_nan() {
        let candles = vec![candle(100.0, 105.0, 95.0, 102.0); 5];
        assert!(calculate_atr(&candles, 0).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn atr_first_value_is_bar_range() {
        let candles = vec![candle(100.0, 106.0, 96.0, 102.0)];
        let out = calculate_atr(&candles, 14);
        assert!((out[0] - 10.0).abs() < 1e-12);
    }

    #[test]
    fn atr_constant_range_converges() {
        // Every bar spans exactly 10; ATR must stay at 10.
        let candles: Vec<Candle> = (0..40)
            .map(|_| candle(100.0, 105.0, 95.0, 100.0))
            .collect();
        let out = calculate_atr(&candles, 14);
        assert!((out[39] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn atr_true_range_uses_prev_close_on_gaps() {
        // Gap up: |H - prevClose| = 20 dominates H - L = 7.
        let candles = vec![
            candle(100.0, 105.0, 95.0, 95.0),
            candle(110.0, 115.0, 108.0, 112.0),
        ];
        let out = calculate_atr(&candles, 2);
        // ATR_1 = 0.5 * 10 + 0.5 * 20 = 15.
        assert!((out[1] - 15.0).abs() < 1e-12);
    }

    #[test]
    fn atr_rises_with_expanding_volatility() {
        let mut candles = vec![candle(100.0, 101.0, 99.0, 100.0)];
        for i in 1..40 {
            let spread = 1.0 + i as f64 * 0.5;
            candles.push(candle(100.0, 100.0 + spread, 100.0 - spread, 100.0));
        }
        let out = calculate_atr(&candles, 5);
        assert!(out[39] > out[10]);
    }
}
