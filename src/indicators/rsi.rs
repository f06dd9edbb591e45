// =============================================================================
// Relative Strength Index (RSI) — Wilder's Smoothing
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes.
//
// Step 1 — Compute price changes (deltas) from consecutive closes.
// Step 2 — Seed average gain / average loss with the SMA of the first `period`
//          gains / losses.
// Step 3 — Apply Wilder's exponential smoothing:
//            avg_gain = (prev_avg_gain * (period - 1) + current_gain) / period
//            avg_loss = (prev_avg_loss * (period - 1) + current_loss) / period
// Step 4 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// Thresholds:  RSI > 70 => OVERBOUGHT,  RSI < 30 => OVERSOLD.
// =============================================================================

/// Compute the RSI series for the given `closes` and `period`.
///
/// The result has the same length as the input; positions before index
/// `period` are NaN (the first `period` closes are consumed to seed the
/// averages).  If the average loss is zero (no down moves) RSI is clamped to
/// 100.
///
/// # Edge cases
/// - `period == 0` or `closes.len() < period + 1` => all-NaN series
pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let mut result = vec![f64::NAN; closes.len()];
    if period == 0 || closes.len() < period + 1 {
        return result;
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    // Seed averages with the SMA of the first `period` deltas.
    let (sum_gain, sum_loss) = deltas[..period].iter().fold((0.0_f64, 0.0_f64), |(g, l), &d| {
        if d > 0.0 {
            (g + d, l)
        } else {
            (g, l + d.abs())
        }
    });

    let period_f = period as f64;
    let mut avg_gain = sum_gain / period_f;
    let mut avg_loss = sum_loss / period_f;

    result[period] = rsi_from_averages(avg_gain, avg_loss);

    for (i, &delta) in deltas.iter().enumerate().skip(period) {
        let (gain, loss) = if delta > 0.0 {
            (delta, 0.0)
        } else {
            (0.0, delta.abs())
        };

        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;

        // Delta index i corresponds to close index i + 1.
        result[i + 1] = rsi_from_averages(avg_gain, avg_loss);
    }

    result
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if !avg_gain.is_finite() || !avg_loss.is_finite() {
        return f64::NAN;
    }
    if avg_loss == 0.0 {
        // No down moves in the window: maximally overbought.
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_insufficient_data_is_all_nan() {
        let out = calculate_rsi(&[1.0, 2.0, 3.0], 14);
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn rsi_alignment() {
        let closes: Vec<f64> = (1..=30).map(|i| 100.0 + i as f64).collect();
        let out = calculate_rsi(&closes, 14);
        assert_eq!(out.len(), closes.len());
        assert!(out[13].is_nan());
        assert!(out[14].is_finite());
    }

    #[test]
    fn rsi_all_gains_is_100() {
        let closes: Vec<f64> = (1..=30).map(|i| i as f64).collect();
        let out = calculate_rsi(&closes, 14);
        assert!((out[29] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn rsi_all_losses_is_0() {
        let closes: Vec<f64> = (1..=30).rev().map(|i| i as f64).collect();
        let out = calculate_rsi(&closes, 14);
        assert!(out[29].abs() < 1e-9);
    }

    #[test]
    fn rsi_alternating_series_is_mid_range() {
        let closes: Vec<f64> = (0..40)
            .map(|i| if i % 2 == 0 { 100.0 } else { 101.0 })
            .collect();
        let out = calculate_rsi(&closes, 14);
        let last = out[39];
        assert!(last > 30.0 && last < 70.0, "expected mid-range RSI, got {last}");
    }

    #[test]
    fn rsi_stays_within_bounds() {
        let closes: Vec<f64> = (0..100)
            .map(|i| 100.0 + (i as f64 * 0.7).sin() * 15.0)
            .collect();
        for v in calculate_rsi(&closes, 14) {
            if v.is_finite() {
                assert!((0.0..=100.0).contains(&v), "RSI out of bounds: {v}");
            }
        }
    }
}
