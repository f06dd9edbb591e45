// =============================================================================
// Stochastic RSI
// =============================================================================
//
// Applies the stochastic oscillator formula to the RSI series itself:
//
//   StochRSI_t = (RSI_t - min(RSI, window)) / (max(RSI, window) - min(RSI, window))
//
// Output range is [0, 1].  Values near 1 mean RSI is at the top of its recent
// range; values near 0 mean it is at the bottom.
// =============================================================================

/// Compute the Stochastic RSI series from an already-computed RSI series.
///
/// The result has the same length as the input.  A position is NaN when the
/// look-back window is incomplete, contains NaN (e.g. the RSI warm-up
/// region), or is flat (max == min).
pub fn calculate_stoch_rsi(rsi: &[f64], window: usize) -> Vec<f64> {
    let mut result = vec![f64::NAN; rsi.len()];
    if window == 0 || rsi.len() < window {
        return result;
    }

    for i in (window - 1)..rsi.len() {
        let slice = &rsi[i + 1 - window..=i];
        if slice.iter().any(|v| !v.is_finite()) {
            continue;
        }

        let min = slice.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = slice.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        let range = max - min;
        if range > 0.0 {
            result[i] = (rsi[i] - min) / range;
        }
    }

    result
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stoch_rsi_window_zero_is_all_nan() {
        let out = calculate_stoch_rsi(&[50.0, 60.0], 0);
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn stoch_rsi_at_window_extremes() {
        let rsi = vec![30.0, 40.0, 50.0, 60.0, 70.0];
        let out = calculate_stoch_rsi(&rsi, 5);
        // Last value is the window maximum => 1.0.
        assert!((out[4] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn stoch_rsi_at_window_minimum_is_zero() {
        let rsi = vec![70.0, 60.0, 50.0, 40.0, 30.0];
        let out = calculate_stoch_rsi(&rsi, 5);
        assert!(out[4].abs() < 1e-12);
    }

    #[test]
    fn stoch_rsi_flat_window_is_nan() {
        let rsi = vec![50.0; 10];
        let out = calculate_stoch_rsi(&rsi, 5);
        assert!(out[9].is_nan());
    }

    #[test]
    fn stoch_rsi_skips_rsi_warmup_nans() {
        let mut rsi = vec![f64::NAN; 5];
        rsi.extend([40.0, 50.0, 60.0, 55.0, 45.0]);
        let out = calculate_stoch_rsi(&rsi, 3);
        // Windows overlapping the NaN warm-up stay NaN.
        assert!(out[5].is_nan());
        assert!(out[6].is_nan());
        assert!(out[7].is_finite());
    }

    #[test]
    fn stoch_rsi_stays_within_unit_interval() {
        let rsi: Vec<f64> = (0..50).map(|i| 50.0 + (i as f64 * 0.9).sin() * 20.0).collect();
        for v in calculate_stoch_rsi(&rsi, 14) {
            if v.is_finite() {
                assert!((0.0..=1.0).contains(&v), "StochRSI out of bounds: {v}");
            }
        }
    }
}
