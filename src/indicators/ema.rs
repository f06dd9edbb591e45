// =============================================================================
// Exponential Moving Average (EMA) — span parameterisation
// =============================================================================
//
// EMA gives more weight to recent values:
//   multiplier = 2 / (span + 1)
//   EMA_0      = v_0
//   EMA_t      = v_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// Seeding with the first value (rather than an SMA) matches the recursive
// form the features were trained with, so the MACD built on top of this EMA
// reproduces the training pipeline exactly.

/// Compute the EMA series for `values` with the given `span`.
///
/// The result has the same length as the input and is defined from index 0.
/// A non-finite input value poisons the series from that point on.
///
/// # Edge cases
/// - `span == 0` => all-NaN series (division-by-zero guard)
pub fn calculate_ema(values: &[f64], span: usize) -> Vec<f64> {
    let mut result = vec![f64::NAN; values.len()];
    if span == 0 || values.is_empty() {
        return result;
    }

    let multiplier = 2.0 / (span + 1) as f64;

    let mut prev = values[0];
    result[0] = prev;
    for i in 1..values.len() {
        prev = values[i] * multiplier + prev * (1.0 - multiplier);
        result[i] = prev;
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
    fn ema_span_zero_is_all_nan() {
        let out = calculate_ema(&[1.0, 2.0], 0);
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn ema_first_value_seeds_series() {
        let out = calculate_ema(&[10.0, 10.0, 10.0], 5);
        for v in out {
            assert!((v - 10.0).abs() < 1e-12);
        }
    }

    #[test]
    fn ema_known_recursion() {
        // span=3 => multiplier = 0.5
        let out = calculate_ema(&[2.0, 4.0, 8.0], 3);
        assert!((out[0] - 2.0).abs() < 1e-12);
        assert!((out[1] - 3.0).abs() < 1e-12); // 4*0.5 + 2*0.5
        assert!((out[2] - 5.5).abs() < 1e-12); // 8*0.5 + 3*0.5
    }

    #[test]
    fn ema_tracks_trend_direction() {
        let rising: Vec<f64> = (1..=50).map(|i| i as f64).collect();
        let out = calculate_ema(&rising, 10);
        // EMA lags a rising series but must still be increasing.
        assert!(out.windows(2).all(|w| w[1] > w[0]));
        assert!(out[49] < 50.0);
    }
}
