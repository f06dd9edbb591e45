// =============================================================================
// Momentum
// =============================================================================
//
// The raw price change over a fixed look-back:
//   momentum_t = close_t - close_{t - period}

/// Compute the momentum series for `closes` with the given `period`.
///
/// The result has the same length as the input; the first `period` positions
/// are NaN.
pub fn calculate_momentum(closes: &[f64], period: usize) -> Vec<f64> {
    let mut result = vec![f64::NAN; closes.len()];
    if period == 0 || closes.len() <= period {
        return result;
    }

    for i in period..closes.len() {
        result[i] = closes[i] - closes[i - period];
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
    fn momentum_period_zero_is_all_nan() {
        let out = calculate_momentum(&[1.0, 2.0, 3.0], 0);
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn momentum_alignment_and_values() {
        let closes = vec![100.0, 102.0, 101.0, 105.0, 110.0];
        let out = calculate_momentum(&closes, 2);
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert!((out[2] - 1.0).abs() < 1e-12);
        assert!((out[3] - 3.0).abs() < 1e-12);
        assert!((out[4] - 9.0).abs() < 1e-12);
    }

    #[test]
    fn momentum_is_negative_in_downtrend() {
        let closes: Vec<f64> = (1..=30).rev().map(|i| i as f64).collect();
        let out = calculate_momentum(&closes, 14);
        assert!((out[29] + 14.0).abs() < 1e-12);
    }
}
