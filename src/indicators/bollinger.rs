// =============================================================================
// Bollinger Band Width
// =============================================================================
//
// Bollinger Bands are a middle band (SMA) flanked by bands `k` sample
// standard deviations away.  The classifier consumes only the normalised
// width:
//
//   width_t = (upper_t - lower_t) / middle_t = 2k * sigma_t / SMA_t
//
// The sample standard deviation (n - 1 denominator) matches the statistics
// library the model was originally trained against.
// =============================================================================

/// Compute the Bollinger band width series for `closes`.
///
/// The result has the same length as the input; the first `period - 1`
/// positions are NaN, as is any position whose window contains a non-finite
/// value or whose middle band is zero.
pub fn calculate_bb_width(closes: &[f64], period: usize, num_std: f64) -> Vec<f64> {
    let mut result = vec![f64::NAN; closes.len()];
    if period < 2 || closes.len() < period {
        return result;
    }

    for i in (period - 1)..closes.len() {
        let window = &closes[i + 1 - period..=i];
        if window.iter().any(|v| !v.is_finite()) {
            continue;
        }

        let middle = window.iter().sum::<f64>() / period as f64;
        if middle == 0.0 {
            continue;
        }

        let variance =
            window.iter().map(|v| (v - middle).powi(2)).sum::<f64>() / (period - 1) as f64;
        let std_dev = variance.sqrt();

        result[i] = 2.0 * num_std * std_dev / middle;
    }

    result
}
