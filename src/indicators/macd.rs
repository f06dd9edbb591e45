// =============================================================================
// Moving Average Convergence/Divergence (MACD)
// =============================================================================
//
//   macd      = EMA_fast(close) - EMA_slow(close)
//   signal    = EMA_signal(macd)
//   histogram = macd - signal
//
// Standard parameters: fast=12, slow=26, signal=9.
// =============================================================================

use super::ema::calculate_ema;

/// The three MACD series, each aligned with the input closes.
#[derive(Debug, Clone)]
pub struct MacdResult {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

/// Compute MACD, its signal line, and the histogram for `closes`.
///
/// All three series have the same length as the input.  With zero-period
/// arguments the underlying EMAs degenerate to NaN series, which propagates
/// through every output position.
pub fn calculate_macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> MacdResult {
    let ema_fast = calculate_ema(closes, fast);
    let ema_slow = calculate_ema(closes, slow);

    let macd: Vec<f64> = ema_fast
        .iter()
        .zip(ema_slow.iter())
        .map(|(f, s)| f - s)
        .collect();

    let signal_line = calculate_ema(&macd, signal);

    let histogram: Vec<f64> = macd
        .iter()
        .zip(signal_line.iter())
        .map(|(m, s)| m - s)
        .collect();

    MacdResult {
        macd,
        signal: signal_line,
        histogram,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macd_output_lengths_match_input() {
        let closes: Vec<f64> = (1..=60).map(|i| i as f64).collect();
        let out = calculate_macd(&closes, 12, 26, 9);
        assert_eq!(out.macd.len(), 60);
        assert_eq!(out.signal.len(), 60);
        assert_eq!(out.histogram.len(), 60);
    }

    #[test]
    fn macd_is_zero_on_flat_series() {
        let closes = vec![100.0; 60];
        let out = calculate_macd(&closes, 12, 26, 9);
        assert!(out.macd[59].abs() < 1e-9);
        assert!(out.signal[59].abs() < 1e-9);
        assert!(out.histogram[59].abs() < 1e-9);
    }

    #[test]
    fn macd_positive_in_uptrend() {
        let closes: Vec<f64> = (1..=120).map(|i| 100.0 + i as f64).collect();
        let out = calculate_macd(&closes, 12, 26, 9);
        // Fast EMA sits above slow EMA in a sustained uptrend.
        assert!(out.macd[119] > 0.0);
    }

    #[test]
    fn macd_negative_in_downtrend() {
        let closes: Vec<f64> = (1..=120).map(|i| 300.0 - i as f64).collect();
        let out = calculate_macd(&closes, 12, 26, 9);
        assert!(out.macd[119] < 0.0);
    }

    #[test]
    fn histogram_is_macd_minus_signal() {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let out = calculate_macd(&closes, 12, 26, 9);
        for i in 0..closes.len() {
            let expected = out.macd[i] - out.signal[i];
            assert!((out.histogram[i] - expected).abs() < 1e-12);
        }
    }
}
