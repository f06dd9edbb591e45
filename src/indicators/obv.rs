// =============================================================================
// On-Balance Volume (OBV)
// =============================================================================
//
// Cumulative volume signed by the direction of the close-to-close change:
//
//   OBV_t = OBV_{t-1} + volume_t   if close_t >  close_{t-1}
//   OBV_t = OBV_{t-1} - volume_t   if close_t <= close_{t-1}
//
// The first bar has no previous close and counts as an up-move, matching the
// training pipeline's convention.
// =============================================================================

/// Compute the OBV series from parallel `closes` and `volumes` slices.
///
/// The result has the same length as the inputs and is defined from index 0.
/// Mismatched input lengths yield an empty series.
pub fn calculate_obv(closes: &[f64], volumes: &[f64]) -> Vec<f64> {
    if closes.len() != volumes.len() {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(closes.len());
    let mut obv = 0.0;

    for i in 0..closes.len() {
        let up = if i == 0 {
            true
        } else {
            closes[i] - closes[i - 1] > 0.0
        };

        obv += if up { volumes[i] } else { -volumes[i] };
        result.push(obv);
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
    fn obv_mismatched_inputs_are_rejected() {
        assert!(calculate_obv(&[1.0, 2.0], &[10.0]).is_empty());
    }

    #[test]
    fn obv_first_bar_counts_as_up_move() {
        let out = calculate_obv(&[100.0], &[25.0]);
        assert_eq!(out, vec![25.0]);
    }

    #[test]
    fn obv_accumulates_signed_volume() {
        let closes = vec![100.0, 101.0, 100.5, 100.5, 102.0];
        let volumes = vec![10.0, 20.0, 30.0, 5.0, 15.0];
        let out = calculate_obv(&closes, &volumes);
        // +10 (first), +20 (up), -30 (down), -5 (flat counts as down), +15 (up)
        assert_eq!(out, vec![10.0, 30.0, 0.0, -5.0, 10.0]);
    }

    #[test]
    fn obv_monotonic_in_steady_uptrend() {
        let closes: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        let volumes = vec![5.0; 20];
        let out = calculate_obv(&closes, &volumes);
        assert!(out.windows(2).all(|w| w[1] > w[0]));
    }
}
