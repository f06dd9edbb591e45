// =============================================================================
// Rate-Limit Tracker — keeps paged downloads under the Binance weight budget
// =============================================================================
//
// Binance allows 1200 request weight per minute; we hard-cap ourselves at
// 1000.  The tracker mirrors the `X-MBX-USED-WEIGHT-1M` response header into
// an atomic counter that the paged kline download consults before each
// request.  When the budget is exhausted the caller sleeps until the next
// minute window.
// =============================================================================

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

/// Hard ceiling at which we refuse to send additional requests.
const WEIGHT_HARD_LIMIT: u32 = 1000;
/// Soft warning threshold.
const WEIGHT_WARN_THRESHOLD: u32 = 800;
/// How long to back off once the budget is exhausted.
const BACKOFF: Duration = Duration::from_secs(20);

/// Thread-safe weight tracker backed by an atomic counter.
pub struct RateLimitTracker {
    used_weight_1m: AtomicU32,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self {
            used_weight_1m: AtomicU32::new(0),
        }
    }

    /// Mirror the weight counters from the HTTP response headers returned by
    /// Binance.  The header is authoritative; local estimates are discarded.
    pub fn update_from_headers(&self, headers: &reqwest::header::HeaderMap) {
        let Some(weight) = headers
            .get("X-MBX-USED-WEIGHT-1M")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u32>().ok())
        else {
            return;
        };

        let prev = self.used_weight_1m.swap(weight, Ordering::Relaxed);
        if weight >= WEIGHT_WARN_THRESHOLD && prev < WEIGHT_WARN_THRESHOLD {
            warn!(
                used_weight = weight,
                hard_limit = WEIGHT_HARD_LIMIT,
                "rate-limit weight crossed warning threshold"
            );
        }
        debug!(used_weight_1m = weight, "rate-limit weight updated from header");
    }

    /// Return `true` if `weight` more request weight fits under the hard cap.
    pub fn can_send(&self, weight: u32) -> bool {
        self.used_weight_1m.load(Ordering::Relaxed) + weight <= WEIGHT_HARD_LIMIT
    }

    /// Current mirrored weight (diagnostics).
    pub fn used_weight(&self) -> u32 {
        self.used_weight_1m.load(Ordering::Relaxed)
    }

    /// Sleep until `weight` more request weight is affordable.
    ///
    /// The used-weight header resets every minute on Binance's side, so a
    /// fixed backoff and a re-check is enough; the counter is also decayed
    /// locally in case no further responses arrive to refresh it.
    pub async fn acquire(&self, weight: u32) {
        while !self.can_send(weight) {
            warn!(
                used_weight = self.used_weight(),
                requested = weight,
                backoff_secs = BACKOFF.as_secs(),
                "weight budget exhausted — backing off"
            );
            tokio::time::sleep(BACKOFF).await;
            // Assume the minute window has partially rolled over.
            let current = self.used_weight_1m.load(Ordering::Relaxed);
            let decayed = current.saturating_sub(WEIGHT_HARD_LIMIT / 3);
            self.used_weight_1m.store(decayed, Ordering::Relaxed);
        }
    }
}

impl Default for RateLimitTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RateLimitTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitTracker")
            .field("used_weight_1m", &self.used_weight())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_tracker_allows_requests() {
        let tracker = RateLimitTracker::new();
        assert!(tracker.can_send(100));
        assert_eq!(tracker.used_weight(), 0);
    }

    #[test]
    fn header_updates_are_mirrored() {
        let tracker = RateLimitTracker::new();

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("X-MBX-USED-WEIGHT-1M", "950".parse().unwrap());
        tracker.update_from_headers(&headers);

        assert_eq!(tracker.used_weight(), 950);
        assert!(tracker.can_send(50));
        assert!(!tracker.can_send(51));
    }

    #[test]
    fn garbage_headers_are_ignored() {
        let tracker = RateLimitTracker::new();

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("X-MBX-USED-WEIGHT-1M", "not-a-number".parse().unwrap());
        tracker.update_from_headers(&headers);

        assert_eq!(tracker.used_weight(), 0);
    }
}
