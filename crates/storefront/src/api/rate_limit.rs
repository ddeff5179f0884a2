//! Client-side rate limiting using governor.
//!
//! Every outbound call consults a keyed GCRA limiter before touching the
//! network. The quota is "N requests per window": a burst of N, with one cell
//! replenished every `window / N`.

use std::num::NonZeroU32;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

use crate::config::RateLimitConfig;

/// Keyed limiter shared by all requests of one `ApiClient`.
pub struct ClientRateLimiter {
    limiter: DefaultKeyedRateLimiter<String>,
}

impl ClientRateLimiter {
    /// Build a limiter allowing `config.requests` per `config.window` for
    /// each key.
    #[must_use]
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            limiter: RateLimiter::keyed(quota(config)),
        }
    }

    /// Take one cell for `client_id`. Returns `false` when the budget is
    /// exhausted.
    #[must_use]
    pub fn try_acquire(&self, client_id: &str) -> bool {
        self.limiter.check_key(&client_id.to_owned()).is_ok()
    }
}

impl std::fmt::Debug for ClientRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRateLimiter").finish_non_exhaustive()
    }
}

fn quota(config: &RateLimitConfig) -> Quota {
    let burst: NonZeroU32 = config.requests;
    // Sub-nanosecond periods round to zero; fall back to a per-second quota.
    Quota::with_period(config.window / burst.get())
        .map_or_else(|| Quota::per_second(burst), |quota| quota.allow_burst(burst))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn limiter(requests: u32, window_secs: u64) -> ClientRateLimiter {
        ClientRateLimiter::new(&RateLimitConfig {
            requests: NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN),
            window: Duration::from_secs(window_secs),
        })
    }

    #[test]
    fn test_allows_burst_then_rejects() {
        let limiter = limiter(3, 60);
        assert!(limiter.try_acquire("web"));
        assert!(limiter.try_acquire("web"));
        assert!(limiter.try_acquire("web"));
        assert!(!limiter.try_acquire("web"));
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = limiter(1, 60);
        assert!(limiter.try_acquire("web"));
        assert!(!limiter.try_acquire("web"));
        assert!(limiter.try_acquire("kiosk"));
    }
}
