//! In-process request limiting.
//!
//! The limiter sits behind a trait so a shared store can replace it without
//! touching handlers. The bundled implementation only sees its own process.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{DefaultKeyedRateLimiter, Quota};
use tracing::debug;

pub trait RateLimiter: Send + Sync {
    /// Count one hit for `key`; `false` once the key is over its budget.
    fn check(&self, key: &str) -> bool;
}

/// Per-key limiter backed by `governor`: `limit` hits per `window`, replenished
/// evenly across the window, with a bounded number of tracked keys.
pub struct KeyedLimiter {
    limiter: DefaultKeyedRateLimiter<String>,
    capacity: usize,
}

impl KeyedLimiter {
    pub const DEFAULT_CAPACITY: usize = 10_000;

    pub fn new(limit: u32, window: Duration) -> Self {
        Self::with_capacity(limit, window, Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(limit: u32, window: Duration, capacity: usize) -> Self {
        let burst = NonZeroU32::new(limit).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(window / burst.get())
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);
        Self {
            limiter: governor::RateLimiter::keyed(quota),
            capacity: capacity.max(1),
        }
    }

    /// Number of keys currently holding state.
    pub fn tracked_keys(&self) -> usize {
        self.limiter.len()
    }
}

impl RateLimiter for KeyedLimiter {
    fn check(&self, key: &str) -> bool {
        if self.limiter.len() >= self.capacity {
            // Keys whose budget has fully replenished carry no information.
            self.limiter.retain_recent();
            self.limiter.shrink_to_fit();
            debug!("Rate limiter pruned to {} keys", self.limiter.len());
        }
        self.limiter.check_key(&key.to_string()).is_ok()
    }
}
