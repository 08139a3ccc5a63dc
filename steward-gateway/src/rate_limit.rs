//! Per-key token-bucket admission control.
//!
//! One bucket per API key id, created lazily on the key's first request
//! and held for the life of the process. Capacity equals the key's
//! per-minute limit; refill is continuous at `capacity / 60` tokens per
//! second. Buckets serialize under their own mutex; the surrounding map
//! is a concurrent `DashMap` whose entry API gives the double-checked
//! insertion the lazy creation needs. Limiting is process-local only.

use dashmap::DashMap;
use std::sync::Mutex;
use std::time::Instant;
use uuid::Uuid;

#[derive(Debug)]
struct TokenBucket {
    capacity: f64,
    refill_rate_per_second: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(rate_limit_per_minute: u32, now: Instant) -> Self {
        let capacity = f64::from(rate_limit_per_minute);
        Self {
            capacity,
            refill_rate_per_second: capacity / 60.0,
            tokens: capacity,
            last_refill: now,
        }
    }

    fn try_consume(&mut self, now: Instant) -> bool {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate_per_second).min(self.capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Process-wide rate limiter keyed by API key id.
#[derive(Default)]
pub struct RateLimiter {
    buckets: DashMap<Uuid, Mutex<TokenBucket>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit one request for `api_key_id`, consuming one token.
    ///
    /// Returns `false` when the bucket is empty. The key's limit is only
    /// read at bucket creation; a changed limit takes effect on restart.
    pub fn try_acquire(&self, api_key_id: Uuid, rate_limit_per_minute: u32) -> bool {
        let now = Instant::now();
        let bucket = self
            .buckets
            .entry(api_key_id)
            .or_insert_with(|| Mutex::new(TokenBucket::new(rate_limit_per_minute, now)));

        let mut guard = bucket.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.try_consume(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn burst_is_bounded_by_capacity() {
        let limiter = RateLimiter::new();
        let key = Uuid::new_v4();

        let admitted = (0..61)
            .filter(|_| limiter.try_acquire(key, 60))
            .count();
        assert_eq!(admitted, 60);
        assert!(!limiter.try_acquire(key, 60));
    }

    #[test]
    fn refill_restores_one_token_per_period() {
        let now = Instant::now();
        let mut bucket = TokenBucket::new(60, now);

        for _ in 0..60 {
            assert!(bucket.try_consume(now));
        }
        assert!(!bucket.try_consume(now));

        // 60/min refills one token per second.
        assert!(bucket.try_consume(now + Duration::from_secs(1)));
        assert!(!bucket.try_consume(now + Duration::from_secs(1)));
    }

    #[test]
    fn refill_clamps_at_capacity() {
        let now = Instant::now();
        let mut bucket = TokenBucket::new(2, now);

        assert!(bucket.try_consume(now));
        // A long idle period must not bank more than `capacity` tokens.
        let later = now + Duration::from_secs(3600);
        assert!(bucket.try_consume(later));
        assert!(bucket.try_consume(later));
        assert!(!bucket.try_consume(later));
    }

    #[test]
    fn buckets_are_independent_per_key() {
        let limiter = RateLimiter::new();
        let busy = Uuid::new_v4();
        let idle = Uuid::new_v4();

        while limiter.try_acquire(busy, 5) {}
        assert!(limiter.try_acquire(idle, 5));
    }

    #[test]
    fn steady_state_admissions_stay_under_the_rate_bound() {
        let now = Instant::now();
        let mut bucket = TokenBucket::new(60, now);

        // Drain the initial burst, then hammer for a simulated 10 s window.
        while bucket.try_consume(now) {}
        let mut admitted = 0;
        for ms in (0..10_000).step_by(10) {
            if bucket.try_consume(now + Duration::from_millis(ms)) {
                admitted += 1;
            }
        }
        // <= ceil(60 * 10 / 60) = 10 admissions over the window.
        assert!(admitted <= 10, "admitted {admitted} in 10s at 60/min");
    }
}
