//! # Rate limiters for requeued items.
//!
//! A [`RateLimiter`] answers "how long should this item wait before it is
//! queued again". Three building blocks are provided:
//!
//! - [`BackoffRateLimiter`] per-item exponential backoff driven by a [`BackoffPolicy`]
//! - [`BucketRateLimiter`] overall token bucket shared by all items
//! - [`MaxOfRateLimiter`] the largest delay of several limiters
//!
//! [`default_rate_limiter`] combines the first two the way controllers
//! conventionally do: per-item backoff from 5ms to 1000s, capped overall at
//! 10 qps with a burst of 100.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::policies::BackoffPolicy;

use super::interface::Key;

/// Decides requeue delays for items.
pub trait RateLimiter<K: Key>: Send + Sync + 'static {
    /// Returns the delay for the next requeue of `item` and records the attempt.
    fn when(&self, item: &K) -> Duration;

    /// Stops tracking `item`; its next delay starts from scratch.
    fn forget(&self, item: &K);

    /// Returns how many times `item` was requeued since the last `forget`.
    fn num_requeues(&self, item: &K) -> u32;
}

/// Shared handle to a rate limiter.
pub type RateLimiterRef<K> = Arc<dyn RateLimiter<K>>;

/// Returns the conventional controller rate limiter:
/// `max(per-item backoff 5ms..1000s, bucket 10 qps / burst 100)`.
pub fn default_rate_limiter<K: Key>() -> RateLimiterRef<K> {
    let backoff: RateLimiterRef<K> = Arc::new(BackoffRateLimiter::new(BackoffPolicy::default()));
    let bucket: RateLimiterRef<K> = Arc::new(BucketRateLimiter::new(10.0, 100));
    Arc::new(MaxOfRateLimiter::new(vec![backoff, bucket]))
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-item exponential backoff.
///
/// The `n`-th requeue of an item waits `policy.next(n)`.
#[derive(Debug)]
pub struct BackoffRateLimiter<K> {
    policy: BackoffPolicy,
    failures: Mutex<HashMap<K, u32>>,
}

impl<K: Key> BackoffRateLimiter<K> {
    /// Creates a limiter with the given policy.
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            failures: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Key> RateLimiter<K> for BackoffRateLimiter<K> {
    fn when(&self, item: &K) -> Duration {
        let mut failures = lock(&self.failures);
        let count = failures.entry(item.clone()).or_insert(0);
        let n = *count;
        *count = count.saturating_add(1);
        self.policy.next(n)
    }

    fn forget(&self, item: &K) {
        lock(&self.failures).remove(item);
    }

    fn num_requeues(&self, item: &K) -> u32 {
        lock(&self.failures).get(item).copied().unwrap_or(0)
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last: Instant,
}

/// Token bucket applied to all items together.
///
/// Tokens refill at `qps` up to `burst`; a requeue that finds the bucket empty
/// is delayed until its token would have been refilled.
#[derive(Debug)]
pub struct BucketRateLimiter {
    qps: f64,
    burst: f64,
    bucket: Mutex<Bucket>,
}

impl BucketRateLimiter {
    /// Creates a bucket refilling at `qps` with capacity `burst` (both min 1).
    pub fn new(qps: f64, burst: u32) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            qps: if qps.is_finite() && qps > 0.0 { qps } else { 1.0 },
            burst,
            bucket: Mutex::new(Bucket {
                tokens: burst,
                last: Instant::now(),
            }),
        }
    }

    fn reserve(&self) -> Duration {
        let mut bucket = lock(&self.bucket);
        let now = Instant::now();
        let refill = now.duration_since(bucket.last).as_secs_f64() * self.qps;
        bucket.tokens = (bucket.tokens + refill).min(self.burst) - 1.0;
        bucket.last = now;

        if bucket.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-bucket.tokens / self.qps)
        }
    }
}

impl<K: Key> RateLimiter<K> for BucketRateLimiter {
    fn when(&self, _item: &K) -> Duration {
        self.reserve()
    }

    fn forget(&self, _item: &K) {}

    fn num_requeues(&self, _item: &K) -> u32 {
        0
    }
}

/// Combines limiters by taking the longest delay.
pub struct MaxOfRateLimiter<K> {
    limiters: Vec<RateLimiterRef<K>>,
}

impl<K: Key> MaxOfRateLimiter<K> {
    /// Creates a combined limiter. An empty list never delays.
    pub fn new(limiters: Vec<RateLimiterRef<K>>) -> Self {
        Self { limiters }
    }
}

impl<K: Key> RateLimiter<K> for MaxOfRateLimiter<K> {
    fn when(&self, item: &K) -> Duration {
        // Every limiter must observe the attempt, so no short-circuiting.
        self.limiters
            .iter()
            .map(|l| l.when(item))
            .fold(Duration::ZERO, Duration::max)
    }

    fn forget(&self, item: &K) {
        for l in &self.limiters {
            l.forget(item);
        }
    }

    fn num_requeues(&self, item: &K) -> u32 {
        self.limiters
            .iter()
            .map(|l| l.num_requeues(item))
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::JitterPolicy;

    fn fast_backoff() -> BackoffRateLimiter<&'static str> {
        BackoffRateLimiter::new(BackoffPolicy {
            first: Duration::from_millis(1),
            max: Duration::from_millis(8),
            factor: 2.0,
            jitter: JitterPolicy::None,
        })
    }

    #[test]
    fn backoff_is_tracked_per_item() {
        let limiter = fast_backoff();
        assert_eq!(limiter.when(&"a"), Duration::from_millis(1));
        assert_eq!(limiter.when(&"a"), Duration::from_millis(2));
        assert_eq!(limiter.when(&"b"), Duration::from_millis(1));
        assert_eq!(limiter.num_requeues(&"a"), 2);

        limiter.forget(&"a");
        assert_eq!(limiter.num_requeues(&"a"), 0);
        assert_eq!(limiter.when(&"a"), Duration::from_millis(1));
    }

    #[test]
    fn backoff_caps_at_max() {
        let limiter = fast_backoff();
        let last = (0..10).map(|_| limiter.when(&"a")).last();
        assert_eq!(last, Some(Duration::from_millis(8)));
    }

    #[test]
    fn bucket_allows_burst_then_delays() {
        let bucket = BucketRateLimiter::new(1.0, 2);
        assert_eq!(RateLimiter::<u32>::when(&bucket, &1), Duration::ZERO);
        assert_eq!(RateLimiter::<u32>::when(&bucket, &2), Duration::ZERO);
        let third = RateLimiter::<u32>::when(&bucket, &3);
        assert!(third > Duration::from_millis(900), "got {third:?}");
        assert!(third <= Duration::from_secs(1), "got {third:?}");
    }

    #[test]
    fn max_of_takes_longest_and_aggregates_requeues() {
        let backoff: RateLimiterRef<&'static str> = Arc::new(fast_backoff());
        let bucket: RateLimiterRef<&'static str> = Arc::new(BucketRateLimiter::new(1000.0, 1000));
        let limiter = MaxOfRateLimiter::new(vec![backoff, bucket]);
        assert_eq!(limiter.when(&"a"), Duration::from_millis(1));
        assert_eq!(limiter.when(&"a"), Duration::from_millis(2));
        assert_eq!(limiter.num_requeues(&"a"), 2);

        limiter.forget(&"a");
        assert_eq!(limiter.num_requeues(&"a"), 0);
    }
}
