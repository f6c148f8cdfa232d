//! # Backoff policy for requeued items.
//!
//! [`BackoffPolicy`] turns "how many times has this item failed" into a delay.
//! The delay for failure `n` is `first × factor^n`, clamped to `max`, then
//! jitter is applied. The base is derived from `n` alone, so a jittered
//! result never feeds back into the next computation.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use reconcile_controller::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(5),
//!     max: Duration::from_secs(1),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(5));
//! assert_eq!(backoff.next(3), Duration::from_millis(40));
//! assert_eq!(backoff.next(20), Duration::from_secs(1));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Exponential backoff parameters.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay after the first failure.
    pub first: Duration,
    /// Upper bound for any delay.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Randomization applied to the clamped delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Per-item controller default: `first = 5ms`, `factor = 2.0`, `max = 1000s`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(5),
            max: Duration::from_secs(1000),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay for the given (0-indexed) failure count.
    ///
    /// Overflowing, negative or non-finite intermediate values clamp to `max`.
    pub fn next(&self, failures: u32) -> Duration {
        let exp = failures.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        self.jitter.apply(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exponential(first_ms: u64, max: Duration) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(first_ms),
            max,
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }

    #[test]
    fn doubles_per_failure() {
        let policy = exponential(5, Duration::from_secs(1000));
        let delays: Vec<_> = (0..4).map(|n| policy.next(n)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(5),
                Duration::from_millis(10),
                Duration::from_millis(20),
                Duration::from_millis(40),
            ]
        );
    }

    #[test]
    fn first_larger_than_max_is_clamped() {
        let policy = exponential(10_000, Duration::from_secs(5));
        assert_eq!(policy.next(0), Duration::from_secs(5));
    }

    #[test]
    fn overflow_clamps_to_max() {
        let policy = exponential(100, Duration::from_secs(10));
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn equal_jitter_stays_within_half_and_base() {
        let policy = BackoffPolicy {
            jitter: JitterPolicy::Equal,
            factor: 1.0,
            ..exponential(1000, Duration::from_secs(30))
        };
        for n in 0..50 {
            let delay = policy.next(n);
            assert!(delay >= Duration::from_millis(500), "failure {n}: {delay:?}");
            assert!(delay <= Duration::from_millis(1000), "failure {n}: {delay:?}");
        }
    }
}
