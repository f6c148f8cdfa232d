//! # Work queue contract.
//!
//! [`Queue`] is the sink sources push request keys into and the surface an
//! external worker pool pops from. [`QueueFactory`] is how a controller builds
//! its queue lazily, at `start`, so nothing is spawned by a controller that is
//! never started.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::rate_limiter::RateLimiterRef;

/// Bound for request keys flowing through a controller.
///
/// Blanket-implemented for every type satisfying the bounds.
pub trait Key: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

impl<T> Key for T where T: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

/// A de-duplicating, rate-limited, blocking-pop work queue.
///
/// Implementations must be safe for concurrent use by many sources and workers.
#[async_trait]
pub trait Queue<K: Key>: Send + Sync + 'static {
    /// Marks `item` as needing processing.
    fn add(&self, item: K);

    /// Adds `item` once `delay` has elapsed.
    fn add_after(&self, item: K, delay: Duration);

    /// Adds `item` after the delay the rate limiter assigns to it.
    fn add_rate_limited(&self, item: K);

    /// Clears the rate limiter's failure history for `item`.
    fn forget(&self, item: &K);

    /// Returns how many times `item` has been rate-limited since the last `forget`.
    fn num_requeues(&self, item: &K) -> u32;

    /// Waits for the next item; `None` once the queue is shut down and drained.
    async fn get(&self) -> Option<K>;

    /// Marks `item` as no longer being processed.
    fn done(&self, item: &K);

    /// Number of items waiting to be handed out.
    fn len(&self) -> usize;

    /// Returns `true` when no item is waiting.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops accepting items and wakes every blocked [`get`](Queue::get).
    fn shutdown(&self);

    /// Returns `true` once [`shutdown`](Queue::shutdown) was called.
    fn is_shutting_down(&self) -> bool;
}

/// Shared handle to a queue.
pub type QueueRef<K> = Arc<dyn Queue<K>>;

/// Builds a queue from the controller name and rate limiter.
///
/// Invoked exactly once, at the start of `Controller::start`.
pub type QueueFactory<K> = Arc<dyn Fn(&str, RateLimiterRef<K>) -> QueueRef<K> + Send + Sync>;
