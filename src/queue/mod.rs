//! Work queue and rate limiting.
//!
//! The controller treats the queue as a collaborator: it builds one through a
//! [`QueueFactory`] when it starts, hands it to every source as their sink and
//! shuts it down when its operating context is cancelled. Consumers pop, mark
//! done and requeue items on their own.
//!
//! ## Contents
//! - [`Key`], [`Queue`], [`QueueRef`], [`QueueFactory`] the contract
//! - [`RateLimiter`] and its implementations, [`default_rate_limiter`]
//! - [`RateLimitingQueue`] the default implementation, [`default_queue_factory`]

mod interface;
mod rate_limiter;
mod rate_limiting_queue;

use std::sync::Arc;

pub use interface::{Key, Queue, QueueFactory, QueueRef};
pub use rate_limiter::{
    BackoffRateLimiter, BucketRateLimiter, MaxOfRateLimiter, RateLimiter, RateLimiterRef,
    default_rate_limiter,
};
pub use rate_limiting_queue::RateLimitingQueue;

/// Returns a factory building a [`RateLimitingQueue`] per controller.
pub fn default_queue_factory<K: Key>() -> QueueFactory<K> {
    Arc::new(|name: &str, limiter: RateLimiterRef<K>| -> QueueRef<K> {
        RateLimitingQueue::new(name, limiter)
    })
}
