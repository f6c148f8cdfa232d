//! Delay policies used by the work-queue rate limiters.
//!
//! ## Contents
//! - [`BackoffPolicy`] how per-item requeue delays grow (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy to avoid synchronized requeues
//!
//! ## Quick wiring
//! ```text
//! BackoffRateLimiter { policy: BackoffPolicy, failures: HashMap<K, u32> }
//!      └─► when(item) = policy.next(failures[item]++)
//! ```

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
