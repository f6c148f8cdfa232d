//! # Lifecycle events emitted by a controller.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Registration events**: watches buffered before start or started live
//! - **Startup events**: sources starting, caches syncing, startup outcome
//! - **Shutdown events**: context cancelled, queue shut down, controller stopped
//! - **Subscriber events**: fan-out overflow and subscriber panics
//!
//! The [`Event`] struct carries additional metadata such as timestamps,
//! controller/source names, reasons and the cache-sync deadline.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use reconcile_controller::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::CacheSyncFailed)
//!     .with_controller("alpha")
//!     .with_source("pods")
//!     .with_reason("timed out")
//!     .with_timeout(Duration::from_secs(2));
//!
//! assert_eq!(ev.kind, EventKind::CacheSyncFailed);
//! assert_eq!(ev.source.as_deref(), Some("pods"));
//! assert_eq!(ev.timeout_ms, Some(2_000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of controller events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Registration ===
    /// A source was registered before start and buffered.
    ///
    /// Sets: `controller`, `source`
    WatchBuffered,

    /// A source was registered after start and started immediately.
    ///
    /// Sets: `controller`, `source`, `reason` on failure
    WatchStarted,

    // === Startup ===
    /// `start` accepted; the queue has been constructed.
    ///
    /// Sets: `controller`
    ControllerStarting,

    /// A buffered source is being started.
    ///
    /// Sets: `controller`, `source`
    SourceStarting,

    /// A buffered source failed to start; startup aborts.
    ///
    /// Sets: `controller`, `source`, `reason`
    SourceFailed,

    /// Waiting for a syncing source's cache.
    ///
    /// Sets: `controller`, `source`, `timeout_ms`
    CacheSyncWaiting,

    /// A syncing source reported its cache as synced.
    ///
    /// Sets: `controller`, `source`
    CacheSynced,

    /// A syncing source failed or timed out; startup aborts.
    ///
    /// Sets: `controller`, `source`, `reason`, `timeout_ms`
    CacheSyncFailed,

    /// All sources started and synced; the controller is running.
    ///
    /// Sets: `controller`
    ControllerStarted,

    /// Startup failed; the controller is permanently failed.
    ///
    /// Sets: `controller`, `reason`
    StartupFailed,

    // === Shutdown ===
    /// The operating context was cancelled.
    ///
    /// Sets: `controller`
    ControllerStopping,

    /// The work queue was shut down.
    ///
    /// Sets: `controller`
    QueueShutdown,

    /// `start` is about to return.
    ///
    /// Sets: `controller`
    ControllerStopped,

    // === Subscribers ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `source` (subscriber name), `reason`
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `source` (subscriber name), `reason`
    SubscriberOverflow,
}

/// Controller event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Name of the controller, if applicable.
    pub controller: Option<Arc<str>>,
    /// Name of the source (or subscriber), if applicable.
    pub source: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Cache sync deadline in milliseconds.
    pub timeout_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            controller: None,
            source: None,
            reason: None,
            timeout_ms: None,
        }
    }

    /// Attaches a controller name.
    #[inline]
    pub fn with_controller(mut self, controller: impl Into<Arc<str>>) -> Self {
        self.controller = Some(controller.into());
        self
    }

    /// Attaches a source name.
    #[inline]
    pub fn with_source(mut self, source: impl Into<Arc<str>>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a deadline (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_source(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_source(subscriber)
            .with_reason(info)
    }

    /// Returns `true` for events produced by the subscriber machinery itself.
    #[inline]
    pub fn is_subscriber_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::new(EventKind::ControllerStarting);
        let b = Event::new(EventKind::ControllerStarted);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn huge_timeouts_saturate() {
        let ev = Event::new(EventKind::CacheSyncWaiting).with_timeout(Duration::from_secs(u64::MAX));
        assert_eq!(ev.timeout_ms, Some(u32::MAX));
    }
}
