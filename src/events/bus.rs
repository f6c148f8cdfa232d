//! # Event bus for controller lifecycle events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`]. The controller
//! publishes to it from `watch`, `start`, the queue-shutdown task and the
//! subscriber workers.
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks.
//! - **Bounded capacity**: a single ring buffer stores recent events for all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No persistence**: events are lost if there are no active receivers at send time.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for controller events.
///
/// Cheap to clone (holds an `Arc`-backed sender). Creating a bus does not
/// spawn anything, so it is safe to build outside a runtime.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers; dropped if there are none.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new receiver that will observe subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn receivers_only_see_events_after_subscribing() {
        let bus = Bus::new(0);
        bus.publish(Event::new(EventKind::WatchBuffered));

        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::ControllerStarting).with_controller("alpha"));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::ControllerStarting);
        assert!(rx.try_recv().is_err());
    }
}
