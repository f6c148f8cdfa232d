//! Controller events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Controller::watch`, `Controller::start`, the queue-shutdown
//!   task, `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the fan-out task spawned by `start` (feeds `SubscriberSet`)
//!   and any receiver obtained through `Controller::subscribe`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
