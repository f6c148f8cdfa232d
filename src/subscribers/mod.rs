//! # Event subscribers.
//!
//! Subscribers observe the lifecycle [`Event`](crate::Event)s a controller
//! publishes on its [`Bus`](crate::Bus).
//!
//! ```text
//! Controller ── publish(Event) ──► Bus ──► fan-out task (spawned by start)
//!                                               │
//!                                               ▼
//!                                        SubscriberSet::emit
//!                                      ┌────────┼────────┐
//!                                      ▼        ▼        ▼
//!                                  LogWriter  Metrics  Custom
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use reconcile_controller::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct SyncAlerts;
//!
//! #[async_trait]
//! impl Subscribe for SyncAlerts {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::CacheSyncFailed {
//!             // page someone
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "sync-alerts" }
//! }
//! ```

mod log;
mod subscribe;
mod subscriber_set;

pub use log::LogWriter;
pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;
