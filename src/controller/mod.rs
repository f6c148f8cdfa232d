//! # Controller lifecycle.
//!
//! A [`Controller`] owns a set of event sources, a lazily constructed work
//! queue and the started/failed/terminated state that ties them together.
//!
//! ```text
//! builder ──► Controller ──watch──► buffered sources
//!                  │
//!                start(ctx)
//!                  ├─► queue = factory(name, rate_limiter)
//!                  ├─► source.start(run, queue)   (registration order)
//!                  ├─► source.wait_for_sync(..)   (bounded, syncing only)
//!                  ├─► started ──watch──► source.start(run, queue)  (live)
//!                  └─► ctx cancelled ─► queue.shutdown() ─► Ok(())
//! ```
//!
//! Leader election, metrics and the reconcile worker loop live outside this
//! crate; [`Controller::need_leader_election`] and [`Controller::queue`] are the
//! hooks they use.

mod builder;
mod core;
mod log;
mod phase;


pub use builder::ControllerBuilder;
pub use core::Controller;
pub use log::{LogFactory, default_log_factory};
