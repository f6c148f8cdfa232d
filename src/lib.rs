//! # reconcile-controller
//!
//! **reconcile-controller** is the lifecycle core of a reconciliation
//! controller: it registers event sources, starts them against a lazily
//! constructed rate-limited work queue, waits (bounded) for their caches to
//! sync, and shuts the queue down when its operating context is cancelled.
//!
//! Workers that pop keys from the queue and reconcile them are outside the
//! scope of this crate; they obtain the queue through [`Controller::queue`]
//! once [`Controller::wait_for_started`] returns `true`.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ WatchSource  │   │ WatchSource  │   │ WatchSource  │
//!     │   (plain)    │   │  (syncing)   │   │  (syncing)   │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Controller (lifecycle host)                                      │
//! │  - Phase (configured → starting → running → terminated | failed)  │
//! │  - QueueFactory + RateLimiter (queue built by start, once)        │
//! │  - LogFactory (tracing span per request / controller)             │
//! │  - Bus (broadcast lifecycle events)                               │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼                  ▼                  ▼               │
//!   source.start       source.start       source.start         │
//!   (run token,        + wait_for_sync    + wait_for_sync      │
//!    queue)              (bounded)          (bounded)          │
//!        │                  │                  │               │
//!        └──────── queue.add(key) ─────────────┘               │
//!                           ▼                                  ▼
//!                ┌─────────────────────┐        ┌──────────────────────┐
//!                │  RateLimitingQueue  │        │ fan-out task (start) │
//!                │ (dedup, delay, rate)│        └──────────┬───────────┘
//!                └──────────┬──────────┘                   ▼
//!                           ▼                        SubscriberSet
//!                    reconcile workers              (per-sub queues)
//!                    (outside this crate)
//! ```
//!
//! ### Lifecycle
//! ```text
//! builder().build() ──► watch(src)* ──► start(ctx)
//!
//! start(ctx) {
//!   ├─► already started / failed        ─► DuplicateStart
//!   ├─► queue = factory(name, limiter)
//!   ├─► for src in buffered: src.start(run, queue)  ─ err ─► SourceStart
//!   ├─► for src in buffered (syncing):
//!   │        timeout(cache_sync_timeout, src.wait_for_sync(..)) ─ err ─► CacheSync
//!   ├─► started = true (watch() now starts sources immediately)
//!   ├─► await ctx.cancelled()
//!   └─► queue.shutdown() ─► Ok(())
//! }
//!
//! On a startup error the queue is shut down and the controller stays failed.
//! ```
//!
//! ## Features
//! | Area              | Description                                                     | Key types / traits                               |
//! |-------------------|-----------------------------------------------------------------|--------------------------------------------------|
//! | **Controller**    | Source registration, startup, cache sync and shutdown.          | [`Controller`], [`ControllerBuilder`]            |
//! | **Sources**       | Key producers, optionally with a readiness wait.                | [`Source`], [`SyncingSource`], [`WatchSource`]   |
//! | **Queue**         | Deduplicating, delaying, rate-limited work queue.               | [`Queue`], [`RateLimitingQueue`], [`RateLimiter`]|
//! | **Policies**      | Per-item exponential backoff with jitter.                       | [`BackoffPolicy`], [`JitterPolicy`]              |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics, custom).          | [`Subscribe`], [`LogWriter`]                     |
//! | **Errors**        | Typed errors for the lifecycle and for sources.                 | [`ControllerError`], [`SourceError`]             |
//! | **Configuration** | Cache sync timeout, panic recovery, leader election.            | [`ControllerConfig`]                             |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use reconcile_controller::{Controller, ControllerConfig, Queue, QueueRef, SourceError, SourceFn, WatchSource};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let controller = Controller::<String>::builder("pods")
//!         .with_config(ControllerConfig::default().with_cache_sync_timeout(Duration::from_secs(5)))
//!         .build()?;
//!
//!     // Buffered until start.
//!     controller
//!         .watch(WatchSource::plain(SourceFn::new(
//!             "seed",
//!             |_ctx: CancellationToken, queue: QueueRef<String>| async move {
//!                 queue.add("default/web-0".to_string());
//!                 Ok::<_, SourceError>(())
//!             },
//!         )))
//!         .await?;
//!
//!     let ctx = CancellationToken::new();
//!     let (res, started) = tokio::join!(controller.start(ctx.clone()), async {
//!         let started = controller.wait_for_started(&ctx).await;
//!         if let Some(queue) = controller.queue().await {
//!             assert_eq!(queue.get().await.as_deref(), Some("default/web-0"));
//!         }
//!         ctx.cancel();
//!         started
//!     });
//!     assert!(started);
//!     res?;
//!     Ok(())
//! }
//! ```
mod config;
mod controller;
mod error;
mod events;
mod policies;
mod queue;
mod sources;
mod subscribers;

// ---- Public re-exports ----

pub use config::{ControllerConfig, DEFAULT_CACHE_SYNC_TIMEOUT, STARTED_POLL_INTERVAL};
pub use controller::{Controller, ControllerBuilder, LogFactory, default_log_factory};
pub use error::{ControllerError, SourceError};
pub use events::{Bus, Event, EventKind};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use queue::{
    BackoffRateLimiter, BucketRateLimiter, Key, MaxOfRateLimiter, Queue, QueueFactory, QueueRef,
    RateLimiter, RateLimiterRef, RateLimitingQueue, default_queue_factory, default_rate_limiter,
};
pub use sources::{
    ChannelSource, ListSource, Source, SourceFn, SourceRef, SyncingSource, SyncingSourceFn,
    SyncingSourceRef, WatchSource,
};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
