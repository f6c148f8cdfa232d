use std::fmt;
use std::future::Future;
use std::mem;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{Span, debug, error, info, warn};

use crate::config::{ControllerConfig, STARTED_POLL_INTERVAL};
use crate::error::{ControllerError, SourceError, panic_message};
use crate::events::{Bus, Event, EventKind};
use crate::queue::{Key, QueueFactory, QueueRef, RateLimiterRef};
use crate::sources::{SyncingSourceRef, WatchSource};
use crate::subscribers::{Subscribe, SubscriberSet};

use super::builder::ControllerBuilder;
use super::log::LogFactory;
use super::phase::Phase;

/// Lifecycle host for a reconciliation controller.
///
/// Sources registered with [`watch`](Self::watch) before start are buffered
/// and started, in registration order, by [`start`](Self::start). Sources
/// registered afterwards start immediately with the stored operating context.
///
/// The controller is single-use: once `start` has been called, later calls
/// fail with [`ControllerError::DuplicateStart`].
pub struct Controller<K: Key> {
    pub(super) name: Arc<str>,
    pub(super) config: ControllerConfig,
    pub(super) rate_limiter: RateLimiterRef<K>,
    pub(super) new_queue: QueueFactory<K>,
    pub(super) log: LogFactory<K>,
    pub(super) bus: Bus,
    pub(super) subscribers: Vec<Arc<dyn Subscribe>>,
    pub(super) state: Mutex<Phase<K>>,
}

impl<K: Key> Controller<K> {
    /// Returns a builder for a controller with the given name.
    pub fn builder(name: impl Into<String>) -> ControllerBuilder<K> {
        ControllerBuilder::new(name)
    }

    /// Returns the controller name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Subscribes to lifecycle events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Returns a span for logging about `request` (or the controller itself).
    pub fn logger(&self, request: Option<&K>) -> Span {
        (self.log)(request)
    }

    /// Reports whether this controller may only run on the elected leader.
    ///
    /// Unset configuration means `true`.
    pub fn need_leader_election(&self) -> bool {
        self.config.need_leader_election()
    }

    /// Returns `true` once startup has completed. Never reverts.
    ///
    /// Waits on the state lock, which `start` holds while sources start and
    /// caches sync (up to the cache sync timeout per syncing source). Use
    /// [`wait_for_started`](Self::wait_for_started) to probe cancellably
    /// during startup.
    pub async fn is_started(&self) -> bool {
        self.state.lock().await.has_started()
    }

    /// Returns the work queue, which exists only after a successful start.
    ///
    /// Like [`is_started`](Self::is_started), blocks for the whole startup
    /// phase; call it after `wait_for_started` returned `true`.
    pub async fn queue(&self) -> Option<QueueRef<K>> {
        self.state.lock().await.queue().cloned()
    }

    /// Registers an event source.
    ///
    /// Before start the source is buffered. After start it is started right
    /// away with the operating context and the live queue, and its start error
    /// is returned. A controller that failed to start or has terminated
    /// rejects new sources with [`ControllerError::NotRunning`].
    ///
    /// While `start` is bringing sources up, this call waits for it to finish
    /// and then takes the live path.
    pub async fn watch(&self, source: impl Into<WatchSource<K>>) -> Result<(), ControllerError> {
        let source = source.into();
        let mut state = self.state.lock().await;

        let (queue, token) = match &mut *state {
            Phase::Configured { watches } => {
                self.bus
                    .publish(self.event(EventKind::WatchBuffered).with_source(source.name()));
                watches.push(source);
                return Ok(());
            }
            // A cancelled run token means the queue is (being) shut down, even
            // when `start` was dropped before it could record termination.
            Phase::Running { queue, token } if !token.is_cancelled() => {
                (Arc::clone(queue), token.clone())
            }
            other => {
                debug!(controller = %self.name, phase = other.label(), "watch rejected");
                return Err(ControllerError::NotRunning {
                    controller: self.name.to_string(),
                });
            }
        };

        let log = self.logger(None);
        log.in_scope(|| info!(source = source.name(), "starting event source"));

        let res = self.guarded(source.start(token, queue)).await;
        drop(state);

        let mut ev = self.event(EventKind::WatchStarted).with_source(source.name());
        if let Err(e) = &res {
            ev = ev.with_reason(e.to_string());
        }
        self.bus.publish(ev);

        res.map_err(|error| ControllerError::SourceStart {
            controller: self.name.to_string(),
            source_name: source.name().to_string(),
            error,
        })
    }

    /// Starts every buffered source, waits for syncing sources, then runs
    /// until `ctx` is cancelled.
    ///
    /// ```text
    /// ctx ──► child run token ──► sources, live watches, queue-shutdown task
    ///
    /// construct queue ─► start sources (registration order)
    ///                 ─► wait_for_sync per syncing source (bounded)
    ///                 ─► started = true ─► await ctx ─► queue.shutdown() ─► Ok
    /// ```
    ///
    /// Returns `Ok(())` after a clean shutdown. On a source start failure or a
    /// cache sync failure the error is returned promptly, the queue is shut
    /// down, and the controller is left permanently failed.
    pub async fn start(&self, ctx: CancellationToken) -> Result<(), ControllerError> {
        let log = self.logger(None);
        let mut state = self.state.lock().await;

        let watches = match mem::replace(&mut *state, Phase::Starting) {
            Phase::Configured { watches } => watches,
            previous => {
                let err = ControllerError::DuplicateStart {
                    controller: self.name.to_string(),
                };
                log.in_scope(|| warn!(phase = previous.label(), "{err}"));
                *state = previous;
                return Err(err);
            }
        };

        let queue = (self.new_queue)(&self.name, Arc::clone(&self.rate_limiter));
        let run = ctx.child_token();
        // Shuts the queue down if this future is dropped or a source panics.
        let run_guard = run.clone().drop_guard();
        let shutdown = self.spawn_queue_shutdown(run.clone(), Arc::clone(&queue));
        let fanout = self.spawn_fanout();

        self.bus.publish(self.event(EventKind::ControllerStarting));

        if let Err(err) = self.launch(&run, &queue, watches, &log).await {
            *state = Phase::Failed;
            drop(state);

            self.bus
                .publish(self.event(EventKind::StartupFailed).with_reason(err.to_string()));
            run.cancel();
            let _ = shutdown.await;
            fanout.finish().await;
            drop(run_guard);
            return Err(err);
        }

        *state = Phase::Running {
            queue: Arc::clone(&queue),
            token: run.clone(),
        };
        drop(state);

        log.in_scope(|| info!("controller started"));
        self.bus.publish(self.event(EventKind::ControllerStarted));

        ctx.cancelled().await;

        log.in_scope(|| info!("shutdown signal received, stopping controller"));
        self.bus.publish(self.event(EventKind::ControllerStopping));
        let _ = shutdown.await;

        *self.state.lock().await = Phase::Terminated { queue };

        log.in_scope(|| info!("controller stopped"));
        self.bus.publish(self.event(EventKind::ControllerStopped));
        fanout.finish().await;
        drop(run_guard);
        Ok(())
    }

    /// Waits until startup completes or `ctx` is cancelled.
    ///
    /// The started flag is checked immediately and then every
    /// [`STARTED_POLL_INTERVAL`]. Returns `true` when started, `false` when
    /// `ctx` was cancelled first.
    pub async fn wait_for_started(&self, ctx: &CancellationToken) -> bool {
        let log = self.logger(None);
        loop {
            let started = tokio::select! {
                biased;
                state = self.state.lock() => state.has_started(),
                _ = ctx.cancelled() => {
                    log.in_scope(|| debug!("stopped waiting for controller to start"));
                    return false;
                }
            };
            if started {
                return true;
            }

            tokio::select! {
                _ = ctx.cancelled() => {
                    log.in_scope(|| debug!("stopped waiting for controller to start"));
                    return false;
                }
                _ = time::sleep(STARTED_POLL_INTERVAL) => {}
            }
        }
    }

    /// Starts every buffered source in order, then waits for each syncing one.
    ///
    /// Sources all start before the first wait so that their caches fill
    /// concurrently.
    async fn launch(
        &self,
        run: &CancellationToken,
        queue: &QueueRef<K>,
        watches: Vec<WatchSource<K>>,
        log: &Span,
    ) -> Result<(), ControllerError> {
        for watch in &watches {
            log.in_scope(|| info!(source = watch.name(), "starting event source"));
            self.bus
                .publish(self.event(EventKind::SourceStarting).with_source(watch.name()));

            if let Err(error) = self.guarded(watch.start(run.clone(), Arc::clone(queue))).await {
                log.in_scope(|| error!(source = watch.name(), error = %error, "event source failed to start"));
                self.bus.publish(
                    self.event(EventKind::SourceFailed)
                        .with_source(watch.name())
                        .with_reason(error.to_string()),
                );
                return Err(ControllerError::SourceStart {
                    controller: self.name.to_string(),
                    source_name: watch.name().to_string(),
                    error,
                });
            }
        }

        log.in_scope(|| info!("starting controller"));
        for watch in &watches {
            if let Some(source) = watch.as_syncing() {
                self.wait_for_cache_sync(run, source, log).await?;
            }
        }
        Ok(())
    }

    /// Bounded wait for one source; the source's wait context is cancelled
    /// when the deadline passes.
    async fn wait_for_cache_sync(
        &self,
        run: &CancellationToken,
        source: &SyncingSourceRef<K>,
        log: &Span,
    ) -> Result<(), ControllerError> {
        let timeout = self.config.cache_sync_timeout();
        let sync = run.child_token();
        let _sync_guard = sync.clone().drop_guard();

        self.bus.publish(
            self.event(EventKind::CacheSyncWaiting)
                .with_source(source.name())
                .with_timeout(timeout),
        );

        let res = match time::timeout(timeout, self.guarded(source.wait_for_sync(sync))).await {
            Ok(res) => res,
            Err(_elapsed) => Err(SourceError::Timeout { timeout }),
        };

        match res {
            Ok(()) => {
                log.in_scope(|| debug!(source = source.name(), "cache synced"));
                self.bus
                    .publish(self.event(EventKind::CacheSynced).with_source(source.name()));
                Ok(())
            }
            Err(error) => {
                let err = ControllerError::CacheSync {
                    controller: self.name.to_string(),
                    source_name: source.name().to_string(),
                    error,
                };
                log.in_scope(|| error!(source = source.name(), "{err}"));
                self.bus.publish(
                    self.event(EventKind::CacheSyncFailed)
                        .with_source(source.name())
                        .with_reason(err.to_string())
                        .with_timeout(timeout),
                );
                Err(err)
            }
        }
    }

    /// Runs a source call, converting panics into errors when configured to.
    async fn guarded<F>(&self, fut: F) -> Result<(), SourceError>
    where
        F: Future<Output = Result<(), SourceError>>,
    {
        if !self.config.recover_panic() {
            return fut.await;
        }
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(res) => res,
            Err(payload) => Err(SourceError::Panicked {
                info: panic_message(payload.as_ref()),
            }),
        }
    }

    /// Shuts the queue down exactly once, when the run token is cancelled.
    fn spawn_queue_shutdown(&self, run: CancellationToken, queue: QueueRef<K>) -> JoinHandle<()> {
        let bus = self.bus.clone();
        let ev = self.event(EventKind::QueueShutdown);
        let log = self.logger(None);

        tokio::spawn(async move {
            run.cancelled().await;
            queue.shutdown();
            log.in_scope(|| debug!("work queue shut down"));
            bus.publish(ev);
        })
    }

    /// Forwards bus events to the configured subscribers until finished.
    fn spawn_fanout(&self) -> Fanout {
        if self.subscribers.is_empty() {
            return Fanout::default();
        }

        let stop = CancellationToken::new();
        let set = SubscriberSet::new(self.subscribers.clone(), self.bus.clone());
        let mut rx = self.bus.subscribe();
        let token = stop.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    ev = rx.recv() => match ev {
                        Ok(ev) => set.emit(&ev),
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = token.cancelled() => break,
                }
            }
            while let Ok(ev) = rx.try_recv() {
                set.emit(&ev);
            }
            set.shutdown().await;
        });

        Fanout {
            stop: Some(stop.drop_guard()),
            handle: Some(handle),
        }
    }

    fn event(&self, kind: EventKind) -> Event {
        Event::new(kind).with_controller(Arc::clone(&self.name))
    }
}

impl<K: Key> fmt::Debug for Controller<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("subscribers", &self.subscribers.len())
            .finish_non_exhaustive()
    }
}

/// Subscriber fan-out task; stopped when dropped.
#[derive(Default)]
struct Fanout {
    stop: Option<DropGuard>,
    handle: Option<JoinHandle<()>>,
}

impl Fanout {
    /// Stops forwarding, delivers what is already on the bus and waits for
    /// every subscriber to drain.
    async fn finish(mut self) {
        drop(self.stop.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}
