//! # Event source abstractions.
//!
//! A [`Source`] pushes request keys into the controller's queue once started.
//! A [`SyncingSource`] additionally offers a bounded readiness wait: the
//! controller calls [`SyncingSource::wait_for_sync`] after starting every source
//! and before it reports itself as started.
//!
//! Whether a source can be waited on is declared when it is registered, by
//! wrapping it in the matching [`WatchSource`] variant.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::SourceError;
use crate::queue::{Key, QueueRef};

/// # Producer of request keys.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use reconcile_controller::{Queue, QueueRef, Source, SourceError};
///
/// struct Once(&'static str);
///
/// #[async_trait]
/// impl Source<String> for Once {
///     fn name(&self) -> &str { "once" }
///
///     async fn start(&self, _ctx: CancellationToken, queue: QueueRef<String>) -> Result<(), SourceError> {
///         queue.add(self.0.to_string());
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Source<K: Key>: Send + Sync + 'static {
    /// Returns a stable, human-readable source name (used in logs and errors).
    fn name(&self) -> &str;

    /// Starts producing keys into `queue`.
    ///
    /// Should return promptly: sources are started one after another, so a
    /// slow start delays every source registered after it. Long-running work
    /// belongs on a spawned task that exits when `ctx` is cancelled.
    async fn start(&self, ctx: CancellationToken, queue: QueueRef<K>) -> Result<(), SourceError>;
}

/// # Source with a readiness wait.
#[async_trait]
pub trait SyncingSource<K: Key>: Source<K> {
    /// Waits until the source's cache is populated.
    ///
    /// The controller bounds this call with its cache sync timeout and cancels
    /// `ctx` once the deadline passes; implementations should return
    /// [`SourceError::Canceled`] when they observe that.
    async fn wait_for_sync(&self, ctx: CancellationToken) -> Result<(), SourceError>;
}

/// Shared handle to a plain source.
pub type SourceRef<K> = Arc<dyn Source<K>>;

/// Shared handle to a syncing source.
pub type SyncingSourceRef<K> = Arc<dyn SyncingSource<K>>;

/// A registered source together with its declared capability.
pub enum WatchSource<K: Key> {
    /// Source without a readiness wait; it is started and never waited on.
    Plain(SourceRef<K>),
    /// Source whose cache sync is awaited during startup.
    Syncing(SyncingSourceRef<K>),
}

impl<K: Key> WatchSource<K> {
    /// Wraps a plain source.
    pub fn plain(source: impl Source<K>) -> Self {
        WatchSource::Plain(Arc::new(source))
    }

    /// Wraps a syncing source.
    pub fn syncing(source: impl SyncingSource<K>) -> Self {
        WatchSource::Syncing(Arc::new(source))
    }

    /// Name of the underlying source.
    pub fn name(&self) -> &str {
        match self {
            WatchSource::Plain(s) => s.name(),
            WatchSource::Syncing(s) => s.name(),
        }
    }

    /// Starts the underlying source.
    pub async fn start(&self, ctx: CancellationToken, queue: QueueRef<K>) -> Result<(), SourceError> {
        match self {
            WatchSource::Plain(s) => s.start(ctx, queue).await,
            WatchSource::Syncing(s) => s.start(ctx, queue).await,
        }
    }

    /// Returns the syncing capability, if declared.
    pub fn as_syncing(&self) -> Option<&SyncingSourceRef<K>> {
        match self {
            WatchSource::Plain(_) => None,
            WatchSource::Syncing(s) => Some(s),
        }
    }
}

impl<K: Key> Clone for WatchSource<K> {
    fn clone(&self) -> Self {
        match self {
            WatchSource::Plain(s) => WatchSource::Plain(Arc::clone(s)),
            WatchSource::Syncing(s) => WatchSource::Syncing(Arc::clone(s)),
        }
    }
}

impl<K: Key> fmt::Debug for WatchSource<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            WatchSource::Plain(_) => "plain",
            WatchSource::Syncing(_) => "syncing",
        };
        f.debug_struct("WatchSource")
            .field("name", &self.name())
            .field("kind", &kind)
            .finish()
    }
}

impl<K: Key> From<SourceRef<K>> for WatchSource<K> {
    fn from(source: SourceRef<K>) -> Self {
        WatchSource::Plain(source)
    }
}

impl<K: Key> From<SyncingSourceRef<K>> for WatchSource<K> {
    fn from(source: SyncingSourceRef<K>) -> Self {
        WatchSource::Syncing(source)
    }
}
