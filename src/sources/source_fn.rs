//! # Closure-backed sources
//!
//! [`SourceFn`] wraps `F: Fn(CancellationToken, QueueRef<K>) -> Fut`, producing
//! a fresh future per start. [`SyncingSourceFn`] adds a second closure used as
//! the readiness wait.
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use reconcile_controller::{Queue, QueueRef, SourceError, SourceFn, WatchSource};
//!
//! let ticks = SourceFn::new("ticks", |_ctx: CancellationToken, queue: QueueRef<u64>| async move {
//!     queue.add(1);
//!     Ok::<_, SourceError>(())
//! });
//! let watch: WatchSource<u64> = WatchSource::plain(ticks);
//! assert_eq!(watch.name(), "ticks");
//! ```

use std::borrow::Cow;
use std::future::Future;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::SourceError;
use crate::queue::{Key, QueueRef};
use crate::sources::source::{Source, SyncingSource};

/// Function-backed source.
#[derive(Debug)]
pub struct SourceFn<F> {
    name: Cow<'static, str>,
    start: F,
}

impl<F> SourceFn<F> {
    /// Creates a new function-backed source.
    pub fn new(name: impl Into<Cow<'static, str>>, start: F) -> Self {
        Self {
            name: name.into(),
            start,
        }
    }

    /// Adds a readiness wait, turning this into a [`SyncingSourceFn`].
    pub fn with_sync<S>(self, sync: S) -> SyncingSourceFn<F, S> {
        SyncingSourceFn { inner: self, sync }
    }
}

#[async_trait]
impl<K, F, Fut> Source<K> for SourceFn<F>
where
    K: Key,
    F: Fn(CancellationToken, QueueRef<K>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), SourceError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, ctx: CancellationToken, queue: QueueRef<K>) -> Result<(), SourceError> {
        (self.start)(ctx, queue).await
    }
}

/// Function-backed source with a readiness wait.
#[derive(Debug)]
pub struct SyncingSourceFn<F, S> {
    inner: SourceFn<F>,
    sync: S,
}

#[async_trait]
impl<K, F, Fut, S, SFut> Source<K> for SyncingSourceFn<F, S>
where
    K: Key,
    F: Fn(CancellationToken, QueueRef<K>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), SourceError>> + Send + 'static,
    S: Fn(CancellationToken) -> SFut + Send + Sync + 'static,
    SFut: Future<Output = Result<(), SourceError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.inner.name
    }

    async fn start(&self, ctx: CancellationToken, queue: QueueRef<K>) -> Result<(), SourceError> {
        (self.inner.start)(ctx, queue).await
    }
}

#[async_trait]
impl<K, F, Fut, S, SFut> SyncingSource<K> for SyncingSourceFn<F, S>
where
    K: Key,
    F: Fn(CancellationToken, QueueRef<K>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), SourceError>> + Send + 'static,
    S: Fn(CancellationToken) -> SFut + Send + Sync + 'static,
    SFut: Future<Output = Result<(), SourceError>> + Send + 'static,
{
    async fn wait_for_sync(&self, ctx: CancellationToken) -> Result<(), SourceError> {
        (self.sync)(ctx).await
    }
}
