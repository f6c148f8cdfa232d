//! # List-then-sync source.
//!
//! [`ListSource`] performs an initial bulk listing in the background, enqueues
//! every listed key and then reports its cache as synced. It is the shape of
//! an informer-backed source reduced to its lifecycle: start is cheap, the
//! expensive population happens asynchronously, and readiness is observable
//! through [`SyncingSource::wait_for_sync`].
//!
//! ```text
//! start(ctx, queue) ──► spawn ──► lister(ctx) ──► queue.add(k) for k in keys
//!                                     │                 │
//!                                     ▼                 ▼
//!                               SyncState::Failed  SyncState::Synced
//!                                     └───────┬─────────┘
//!                                             ▼
//!                                   wait_for_sync(ctx) returns
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::SourceError;
use crate::queue::{Key, Queue, QueueRef};
use crate::sources::source::{Source, SyncingSource};

#[derive(Clone, Debug, PartialEq, Eq)]
enum SyncState {
    Pending,
    Synced,
    Failed(SourceError),
}

/// Source whose cache is populated by an async lister.
pub struct ListSource<L> {
    name: Cow<'static, str>,
    lister: L,
    started: AtomicBool,
    state: Arc<watch::Sender<SyncState>>,
}

impl<L> ListSource<L> {
    /// Creates a source that lists keys with `lister` when started.
    pub fn new(name: impl Into<Cow<'static, str>>, lister: L) -> Self {
        let (state, _) = watch::channel(SyncState::Pending);
        Self {
            name: name.into(),
            lister,
            started: AtomicBool::new(false),
            state: Arc::new(state),
        }
    }

    /// Returns `true` once the initial listing has been enqueued.
    pub fn has_synced(&self) -> bool {
        *self.state.borrow() == SyncState::Synced
    }
}

#[async_trait]
impl<K, L, Fut> Source<K> for ListSource<L>
where
    K: Key,
    L: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<K>, SourceError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, ctx: CancellationToken, queue: QueueRef<K>) -> Result<(), SourceError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(SourceError::fail(format!(
                "list source {} already started",
                self.name
            )));
        }

        let listing = (self.lister)(ctx.clone());
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = ctx.cancelled() => SyncState::Failed(SourceError::Canceled),
                res = listing => match res {
                    Ok(keys) => {
                        for key in keys {
                            queue.add(key);
                        }
                        SyncState::Synced
                    }
                    Err(e) => SyncState::Failed(e),
                },
            };
            state.send_replace(outcome);
        });
        Ok(())
    }
}

#[async_trait]
impl<K, L, Fut> SyncingSource<K> for ListSource<L>
where
    K: Key,
    L: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<K>, SourceError>> + Send + 'static,
{
    async fn wait_for_sync(&self, ctx: CancellationToken) -> Result<(), SourceError> {
        let mut rx = self.state.subscribe();
        let outcome = tokio::select! {
            _ = ctx.cancelled() => return Err(SourceError::Canceled),
            res = rx.wait_for(|s| *s != SyncState::Pending) => res.map(|s| (*s).clone()),
        };
        match outcome {
            Ok(SyncState::Failed(e)) => Err(e),
            Ok(_) => Ok(()),
            Err(_) => Err(SourceError::Canceled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{RateLimitingQueue, default_rate_limiter};
    use std::sync::Arc;
    use std::time::Duration;

    fn queue() -> QueueRef<u32> {
        RateLimitingQueue::<u32>::new("test", default_rate_limiter())
    }

    #[tokio::test]
    async fn listed_keys_are_enqueued_before_sync_is_reported() {
        let source = ListSource::new("numbers", |_ctx: CancellationToken| async {
            Ok::<_, SourceError>(vec![1_u32, 2, 3])
        });
        let q = queue();
        let ctx = CancellationToken::new();

        source.start(ctx.clone(), Arc::clone(&q)).await.unwrap();
        source.wait_for_sync(ctx.clone()).await.unwrap();

        assert!(source.has_synced());
        assert_eq!(q.len(), 3);
    }

    #[tokio::test]
    async fn lister_failure_is_reported_by_wait() {
        let source = ListSource::new("broken", |_ctx: CancellationToken| async {
            Err::<Vec<u32>, _>(SourceError::fail("list denied"))
        });
        let ctx = CancellationToken::new();

        source.start(ctx.clone(), queue()).await.unwrap();
        let err = source.wait_for_sync(ctx).await.unwrap_err();
        assert_eq!(err, SourceError::fail("list denied"));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_returns_canceled_when_its_context_is_cancelled() {
        let source = ListSource::new("slow", |_ctx: CancellationToken| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok::<_, SourceError>(vec![1_u32])
        });
        let run = CancellationToken::new();
        source.start(run.clone(), queue()).await.unwrap();

        let wait = CancellationToken::new();
        let canceller = wait.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        assert_eq!(source.wait_for_sync(wait).await, Err(SourceError::Canceled));
        assert!(!source.has_synced());
        run.cancel();
    }
}
