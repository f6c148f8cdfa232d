//! # Channel-fed source.
//!
//! [`ChannelSource`] forwards keys received on a tokio `mpsc` channel into the
//! controller's queue. It is the bridge for events generated outside any
//! watched resource (webhooks, timers, other controllers).

use std::borrow::Cow;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::SourceError;
use crate::queue::{Key, Queue, QueueRef};
use crate::sources::source::Source;

/// Source that drains an `mpsc` receiver into the queue.
///
/// The forwarding task runs until the context is cancelled or every sender is
/// dropped. A channel source can be started only once.
pub struct ChannelSource<K> {
    name: Cow<'static, str>,
    rx: Mutex<Option<mpsc::Receiver<K>>>,
}

impl<K: Key> ChannelSource<K> {
    /// Wraps an existing receiver.
    pub fn new(name: impl Into<Cow<'static, str>>, rx: mpsc::Receiver<K>) -> Self {
        Self {
            name: name.into(),
            rx: Mutex::new(Some(rx)),
        }
    }

    /// Creates a channel of the given capacity and returns the sender with the source.
    pub fn channel(name: impl Into<Cow<'static, str>>, capacity: usize) -> (mpsc::Sender<K>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::new(name, rx))
    }
}

#[async_trait]
impl<K: Key> Source<K> for ChannelSource<K> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, ctx: CancellationToken, queue: QueueRef<K>) -> Result<(), SourceError> {
        let taken = self
            .rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut rx) = taken else {
            return Err(SourceError::fail(format!(
                "channel source {} already started",
                self.name
            )));
        };

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = ctx.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Some(key) => queue.add(key),
                        None => break,
                    },
                }
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{RateLimitingQueue, default_rate_limiter};
    use std::sync::Arc;

    #[tokio::test]
    async fn forwards_keys_and_refuses_a_second_start() {
        let queue: QueueRef<String> = RateLimitingQueue::<String>::new("test", default_rate_limiter());
        let (tx, source) = ChannelSource::channel("webhooks", 8);
        let ctx = CancellationToken::new();

        source.start(ctx.clone(), Arc::clone(&queue)).await.unwrap();
        tx.send("a".to_string()).await.unwrap();
        assert_eq!(queue.get().await.as_deref(), Some("a"));

        let again = source.start(ctx.clone(), Arc::clone(&queue)).await;
        assert!(matches!(again, Err(SourceError::Fail { .. })));
        ctx.cancel();
    }
}
