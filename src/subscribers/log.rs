//! # LogWriter: renders controller events through `tracing`.
//!
//! Failures are logged at `error`/`warn`, lifecycle milestones at `info` and
//! per-source progress at `debug`.

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default, Debug)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let controller = e.controller.as_deref().unwrap_or("-");
        let source = e.source.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::WatchBuffered => {
                debug!(controller, source, "watch buffered until start");
            }
            EventKind::WatchStarted => match &e.reason {
                None => info!(controller, source, "watch started"),
                Some(_) => warn!(controller, source, reason, "watch failed to start"),
            },
            EventKind::ControllerStarting => info!(controller, "controller starting"),
            EventKind::SourceStarting => debug!(controller, source, "starting event source"),
            EventKind::SourceFailed => {
                error!(controller, source, reason, "event source failed to start");
            }
            EventKind::CacheSyncWaiting => {
                debug!(controller, source, timeout_ms = ?e.timeout_ms, "waiting for cache sync");
            }
            EventKind::CacheSynced => debug!(controller, source, "cache synced"),
            EventKind::CacheSyncFailed => {
                error!(controller, source, reason, timeout_ms = ?e.timeout_ms, "cache sync failed");
            }
            EventKind::ControllerStarted => info!(controller, "controller started"),
            EventKind::StartupFailed => error!(controller, reason, "controller startup failed"),
            EventKind::ControllerStopping => info!(controller, "controller stopping"),
            EventKind::QueueShutdown => debug!(controller, "work queue shut down"),
            EventKind::ControllerStopped => info!(controller, "controller stopped"),
            EventKind::SubscriberOverflow => {
                warn!(subscriber = source, reason, "subscriber dropped an event");
            }
            EventKind::SubscriberPanicked => {
                warn!(subscriber = source, reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn failures_are_logged_with_reason() {
        LogWriter::new()
            .on_event(
                &Event::new(EventKind::CacheSyncFailed)
                    .with_controller("alpha")
                    .with_source("pods")
                    .with_reason("timed out after 100ms"),
            )
            .await;

        assert!(logs_contain("cache sync failed"));
        assert!(logs_contain("timed out after 100ms"));
    }
}
