use tokio_util::sync::CancellationToken;

use crate::queue::{Key, QueueRef};
use crate::sources::WatchSource;

/// Lifecycle state of a controller.
///
/// ```text
/// Configured ──start──► Starting ──ok──► Running ──ctx cancelled──► Terminated
///                           │
///                           └──err / panic / dropped──► Failed (or stays Starting)
/// ```
///
/// The queue exists exactly in `Running` and `Terminated`; buffered watches
/// exist only in `Configured`.
pub(super) enum Phase<K: Key> {
    Configured {
        watches: Vec<WatchSource<K>>,
    },
    Starting,
    Running {
        queue: QueueRef<K>,
        /// Child of the operating context; handed to sources watched after start.
        token: CancellationToken,
    },
    Failed,
    Terminated {
        queue: QueueRef<K>,
    },
}

impl<K: Key> Phase<K> {
    pub(super) fn configured() -> Self {
        Phase::Configured {
            watches: Vec::new(),
        }
    }

    /// `true` once startup completed; never reverts.
    pub(super) fn has_started(&self) -> bool {
        matches!(self, Phase::Running { .. } | Phase::Terminated { .. })
    }

    pub(super) fn queue(&self) -> Option<&QueueRef<K>> {
        match self {
            Phase::Running { queue, .. } | Phase::Terminated { queue } => Some(queue),
            _ => None,
        }
    }

    pub(super) fn label(&self) -> &'static str {
        match self {
            Phase::Configured { .. } => "configured",
            Phase::Starting => "starting",
            Phase::Running { token, .. } if token.is_cancelled() => "stopping",
            Phase::Running { .. } => "running",
            Phase::Failed => "failed",
            Phase::Terminated { .. } => "terminated",
        }
    }
}
