//! # Contextual loggers.
//!
//! A [`LogFactory`] builds the `tracing` span controller log lines are emitted
//! in. It receives the request being reconciled, or `None` for
//! controller-level lines (startup, watches, shutdown), and must accept both.

use std::sync::Arc;

use tracing::{Span, info_span};

use crate::queue::Key;

/// Builds a span for an optional request.
pub type LogFactory<K> = Arc<dyn Fn(Option<&K>) -> Span + Send + Sync>;

/// Returns the default factory: an `info`-level `controller` span carrying the
/// controller name and, when given, the request.
pub fn default_log_factory<K: Key>(controller: &str) -> LogFactory<K> {
    let controller: Arc<str> = controller.into();
    Arc::new(move |request: Option<&K>| match request {
        Some(request) => info_span!("controller", controller = %controller, request = ?request),
        None => info_span!("controller", controller = %controller),
    })
}
