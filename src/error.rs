//! Error types used by the controller and its event sources.
//!
//! This module defines two main error enums:
//!
//! - [`ControllerError`] — errors raised by the controller lifecycle itself.
//! - [`SourceError`] — errors reported by individual event sources.
//!
//! Both types provide `as_label` for logs/metrics.

use std::any::Any;
use std::time::Duration;

use thiserror::Error;

/// # Errors produced by the controller lifecycle.
///
/// Every variant that can happen after construction carries the controller name
/// so that a supervisor running many controllers can attribute the failure.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ControllerError {
    /// `start` was invoked on a controller that already left the configured state.
    #[error(
        "controller {controller} was started more than once; this is likely caused by registering it with a supervisor multiple times"
    )]
    DuplicateStart {
        /// Name of the controller.
        controller: String,
    },

    /// An event source failed to start; startup was aborted.
    #[error("controller {controller}: failed to start event source {source_name}: {error}")]
    SourceStart {
        /// Name of the controller.
        controller: String,
        /// Name of the failing source.
        source_name: String,
        /// Error reported by the source.
        #[source]
        error: SourceError,
    },

    /// A source did not report a synced cache in time (or reported an error).
    #[error("could not wait for {controller} caches to sync: {error}")]
    CacheSync {
        /// Name of the controller.
        controller: String,
        /// Name of the source whose cache did not sync.
        source_name: String,
        /// Underlying error (a [`SourceError::Timeout`] when the deadline passed).
        #[source]
        error: SourceError,
    },

    /// The controller failed to start or has already terminated.
    #[error("controller {controller} is not running")]
    NotRunning {
        /// Name of the controller.
        controller: String,
    },

    /// The builder was given an empty controller name.
    #[error("controller name must not be empty")]
    MissingName,
}

impl ControllerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use reconcile_controller::ControllerError;
    ///
    /// let err = ControllerError::DuplicateStart { controller: "alpha".into() };
    /// assert_eq!(err.as_label(), "controller_duplicate_start");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ControllerError::DuplicateStart { .. } => "controller_duplicate_start",
            ControllerError::SourceStart { .. } => "controller_source_start_failed",
            ControllerError::CacheSync { .. } => "controller_cache_sync_failed",
            ControllerError::NotRunning { .. } => "controller_not_running",
            ControllerError::MissingName => "controller_missing_name",
        }
    }

    /// Returns the name of the controller the error belongs to, if any.
    pub fn controller(&self) -> Option<&str> {
        match self {
            ControllerError::DuplicateStart { controller }
            | ControllerError::SourceStart { controller, .. }
            | ControllerError::CacheSync { controller, .. }
            | ControllerError::NotRunning { controller } => Some(controller),
            ControllerError::MissingName => None,
        }
    }

    /// Returns `true` if the failure happened while waiting for a cache sync.
    pub fn is_cache_sync(&self) -> bool {
        matches!(self, ControllerError::CacheSync { .. })
    }
}

/// # Errors reported by event sources.
///
/// Returned from [`Source::start`](crate::Source::start) and
/// [`SyncingSource::wait_for_sync`](crate::SyncingSource::wait_for_sync).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The bounded wait expired before the source was ready.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The deadline that was exceeded.
        timeout: Duration,
    },

    /// The source failed.
    #[error("source failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The source observed cancellation of its context.
    #[error("context cancelled")]
    Canceled,

    /// The source panicked and panic recovery was enabled.
    #[error("source panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl SourceError {
    /// Convenience constructor for [`SourceError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        SourceError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SourceError::Timeout { .. } => "source_timeout",
            SourceError::Fail { .. } => "source_failed",
            SourceError::Canceled => "source_canceled",
            SourceError::Panicked { .. } => "source_panicked",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            SourceError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            SourceError::Fail { error } => format!("error: {error}"),
            SourceError::Canceled => "context cancelled".to_string(),
            SourceError::Panicked { info } => format!("panic: {info}"),
        }
    }
}

/// Renders a panic payload caught by `catch_unwind`.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_sync_error_names_the_controller() {
        let err = ControllerError::CacheSync {
            controller: "alpha".into(),
            source_name: "pods".into(),
            error: SourceError::Timeout {
                timeout: Duration::from_millis(100),
            },
        };
        assert_eq!(
            err.to_string(),
            "could not wait for alpha caches to sync: timed out after 100ms"
        );
        assert_eq!(err.controller(), Some("alpha"));
        assert!(err.is_cache_sync());
    }

    #[test]
    fn missing_name_has_no_controller() {
        assert_eq!(ControllerError::MissingName.controller(), None);
    }

    #[test]
    fn panic_payloads_are_rendered() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");

        let boxed: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
