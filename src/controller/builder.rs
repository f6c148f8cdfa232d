use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::events::Bus;
use crate::queue::{Key, QueueFactory, RateLimiterRef, default_queue_factory, default_rate_limiter};
use crate::subscribers::Subscribe;

use super::core::Controller;
use super::log::{LogFactory, default_log_factory};
use super::phase::Phase;

/// Builder for a fully configured [`Controller`].
///
/// Building never spawns tasks or constructs the queue; both are deferred to
/// [`Controller::start`].
pub struct ControllerBuilder<K: Key> {
    name: String,
    config: ControllerConfig,
    rate_limiter: Option<RateLimiterRef<K>>,
    queue_factory: Option<QueueFactory<K>>,
    log: Option<LogFactory<K>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl<K: Key> ControllerBuilder<K> {
    /// Creates a builder for a controller with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: ControllerConfig::default(),
            rate_limiter: None,
            queue_factory: None,
            log: None,
            subscribers: Vec::new(),
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the rate limiter handed to the queue factory.
    ///
    /// Defaults to [`default_rate_limiter`].
    pub fn with_rate_limiter(mut self, limiter: RateLimiterRef<K>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Sets the queue factory invoked once by `start`.
    ///
    /// Defaults to [`default_queue_factory`].
    pub fn with_queue_factory(mut self, factory: QueueFactory<K>) -> Self {
        self.queue_factory = Some(factory);
        self
    }

    /// Sets the log factory.
    ///
    /// Defaults to [`default_log_factory`].
    pub fn with_log_factory(mut self, log: LogFactory<K>) -> Self {
        self.log = Some(log);
        self
    }

    /// Sets lifecycle event subscribers.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Validates the settings and builds the controller.
    pub fn build(self) -> Result<Controller<K>, ControllerError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ControllerError::MissingName);
        }

        Ok(Controller {
            log: self.log.unwrap_or_else(|| default_log_factory(name)),
            name: name.into(),
            bus: Bus::new(self.config.bus_capacity_clamped()),
            config: self.config,
            rate_limiter: self.rate_limiter.unwrap_or_else(default_rate_limiter),
            new_queue: self.queue_factory.unwrap_or_else(default_queue_factory),
            subscribers: self.subscribers,
            state: Mutex::new(Phase::configured()),
        })
    }
}
