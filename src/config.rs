//! # Controller configuration.
//!
//! Provides [`ControllerConfig`], the per-controller settings consumed by
//! [`ControllerBuilder`](crate::ControllerBuilder).
//!
//! ## Sentinel values
//! - `cache_sync_timeout = 0s` → use [`DEFAULT_CACHE_SYNC_TIMEOUT`]
//! - `bus_capacity = 0` → clamped to 1
//! - `recover_panic = None` → panics propagate
//! - `leader_elected = None` → leader election required

use std::time::Duration;

/// Default upper bound for a single source's cache sync wait.
pub const DEFAULT_CACHE_SYNC_TIMEOUT: Duration = Duration::from_secs(120);

/// Interval at which [`Controller::wait_for_started`](crate::Controller::wait_for_started)
/// re-checks the started flag.
pub const STARTED_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Configuration for a single controller.
///
/// ## Field semantics
/// - `cache_sync_timeout`: deadline for **each** syncing source, measured from
///   the moment its wait begins (`0s` = default)
/// - `bus_capacity`: lifecycle event ring buffer size (min 1)
/// - `recover_panic`: convert source panics during startup into errors
/// - `leader_elected`: whether the controller may only run on the elected leader
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Time limit for waiting on one source's cache sync.
    pub cache_sync_timeout: Duration,

    /// Capacity of the lifecycle event bus.
    ///
    /// Slow receivers that lag behind more than `bus_capacity` events observe
    /// `Lagged` and skip older items.
    pub bus_capacity: usize,

    /// Whether a panic raised by a source during startup is recovered.
    pub recover_panic: Option<bool>,

    /// Whether the controller needs leader election.
    pub leader_elected: Option<bool>,
}

impl ControllerConfig {
    /// Returns the effective cache sync timeout.
    ///
    /// `Duration::ZERO` is treated as "unset" and mapped to the default.
    #[inline]
    pub fn cache_sync_timeout(&self) -> Duration {
        if self.cache_sync_timeout == Duration::ZERO {
            DEFAULT_CACHE_SYNC_TIMEOUT
        } else {
            self.cache_sync_timeout
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns `true` when source panics should be recovered (unset ⇒ `false`).
    #[inline]
    pub fn recover_panic(&self) -> bool {
        self.recover_panic.unwrap_or(false)
    }

    /// Returns `true` when the controller must run on the leader only (unset ⇒ `true`).
    #[inline]
    pub fn need_leader_election(&self) -> bool {
        self.leader_elected.unwrap_or(true)
    }

    /// Returns a config with the given cache sync timeout.
    pub fn with_cache_sync_timeout(mut self, timeout: Duration) -> Self {
        self.cache_sync_timeout = timeout;
        self
    }

    /// Returns a config with an explicit leader-election flag.
    pub fn with_leader_elected(mut self, leader_elected: bool) -> Self {
        self.leader_elected = Some(leader_elected);
        self
    }

    /// Returns a config with an explicit panic-recovery flag.
    pub fn with_recover_panic(mut self, recover_panic: bool) -> Self {
        self.recover_panic = Some(recover_panic);
        self
    }
}

impl Default for ControllerConfig {
    /// Default configuration:
    ///
    /// - `cache_sync_timeout = 2min`
    /// - `bus_capacity = 1024`
    /// - `recover_panic`, `leader_elected` unset
    fn default() -> Self {
        Self {
            cache_sync_timeout: DEFAULT_CACHE_SYNC_TIMEOUT,
            bus_capacity: 1024,
            recover_panic: None,
            leader_elected: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_timeout_falls_back_to_default() {
        let cfg = ControllerConfig::default().with_cache_sync_timeout(Duration::ZERO);
        assert_eq!(cfg.cache_sync_timeout(), DEFAULT_CACHE_SYNC_TIMEOUT);

        let cfg = cfg.with_cache_sync_timeout(Duration::from_millis(100));
        assert_eq!(cfg.cache_sync_timeout(), Duration::from_millis(100));
    }

    #[test]
    fn unset_flags_use_defaults() {
        let cfg = ControllerConfig::default();
        assert!(cfg.need_leader_election());
        assert!(!cfg.recover_panic());
        assert_eq!(
            ControllerConfig {
                bus_capacity: 0,
                ..cfg
            }
            .bus_capacity_clamped(),
            1
        );
    }
}
