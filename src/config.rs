//! # Global manager configuration.
//!
//! Provides [`Config`], the centralized settings for the [`Orchestrator`](crate::Orchestrator),
//! and [`DeferredConfig`] for the [`DeferredQueue`](crate::DeferredQueue).
//!
//! ## Sentinel values
//! - `home = None` → no home app; an empty navigation stack just clears the foreground slot
//! - `dependency_wait = 0s` → never wait for a pending dependency, fail immediately

use std::time::Duration;

/// Global configuration for the application manager.
///
/// ## Field semantics
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
/// - `grace`: Budget for stopping every active app during [`shutdown`](crate::Orchestrator::shutdown)
/// - `dependency_wait`: How long a launch waits for a dependency whose start is still pending
/// - `home`: App foreground control returns to when the navigation stack is empty
/// - `deferred`: Deferred queue settings
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Maximum time to wait for all apps to stop during shutdown.
    pub grace: Duration,

    /// Maximum time a launch waits on a dependency that returned
    /// [`Started::Pending`](crate::Started::Pending).
    pub dependency_wait: Duration,

    /// Name of the home app.
    ///
    /// If it is a foreground app it is launched when nothing else is left to resume;
    /// if it is a service (a launcher drawing the root screen) the slot is just cleared.
    pub home: Option<String>,

    /// Deferred-call queue settings.
    pub deferred: DeferredConfig,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns the home app name, if any.
    #[inline]
    pub fn home_app(&self) -> Option<&str> {
        self.home.as_deref().filter(|h| !h.is_empty())
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `grace = 5s`
    /// - `dependency_wait = 3s`
    /// - `home = Some("launcher")`
    /// - `deferred = DeferredConfig::default()`
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            grace: Duration::from_secs(5),
            dependency_wait: Duration::from_secs(3),
            home: Some("launcher".to_string()),
            deferred: DeferredConfig::default(),
        }
    }
}

/// Configuration for the deferred-call queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeferredConfig {
    /// Maximum number of pending calls; posting beyond it fails with `QueueFull`.
    pub capacity: usize,

    /// Number of worker contexts draining the queue (min 1).
    pub workers: usize,
}

impl DeferredConfig {
    /// Returns the worker count clamped to a minimum of 1.
    #[inline]
    pub fn workers_clamped(&self) -> usize {
        self.workers.max(1)
    }
}

impl Default for DeferredConfig {
    /// `capacity = 16`, `workers = 2`.
    fn default() -> Self {
        Self {
            capacity: 16,
            workers: 2,
        }
    }
}
