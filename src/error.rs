//! Error types used by the application manager, its applications and the deferred queue.
//!
//! - [`AppError`]: returned by an application's own lifecycle callbacks.
//! - [`LaunchError`]: why [`Orchestrator::launch`](crate::Orchestrator::launch) refused or failed.
//! - [`TerminateError`]: why [`Orchestrator::terminate`](crate::Orchestrator::terminate) refused.
//! - [`RegistryError`]: static configuration mistakes caught while building the table.
//! - [`PostError`]: why [`DeferredQueue::post`](crate::DeferredQueue::post) dropped a call.
//! - [`RuntimeError`]: failures of the manager itself (shutdown, signal hookup).
//!
//! Every enum provides `as_label` (stable snake_case label for logs and events).

use std::time::Duration;
use thiserror::Error;

/// Lookup of a name that was never registered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown application '{name}'")]
pub struct UnknownApplication {
    /// The name that was looked up.
    pub name: String,
}

impl UnknownApplication {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// # Errors produced by application lifecycle callbacks.
///
/// A component reports its own failure through this type; the orchestrator never
/// panics on it, it isolates the failure to the affected app.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// The callback failed.
    #[error("callback failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// A shared resource (bus, pin group, surface) was unavailable.
    #[error("resource busy: {resource}")]
    Busy {
        /// Name of the contended resource.
        resource: String,
    },
}

impl AppError {
    /// Shorthand for [`AppError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        AppError::Fail {
            error: error.into(),
        }
    }

    /// Shorthand for [`AppError::Busy`].
    pub fn busy(resource: impl Into<String>) -> Self {
        AppError::Busy {
            resource: resource.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use rtam::AppError;
    ///
    /// assert_eq!(AppError::fail("i2c nack").as_label(), "app_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            AppError::Fail { .. } => "app_failed",
            AppError::Busy { .. } => "app_busy",
        }
    }
}

/// # Errors returned by `launch`.
///
/// A failed launch never leaves two apps claiming the foreground slot: either the
/// previous occupant is still in place, or it was handed back to the navigation stack.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LaunchError {
    /// Name is not registered.
    #[error(transparent)]
    Unknown(#[from] UnknownApplication),

    /// A mutually exclusive app is active; terminate it first.
    #[error("cannot launch '{app}': conflicts with active '{running}'")]
    Conflict {
        /// App being launched.
        app: String,
        /// Active app it conflicts with.
        running: String,
    },

    /// A required dependency failed to reach RUNNING.
    #[error("cannot launch '{app}': dependency '{dependency}' failed: {source}")]
    Dependency {
        /// App being launched.
        app: String,
        /// The dependency that failed.
        dependency: String,
        /// Why the dependency failed.
        source: Box<LaunchError>,
    },

    /// A dependency's start is still pending after the configured wait.
    #[error("cannot launch '{app}': dependency '{dependency}' still starting after {waited:?}")]
    DependencyTimeout {
        /// App being launched.
        app: String,
        /// The dependency that did not finish starting.
        dependency: String,
        /// How long the launch waited.
        waited: Duration,
    },

    /// The current foreground occupant could not be suspended or stopped.
    #[error("cannot launch '{app}': could not preempt '{occupant}': {source}")]
    Preemption {
        /// App being launched.
        app: String,
        /// Foreground occupant that refused to leave.
        occupant: String,
        /// Error from the occupant's suspend/stop callback.
        source: AppError,
    },

    /// The app's own start (or resume) callback failed.
    #[error("'{app}' failed to start: {source}")]
    Start {
        /// App being launched.
        app: String,
        /// Error from the start/resume callback.
        source: AppError,
    },

    /// The app's dependency closure contains a cycle.
    #[error("dependency cycle: {members:?}")]
    Cycle {
        /// Apps forming the cycle, in discovery order.
        members: Vec<String>,
    },
}

impl LaunchError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            LaunchError::Unknown(_) => "launch_unknown",
            LaunchError::Conflict { .. } => "launch_conflict",
            LaunchError::Dependency { .. } => "launch_dependency",
            LaunchError::DependencyTimeout { .. } => "launch_dependency_timeout",
            LaunchError::Preemption { .. } => "launch_preemption",
            LaunchError::Start { .. } => "launch_start",
            LaunchError::Cycle { .. } => "launch_cycle",
        }
    }

    /// Follows `Dependency` chains down to the failure that started it.
    ///
    /// # Example
    /// ```
    /// use rtam::{AppError, LaunchError};
    ///
    /// let root = LaunchError::Start { app: "storage".into(), source: AppError::fail("nvs") };
    /// let err = LaunchError::Dependency {
    ///     app: "gui".into(),
    ///     dependency: "storage".into(),
    ///     source: Box::new(root.clone()),
    /// };
    /// assert_eq!(err.root_cause(), &root);
    /// ```
    pub fn root_cause(&self) -> &LaunchError {
        let mut cur = self;
        while let LaunchError::Dependency { source, .. } = cur {
            cur = source;
        }
        cur
    }
}

/// # Errors returned by `terminate` / `exit`.
///
/// A failing `stop` callback is not an error here: stop is best-effort, the app
/// ends up STOPPED regardless and the failure is published as `AppStopFailed`.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TerminateError {
    /// Name is not registered.
    #[error(transparent)]
    Unknown(#[from] UnknownApplication),

    /// Other active apps depend on this one; use a forced terminate to override.
    #[error("'{app}' is in use by {dependents:?}")]
    InUse {
        /// App being terminated.
        app: String,
        /// Active dependents.
        dependents: Vec<String>,
    },

    /// `exit` tried to send a background-capable app to the background and its suspend failed.
    #[error("'{app}' failed to suspend: {source}")]
    Suspend {
        /// App being exited.
        app: String,
        /// Error from the suspend callback.
        source: AppError,
    },
}

impl TerminateError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            TerminateError::Unknown(_) => "terminate_unknown",
            TerminateError::InUse { .. } => "terminate_in_use",
            TerminateError::Suspend { .. } => "terminate_suspend",
        }
    }
}

/// # Static configuration errors.
///
/// Raised while the descriptor table is being built; these are boot-fatal.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Two descriptors share one name.
    #[error("application '{name}' registered twice")]
    Duplicate {
        /// The duplicated name.
        name: String,
    },

    /// A descriptor has an empty name.
    #[error("application name must not be empty")]
    EmptyName,

    /// A descriptor lists itself as a dependency or conflict.
    #[error("application '{name}' refers to itself")]
    SelfReference {
        /// The offending descriptor.
        name: String,
    },
}

impl RegistryError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RegistryError::Duplicate { .. } => "registry_duplicate",
            RegistryError::EmptyName => "registry_empty_name",
            RegistryError::SelfReference { .. } => "registry_self_reference",
        }
    }
}

/// # Errors returned by the deferred queue.
///
/// A failed post means "this deferred action was dropped"; the caller owns any fallback.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostError {
    /// The pending set is at capacity.
    #[error("deferred queue full (capacity {capacity})")]
    QueueFull {
        /// Configured capacity.
        capacity: usize,
    },

    /// The post pinned itself to a worker index that does not exist.
    #[error("no deferred worker #{worker} (have {workers})")]
    NoSuchWorker {
        /// Requested worker index.
        worker: usize,
        /// Number of configured workers.
        workers: usize,
    },
}

impl PostError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            PostError::QueueFull { .. } => "post_queue_full",
            PostError::NoSuchWorker { .. } => "post_no_such_worker",
        }
    }
}

/// # Errors produced by the manager runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some apps did not finish stopping.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Apps whose stop callback had not returned.
        stuck: Vec<String>,
    },

    /// OS signal listeners could not be installed.
    #[error("failed to install signal handlers: {0}")]
    Signal(#[from] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use rtam::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Signal(_) => "runtime_signal",
        }
    }
}
