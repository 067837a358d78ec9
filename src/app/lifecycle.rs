//! # Lifecycle capability set of an application.
//!
//! Every hook is optional: the default implementations succeed without doing
//! anything, so an app implements exactly the subset it cares about.
//!
//! Hooks run **outside** the orchestrator's state lock. They may block on
//! hardware or on the foreground-surface lock, and they may query
//! [`Orchestrator::get_status`](crate::Orchestrator::get_status). They must not call
//! `launch`/`terminate`/`exit` on the same orchestrator: lifecycle operations are
//! serialized, so re-entry waits on itself.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AppError;

/// Outcome of a successful `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Started {
    /// The app is fully up.
    #[default]
    Running,

    /// The app kicked off its own worker and will report in later via
    /// [`Orchestrator::mark_running`](crate::Orchestrator::mark_running)
    /// (or [`mark_failed`](crate::Orchestrator::mark_failed)). Until then it is STARTING.
    Pending,
}

/// # Optional lifecycle hooks.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use rtam::{AppError, Lifecycle, Started};
///
/// struct Backlight;
///
/// #[async_trait]
/// impl Lifecycle for Backlight {
///     async fn start(&self) -> Result<Started, AppError> {
///         // configure the PWM channel...
///         Ok(Started::Running)
///     }
/// }
/// ```
#[async_trait]
pub trait Lifecycle: Send + Sync + 'static {
    /// Brings the app up from STOPPED.
    ///
    /// On error the component is responsible for undoing its own partial work.
    async fn start(&self) -> Result<Started, AppError> {
        Ok(Started::Running)
    }

    /// Releases everything the app holds. Best-effort: failures are logged, the app ends STOPPED.
    async fn stop(&self) -> Result<(), AppError> {
        Ok(())
    }

    /// Gives up the foreground while keeping in-memory state.
    async fn suspend(&self) -> Result<(), AppError> {
        Ok(())
    }

    /// Takes the foreground back after `suspend`.
    async fn resume(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Shared handle to a lifecycle implementation.
pub type LifecycleRef = Arc<dyn Lifecycle>;

/// Lifecycle with every hook absent.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct NoHooks;

impl Lifecycle for NoHooks {}
