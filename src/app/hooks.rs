//! # Closure-backed lifecycle (`Hooks`)
//!
//! [`Hooks`] is a struct of optional function values. Each closure *creates* a
//! fresh future per call, so there is no hidden mutation between restarts; shared
//! state goes into an explicit `Arc<...>` captured by the closure.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use rtam::{AppError, Hooks, LifecycleRef, Started};
//!
//! let on = Arc::new(AtomicBool::new(false));
//! let (a, b) = (on.clone(), on.clone());
//!
//! let hooks: LifecycleRef = Hooks::new()
//!     .on_start(move || {
//!         let on = a.clone();
//!         async move { on.store(true, Ordering::SeqCst); Ok::<_, AppError>(Started::Running) }
//!     })
//!     .on_stop(move || {
//!         let on = b.clone();
//!         async move { on.store(false, Ordering::SeqCst); Ok::<_, AppError>(()) }
//!     })
//!     .arc();
//! # let _ = hooks;
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;

use super::lifecycle::{Lifecycle, Started};
use crate::error::AppError;

type StartFn = Arc<dyn Fn() -> BoxFuture<'static, Result<Started, AppError>> + Send + Sync>;
type HookFn = Arc<dyn Fn() -> BoxFuture<'static, Result<(), AppError>> + Send + Sync>;

/// Lifecycle assembled from optional closures; absent hooks are no-ops.
#[derive(Clone, Default)]
pub struct Hooks {
    start: Option<StartFn>,
    stop: Option<HookFn>,
    suspend: Option<HookFn>,
    resume: Option<HookFn>,
}

impl Hooks {
    /// Creates an empty hook set (every transition is a no-op).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `start` hook.
    pub fn on_start<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Started, AppError>> + Send + 'static,
    {
        self.start = Some(Arc::new(move || f().boxed()));
        self
    }

    /// Sets the `stop` hook.
    pub fn on_stop<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), AppError>> + Send + 'static,
    {
        self.stop = Some(boxed_hook(f));
        self
    }

    /// Sets the `suspend` hook.
    pub fn on_suspend<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), AppError>> + Send + 'static,
    {
        self.suspend = Some(boxed_hook(f));
        self
    }

    /// Sets the `resume` hook.
    pub fn on_resume<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), AppError>> + Send + 'static,
    {
        self.resume = Some(boxed_hook(f));
        self
    }

    /// Wraps the hook set as a shared [`LifecycleRef`](super::LifecycleRef).
    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

fn boxed_hook<F, Fut>(f: F) -> HookFn
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), AppError>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

#[async_trait]
impl Lifecycle for Hooks {
    async fn start(&self) -> Result<Started, AppError> {
        match &self.start {
            Some(f) => f().await,
            None => Ok(Started::Running),
        }
    }

    async fn stop(&self) -> Result<(), AppError> {
        match &self.stop {
            Some(f) => f().await,
            None => Ok(()),
        }
    }

    async fn suspend(&self) -> Result<(), AppError> {
        match &self.suspend {
            Some(f) => f().await,
            None => Ok(()),
        }
    }

    async fn resume(&self) -> Result<(), AppError> {
        match &self.resume {
            Some(f) => f().await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("start", &self.start.is_some())
            .field("stop", &self.stop.is_some())
            .field("suspend", &self.suspend.is_some())
            .field("resume", &self.resume.is_some())
            .finish()
    }
}
