//! Post options and handles for deferred calls.

use std::sync::Arc;

/// What `post` does when a pending call with the same coalescing key exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CancelPolicy {
    /// Independent one-shot timers; the existing call is left alone.
    #[default]
    KeepBoth,

    /// Cancel every pending call with the same key, then enqueue the new one.
    ///
    /// Used for debounced writes: only the last of a burst fires.
    CancelCurrent,

    /// Drop the new call and return the handle of the existing one.
    KeepPending,
}

/// Options of a single `post`.
///
/// # Example
/// ```
/// use rtam::{CancelPolicy, PostOptions};
///
/// let opts = PostOptions::debounce("nvs_commit");
/// assert_eq!(opts.key.as_deref(), Some("nvs_commit"));
/// assert_eq!(opts.policy, CancelPolicy::CancelCurrent);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostOptions {
    /// Identifies "the same logical call" for coalescing and `cancel_key`.
    pub key: Option<Arc<str>>,
    /// Applied only when `key` is set and a pending call shares it.
    pub policy: CancelPolicy,
    /// Pin the call to one worker; `None` lets whichever worker wakes first run it.
    pub worker: Option<usize>,
}

impl PostOptions {
    /// No key, `KeepBoth`, any worker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keyed call with [`CancelPolicy::CancelCurrent`].
    pub fn debounce(key: impl Into<Arc<str>>) -> Self {
        Self::new().with_key(key).cancel_current()
    }

    pub fn with_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn cancel_current(mut self) -> Self {
        self.policy = CancelPolicy::CancelCurrent;
        self
    }

    pub fn keep_pending(mut self) -> Self {
        self.policy = CancelPolicy::KeepPending;
        self
    }

    /// Pins the call to worker `index`.
    pub fn on_worker(mut self, index: usize) -> Self {
        self.worker = Some(index);
        self
    }
}

/// Handle of a posted call, usable with [`DeferredQueue::cancel`](crate::DeferredQueue::cancel).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeferredHandle {
    pub(crate) id: u64,
    pub(crate) key: Option<Arc<str>>,
}

impl DeferredHandle {
    /// Queue-unique call id (also carried by deferred events).
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Coalescing key the call was posted with.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}
