//! # Events emitted by the orchestrator and the deferred queue.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Lifecycle events**: per-app transitions (starting, running, suspended, stopped, failures)
//! - **Foreground events**: who owns the shared display surface
//! - **Deferred events**: post / fire / cancel / drop of deferred calls
//! - **Runtime events**: boot diagnostics, shutdown, subscriber health
//!
//! The [`Event`] struct carries the metadata: timestamp, app name, peer app, reason, delay, key.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use rtam::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::AppStartFailed)
//!     .with_app("wifi_service")
//!     .with_reason("radio calibration failed");
//!
//! assert_eq!(ev.kind, EventKind::AppStartFailed);
//! assert_eq!(ev.app.as_deref(), Some("wifi_service"));
//! assert_eq!(ev.reason.as_deref(), Some("radio calibration failed"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of manager events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === App lifecycle events ===
    /// App entered STARTING; its `start` callback is about to run.
    ///
    /// Sets: `app`
    AppStarting,

    /// `start` returned `Started::Pending`; the app stays STARTING until it reports in.
    ///
    /// Sets: `app`
    AppStartPending,

    /// App reached RUNNING.
    ///
    /// Sets: `app`
    AppRunning,

    /// `start`/`resume` failed (or a pending start was marked failed); app is STOPPED.
    ///
    /// Sets: `app`, `reason`
    AppStartFailed,

    /// `suspend` is about to run.
    ///
    /// Sets: `app`, `peer` (app that takes over the foreground, if any)
    AppSuspending,

    /// App reached SUSPENDED.
    ///
    /// Sets: `app`
    AppSuspended,

    /// App is leaving SUSPENDED; `resume` is about to run.
    ///
    /// Sets: `app`
    AppResuming,

    /// App entered STOPPING; `stop` is about to run.
    ///
    /// Sets: `app`
    AppStopping,

    /// App reached STOPPED.
    ///
    /// Sets: `app`
    AppStopped,

    /// `stop` (or `suspend` during preemption) failed.
    ///
    /// For terminate the app still ends STOPPED; during preemption it stays in the slot.
    ///
    /// Sets: `app`, `reason`
    AppStopFailed,

    // === Foreground events ===
    /// Foreground slot changed owner.
    ///
    /// Sets: `app` (new occupant, absent when cleared), `peer` (previous occupant)
    ForegroundChanged,

    /// A launch was refused before any callback ran (conflict, cycle, unknown).
    ///
    /// Sets: `app`, `reason`
    LaunchRejected,

    /// A dependency cycle was found while resolving start order.
    ///
    /// Sets: `app` (first member), `reason` (all members)
    DependencyCycle,

    /// App was skipped because a dependency did not reach RUNNING.
    ///
    /// Sets: `app`, `peer` (failed dependency)
    DependencyUnmet,

    // === Deferred events ===
    /// A deferred call entered the pending set.
    ///
    /// Sets: `call`, `key` (if any), `delay_ms`
    DeferredPosted,

    /// A deferred call ran.
    ///
    /// Sets: `call`, `key` (if any)
    DeferredFired,

    /// A pending deferred call was cancelled (coalescing or explicit).
    ///
    /// Sets: `call`, `key` (if any), `reason`
    DeferredCancelled,

    /// A post was refused (queue full, or dropped by `KeepPending`).
    ///
    /// Sets: `key` (if any), `reason`
    DeferredDropped,

    /// A deferred callback panicked; the worker survived.
    ///
    /// Sets: `call`, `key` (if any), `reason`
    DeferredPanicked,

    // === Runtime events ===
    /// Shutdown requested (explicit call or OS signal).
    ShutdownRequested,

    /// All apps stopped within the configured grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some apps did not stop in time.
    ///
    /// Sets: `reason` (stuck apps)
    GraceExceeded,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `app` (subscriber name), `reason`
    SubscriberOverflow,

    /// Subscriber panicked during event processing.
    ///
    /// Sets: `app` (subscriber name), `reason`
    SubscriberPanicked,
}

/// Manager event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// App this event is about.
    pub app: Option<Arc<str>>,
    /// Second app involved (previous occupant, failed dependency, preemptor).
    pub peer: Option<Arc<str>>,
    /// Human-readable reason (errors, cycle members, etc.).
    pub reason: Option<Arc<str>>,
    /// Deferred-call id.
    pub call: Option<u64>,
    /// Deferred-call coalescing key.
    pub key: Option<Arc<str>>,
    /// Deferred delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            app: None,
            peer: None,
            reason: None,
            call: None,
            key: None,
            delay_ms: None,
        }
    }

    /// Attaches the app name.
    #[inline]
    pub fn with_app(mut self, app: impl Into<Arc<str>>) -> Self {
        self.app = Some(app.into());
        self
    }

    /// Attaches the peer app name.
    #[inline]
    pub fn with_peer(mut self, peer: impl Into<Arc<str>>) -> Self {
        self.peer = Some(peer.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a deferred-call id.
    #[inline]
    pub fn with_call(mut self, id: u64) -> Self {
        self.call = Some(id);
        self
    }

    /// Attaches a coalescing key.
    #[inline]
    pub fn with_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_app(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_app(subscriber)
            .with_reason(info)
    }

    /// True for events generated by the subscriber machinery itself.
    ///
    /// The fan-out listener does not feed these back into subscribers.
    #[inline]
    pub fn is_subscriber_internal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}
