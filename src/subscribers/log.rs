//! # LogWriter: event printer over `tracing`.
//!
//! A minimal subscriber that renders every [`Event`] as one `tracing` record under
//! the `rtam` target. Failures go out at `warn`, everything else at `info`
//! (deferred-queue chatter at `debug`).
//!
//! ## Example output (with a `fmt` subscriber installed)
//! ```text
//! INFO rtam: [starting] app=storage
//! INFO rtam: [running] app=storage
//! WARN rtam: [start-failed] app=wifi_service reason="radio calibration failed"
//! WARN rtam: [dependency-unmet] app=weather peer=wifi_service
//! INFO rtam: [foreground] app=pwm peer=launcher
//! DEBUG rtam: [deferred-fired] call=7 key=nvs_commit
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn tag(kind: EventKind) -> &'static str {
    match kind {
        EventKind::AppStarting => "starting",
        EventKind::AppStartPending => "start-pending",
        EventKind::AppRunning => "running",
        EventKind::AppStartFailed => "start-failed",
        EventKind::AppSuspending => "suspending",
        EventKind::AppSuspended => "suspended",
        EventKind::AppResuming => "resuming",
        EventKind::AppStopping => "stopping",
        EventKind::AppStopped => "stopped",
        EventKind::AppStopFailed => "stop-failed",
        EventKind::ForegroundChanged => "foreground",
        EventKind::LaunchRejected => "launch-rejected",
        EventKind::DependencyCycle => "dependency-cycle",
        EventKind::DependencyUnmet => "dependency-unmet",
        EventKind::DeferredPosted => "deferred-posted",
        EventKind::DeferredFired => "deferred-fired",
        EventKind::DeferredCancelled => "deferred-cancelled",
        EventKind::DeferredDropped => "deferred-dropped",
        EventKind::DeferredPanicked => "deferred-panicked",
        EventKind::ShutdownRequested => "shutdown-requested",
        EventKind::AllStoppedWithin => "all-stopped-within-grace",
        EventKind::GraceExceeded => "grace-exceeded",
        EventKind::SubscriberOverflow => "subscriber-overflow",
        EventKind::SubscriberPanicked => "subscriber-panicked",
    }
}

fn render(e: &Event) -> String {
    let mut line = format!("[{}]", tag(e.kind));
    if let Some(app) = &e.app {
        line.push_str(&format!(" app={app}"));
    }
    if let Some(peer) = &e.peer {
        line.push_str(&format!(" peer={peer}"));
    }
    if let Some(call) = e.call {
        line.push_str(&format!(" call={call}"));
    }
    if let Some(key) = &e.key {
        line.push_str(&format!(" key={key}"));
    }
    if let Some(ms) = e.delay_ms {
        line.push_str(&format!(" delay={ms}ms"));
    }
    if let Some(reason) = &e.reason {
        line.push_str(&format!(" reason={reason:?}"));
    }
    line
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let line = render(e);
        match e.kind {
            EventKind::AppStartFailed
            | EventKind::AppStopFailed
            | EventKind::LaunchRejected
            | EventKind::DependencyCycle
            | EventKind::DependencyUnmet
            | EventKind::DeferredDropped
            | EventKind::DeferredPanicked
            | EventKind::GraceExceeded
            | EventKind::SubscriberOverflow
            | EventKind::SubscriberPanicked => {
                tracing::warn!(target: "rtam", seq = e.seq, "{line}");
            }
            EventKind::DeferredPosted
            | EventKind::DeferredFired
            | EventKind::DeferredCancelled => {
                tracing::debug!(target: "rtam", seq = e.seq, "{line}");
            }
            _ => {
                tracing::info!(target: "rtam", seq = e.seq, "{line}");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
