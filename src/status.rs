//! # Application status and process listing.
//!
//! [`AppStatus`] is the single source of truth for introspection and for the
//! orchestrator's idempotency checks. [`ProcessTable`] is the `ps`-style snapshot
//! handed to shell/GUI surfaces.
//!
//! ## Transitions
//! ```text
//!            launch                      start ok
//! STOPPED ───────────► STARTING ─────────────────────► RUNNING
//!    ▲                    │  start err / mark_failed     │   │
//!    │◄───────────────────┘                              │   │ preempt (bg-capable) / exit
//!    │                                                   │   ▼
//!    │      stop (best-effort)                 resume    │ SUSPENDED
//!    └──────────────────── STOPPING ◄───────────┐  ◄─────┘   │
//!                                               └────────────┘
//! ```

use std::fmt;
use std::sync::Arc;

use crate::app::AppFlags;

/// Lifecycle status of one application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AppStatus {
    /// Not running. Initial state.
    #[default]
    Stopped,
    /// `start` or `resume` is in flight (or a pending start has not reported in).
    Starting,
    /// Fully up.
    Running,
    /// `stop` is in flight.
    Stopping,
    /// Alive but off the foreground.
    Suspended,
}

impl AppStatus {
    /// True while the app holds its resources: STARTING, RUNNING or SUSPENDED.
    #[inline]
    pub fn is_active(self) -> bool {
        matches!(
            self,
            AppStatus::Starting | AppStatus::Running | AppStatus::Suspended
        )
    }

    /// True for the in-between states owned by an in-flight transition.
    #[inline]
    pub fn is_transitional(self) -> bool {
        matches!(self, AppStatus::Starting | AppStatus::Stopping)
    }

    /// Short lowercase label (shell output, events).
    pub fn as_str(self) -> &'static str {
        match self {
            AppStatus::Stopped => "stopped",
            AppStatus::Starting => "starting",
            AppStatus::Running => "running",
            AppStatus::Stopping => "stopping",
            AppStatus::Suspended => "suspended",
        }
    }
}

impl fmt::Display for AppStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a [`ProcessTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRow {
    /// App name.
    pub name: Arc<str>,
    /// Capability flags.
    pub flags: AppFlags,
    /// Status at snapshot time.
    pub status: AppStatus,
    /// True if the app owned the foreground slot at snapshot time.
    pub foreground: bool,
    /// Last failure or skip reason, if any.
    pub reason: Option<Arc<str>>,
}

impl ProcessRow {
    fn kind(&self) -> &'static str {
        if self.flags.contains(AppFlags::SERVICE) {
            "service"
        } else {
            "app"
        }
    }
}

/// Snapshot of every registered app, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessTable {
    pub rows: Vec<ProcessRow>,
}

impl ProcessTable {
    /// Row for `name`, if registered.
    pub fn get(&self, name: &str) -> Option<&ProcessRow> {
        self.rows.iter().find(|r| &*r.name == name)
    }

    /// Iterates rows with the given status.
    pub fn with_status(&self, status: AppStatus) -> impl Iterator<Item = &ProcessRow> {
        self.rows.iter().filter(move |r| r.status == status)
    }
}

impl fmt::Display for ProcessTable {
    /// Renders a fixed-width table:
    /// ```text
    /// NAME             KIND     STATUS     FG  REASON
    /// storage          service  running        -
    /// pwm              app      running    *   -
    /// ```
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<16} {:<8} {:<10} {:<3} REASON", "NAME", "KIND", "STATUS", "FG")?;
        for row in &self.rows {
            writeln!(
                f,
                "{:<16} {:<8} {:<10} {:<3} {}",
                row.name,
                row.kind(),
                row.status.as_str(),
                if row.foreground { "*" } else { "" },
                row.reason.as_deref().unwrap_or("-"),
            )?;
        }
        Ok(())
    }
}
