//! # Orchestrator: owns every app's state and the foreground slot.
//!
//! The lifecycle operations themselves live in `launch.rs` and `terminate.rs`;
//! this file holds the struct, read-only queries, boot, completion reports of
//! pending starts, and shutdown.
//!
//! ## Locking
//! ```text
//! ops:   tokio::Mutex<()>        held for a whole launch/terminate/exit/initialize/shutdown
//! state: tokio::RwLock<table>    held only to read or commit, never across a callback
//!
//! launch(name)
//!   ops.lock()
//!     state.write { STOPPED → STARTING }      ── release
//!     lifecycle.start().await                 (may block on a bus / the GUI lock,
//!                                              may call get_status)
//!     state.write { STARTING → RUNNING, slot } ── release
//!   ops.unlock()
//! ```
//! `get_status`, `ps`, `mark_running` and `mark_failed` only take `state`, so they
//! stay responsive while a callback is in flight.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock, watch};

use super::state::StateTable;
use super::shutdown::power_off_signal;
use crate::app::AppDescriptor;
use crate::config::Config;
use crate::error::{LaunchError, RuntimeError, UnknownApplication};
use crate::events::{Bus, Event, EventKind};
use crate::registry::Registry;
use crate::status::{AppStatus, ProcessRow, ProcessTable};
use crate::subscribers::SubscriberSet;

/// Outcome of [`Orchestrator::initialize`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitReport {
    /// Apps brought up during boot (dependencies included), in start order.
    pub started: Vec<String>,
    /// Auto-start apps that did not come up, with the reason.
    pub failed: Vec<(String, LaunchError)>,
    /// Distinct dependency cycles found, each listed once.
    pub cycles: Vec<Vec<String>>,
}

impl InitReport {
    /// True if every auto-start app came up.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Runtime application manager.
///
/// Created through [`Orchestrator::builder`]; shared as `Arc<Orchestrator>` with
/// every context that launches or inspects apps (key handler, GUI, shell).
pub struct Orchestrator {
    pub(super) cfg: Config,
    pub(super) registry: Arc<Registry>,
    pub(super) bus: Bus,
    pub(super) subs: Arc<SubscriberSet>,
    pub(super) state: RwLock<StateTable>,
    pub(super) ops: Mutex<()>,
    pub(super) changes: watch::Sender<u64>,
}

impl Orchestrator {
    pub(super) fn new_internal(
        cfg: Config,
        registry: Arc<Registry>,
        bus: Bus,
        subs: Arc<SubscriberSet>,
    ) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            state: RwLock::new(StateTable::new(registry.len())),
            cfg,
            registry,
            bus,
            subs,
            ops: Mutex::new(()),
            changes,
        }
    }

    /// Subscribes to the bus and forwards events to the subscriber set (fire-and-forget).
    pub(super) fn subscriber_listener(&self) {
        if self.subs.is_empty() {
            return;
        }
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        tokio::spawn(async move {
            use tokio::sync::broadcast::error::RecvError;
            loop {
                match rx.recv().await {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "subscriber listener lagged behind the bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    // ---- accessors -------------------------------------------------------

    /// Active configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// The descriptor table.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The event bus (clone it to publish from a [`DeferredQueue`](crate::DeferredQueue)).
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// New receiver of every subsequent event.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    // ---- queries ---------------------------------------------------------

    /// Current status of `name`.
    ///
    /// # Errors
    /// [`UnknownApplication`] if `name` was never registered.
    pub async fn get_status(&self, name: &str) -> Result<AppStatus, UnknownApplication> {
        let idx = self.registry.require(name)?;
        Ok(self.status(idx).await)
    }

    /// Non-service apps in declaration order (launcher listing).
    pub fn list_applications(&self) -> Vec<AppDescriptor> {
        self.registry.applications().cloned().collect()
    }

    /// Current foreground occupant.
    pub async fn foreground(&self) -> Option<String> {
        let st = self.state.read().await;
        st.foreground.map(|i| self.name(i).to_string())
    }

    /// Suspended apps waiting on the navigation stack, bottom first.
    pub async fn navigation(&self) -> Vec<String> {
        let st = self.state.read().await;
        st.nav.iter().map(|&i| self.name(i).to_string()).collect()
    }

    /// Snapshot of every app, in declaration order.
    pub async fn ps(&self) -> ProcessTable {
        let st = self.state.read().await;
        let rows = self
            .registry
            .iter()
            .enumerate()
            .map(|(idx, desc)| ProcessRow {
                name: desc.name().into(),
                flags: desc.flags(),
                status: st.rows[idx].status,
                foreground: st.foreground == Some(idx),
                reason: st.rows[idx].reason.clone(),
            })
            .collect();
        ProcessTable { rows }
    }

    // ---- pending starts --------------------------------------------------

    /// Reports that an app whose `start` returned [`Started::Pending`](crate::Started::Pending)
    /// is now fully up.
    ///
    /// Returns `false` (and changes nothing) if the app was not STARTING.
    /// Safe to call from the app's own worker at any time; it never waits on a
    /// lifecycle operation in flight.
    pub async fn mark_running(&self, name: &str) -> Result<bool, UnknownApplication> {
        let idx = self.registry.require(name)?;
        let done = self
            .commit(|st| {
                if st.status(idx) != AppStatus::Starting {
                    return false;
                }
                st.came_up(idx, AppStatus::Running);
                true
            })
            .await;
        if done {
            tracing::debug!(app = name, "pending start completed");
            self.publish(Event::new(EventKind::AppRunning).with_app(name));
        }
        Ok(done)
    }

    /// Reports that a pending start gave up. The app ends STOPPED with `reason`.
    ///
    /// If it held the foreground slot the slot is cleared; call
    /// [`home`](Self::home) to bring the home app back.
    pub async fn mark_failed(
        &self,
        name: &str,
        reason: impl Into<String>,
    ) -> Result<bool, UnknownApplication> {
        let idx = self.registry.require(name)?;
        let reason = reason.into();
        let outcome = self
            .commit(|st| {
                if st.status(idx) != AppStatus::Starting {
                    return None;
                }
                let had_slot = st.went_down(idx);
                st.set_reason(idx, format!("start failed: {reason}"));
                Some(had_slot)
            })
            .await;

        let Some(had_slot) = outcome else {
            return Ok(false);
        };
        tracing::warn!(app = name, %reason, "pending start failed");
        self.publish(
            Event::new(EventKind::AppStartFailed)
                .with_app(name)
                .with_reason(reason),
        );
        if had_slot {
            self.publish(Event::new(EventKind::ForegroundChanged).with_peer(name));
        }
        Ok(true)
    }

    // ---- boot ------------------------------------------------------------

    /// Brings up every [`AUTO_START`](crate::AppFlags::AUTO_START) app, dependencies first.
    ///
    /// Failures are isolated: a failed start leaves that app STOPPED, its dependents
    /// are skipped with a "dependency unmet" reason, a cycle leaves its members
    /// unstarted, and everything else still boots.
    pub async fn initialize(&self) -> InitReport {
        let _ops = self.ops.lock().await;
        let before: Vec<usize> = self.state.read().await.started.clone();
        let mut report = InitReport::default();

        let auto: Vec<usize> = self
            .registry
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_auto_start())
            .map(|(i, _)| i)
            .collect();

        for idx in auto {
            if let Err(err) = self.launch_and_recover(idx).await {
                if let LaunchError::Cycle { members } = err.root_cause() {
                    let mut key = members.clone();
                    key.sort();
                    let seen = report.cycles.iter().any(|c| {
                        let mut c = c.clone();
                        c.sort();
                        c == key
                    });
                    if !seen {
                        report.cycles.push(members.clone());
                    }
                }
                report.failed.push((self.name(idx).to_string(), err));
            }
        }

        let st = self.state.read().await;
        report.started = st
            .started
            .iter()
            .filter(|i| !before.contains(i))
            .map(|&i| self.name(i).to_string())
            .collect();
        drop(st);

        tracing::info!(
            started = report.started.len(),
            failed = report.failed.len(),
            cycles = report.cycles.len(),
            "initialization finished"
        );
        report
    }

    // ---- shutdown --------------------------------------------------------

    /// Stops every active app (foreground first, then dependents before their
    /// dependencies) within [`Config::grace`].
    ///
    /// # Errors
    /// [`RuntimeError::GraceExceeded`] listing the apps that were not STOPPED in time.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let _ops = self.ops.lock().await;
        self.publish(Event::new(EventKind::ShutdownRequested));
        tracing::info!(grace = ?self.cfg.grace, "shutdown requested");

        let order = {
            let mut st = self.state.write().await;
            st.nav.clear();
            st.shutdown_order()
        };

        let grace = self.cfg.grace;
        let all = async {
            for idx in order {
                self.stop_app(idx).await;
            }
        };

        if tokio::time::timeout(grace, all).await.is_ok() {
            self.publish(Event::new(EventKind::AllStoppedWithin));
            return Ok(());
        }

        let st = self.state.read().await;
        let stuck: Vec<String> = st
            .rows
            .iter()
            .enumerate()
            .filter(|(_, r)| r.status != AppStatus::Stopped)
            .map(|(i, _)| self.name(i).to_string())
            .collect();
        drop(st);

        tracing::warn!(?stuck, "grace exceeded");
        self.publish(Event::new(EventKind::GraceExceeded).with_reason(stuck.join(",")));
        Err(RuntimeError::GraceExceeded { grace, stuck })
    }

    /// Boots, then waits for SIGINT/SIGTERM/SIGQUIT (Ctrl-C elsewhere) and shuts down.
    pub async fn run_until_signal(&self) -> Result<InitReport, RuntimeError> {
        let report = self.initialize().await;
        for (app, err) in &report.failed {
            tracing::warn!(%app, label = err.as_label(), %err, "auto-start failed");
        }
        let signal = power_off_signal().await?;
        tracing::info!(signal, "power-off signal received");
        self.shutdown().await?;
        Ok(report)
    }

    // ---- internals -------------------------------------------------------

    pub(super) fn name(&self, idx: usize) -> &str {
        self.registry.at(idx).name()
    }

    pub(super) async fn status(&self, idx: usize) -> AppStatus {
        self.state.read().await.status(idx)
    }

    pub(super) fn publish(&self, ev: Event) {
        self.bus.publish(ev);
    }

    /// Applies `f` under the write lock, then wakes everything waiting on a status change.
    pub(super) async fn commit<R>(&self, f: impl FnOnce(&mut StateTable) -> R) -> R {
        let out = {
            let mut st = self.state.write().await;
            f(&mut st)
        };
        self.changes.send_modify(|n| *n = n.wrapping_add(1));
        out
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("apps", &self.registry.len())
            .field("subscribers", &self.subs.len())
            .field("home", &self.cfg.home_app())
            .finish_non_exhaustive()
    }
}
