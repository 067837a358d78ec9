//! # Launch path.
//!
//! ```text
//! launch(name)
//!   ├─ RUNNING / pending STARTING ─────────────────────────────► Ok (no-op)
//!   ├─ registry.start_order(name)      cycle / unknown dep ────► Err, nothing ran
//!   ├─ active conflict? ───────────────────────────────────────► Err(Conflict), nothing ran
//!   ├─ for dep in order[..-1]:
//!   │     RUNNING → skip · pending → wait ≤ dependency_wait · else bring_up(dep)
//!   │     failure ─► DependencyUnmet, target stays STOPPED ───► Err(Dependency)
//!   └─ bring_up(name)
//!        1. active conflict? (a dependency's own) ─────────────► Err(Conflict)
//!        2. foreground app and slot taken by another:
//!             occupant needed by the launch or an active app → keeps RUNNING, loses the slot
//!             BACKGROUND_CAPABLE occupant → suspend, else stop
//!             failure (occupant keeps the slot) ─────────────► Err(Preemption)
//!        3. STARTING; start() (resume() if SUSPENDED)
//!             failure → STOPPED, slot vacated ───────────────► Err(Start)
//!        4. RUNNING (or pending STARTING), take slot, push suspended occupant on nav
//! ```
//! A failed launch that vacated the slot hands the foreground back (previous
//! occupant, then navigation stack, then home) so the slot is never left empty
//! when something can fill it.

use std::sync::Arc;

use tokio::time::{Instant, timeout_at};

use super::core::Orchestrator;
use crate::app::Started;
use crate::error::{AppError, LaunchError};
use crate::events::{Event, EventKind};
use crate::status::AppStatus;

/// What preemption did to the previous foreground occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Preempted {
    Suspended,
    Stopped,
    /// Still needed as a dependency; keeps RUNNING without the slot.
    Kept,
}

impl Orchestrator {
    /// Brings `name` to RUNNING and, for a foreground app, makes it the foreground occupant.
    ///
    /// Idempotent: launching a RUNNING app (or one whose pending start has not reported
    /// in yet) succeeds without calling any hook. Dependencies brought up by a launch
    /// that then fails stay up.
    ///
    /// # Errors
    /// See [`LaunchError`]; every variant leaves at most one foreground occupant.
    pub async fn launch(&self, name: &str) -> Result<(), LaunchError> {
        let idx = self.registry.require(name).inspect_err(|e| {
            self.publish(
                Event::new(EventKind::LaunchRejected)
                    .with_app(name)
                    .with_reason(e.to_string()),
            );
        })?;
        let _ops = self.ops.lock().await;
        self.launch_and_recover(idx).await
    }

    /// `launch_locked` plus foreground hand-back when a failure vacated the slot.
    pub(super) async fn launch_and_recover(&self, idx: usize) -> Result<(), LaunchError> {
        let previous = self.state.read().await.foreground;
        let result = self.launch_locked(idx).await;

        if result.is_err() {
            let vacated = self.state.read().await.foreground.is_none();
            if let (true, Some(prev)) = (vacated, previous) {
                self.hand_back(idx, Some(prev)).await;
            }
        }
        result
    }

    /// Launch with the ops lock already held.
    pub(super) async fn launch_locked(&self, idx: usize) -> Result<(), LaunchError> {
        if matches!(
            self.status(idx).await,
            AppStatus::Running | AppStatus::Starting
        ) {
            return Ok(());
        }

        let order = self.registry.start_order(idx).inspect_err(|err| {
            self.reject(idx, err);
        });
        let order = match order {
            Ok(order) => order,
            Err(err) => {
                if let LaunchError::Cycle { members } = &err {
                    self.record_cycle(idx, members).await;
                }
                return Err(err);
            }
        };

        if let Some(other) = self.active_conflict(idx).await {
            return Err(self.refuse_conflict(idx, other));
        }

        for &dep in &order[..order.len().saturating_sub(1)] {
            if let Err(err) = self.ensure_running(idx, dep).await {
                let dep_name = self.name(dep);
                tracing::warn!(
                    app = self.name(idx),
                    dependency = dep_name,
                    label = err.as_label(),
                    "dependency unmet"
                );
                self.commit(|st| st.set_reason(idx, format!("dependency unmet: {dep_name}")))
                    .await;
                self.publish(
                    Event::new(EventKind::DependencyUnmet)
                        .with_app(self.name(idx))
                        .with_peer(dep_name)
                        .with_reason(err.to_string()),
                );
                return Err(err);
            }
        }

        self.bring_up(idx).await
    }

    /// Makes sure dependency `dep` of `app` is RUNNING; errors come back wrapped for `app`.
    async fn ensure_running(&self, app: usize, dep: usize) -> Result<(), LaunchError> {
        let status = self.status(dep).await;
        if status == AppStatus::Running {
            return Ok(());
        }
        if status != AppStatus::Starting {
            self.bring_up(dep).await.map_err(|source| LaunchError::Dependency {
                app: self.name(app).to_string(),
                dependency: self.name(dep).to_string(),
                source: Box::new(source),
            })?;
        }
        self.wait_running(app, dep).await
    }

    /// Waits up to `dependency_wait` for a pending `dep` to report in.
    async fn wait_running(&self, app: usize, dep: usize) -> Result<(), LaunchError> {
        let waited = self.cfg.dependency_wait;
        let deadline = Instant::now() + waited;
        let mut changes = self.changes.subscribe();

        loop {
            let (status, reason) = {
                let st = self.state.read().await;
                (st.status(dep), st.rows[dep].reason.clone())
            };
            match status {
                AppStatus::Running => return Ok(()),
                AppStatus::Starting => {}
                _ => {
                    let reason = reason.as_deref().unwrap_or("start failed").to_string();
                    return Err(LaunchError::Dependency {
                        app: self.name(app).to_string(),
                        dependency: self.name(dep).to_string(),
                        source: Box::new(LaunchError::Start {
                            app: self.name(dep).to_string(),
                            source: AppError::fail(reason),
                        }),
                    });
                }
            }
            if timeout_at(deadline, changes.changed()).await.is_err() {
                return Err(LaunchError::DependencyTimeout {
                    app: self.name(app).to_string(),
                    dependency: self.name(dep).to_string(),
                    waited,
                });
            }
        }
    }

    /// Conflict check, preemption and start of one app whose dependencies are up.
    async fn bring_up(&self, idx: usize) -> Result<(), LaunchError> {
        let desc = self.registry.at(idx);
        let name = desc.name();

        let (status, occupant) = {
            let st = self.state.read().await;
            (st.status(idx), st.foreground)
        };
        if matches!(status, AppStatus::Running | AppStatus::Starting) {
            return Ok(());
        }
        if let Some(other) = self.active_conflict(idx).await {
            return Err(self.refuse_conflict(idx, other));
        }

        // Preemption.
        let mut preempted = None;
        if desc.is_foreground() {
            if let Some(occ) = occupant.filter(|&o| o != idx) {
                let outcome =
                    self.preempt(occ, idx)
                        .await
                        .map_err(|source| LaunchError::Preemption {
                            app: name.to_string(),
                            occupant: self.name(occ).to_string(),
                            source,
                        })?;
                preempted = Some((occ, outcome));
            }
        }

        // Start or resume.
        let resuming = status == AppStatus::Suspended;
        self.commit(|st| st.set(idx, AppStatus::Starting)).await;
        let kind = if resuming {
            EventKind::AppResuming
        } else {
            EventKind::AppStarting
        };
        self.publish(Event::new(kind).with_app(name));

        let lifecycle = Arc::clone(desc.lifecycle());
        let result = if resuming {
            lifecycle.resume().await.map(|()| Started::Running)
        } else {
            lifecycle.start().await
        };

        match result {
            Ok(started) => {
                let status = match started {
                    Started::Running => AppStatus::Running,
                    Started::Pending => AppStatus::Starting,
                };
                let foreground = desc.is_foreground();
                let previous = self
                    .commit(|st| {
                        st.came_up(idx, status);
                        if !foreground {
                            return None;
                        }
                        st.nav.retain(|&i| i != idx);
                        if let Some((occ, Preempted::Suspended)) = preempted {
                            st.push_nav(occ);
                        }
                        st.foreground.replace(idx)
                    })
                    .await;

                if status == AppStatus::Running {
                    tracing::debug!(app = name, resumed = resuming, "app running");
                    self.publish(Event::new(EventKind::AppRunning).with_app(name));
                } else {
                    tracing::debug!(app = name, "app start pending");
                    self.publish(Event::new(EventKind::AppStartPending).with_app(name));
                }
                if foreground {
                    let ev = Event::new(EventKind::ForegroundChanged).with_app(name);
                    self.publish(match previous {
                        Some(prev) => ev.with_peer(self.name(prev)),
                        None => ev,
                    });
                }
                Ok(())
            }
            Err(source) => {
                tracing::warn!(app = name, label = source.as_label(), %source, "start failed");
                if resuming {
                    // Resume failed: release whatever the suspended app still holds.
                    if let Err(err) = lifecycle.stop().await {
                        tracing::warn!(app = name, %err, "stop after failed resume failed");
                    }
                }
                let reason = format!("start failed: {source}");
                self.commit(|st| {
                    st.went_down(idx);
                    st.set_reason(idx, reason);
                    if preempted.is_some_and(|(_, p)| p != Preempted::Kept) {
                        st.foreground = None;
                    }
                })
                .await;
                self.publish(
                    Event::new(EventKind::AppStartFailed)
                        .with_app(name)
                        .with_reason(source.to_string()),
                );
                Err(LaunchError::Start {
                    app: name.to_string(),
                    source,
                })
            }
        }
    }

    /// Frees the slot held by `occ` for `by`.
    ///
    /// An occupant that `by` or another active app depends on keeps RUNNING and only
    /// loses the slot. Otherwise it is suspended if background-capable, else stopped.
    /// On failure the occupant keeps RUNNING and the slot.
    async fn preempt(&self, occ: usize, by: usize) -> Result<Preempted, AppError> {
        let desc = self.registry.at(occ);
        let lifecycle = Arc::clone(desc.lifecycle());
        let (name, by_name) = (desc.name(), self.name(by));

        if self.still_needed(occ, by).await {
            tracing::debug!(app = name, preemptor = by_name, "occupant kept as a dependency");
            return Ok(Preempted::Kept);
        }

        if desc.is_background_capable() {
            self.publish(
                Event::new(EventKind::AppSuspending)
                    .with_app(name)
                    .with_peer(by_name),
            );
            match lifecycle.suspend().await {
                Ok(()) => {
                    self.commit(|st| st.set(occ, AppStatus::Suspended)).await;
                    self.publish(Event::new(EventKind::AppSuspended).with_app(name));
                    Ok(Preempted::Suspended)
                }
                Err(err) => {
                    self.preempt_failed(name, by_name, &err);
                    Err(err)
                }
            }
        } else {
            self.commit(|st| st.set(occ, AppStatus::Stopping)).await;
            self.publish(
                Event::new(EventKind::AppStopping)
                    .with_app(name)
                    .with_peer(by_name),
            );
            match lifecycle.stop().await {
                Ok(()) => {
                    self.commit(|st| {
                        st.set(occ, AppStatus::Stopped);
                        st.started.retain(|&i| i != occ);
                        st.nav.retain(|&i| i != occ);
                    })
                    .await;
                    self.publish(Event::new(EventKind::AppStopped).with_app(name));
                    Ok(Preempted::Stopped)
                }
                Err(err) => {
                    self.commit(|st| st.set(occ, AppStatus::Running)).await;
                    self.preempt_failed(name, by_name, &err);
                    Err(err)
                }
            }
        }
    }

    /// True if `by` needs `occ` (directly or through other dependencies), or an
    /// active app requires it directly.
    async fn still_needed(&self, occ: usize, by: usize) -> bool {
        if self
            .registry
            .start_order(by)
            .is_ok_and(|order| order.contains(&occ))
        {
            return true;
        }
        let st = self.state.read().await;
        self.registry
            .dependents(occ)
            .any(|d| d != by && st.status(d).is_active())
    }

    /// First active app that conflicts with `idx`.
    async fn active_conflict(&self, idx: usize) -> Option<usize> {
        let st = self.state.read().await;
        (0..self.registry.len()).find(|&other| {
            other != idx
                && st.status(other).is_active()
                && self.registry.conflicts_between(idx, other)
        })
    }

    fn refuse_conflict(&self, idx: usize, other: usize) -> LaunchError {
        let err = LaunchError::Conflict {
            app: self.name(idx).to_string(),
            running: self.name(other).to_string(),
        };
        self.reject(idx, &err);
        err
    }

    fn preempt_failed(&self, name: &str, by: &str, err: &AppError) {
        tracing::warn!(app = name, preemptor = by, %err, "could not free the foreground");
        self.publish(
            Event::new(EventKind::AppStopFailed)
                .with_app(name)
                .with_peer(by)
                .with_reason(err.to_string()),
        );
    }

    /// Publishes `LaunchRejected` for a launch that failed before any hook ran.
    fn reject(&self, idx: usize, err: &LaunchError) {
        tracing::info!(app = self.name(idx), label = err.as_label(), %err, "launch rejected");
        self.publish(
            Event::new(EventKind::LaunchRejected)
                .with_app(self.name(idx))
                .with_reason(err.to_string()),
        );
    }

    async fn record_cycle(&self, idx: usize, members: &[String]) {
        let member_idx: Vec<usize> = members
            .iter()
            .filter_map(|m| self.registry.index_of(m))
            .chain(std::iter::once(idx))
            .collect();
        self.commit(|st| {
            for &i in &member_idx {
                st.set_reason(i, "dependency cycle");
            }
        })
        .await;
        tracing::error!(app = self.name(idx), ?members, "dependency cycle");
        let ev = Event::new(EventKind::DependencyCycle).with_reason(members.join(" -> "));
        self.publish(match members.first() {
            Some(first) => ev.with_app(first.as_str()),
            None => ev,
        });
    }
}
