//! # Terminate, exit and navigation.
//!
//! ```text
//! terminate(name)                      exit(name)
//!   STOPPED → Ok                         BACKGROUND_CAPABLE app in the slot → suspend, hand back
//!   active dependents → InUse            anything else              → terminate(name)
//!   STOPPING; stop() (best-effort); STOPPED
//!   held the slot → hand back
//!
//! hand back:  previous occupant* → nav.pop() (still SUSPENDED) → home → empty slot
//!             (* only after a failed launch)
//! ```

use std::sync::Arc;

use super::core::Orchestrator;
use crate::error::TerminateError;
use crate::events::{Event, EventKind};
use crate::status::AppStatus;

impl Orchestrator {
    /// Stops `name` and, if it held the foreground, hands control back.
    ///
    /// Terminating a STOPPED app is a no-op. A failing `stop` hook is logged and the
    /// app still ends STOPPED.
    ///
    /// # Errors
    /// - [`TerminateError::Unknown`] for an unregistered name.
    /// - [`TerminateError::InUse`] while a RUNNING, STARTING or SUSPENDED app depends on it.
    pub async fn terminate(&self, name: &str) -> Result<(), TerminateError> {
        let idx = self.registry.require(name)?;
        let _ops = self.ops.lock().await;
        self.terminate_locked(idx, false).await
    }

    /// Like [`terminate`](Self::terminate) but skips the in-use check.
    ///
    /// Dependents are **not** stopped; they keep running on top of a stopped dependency.
    pub async fn force_terminate(&self, name: &str) -> Result<(), TerminateError> {
        let idx = self.registry.require(name)?;
        let _ops = self.ops.lock().await;
        self.terminate_locked(idx, true).await
    }

    /// Leaves `name`: a background-capable app holding the foreground is suspended
    /// (it keeps running, a later launch resumes it); any other app is terminated.
    ///
    /// # Errors
    /// As [`terminate`](Self::terminate), plus [`TerminateError::Suspend`] if the
    /// suspend hook failed (the app then keeps the foreground).
    pub async fn exit(&self, name: &str) -> Result<(), TerminateError> {
        let idx = self.registry.require(name)?;
        let _ops = self.ops.lock().await;
        self.exit_locked(idx).await
    }

    /// Returns to the home app: the navigation stack is dropped (its apps stay
    /// SUSPENDED) and the current occupant exits.
    pub async fn home(&self) -> Result<(), TerminateError> {
        let _ops = self.ops.lock().await;
        let occupant = {
            let mut st = self.state.write().await;
            st.nav.clear();
            st.foreground
        };
        let home = self.home_index();

        match occupant {
            Some(occ) if Some(occ) == home => Ok(()),
            Some(occ) => self.exit_locked(occ).await,
            None => {
                self.hand_back(usize::MAX, None).await;
                Ok(())
            }
        }
    }

    /// Exits the current foreground occupant, if any.
    pub async fn back(&self) -> Result<(), TerminateError> {
        let _ops = self.ops.lock().await;
        let occupant = self.state.read().await.foreground;
        match occupant {
            Some(occ) => self.exit_locked(occ).await,
            None => Ok(()),
        }
    }

    async fn exit_locked(&self, idx: usize) -> Result<(), TerminateError> {
        let desc = self.registry.at(idx);
        let (status, holds_slot) = {
            let st = self.state.read().await;
            (st.status(idx), st.foreground == Some(idx))
        };
        if !(holds_slot && status == AppStatus::Running && desc.is_background_capable()) {
            return self.terminate_locked(idx, false).await;
        }

        let name = desc.name();
        self.publish(Event::new(EventKind::AppSuspending).with_app(name));
        if let Err(source) = Arc::clone(desc.lifecycle()).suspend().await {
            tracing::warn!(app = name, %source, "suspend on exit failed");
            self.publish(
                Event::new(EventKind::AppStopFailed)
                    .with_app(name)
                    .with_reason(source.to_string()),
            );
            return Err(TerminateError::Suspend {
                app: name.to_string(),
                source,
            });
        }
        self.commit(|st| {
            st.set(idx, AppStatus::Suspended);
            st.nav.retain(|&i| i != idx);
            st.release(idx);
        })
        .await;
        self.publish(Event::new(EventKind::AppSuspended).with_app(name));
        self.hand_back(idx, None).await;
        Ok(())
    }

    pub(super) async fn terminate_locked(
        &self,
        idx: usize,
        force: bool,
    ) -> Result<(), TerminateError> {
        let status = self.status(idx).await;
        if status == AppStatus::Stopped {
            return Ok(());
        }

        if !force {
            let st = self.state.read().await;
            let dependents: Vec<String> = self
                .registry
                .dependents(idx)
                .filter(|&d| st.status(d).is_active())
                .map(|d| self.name(d).to_string())
                .collect();
            drop(st);
            if !dependents.is_empty() {
                return Err(TerminateError::InUse {
                    app: self.name(idx).to_string(),
                    dependents,
                });
            }
        }

        if self.stop_app(idx).await {
            self.hand_back(idx, None).await;
        }
        Ok(())
    }

    /// Best-effort stop. Returns true if the app held the foreground slot.
    pub(super) async fn stop_app(&self, idx: usize) -> bool {
        let desc = self.registry.at(idx);
        let name = desc.name();

        self.commit(|st| st.set(idx, AppStatus::Stopping)).await;
        self.publish(Event::new(EventKind::AppStopping).with_app(name));

        let result = Arc::clone(desc.lifecycle()).stop().await;
        let had_slot = self.commit(|st| st.went_down(idx)).await;

        if let Err(err) = result {
            tracing::warn!(app = name, label = err.as_label(), %err, "stop failed; app marked stopped");
            self.publish(
                Event::new(EventKind::AppStopFailed)
                    .with_app(name)
                    .with_reason(err.to_string()),
            );
        }
        tracing::debug!(app = name, "app stopped");
        self.publish(Event::new(EventKind::AppStopped).with_app(name));
        had_slot
    }

    /// Gives the empty foreground slot to the next candidate that comes up.
    ///
    /// `left` is the app that just gave up the slot (never picked again);
    /// `prefer` is tried first.
    pub(super) async fn hand_back(&self, left: usize, prefer: Option<usize>) {
        let mut tried = vec![left];

        loop {
            let candidate = {
                let mut st = self.state.write().await;
                if st.foreground.is_some() {
                    return;
                }
                prefer
                    .filter(|p| !tried.contains(p))
                    .or_else(|| std::iter::from_fn(|| st.pop_nav()).find(|c| !tried.contains(c)))
                    .or_else(|| self.home_index().filter(|h| !tried.contains(h)))
            };

            let Some(next) = candidate else {
                self.publish_cleared(left);
                return;
            };
            tried.push(next);

            if self.registry.at(next).is_service() {
                // A service home (a launcher drawing the root screen) just takes over the display.
                self.publish_cleared(left);
                return;
            }
            match self.launch_locked(next).await {
                Ok(()) => return,
                Err(err) => {
                    tracing::warn!(
                        app = self.name(next),
                        label = err.as_label(),
                        %err,
                        "foreground hand-back failed"
                    );
                }
            }
        }
    }

    fn publish_cleared(&self, left: usize) {
        let ev = Event::new(EventKind::ForegroundChanged);
        self.publish(match self.registry.iter().nth(left) {
            Some(desc) => ev.with_peer(desc.name()),
            None => ev,
        });
    }

    fn home_index(&self) -> Option<usize> {
        self.cfg
            .home_app()
            .and_then(|h| self.registry.index_of(h))
    }
}
