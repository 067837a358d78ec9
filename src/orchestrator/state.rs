//! Mutable per-app state, the foreground slot and the navigation stack.
//!
//! Everything here is plain data guarded by the orchestrator's `RwLock`; no method
//! awaits, so the lock is only ever held for a few instructions.

use std::sync::Arc;

use crate::status::AppStatus;

#[derive(Debug, Clone, Default)]
pub(super) struct Row {
    pub(super) status: AppStatus,
    pub(super) reason: Option<Arc<str>>,
}

#[derive(Debug)]
pub(super) struct StateTable {
    pub(super) rows: Vec<Row>,
    /// Single occupant of the shared display surface.
    pub(super) foreground: Option<usize>,
    /// Suspended foreground apps, most recent last.
    pub(super) nav: Vec<usize>,
    /// Apps in the order they came up; shutdown walks it backwards.
    pub(super) started: Vec<usize>,
}

impl StateTable {
    pub(super) fn new(len: usize) -> Self {
        Self {
            rows: vec![Row::default(); len],
            foreground: None,
            nav: Vec::new(),
            started: Vec::new(),
        }
    }

    pub(super) fn status(&self, idx: usize) -> AppStatus {
        self.rows[idx].status
    }

    pub(super) fn set(&mut self, idx: usize, status: AppStatus) {
        self.rows[idx].status = status;
    }

    pub(super) fn set_reason(&mut self, idx: usize, reason: impl Into<Arc<str>>) {
        self.rows[idx].reason = Some(reason.into());
    }

    /// Marks `idx` as up (RUNNING or pending STARTING).
    pub(super) fn came_up(&mut self, idx: usize, status: AppStatus) {
        self.rows[idx].status = status;
        self.rows[idx].reason = None;
        if !self.started.contains(&idx) {
            self.started.push(idx);
        }
    }

    /// Marks `idx` as STOPPED and forgets it everywhere. Returns true if it held the slot.
    pub(super) fn went_down(&mut self, idx: usize) -> bool {
        self.rows[idx].status = AppStatus::Stopped;
        self.started.retain(|&i| i != idx);
        self.nav.retain(|&i| i != idx);
        self.release(idx)
    }

    /// Clears the slot if `idx` holds it.
    pub(super) fn release(&mut self, idx: usize) -> bool {
        if self.foreground == Some(idx) {
            self.foreground = None;
            true
        } else {
            false
        }
    }

    /// Pushes a suspended app on top of the navigation stack (moving it if present).
    pub(super) fn push_nav(&mut self, idx: usize) {
        self.nav.retain(|&i| i != idx);
        self.nav.push(idx);
    }

    /// Pops the most recent entry that is still SUSPENDED.
    pub(super) fn pop_nav(&mut self) -> Option<usize> {
        while let Some(idx) = self.nav.pop() {
            if self.rows[idx].status == AppStatus::Suspended {
                return Some(idx);
            }
        }
        None
    }

    /// Active apps in shutdown order: the foreground occupant first, then reverse
    /// start order, then anything active that never made it into the start list.
    pub(super) fn shutdown_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = self.foreground.into_iter().collect();
        for &idx in self.started.iter().rev() {
            if !order.contains(&idx) {
                order.push(idx);
            }
        }
        for (idx, row) in self.rows.iter().enumerate() {
            if row.status != AppStatus::Stopped && !order.contains(&idx) {
                order.push(idx);
            }
        }
        order.retain(|&i| self.rows[i].status != AppStatus::Stopped);
        order
    }
}
