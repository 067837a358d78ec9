//! # Deferred call queue.
//!
//! A cooperative queue of delayed callbacks ("run later", "debounce") drained by a
//! fixed pool of worker tasks. Any component may post into it; it does not depend on
//! the orchestrator, but it can be registered as a service app since
//! [`DeferredQueue`] implements [`Lifecycle`](crate::Lifecycle).
//!
//! ## Architecture
//! ```text
//! post(cb, payload, delay, opts) ──► coalesce by key ──► capacity check
//!                                                            │
//!                                        BTreeMap<(due, seq), Entry>  (global)
//!                                                            │ notify
//!                                ┌───────────────────────────┼───────────────┐
//!                                ▼                           ▼               ▼
//!                            worker 0                    worker 1   ...  worker N-1
//!                 sleep_until(next due) / notified / cancelled
//!                 pop due entries (due order, ties by post order) → run cb(payload)
//! ```
//!
//! ## Rules
//! - `post` never blocks and never runs the callback on the caller's context.
//! - Coalescing state is global: keys coalesce across every worker.
//! - A call is either fired once or cancelled; a fired call can no longer be cancelled.
//! - A panicking callback is reported (`DeferredPanicked`) and the worker keeps going.

mod call;
mod queue;
mod worker;

pub use call::{CancelPolicy, DeferredHandle, PostOptions};
pub use queue::DeferredQueue;
