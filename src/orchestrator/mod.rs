//! # Lifecycle orchestrator.
//!
//! [`Orchestrator`] owns the state of every registered app and the single
//! foreground slot, and exposes the lifecycle operations:
//!
//! | Operation | Effect |
//! |---|---|
//! | [`initialize`](Orchestrator::initialize) | start every auto-start app, dependencies first |
//! | [`launch`](Orchestrator::launch) | bring one app to RUNNING, take the foreground if it has a surface |
//! | [`terminate`](Orchestrator::terminate) / [`force_terminate`](Orchestrator::force_terminate) | stop one app |
//! | [`exit`](Orchestrator::exit) | send a background-capable app to the background, else terminate |
//! | [`home`](Orchestrator::home) / [`back`](Orchestrator::back) | navigation |
//! | [`get_status`](Orchestrator::get_status) / [`ps`](Orchestrator::ps) / [`list_applications`](Orchestrator::list_applications) | introspection |
//! | [`mark_running`](Orchestrator::mark_running) / [`mark_failed`](Orchestrator::mark_failed) | completion of a pending start |
//! | [`shutdown`](Orchestrator::shutdown) / [`run_until_signal`](Orchestrator::run_until_signal) | orderly stop |
//!
//! Lifecycle operations are serialized; hooks run with no orchestrator lock held
//! except the operation lock, so a hook may query status but must not launch or
//! terminate on the same orchestrator. A hook that never returns wedges lifecycle
//! operations (status queries keep working); there is no per-hook timeout.

mod builder;
mod core;
mod launch;
mod shutdown;
mod state;
mod terminate;

pub use builder::OrchestratorBuilder;
pub use self::core::{InitReport, Orchestrator};
