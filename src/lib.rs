//! # rtam
//!
//! **rtam** is a runtime application manager for small devices that share one
//! display between many "applications".
//!
//! It registers statically declared apps (background services and foreground
//! apps), resolves their dependency and conflict graph, and drives each app
//! through a lifecycle state machine on demand, with exactly one foreground app
//! at a time. A deferred call queue provides debounced, cancellable "run later"
//! work for any component.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   ┌───────────────┐  ┌───────────────┐  ┌───────────────┐
//!   │ AppDescriptor │  │ AppDescriptor │  │ AppDescriptor │   name, flags, requires,
//!   │   "storage"   │  │     "gui"     │  │     "pwm"     │   conflicts, Lifecycle
//!   └───────┬───────┘  └───────┬───────┘  └───────┬───────┘
//!           └──────────────────┼──────────────────┘
//!                              ▼
//!                   Registry (declaration order, start_order DFS)
//!                              │ Arc<Registry>
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Orchestrator                                                   │
//! │  - ops lock (serializes launch / terminate / exit / initialize) │
//! │  - state table (status per app, foreground slot, nav stack)     │
//! │  - Bus (broadcast events)                                       │
//! │  - SubscriberSet (fans out to user subscribers)                 │
//! └──────┬─────────────────────┬────────────────────────────┬───────┘
//!        │ start/stop/          │ Publishes events:          │
//!        │ suspend/resume       │ - AppStarting / AppRunning │
//!        ▼ (no state lock held) │ - AppSuspended / Stopped   │
//!   Lifecycle hooks             │ - ForegroundChanged        │
//!                               ▼                            │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Bus (broadcast channel)                     │◄── DeferredQueue
//! └───────────────────────────────┬─────────────────────────────────┘    (Deferred* events)
//!                                 ▼
//!                     subscriber_listener ──► SubscriberSet
//!                                        ┌─────────┼─────────┐
//!                                        ▼         ▼         ▼
//!                                    LogWriter  worker2  workerN
//! ```
//!
//! ### Lifecycle
//! ```text
//! launch("pwm")
//!   ├─► RUNNING already?             ─► Ok (no hook runs)
//!   ├─► start_order: [gui, launcher, pwm]   (cycle ─► Err(Cycle))
//!   ├─► conflict active?              ─► Err(Conflict), nothing started
//!   ├─► bring up each dependency not RUNNING (failure ─► Err(Dependency))
//!   ├─► preempt foreground occupant: suspend (BACKGROUND_CAPABLE) or stop,
//!   │   unless something still depends on it
//!   ├─► STARTING ─► start() / resume()  (failure ─► STOPPED, Err(Start))
//!   └─► RUNNING, foreground = pwm, previous occupant pushed on the nav stack
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                          |
//! |-------------------|---------------------------------------------------------------|---------------------------------------------|
//! | **Apps**          | Declare apps and their lifecycle hooks.                       | [`AppDescriptor`], [`Lifecycle`], [`Hooks`] |
//! | **Registry**      | Static app table, dependency resolution.                      | [`Registry`]                                |
//! | **Orchestration** | Launch, terminate, exit, navigation, boot, shutdown.          | [`Orchestrator`]                            |
//! | **Status**        | Per-app status and `ps`-style listing.                        | [`AppStatus`], [`ProcessTable`]             |
//! | **Deferred calls**| Delayed, coalesced, cancellable callbacks.                    | [`DeferredQueue`], [`PostOptions`]          |
//! | **Subscriber API**| Hook into lifecycle events (logging, monitors).               | [`Subscribe`]                               |
//! | **Errors**        | Typed errors for every operation.                             | [`LaunchError`], [`TerminateError`], ...    |
//! | **Configuration** | Centralize runtime settings.                                  | [`Config`], [`DeferredConfig`]              |
//!
//! ## Optional features
//! - `logging` (default): exports the built-in [`LogWriter`] subscriber.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use rtam::{AppDescriptor, AppFlags, AppStatus, Config, Hooks, Orchestrator, Registry};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Registry::from_descriptors([
//!         AppDescriptor::builder("storage")
//!             .flags(AppFlags::AUTO_START | AppFlags::SERVICE)
//!             .build(),
//!         AppDescriptor::builder("gui")
//!             .flags(AppFlags::AUTO_START | AppFlags::SERVICE)
//!             .requires(["storage"])
//!             .build(),
//!         AppDescriptor::builder("pwm")
//!             .requires(["gui"])
//!             .conflicts_with(["serial_debug"])
//!             .lifecycle(Hooks::new().arc())
//!             .build(),
//!         AppDescriptor::builder("serial_debug").requires(["gui"]).build(),
//!     ])?;
//!
//!     let rtam = Orchestrator::builder(registry)
//!         .with_config(Config { home: None, ..Config::default() })
//!         .build();
//!
//!     rtam.initialize().await;
//!     rtam.launch("pwm").await?;
//!     assert!(rtam.launch("serial_debug").await.is_err());
//!     assert_eq!(rtam.get_status("pwm").await?, AppStatus::Running);
//!     println!("{}", rtam.ps().await);
//!
//!     rtam.shutdown().await?;
//!     Ok(())
//! }
//! ```
mod app;
mod config;
mod deferred;
mod error;
mod events;
mod orchestrator;
mod registry;
mod status;
mod subscribers;

// ---- Public re-exports ----

pub use app::{
    AppDescriptor, AppDescriptorBuilder, AppFlags, AppInfo, Hooks, Lifecycle, LifecycleRef,
    Started,
};
pub use config::{Config, DeferredConfig};
pub use deferred::{CancelPolicy, DeferredHandle, DeferredQueue, PostOptions};
pub use error::{
    AppError, LaunchError, PostError, RegistryError, RuntimeError, TerminateError,
    UnknownApplication,
};
pub use events::{Bus, Event, EventKind};
pub use orchestrator::{InitReport, Orchestrator, OrchestratorBuilder};
pub use registry::Registry;
pub use status::{AppStatus, ProcessRow, ProcessTable};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
