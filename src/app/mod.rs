//! # Application abstractions and descriptors.
//!
//! This module provides the application-side types:
//! - [`Lifecycle`] - trait with optional async `start`/`stop`/`suspend`/`resume`
//! - [`Hooks`] - closure-backed lifecycle (a struct of optional function values)
//! - [`LifecycleRef`] - shared reference to a lifecycle (`Arc<dyn Lifecycle>`)
//! - [`AppDescriptor`] - static declaration bundling name, flags, lifecycle, dependencies, conflicts
//! - [`AppFlags`], [`AppInfo`] - capability bits and launcher metadata

mod descriptor;
mod hooks;
mod lifecycle;

pub use descriptor::{AppDescriptor, AppDescriptorBuilder, AppFlags, AppInfo};
pub use hooks::Hooks;
pub use lifecycle::{Lifecycle, LifecycleRef, Started};
