//! # Static application descriptors.
//!
//! An [`AppDescriptor`] is declared once at boot, registered into the
//! [`Registry`](crate::Registry) and never mutated afterwards.
//!
//! ## Example
//! ```rust
//! use rtam::{AppDescriptor, AppFlags, AppInfo, Hooks};
//!
//! let pwm = AppDescriptor::builder("pwm")
//!     .flags(AppFlags::BACKGROUND_CAPABLE)
//!     .requires(["gui", "launcher"])
//!     .conflicts_with(["serial_debug"])
//!     .info(AppInfo::new("PWM").with_icon("app/pwm/icon.png"))
//!     .lifecycle(Hooks::new().arc())
//!     .build();
//!
//! assert_eq!(pwm.name(), "pwm");
//! assert!(pwm.is_foreground());
//! assert_eq!(pwm.label(), "PWM");
//! ```

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;

use super::lifecycle::{LifecycleRef, NoHooks};

bitflags! {
    /// Capability flags of an application.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AppFlags: u8 {
        /// Started by [`Orchestrator::initialize`](crate::Orchestrator::initialize).
        const AUTO_START = 1 << 0;
        /// No visible surface; never occupies the foreground slot, hidden from the launcher.
        const SERVICE = 1 << 1;
        /// Suspended (not stopped) when another app takes the foreground.
        const BACKGROUND_CAPABLE = 1 << 2;
    }
}

/// Launcher metadata. Opaque to the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppInfo {
    /// Display label.
    pub label: Option<Cow<'static, str>>,
    /// Icon reference (path or resource id).
    pub icon: Option<Cow<'static, str>>,
}

impl AppInfo {
    /// Creates metadata with a label.
    pub fn new(label: impl Into<Cow<'static, str>>) -> Self {
        Self {
            label: Some(label.into()),
            icon: None,
        }
    }

    /// Attaches an icon reference.
    pub fn with_icon(mut self, icon: impl Into<Cow<'static, str>>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

/// Static declaration of one application.
#[derive(Clone)]
pub struct AppDescriptor {
    name: Cow<'static, str>,
    flags: AppFlags,
    lifecycle: LifecycleRef,
    dependencies: Vec<Cow<'static, str>>,
    conflicts: Vec<Cow<'static, str>>,
    info: AppInfo,
}

impl AppDescriptor {
    /// Creates a descriptor with explicit parameters.
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        flags: AppFlags,
        lifecycle: LifecycleRef,
    ) -> Self {
        Self {
            name: name.into(),
            flags,
            lifecycle,
            dependencies: Vec::new(),
            conflicts: Vec::new(),
            info: AppInfo::default(),
        }
    }

    /// Creates a builder for constructing a descriptor with a fluent API.
    pub fn builder(name: impl Into<Cow<'static, str>>) -> AppDescriptorBuilder {
        AppDescriptorBuilder::new(name)
    }

    /// Unique name (lookup key).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Capability flags.
    pub fn flags(&self) -> AppFlags {
        self.flags
    }

    /// Lifecycle hooks.
    pub fn lifecycle(&self) -> &LifecycleRef {
        &self.lifecycle
    }

    /// Names that must be RUNNING before this app starts, in declaration order.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().map(|d| d.as_ref())
    }

    /// Names that must not be active at the same time as this app.
    pub fn conflicts(&self) -> impl Iterator<Item = &str> {
        self.conflicts.iter().map(|c| c.as_ref())
    }

    /// Launcher metadata.
    pub fn info(&self) -> &AppInfo {
        &self.info
    }

    /// Display label, falling back to the name.
    pub fn label(&self) -> &str {
        self.info.label.as_deref().unwrap_or(&self.name)
    }

    /// True for [`AppFlags::SERVICE`] apps.
    pub fn is_service(&self) -> bool {
        self.flags.contains(AppFlags::SERVICE)
    }

    /// True for apps that occupy the foreground slot when RUNNING.
    pub fn is_foreground(&self) -> bool {
        !self.is_service()
    }

    /// True for [`AppFlags::AUTO_START`] apps.
    pub fn is_auto_start(&self) -> bool {
        self.flags.contains(AppFlags::AUTO_START)
    }

    /// True for [`AppFlags::BACKGROUND_CAPABLE`] apps.
    pub fn is_background_capable(&self) -> bool {
        self.flags.contains(AppFlags::BACKGROUND_CAPABLE)
    }

    /// True if this descriptor lists `name` as a dependency.
    pub fn depends_on(&self, name: &str) -> bool {
        self.dependencies.iter().any(|d| d == name)
    }

    /// True if this descriptor lists `name` as a conflict.
    pub fn lists_conflict(&self, name: &str) -> bool {
        self.conflicts.iter().any(|c| c == name)
    }
}

impl fmt::Debug for AppDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppDescriptor")
            .field("name", &self.name)
            .field("flags", &self.flags)
            .field("dependencies", &self.dependencies)
            .field("conflicts", &self.conflicts)
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// Builder for [`AppDescriptor`].
#[derive(Clone)]
pub struct AppDescriptorBuilder {
    inner: AppDescriptor,
}

impl AppDescriptorBuilder {
    /// Creates a new builder with the given app name, no flags and no hooks.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            inner: AppDescriptor::new(name, AppFlags::empty(), Arc::new(NoHooks)),
        }
    }

    pub fn flags(mut self, flags: AppFlags) -> Self {
        self.inner.flags = flags;
        self
    }

    pub fn lifecycle(mut self, lifecycle: LifecycleRef) -> Self {
        self.inner.lifecycle = lifecycle;
        self
    }

    /// Appends dependencies (order is preserved).
    pub fn requires<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Cow<'static, str>>,
    {
        self.inner.dependencies.extend(names.into_iter().map(Into::into));
        self
    }

    /// Appends conflicts.
    pub fn conflicts_with<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Cow<'static, str>>,
    {
        self.inner.conflicts.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn info(mut self, info: AppInfo) -> Self {
        self.inner.info = info;
        self
    }

    pub fn build(self) -> AppDescriptor {
        self.inner
    }
}
