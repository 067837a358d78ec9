use std::sync::Arc;

use super::core::Orchestrator;
use crate::{
    config::Config,
    events::Bus,
    registry::Registry,
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing an [`Orchestrator`].
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use rtam::{AppDescriptor, AppFlags, Config, Orchestrator, Registry};
///
/// # async fn boot() -> Result<(), Box<dyn std::error::Error>> {
/// let registry = Registry::from_descriptors([
///     AppDescriptor::builder("storage")
///         .flags(AppFlags::AUTO_START | AppFlags::SERVICE)
///         .build(),
/// ])?;
///
/// let rtam = Orchestrator::builder(registry)
///     .with_config(Config { home: None, ..Config::default() })
///     .build();
/// let report = rtam.initialize().await;
/// assert!(report.is_clean());
/// # Ok(()) }
/// ```
pub struct OrchestratorBuilder {
    registry: Arc<Registry>,
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    bus: Option<Bus>,
}

impl OrchestratorBuilder {
    /// Creates a builder with the default configuration and no subscribers.
    pub fn new(registry: impl Into<Arc<Registry>>) -> Self {
        Self {
            registry: registry.into(),
            cfg: Config::default(),
            subscribers: Vec::new(),
            bus: None,
        }
    }

    pub fn with_config(mut self, cfg: Config) -> Self {
        self.cfg = cfg;
        self
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive every lifecycle, foreground and deferred-queue event
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Uses an existing bus instead of creating one.
    ///
    /// Create the bus first when a [`DeferredQueue`](crate::DeferredQueue) registered as
    /// an app should publish on the same bus as the orchestrator.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Builds the orchestrator and starts forwarding bus events to the subscribers.
    ///
    /// Must be called from within a tokio runtime. Dependencies that name no
    /// registered app are logged here and fail at launch time.
    pub fn build(self) -> Arc<Orchestrator> {
        let bus = self
            .bus
            .unwrap_or_else(|| Bus::new(self.cfg.bus_capacity_clamped()));
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));

        for (app, missing) in self.registry.unresolved() {
            tracing::warn!(%app, dependency = %missing, "dependency names no registered app");
        }
        if let Some(home) = self.cfg.home_app() {
            if self.registry.get(home).is_none() {
                tracing::warn!(%home, "home app is not registered");
            }
        }

        let orch = Arc::new(Orchestrator::new_internal(
            self.cfg,
            self.registry,
            bus,
            subs,
        ));
        orch.subscriber_listener();
        orch
    }
}

impl Orchestrator {
    /// Starts building an orchestrator over `registry`.
    pub fn builder(registry: impl Into<Arc<Registry>>) -> OrchestratorBuilder {
        OrchestratorBuilder::new(registry)
    }
}
