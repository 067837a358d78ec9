//! # Example: device_boot
//!
//! Boots a small device profile, prints the process table, then waits for Ctrl-C
//! and shuts everything down in reverse start order.
//!
//! Shows how to:
//! - Declare services and foreground apps with [`AppDescriptor::builder`].
//! - Register the deferred queue itself as the `cpost` service.
//! - Report a pending start with [`Orchestrator::mark_running`].
//! - Route events to `tracing` through [`LogWriter`].
//!
//! ## Flow
//! ```text
//! Orchestrator::run_until_signal()
//!     ├─► initialize(): cpost, storage, wifi (pending), gui, launcher
//!     │      └─ wifi worker ──(800ms)──► mark_running("wifi")
//!     ├─► wait for SIGINT / SIGTERM / Ctrl-C
//!     └─► shutdown(): launcher, gui, wifi, storage, cpost
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example device_boot
//! ```

use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use rtam::{
    AppDescriptor, AppError, AppFlags, AppInfo, Bus, Config, DeferredQueue, Hooks, LogWriter,
    Orchestrator, Registry, Started, Subscribe,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let cfg = Config::default();
    let bus = Bus::new(cfg.bus_capacity_clamped());
    let cpost = DeferredQueue::with_bus(cfg.deferred, bus.clone());
    let handle: Arc<OnceLock<Weak<Orchestrator>>> = Arc::new(OnceLock::new());

    let boot = AppFlags::AUTO_START | AppFlags::SERVICE;
    let wifi_hooks = {
        let handle = handle.clone();
        Hooks::new().on_start(move || {
            let handle = handle.clone();
            async move {
                // radio calibration runs on its own task and reports back
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(800)).await;
                    if let Some(rtam) = handle.get().and_then(Weak::upgrade) {
                        let _ = rtam.mark_running("wifi_service").await;
                    }
                });
                Ok::<_, AppError>(Started::Pending)
            }
        })
    };

    let registry = Registry::from_descriptors([
        AppDescriptor::builder("cpost")
            .flags(boot)
            .lifecycle(Arc::new(cpost.clone()))
            .build(),
        AppDescriptor::builder("storage").flags(boot).build(),
        AppDescriptor::builder("wifi_service")
            .flags(boot)
            .requires(["storage"])
            .lifecycle(wifi_hooks.arc())
            .build(),
        AppDescriptor::builder("gui")
            .flags(boot)
            .requires(["storage"])
            .build(),
        AppDescriptor::builder("launcher")
            .flags(AppFlags::AUTO_START)
            .requires(["gui"])
            .info(AppInfo::new("Home"))
            .build(),
        AppDescriptor::builder("pwm")
            .requires(["gui", "launcher"])
            .conflicts_with(["serial_debug"])
            .info(AppInfo::new("PWM").with_icon("app/pwm/icon.png"))
            .build(),
        AppDescriptor::builder("serial_debug")
            .requires(["gui"])
            .info(AppInfo::new("Serial"))
            .build(),
    ])?;

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let rtam = Orchestrator::builder(registry)
        .with_config(cfg)
        .with_bus(bus)
        .with_subscribers(subs)
        .build();
    let _ = handle.set(Arc::downgrade(&rtam));

    let printer = {
        let rtam = rtam.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            println!("{}", rtam.ps().await);
            println!("press Ctrl-C to power off");
        })
    };

    let report = rtam.run_until_signal().await?;
    printer.abort();
    println!("booted {:?}, failed {}", report.started, report.failed.len());
    Ok(())
}
