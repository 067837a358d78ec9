//! # Example: custom_subscriber
//!
//! Demonstrates how to build and attach a custom event subscriber.
//!
//! Shows how to:
//! - Implement the [`Subscribe`] trait.
//! - Inspect [`Event`] / [`EventKind`] to keep crash notes about failed starts.
//! - Wire the subscriber into [`Orchestrator::builder`].
//!
//! ## Flow
//! ```text
//! launch("weather")
//!     ├─► wifi_service start() fails ─► AppStartFailed
//!     ├─► weather skipped          ─► DependencyUnmet
//!     └─► subscriber_listener ─► SubscriberSet.emit() ─► CrashNotes.on_event()
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example custom_subscriber
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rtam::{
    AppDescriptor, AppError, AppFlags, Config, Event, EventKind, Hooks, Orchestrator, Registry,
    Started, Subscribe,
};

/// Keeps the last few failures, the way a device would append them to a flash ring.
#[derive(Default)]
struct CrashNotes {
    notes: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl Subscribe for CrashNotes {
    async fn on_event(&self, ev: &Event) {
        let app = ev.app.as_deref().unwrap_or("<unknown>");
        let note = match ev.kind {
            EventKind::AppStartFailed => format!(
                "{app} failed to start: {}",
                ev.reason.as_deref().unwrap_or("<none>")
            ),
            EventKind::DependencyUnmet => format!(
                "{app} skipped, dependency {} is down",
                ev.peer.as_deref().unwrap_or("<unknown>")
            ),
            EventKind::AppStopFailed => format!("{app} did not release its resources"),
            _ => return,
        };
        println!("[crash-notes] {note}");
        if let Ok(mut notes) = self.notes.lock() {
            notes.push(note);
        }
    }

    fn name(&self) -> &'static str {
        "crash-notes"
    }

    fn queue_capacity(&self) -> usize {
        32
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let registry = Registry::from_descriptors([
        AppDescriptor::builder("wifi_service")
            .flags(AppFlags::SERVICE)
            .lifecycle(
                Hooks::new()
                    .on_start(|| async {
                        Err::<Started, _>(AppError::fail("radio calibration failed"))
                    })
                    .arc(),
            )
            .build(),
        AppDescriptor::builder("weather")
            .requires(["wifi_service"])
            .build(),
    ])?;

    let notes = Arc::new(CrashNotes::default());
    let subs: Vec<Arc<dyn Subscribe>> = vec![notes.clone()];
    let rtam = Orchestrator::builder(registry)
        .with_config(Config {
            home: None,
            ..Config::default()
        })
        .with_subscribers(subs)
        .build();

    if let Err(err) = rtam.launch("weather").await {
        println!("launch(weather): {err} [{}]", err.as_label());
    }

    // let the subscriber worker drain
    tokio::time::sleep(Duration::from_millis(50)).await;
    let count = notes.notes.lock().map(|n| n.len()).unwrap_or(0);
    println!("{count} crash notes recorded");
    Ok(())
}
