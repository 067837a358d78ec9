//! # Example: debounced_commit
//!
//! A brightness slider fires on every step; only the last value should reach flash.
//! The settings write is posted with a coalescing key and `CancelCurrent`, so each
//! new post replaces the pending one. A backlight timeout uses plain `KeepBoth`
//! timers and is cancelled explicitly by handle.
//!
//! ## Flow
//! ```text
//! t=0ms   post(commit 10, key=brightness, 200ms)
//! t=30ms  post(commit 40, key=brightness, 200ms)  ─► commit 10 cancelled
//! t=60ms  post(commit 80, key=brightness, 200ms)  ─► commit 40 cancelled
//! t=260ms commit 80 runs on a worker
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example debounced_commit
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use rtam::{Bus, DeferredConfig, DeferredQueue, LogWriter, PostOptions, Subscribe, SubscriberSet};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let bus = Bus::new(256);
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let set = Arc::new(SubscriberSet::new(subs, bus.clone()));
    let mut rx = bus.subscribe();
    let forward = {
        let set = Arc::clone(&set);
        tokio::spawn(async move {
            while let Ok(ev) = rx.recv().await {
                set.emit(&ev);
            }
        })
    };

    let queue = DeferredQueue::with_bus(DeferredConfig::default(), bus);
    queue.spawn_workers();
    let t0 = Instant::now();

    for level in [10u8, 40, 80] {
        queue.post(
            move |level| println!("[{:>4}ms] commit brightness={level}", t0.elapsed().as_millis()),
            level,
            Duration::from_millis(200),
            PostOptions::debounce("brightness"),
        )?;
        tokio::time::sleep(Duration::from_millis(30)).await;
    }

    let backlight = queue.post(
        |_: ()| println!("backlight off"),
        (),
        Duration::from_millis(150),
        PostOptions::new(),
    )?;
    // a key press keeps the backlight on
    queue.cancel(&backlight);

    tokio::time::sleep(Duration::from_millis(400)).await;
    println!("pending after burst: {}", queue.pending());

    queue.stop_workers().await;
    forward.abort();
    Ok(())
}
