//! # Worker loop.
//!
//! ```text
//! loop:
//!   arm notified()            (before looking, so no wake-up is lost)
//!   lock pending
//!     ├─ due entry for me? ─► unlock ─► run it ─► loop
//!     └─ else next due     ─► unlock ─► select { cancelled | notified | sleep_until(next) }
//! ```
//!
//! Callbacks run synchronously on the worker task, one at a time.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

use super::queue::{Entry, Inner};
use crate::events::{Event, EventKind};
use crate::subscribers::panic_message;

enum Step {
    Run(Entry),
    Wait(Option<Instant>),
}

pub(super) async fn run(inner: Arc<Inner>, index: usize, token: CancellationToken) {
    loop {
        let notified = inner.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        let step = {
            let mut pending = inner.pending.lock();
            match pending.pop_due(index, Instant::now()) {
                Some(entry) => Step::Run(entry),
                None => Step::Wait(pending.next_due(index)),
            }
        };

        match step {
            Step::Run(entry) => fire(&inner, index, entry),
            Step::Wait(next) => {
                let sleep = async {
                    match next {
                        Some(at) => sleep_until(at).await,
                        None => std::future::pending::<()>().await,
                    }
                };
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = &mut notified => {}
                    _ = sleep => {}
                }
            }
        }

        if token.is_cancelled() {
            break;
        }
    }
}

fn fire(inner: &Inner, index: usize, entry: Entry) {
    let Entry {
        id, key, callback, ..
    } = entry;

    match catch_unwind(AssertUnwindSafe(callback)) {
        Ok(()) => {
            tracing::trace!(call = id, worker = index, "deferred call fired");
            inner.publish(|| {
                let ev = Event::new(EventKind::DeferredFired).with_call(id);
                match &key {
                    Some(k) => ev.with_key(Arc::clone(k)),
                    None => ev,
                }
            });
        }
        Err(panic) => {
            let info = panic_message(&*panic);
            tracing::warn!(call = id, worker = index, %info, "deferred call panicked");
            inner.publish(|| {
                let ev = Event::new(EventKind::DeferredPanicked)
                    .with_call(id)
                    .with_reason(info);
                match &key {
                    Some(k) => ev.with_key(Arc::clone(k)),
                    None => ev,
                }
            });
        }
    }
}
