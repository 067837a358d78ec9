//! # The shared pending set and its public API.
//!
//! [`DeferredQueue`] is a cheap-to-clone handle (`Arc` inside). All bookkeeping sits
//! behind one short-lived `parking_lot` mutex that is never held across an `.await`
//! or across a callback, so `post`/`cancel` are safe from any context, including
//! from inside a deferred callback.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::call::{CancelPolicy, DeferredHandle, PostOptions};
use super::worker;
use crate::app::{Lifecycle, Started};
use crate::config::DeferredConfig;
use crate::error::{AppError, PostError};
use crate::events::{Bus, Event, EventKind};

pub(super) type Callback = Box<dyn FnOnce() + Send + 'static>;

/// One pending call.
pub(super) struct Entry {
    pub(super) id: u64,
    pub(super) key: Option<Arc<str>>,
    pub(super) worker: Option<usize>,
    pub(super) callback: Callback,
}

/// Pending set ordered by `(due, id)`; ids grow with every post, so ties at the
/// same due time run in post order.
#[derive(Default)]
pub(super) struct Pending {
    pub(super) by_due: BTreeMap<(Instant, u64), Entry>,
    pub(super) due_of: HashMap<u64, Instant>,
}

impl Pending {
    fn len(&self) -> usize {
        self.by_due.len()
    }

    fn insert(&mut self, due: Instant, entry: Entry) {
        self.due_of.insert(entry.id, due);
        self.by_due.insert((due, entry.id), entry);
    }

    fn remove(&mut self, id: u64) -> Option<Entry> {
        let due = self.due_of.remove(&id)?;
        self.by_due.remove(&(due, id))
    }

    fn ids_with_key(&self, key: &str) -> Vec<u64> {
        self.by_due
            .values()
            .filter(|e| e.key.as_deref() == Some(key))
            .map(|e| e.id)
            .collect()
    }

    /// Removes the earliest due entry `worker` may run.
    pub(super) fn pop_due(&mut self, worker: usize, now: Instant) -> Option<Entry> {
        let slot = self
            .by_due
            .iter()
            .take_while(|((due, _), _)| *due <= now)
            .find(|(_, e)| e.worker.is_none_or(|w| w == worker))
            .map(|(k, _)| *k)?;
        self.due_of.remove(&slot.1);
        self.by_due.remove(&slot)
    }

    /// Earliest due time among entries `worker` may run.
    pub(super) fn next_due(&self, worker: usize) -> Option<Instant> {
        self.by_due
            .iter()
            .find(|(_, e)| e.worker.is_none_or(|w| w == worker))
            .map(|((due, _), _)| *due)
    }
}

struct Workers {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

pub(super) struct Inner {
    pub(super) cfg: DeferredConfig,
    pub(super) pending: Mutex<Pending>,
    pub(super) notify: Notify,
    pub(super) bus: Option<Bus>,
    next_id: AtomicU64,
    workers: Mutex<Option<Workers>>,
}

impl Inner {
    pub(super) fn publish(&self, ev: impl FnOnce() -> Event) {
        if let Some(bus) = &self.bus {
            bus.publish(ev());
        }
    }
}

/// Bounded queue of delayed callbacks drained by a pool of workers.
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use rtam::{DeferredConfig, DeferredQueue, PostOptions};
///
/// # async fn demo() -> Result<(), rtam::PostError> {
/// let queue = DeferredQueue::new(DeferredConfig::default());
/// queue.spawn_workers();
///
/// // rapid slider drags: only the last write reaches flash
/// for level in [10u8, 40, 80] {
///     queue.post(
///         |level| println!("commit brightness={level}"),
///         level,
///         Duration::from_millis(50),
///         PostOptions::debounce("brightness"),
///     )?;
/// }
/// # Ok(()) }
/// ```
#[derive(Clone)]
pub struct DeferredQueue {
    inner: Arc<Inner>,
}

impl DeferredQueue {
    /// Creates a queue that publishes nothing.
    pub fn new(cfg: DeferredConfig) -> Self {
        Self::build(cfg, None)
    }

    /// Creates a queue that publishes `Deferred*` events on `bus`.
    pub fn with_bus(cfg: DeferredConfig, bus: Bus) -> Self {
        Self::build(cfg, Some(bus))
    }

    fn build(cfg: DeferredConfig, bus: Option<Bus>) -> Self {
        Self {
            inner: Arc::new(Inner {
                cfg,
                pending: Mutex::new(Pending::default()),
                notify: Notify::new(),
                bus,
                next_id: AtomicU64::new(1),
                workers: Mutex::new(None),
            }),
        }
    }

    /// Maximum number of pending calls.
    pub fn capacity(&self) -> usize {
        self.inner.cfg.capacity
    }

    /// Number of worker tasks (when running).
    pub fn workers(&self) -> usize {
        self.inner.cfg.workers_clamped()
    }

    /// Number of calls waiting to fire.
    pub fn pending(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// True while the worker pool is up.
    pub fn is_running(&self) -> bool {
        self.inner.workers.lock().is_some()
    }

    /// Schedules `callback(payload)` to run on a worker after `delay`.
    ///
    /// Coalescing (when `options.key` is set and a call with the same key is pending):
    /// - [`CancelPolicy::KeepBoth`]: both stay pending.
    /// - [`CancelPolicy::CancelCurrent`]: the older calls are cancelled first, so a
    ///   replacement never fails for lack of room.
    /// - [`CancelPolicy::KeepPending`]: nothing is enqueued and the handle of the oldest
    ///   pending call is returned.
    ///
    /// Calls posted before [`spawn_workers`](Self::spawn_workers) wait for the pool.
    ///
    /// # Errors
    /// - [`PostError::QueueFull`] if `capacity` calls are already pending.
    /// - [`PostError::NoSuchWorker`] if `options.worker` is out of range.
    pub fn post<F, P>(
        &self,
        callback: F,
        payload: P,
        delay: Duration,
        options: PostOptions,
    ) -> Result<DeferredHandle, PostError>
    where
        F: FnOnce(P) + Send + 'static,
        P: Send + 'static,
    {
        let workers = self.workers();
        if let Some(worker) = options.worker.filter(|w| *w >= workers) {
            return Err(PostError::NoSuchWorker { worker, workers });
        }

        let PostOptions {
            key,
            policy,
            worker,
        } = options;
        let due = Instant::now() + delay;
        let mut replaced = Vec::new();

        let posted = {
            let mut pending = self.inner.pending.lock();

            if let Some(k) = key.as_deref() {
                let same = pending.ids_with_key(k);
                match policy {
                    CancelPolicy::KeepBoth => {}
                    CancelPolicy::KeepPending => {
                        if let Some(&id) = same.first() {
                            drop(pending);
                            tracing::debug!(key = k, existing = id, "deferred call kept pending");
                            self.inner.publish(|| {
                                Event::new(EventKind::DeferredDropped)
                                    .with_call(id)
                                    .with_key(k)
                                    .with_reason("keep_pending")
                            });
                            return Ok(DeferredHandle { id, key });
                        }
                    }
                    CancelPolicy::CancelCurrent => {
                        for id in same {
                            if pending.remove(id).is_some() {
                                replaced.push(id);
                            }
                        }
                    }
                }
            }

            if pending.len() >= self.inner.cfg.capacity {
                Err(PostError::QueueFull {
                    capacity: self.inner.cfg.capacity,
                })
            } else {
                let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
                pending.insert(
                    due,
                    Entry {
                        id,
                        key: key.clone(),
                        worker,
                        callback: Box::new(move || callback(payload)),
                    },
                );
                Ok(id)
            }
        };

        for id in &replaced {
            self.inner.publish(|| {
                let ev = Event::new(EventKind::DeferredCancelled)
                    .with_call(*id)
                    .with_reason("replaced");
                match &key {
                    Some(k) => ev.with_key(Arc::clone(k)),
                    None => ev,
                }
            });
        }

        match posted {
            Ok(id) => {
                self.inner.notify.notify_waiters();
                self.inner.publish(|| {
                    let ev = Event::new(EventKind::DeferredPosted)
                        .with_call(id)
                        .with_delay(delay);
                    match &key {
                        Some(k) => ev.with_key(Arc::clone(k)),
                        None => ev,
                    }
                });
                Ok(DeferredHandle { id, key })
            }
            Err(err) => {
                tracing::warn!(key = ?key, %err, "deferred call dropped");
                self.inner.publish(|| {
                    let ev = Event::new(EventKind::DeferredDropped).with_reason(err.to_string());
                    match &key {
                        Some(k) => ev.with_key(Arc::clone(k)),
                        None => ev,
                    }
                });
                Err(err)
            }
        }
    }

    /// Cancels a pending call. Returns `false` if it already fired or was cancelled.
    pub fn cancel(&self, handle: &DeferredHandle) -> bool {
        let removed = self.inner.pending.lock().remove(handle.id).is_some();
        if removed {
            self.inner.notify.notify_waiters();
            self.inner.publish(|| {
                let ev = Event::new(EventKind::DeferredCancelled)
                    .with_call(handle.id)
                    .with_reason("cancelled");
                match &handle.key {
                    Some(k) => ev.with_key(Arc::clone(k)),
                    None => ev,
                }
            });
        }
        removed
    }

    /// Cancels every pending call posted with `key`; returns how many were cancelled.
    pub fn cancel_key(&self, key: &str) -> usize {
        let cancelled: Vec<u64> = {
            let mut pending = self.inner.pending.lock();
            pending
                .ids_with_key(key)
                .into_iter()
                .filter(|id| pending.remove(*id).is_some())
                .collect()
        };
        if !cancelled.is_empty() {
            self.inner.notify.notify_waiters();
        }
        for id in &cancelled {
            self.inner.publish(|| {
                Event::new(EventKind::DeferredCancelled)
                    .with_call(*id)
                    .with_key(key)
                    .with_reason("cancelled")
            });
        }
        cancelled.len()
    }

    /// Spawns the worker pool. No-op if it is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_workers(&self) {
        let mut slot = self.inner.workers.lock();
        if slot.is_some() {
            return;
        }
        let token = CancellationToken::new();
        let handles = (0..self.workers())
            .map(|index| {
                tokio::spawn(worker::run(
                    Arc::clone(&self.inner),
                    index,
                    token.child_token(),
                ))
            })
            .collect();
        tracing::debug!(workers = self.workers(), "deferred workers started");
        *slot = Some(Workers { token, handles });
    }

    /// Stops the worker pool and waits for in-flight callbacks to return.
    ///
    /// Pending calls stay queued and fire once the pool is spawned again.
    pub async fn stop_workers(&self) {
        let Some(workers) = self.inner.workers.lock().take() else {
            return;
        };
        workers.token.cancel();
        for h in workers.handles {
            let _ = h.await;
        }
        tracing::debug!("deferred workers stopped");
    }
}

impl std::fmt::Debug for DeferredQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredQueue")
            .field("capacity", &self.capacity())
            .field("workers", &self.workers())
            .field("pending", &self.pending())
            .field("running", &self.is_running())
            .finish()
    }
}

/// Lets the queue be registered as a service app (`AUTO_START | SERVICE`).
#[async_trait]
impl Lifecycle for DeferredQueue {
    async fn start(&self) -> Result<Started, AppError> {
        self.spawn_workers();
        Ok(Started::Running)
    }

    async fn stop(&self) -> Result<(), AppError> {
        self.stop_workers().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as SyncMutex;
    use std::sync::atomic::AtomicUsize;

    fn queue(capacity: usize, workers: usize) -> DeferredQueue {
        DeferredQueue::new(DeferredConfig { capacity, workers })
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn(usize) + Send + Clone + 'static) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        (hits, move |n: usize| {
            h.fetch_add(n, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_current_coalesces_a_burst_into_the_last_call() {
        let q = queue(16, 2);
        q.spawn_workers();
        let fired = Arc::new(SyncMutex::new(Vec::<(u32, Instant)>::new()));
        let start = Instant::now();

        for n in 1..=3u32 {
            let sink = fired.clone();
            q.post(
                move |n| sink.lock().push((n, Instant::now())),
                n,
                Duration::from_millis(50),
                PostOptions::debounce("k"),
            )
            .unwrap();
            if n < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
        assert_eq!(q.pending(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        let fired = fired.lock();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].0, 3);
        let elapsed = fired[0].1 - start;
        assert!(elapsed >= Duration::from_millis(60), "{elapsed:?}");
        assert!(elapsed <= Duration::from_millis(75), "{elapsed:?}");
        q.stop_workers().await;
    }

    #[tokio::test(start_paused = true)]
    async fn keep_both_fires_every_call_in_due_order() {
        let q = queue(16, 1);
        q.spawn_workers();
        let order = Arc::new(SyncMutex::new(Vec::new()));

        for (tag, ms) in [("late", 30u64), ("early", 10), ("tie-a", 20), ("tie-b", 20)] {
            let sink = order.clone();
            q.post(
                move |tag| sink.lock().push(tag),
                tag,
                Duration::from_millis(ms),
                PostOptions::new().with_key("backlight"),
            )
            .unwrap();
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(*order.lock(), ["early", "tie-a", "tie-b", "late"]);
    }

    #[tokio::test(start_paused = true)]
    async fn keep_pending_returns_the_existing_handle() {
        let q = queue(16, 1);
        let (hits, cb) = counter();
        let first = q
            .post(cb.clone(), 1, Duration::from_millis(10), PostOptions::new().with_key("k"))
            .unwrap();
        let second = q
            .post(
                cb,
                1,
                Duration::from_millis(10),
                PostOptions::new().with_key("k").keep_pending(),
            )
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(q.pending(), 1);

        q.spawn_workers();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_rejects_but_replacement_still_fits() {
        let q = queue(2, 1);
        let (_hits, cb) = counter();
        q.post(cb.clone(), 1, Duration::from_secs(1), PostOptions::debounce("a"))
            .unwrap();
        q.post(cb.clone(), 1, Duration::from_secs(1), PostOptions::new())
            .unwrap();

        let err = q
            .post(cb.clone(), 1, Duration::from_secs(1), PostOptions::new())
            .unwrap_err();
        assert_eq!(err, PostError::QueueFull { capacity: 2 });

        q.post(cb, 1, Duration::from_secs(1), PostOptions::debounce("a"))
            .unwrap();
        assert_eq!(q.pending(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_cancel_before_due_time() {
        let q = queue(16, 2);
        q.spawn_workers();
        let (hits, cb) = counter();

        let h = q
            .post(cb.clone(), 1, Duration::from_millis(20), PostOptions::new())
            .unwrap();
        q.post(cb.clone(), 10, Duration::from_millis(20), PostOptions::new().with_key("x"))
            .unwrap();
        q.post(cb, 10, Duration::from_millis(20), PostOptions::new().with_key("x"))
            .unwrap();

        assert!(q.cancel(&h));
        assert!(!q.cancel(&h));
        assert_eq!(q.cancel_key("x"), 2);
        assert_eq!(q.pending(), 0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fired_call_cannot_be_cancelled() {
        let q = queue(16, 1);
        q.spawn_workers();
        let (hits, cb) = counter();
        let h = q
            .post(cb, 1, Duration::from_millis(5), PostOptions::new())
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!q.cancel(&h));
    }

    #[tokio::test(start_paused = true)]
    async fn pinned_calls_respect_worker_range() {
        let q = queue(16, 2);
        let err = q
            .post(|_: ()| {}, (), Duration::ZERO, PostOptions::new().on_worker(2))
            .unwrap_err();
        assert_eq!(err, PostError::NoSuchWorker { worker: 2, workers: 2 });

        q.spawn_workers();
        let (hits, cb) = counter();
        q.post(cb, 1, Duration::from_millis(1), PostOptions::new().on_worker(1))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_callback_does_not_kill_the_worker() {
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let q = DeferredQueue::with_bus(DeferredConfig { capacity: 4, workers: 1 }, bus);
        q.spawn_workers();
        let (hits, cb) = counter();

        q.post(|_: ()| panic!("bad payload"), (), Duration::from_millis(1), PostOptions::new())
            .unwrap();
        q.post(cb, 1, Duration::from_millis(2), PostOptions::new())
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind);
        }
        assert!(kinds.contains(&EventKind::DeferredPanicked));
        assert_eq!(
            kinds.iter().filter(|k| **k == EventKind::DeferredFired).count(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn lifecycle_stop_keeps_pending_calls() {
        let q = queue(16, 1);
        let (hits, cb) = counter();
        assert_eq!(Lifecycle::start(&q).await, Ok(Started::Running));
        q.post(cb, 1, Duration::from_millis(10), PostOptions::new())
            .unwrap();
        Lifecycle::stop(&q).await.unwrap();
        assert!(!q.is_running());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(q.pending(), 1);

        q.spawn_workers();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
