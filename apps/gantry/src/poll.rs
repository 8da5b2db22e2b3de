use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::resources::ResourceId;

/// Produces one fetch future per invocation. The scheduler spawns every fetch
/// instead of awaiting it, so a slow response never delays the next tick;
/// overlapping in-flight fetches are resolved by the view's sequence guard.
pub type FetchFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

struct Entry {
    generation: u64,
    refresh_tx: mpsc::UnboundedSender<()>,
    handle: JoinHandle<()>,
}

/// Cancellation token for one schedule. Generation-tagged: a handle from a
/// superseded schedule cannot cancel the replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelHandle {
    id: ResourceId,
    generation: u64,
}

impl CancelHandle {
    pub fn resource(&self) -> ResourceId {
        self.id
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<ResourceId, Entry>,
    next_generation: u64,
}

/// Per-resource refresh timers with independent cadence. One driver task per
/// scheduled resource; `cadence: None` registers an on-demand-only resource
/// that fetches solely through [`PollScheduler::refresh_now`].
#[derive(Default)]
pub struct PollScheduler {
    inner: Mutex<Inner>,
}

impl PollScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the poll loop for a resource. Re-scheduling
    /// first cancels any prior timer so a resource never runs two loops.
    pub fn schedule(
        &self,
        id: ResourceId,
        cadence: Option<Duration>,
        fetch: FetchFn,
    ) -> CancelHandle {
        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_driver(id, cadence, fetch, refresh_rx));

        let mut inner = self.inner.lock();
        inner.next_generation += 1;
        let generation = inner.next_generation;
        if let Some(previous) = inner.entries.insert(
            id,
            Entry {
                generation,
                refresh_tx,
                handle,
            },
        ) {
            debug!(resource = %id, "replacing existing schedule");
            previous.handle.abort();
        }
        CancelHandle { id, generation }
    }

    /// Out-of-band fetch that leaves the timer's phase untouched. Returns
    /// false when the resource has no active schedule.
    pub fn refresh_now(&self, id: ResourceId) -> bool {
        let inner = self.inner.lock();
        match inner.entries.get(&id) {
            Some(entry) => entry.refresh_tx.send(()).is_ok(),
            None => false,
        }
    }

    /// Exactly-once cancellation: true only when this handle's schedule was
    /// still the active one. A cancelled timer never fires again.
    pub fn cancel(&self, handle: CancelHandle) -> bool {
        let mut inner = self.inner.lock();
        match inner.entries.get(&handle.id) {
            Some(entry) if entry.generation == handle.generation => {
                let entry = inner.entries.remove(&handle.id).expect("entry present");
                entry.handle.abort();
                true
            }
            _ => false,
        }
    }

    pub fn is_scheduled(&self, id: ResourceId) -> bool {
        self.inner.lock().entries.contains_key(&id)
    }

    /// Cancels every schedule. Spawned in-flight fetches complete on their
    /// own; their results are dropped by the views' weak references.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock();
        for (_, entry) in inner.entries.drain() {
            entry.handle.abort();
        }
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_driver(
    id: ResourceId,
    cadence: Option<Duration>,
    fetch: FetchFn,
    mut refresh_rx: mpsc::UnboundedReceiver<()>,
) {
    match cadence {
        Some(every) => {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        tokio::spawn(fetch());
                    }
                    msg = refresh_rx.recv() => match msg {
                        Some(()) => {
                            debug!(resource = %id, "manual refresh");
                            tokio::spawn(fetch());
                        }
                        None => break,
                    },
                }
            }
        }
        None => {
            while refresh_rx.recv().await.is_some() {
                debug!(resource = %id, "on-demand fetch");
                tokio::spawn(fetch());
            }
        }
    }
}
