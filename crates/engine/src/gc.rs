//! Asynchronous storage reclamation.
//!
//! Deleting a branch only tombstones it; a background collector reclaims
//! the storage later so delete never blocks the caller. Reclamation of a
//! branch:
//!
//! 1. wait until the pointer table shows no live references
//! 2. detach the branch's key map, taking ownership of its pages
//! 3. release each page; pages pinned by in-flight readers are deferred
//!    until the last pin drops
//! 4. mark the branch `Reclaimed` and drop its pointer-table entry
//!
//! Failures are retried with backoff and never surface to callers of
//! unrelated operations.

use crate::branches::BranchManager;
use parking_lot::Mutex;
use sediment_core::BranchId;
use sediment_storage::{BranchPointerTable, BranchStore, ReleaseOutcome};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Reference-drain retries before a task goes back to the queue.
const DRAIN_ATTEMPTS: u32 = 20;

/// Initial backoff between drain attempts; doubles up to [`MAX_BACKOFF`].
const INITIAL_BACKOFF: Duration = Duration::from_millis(1);
const MAX_BACKOFF: Duration = Duration::from_millis(50);

enum GcMsg {
    Reclaim(BranchId),
    /// Resolves once everything enqueued before it has been processed.
    Barrier(mpsc::Sender<()>),
    Shutdown,
}

/// Background collector for tombstoned branches.
pub struct GarbageCollector {
    sender: mpsc::Sender<GcMsg>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl GarbageCollector {
    /// Spawn the collector thread.
    pub fn start(
        store: Arc<BranchStore>,
        pointers: Arc<BranchPointerTable>,
        branches: Arc<BranchManager>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel();
        let worker_sender = sender.clone();
        let handle = std::thread::Builder::new()
            .name("sediment-gc".into())
            .spawn(move || run_collector(store, pointers, branches, receiver, worker_sender))
            .ok();

        if handle.is_none() {
            tracing::error!("failed to spawn garbage collector thread");
        }

        GarbageCollector {
            sender,
            handle: Mutex::new(handle),
        }
    }

    /// Enqueue a tombstoned branch for reclamation.
    pub fn enqueue(&self, branch: BranchId) {
        if self.sender.send(GcMsg::Reclaim(branch)).is_err() {
            tracing::warn!(%branch, "garbage collector is shut down; reclamation dropped");
        }
    }

    /// Block until all currently queued reclamation work has been tried.
    ///
    /// Test and shutdown aid; production callers never need it.
    pub fn drain(&self) {
        let (ack, done) = mpsc::channel();
        if self.sender.send(GcMsg::Barrier(ack)).is_ok() {
            let _ = done.recv();
        }
    }

    /// Stop the collector thread.
    pub fn shutdown(&self) {
        let _ = self.sender.send(GcMsg::Shutdown);
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for GarbageCollector {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_collector(
    store: Arc<BranchStore>,
    pointers: Arc<BranchPointerTable>,
    branches: Arc<BranchManager>,
    receiver: mpsc::Receiver<GcMsg>,
    sender: mpsc::Sender<GcMsg>,
) {
    while let Ok(msg) = receiver.recv() {
        match msg {
            GcMsg::Reclaim(branch) => {
                if reclaim(&store, &pointers, &branches, branch) {
                    tracing::debug!(%branch, "branch storage reclaimed");
                } else {
                    // Live references outlasted the backoff budget; retry
                    // the whole task later instead of blocking the queue.
                    tracing::debug!(%branch, "reclamation deferred, re-queueing");
                    let _ = sender.send(GcMsg::Reclaim(branch));
                    std::thread::sleep(MAX_BACKOFF);
                }
            }
            GcMsg::Barrier(ack) => {
                let _ = ack.send(());
            }
            GcMsg::Shutdown => break,
        }
    }
}

/// Attempt one full reclamation. Returns false if live references or pins
/// did not drain within the backoff budget.
fn reclaim(
    store: &BranchStore,
    pointers: &BranchPointerTable,
    branches: &BranchManager,
    branch: BranchId,
) -> bool {
    if !wait_for(|| pointers.ref_count(branch) == 0) {
        return false;
    }

    let pages = store.detach_branch(branch);
    let mut deferred = Vec::new();
    for page in pages {
        if store.arena().release(page) == ReleaseOutcome::Deferred {
            deferred.push(page);
        }
    }

    // In-flight reader pins free their page on drop; wait for the stragglers.
    if !deferred.is_empty() {
        let arena = store.arena();
        if !wait_for(|| deferred.iter().all(|&page| !arena.contains(page))) {
            tracing::warn!(
                %branch,
                pinned = deferred.len(),
                "pages still pinned after backoff; reclamation will retry"
            );
            return false;
        }
    }

    branches.mark_reclaimed(branch);
    pointers.remove(branch);
    true
}

/// Poll `condition` with doubling backoff, up to [`DRAIN_ATTEMPTS`] tries.
fn wait_for(condition: impl Fn() -> bool) -> bool {
    let mut backoff = INITIAL_BACKOFF;
    for attempt in 0..DRAIN_ATTEMPTS {
        if condition() {
            return true;
        }
        if attempt + 1 < DRAIN_ATTEMPTS {
            std::thread::sleep(backoff);
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }
    condition()
}
