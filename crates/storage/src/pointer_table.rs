//! Branch pointer table.
//!
//! Holds the active-branch pointer and a per-branch count of live
//! readers/writers. This is the only state mutated by multiple components
//! (branch manager writes, garbage collector reads and decrements), so
//! every operation is a short critical section on one lock.

use parking_lot::RwLock;
use sediment_core::BranchId;
use std::collections::HashMap;

struct TableInner {
    active: Option<BranchId>,
    refs: HashMap<BranchId, u64>,
}

/// Active-branch pointer plus per-branch live reference counts.
pub struct BranchPointerTable {
    inner: RwLock<TableInner>,
}

impl BranchPointerTable {
    /// Create an empty table with no active branch.
    pub fn new() -> Self {
        BranchPointerTable {
            inner: RwLock::new(TableInner {
                active: None,
                refs: HashMap::new(),
            }),
        }
    }

    /// The current active branch.
    pub fn active(&self) -> Option<BranchId> {
        self.inner.read().active
    }

    /// Point the active-branch pointer at `id`. In-memory only and O(1);
    /// persistence rides in the ordinary WAL stream.
    pub fn set_active(&self, id: BranchId) {
        self.inner.write().active = Some(id);
    }

    /// Register a branch with a zero reference count.
    pub fn register(&self, id: BranchId) {
        self.inner.write().refs.entry(id).or_insert(0);
    }

    /// Take a live reference on a branch (a reader or writer entered).
    pub fn retain(&self, id: BranchId) {
        let mut inner = self.inner.write();
        *inner.refs.entry(id).or_insert(0) += 1;
    }

    /// Drop a live reference on a branch.
    pub fn release(&self, id: BranchId) {
        let mut inner = self.inner.write();
        if let Some(count) = inner.refs.get_mut(&id) {
            *count = count.saturating_sub(1);
        }
    }

    /// Live reference count for a branch (0 if unknown).
    pub fn ref_count(&self, id: BranchId) -> u64 {
        self.inner.read().refs.get(&id).copied().unwrap_or(0)
    }

    /// Remove a branch's entry once reclaimed.
    pub fn remove(&self, id: BranchId) {
        self.inner.write().refs.remove(&id);
    }
}

impl Default for BranchPointerTable {
    fn default() -> Self {
        Self::new()
    }
}
