//! Page arena with explicit reference counts.
//!
//! Pages are addressed by stable [`PageId`]s instead of aliased references
//! so that branches can share unmodified data and reclamation can be
//! deferred safely. Every page carries a reference count:
//!
//! - the owning branch's key map holds one reference
//! - each in-flight reader pin holds one reference
//!
//! A page is freed when its count reaches zero, whichever release gets
//! there last. The garbage collector releases the owner reference and then
//! waits for outstanding pins to drain.

use parking_lot::RwLock;
use sediment_core::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Stable identifier for a page in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(u64);

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "page-{}", self.0)
    }
}

/// Outcome of releasing one reference to a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Count reached zero; page memory was freed
    Freed,
    /// References remain (in-flight pins); freeing is deferred
    Deferred,
    /// Page was not present (already freed, or never existed)
    Missing,
}

struct PageSlot {
    value: Value,
    refs: u64,
}

/// Owning arena for all pages in the store.
pub struct PageArena {
    pages: RwLock<HashMap<PageId, PageSlot>>,
    next_id: AtomicU64,
}

impl PageArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        PageArena {
            pages: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Insert a new page with one (owner) reference.
    pub fn insert(&self, value: Value) -> PageId {
        let id = PageId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.pages.write().insert(id, PageSlot { value, refs: 1 });
        id
    }

    /// Read a page's value. Takes only a short-lived read lock.
    pub fn get(&self, id: PageId) -> Option<Value> {
        self.pages.read().get(&id).map(|slot| slot.value.clone())
    }

    /// Pin a page for a long-lived read. The pin holds a reference until
    /// dropped, deferring reclamation of the page.
    pub fn pin(self: &Arc<Self>, id: PageId) -> Option<PagePin> {
        let mut pages = self.pages.write();
        let slot = pages.get_mut(&id)?;
        slot.refs += 1;
        Some(PagePin {
            arena: Arc::clone(self),
            id,
        })
    }

    /// Release one reference to a page, freeing it at zero.
    pub fn release(&self, id: PageId) -> ReleaseOutcome {
        let mut pages = self.pages.write();
        match pages.get_mut(&id) {
            None => ReleaseOutcome::Missing,
            Some(slot) => {
                slot.refs -= 1;
                if slot.refs == 0 {
                    pages.remove(&id);
                    ReleaseOutcome::Freed
                } else {
                    ReleaseOutcome::Deferred
                }
            }
        }
    }

    /// Whether a page is still resident.
    pub fn contains(&self, id: PageId) -> bool {
        self.pages.read().contains_key(&id)
    }

    /// Current reference count of a page (None once freed).
    pub fn ref_count(&self, id: PageId) -> Option<u64> {
        self.pages.read().get(&id).map(|slot| slot.refs)
    }

    /// Number of resident pages.
    pub fn len(&self) -> usize {
        self.pages.read().len()
    }

    /// Whether the arena holds no pages.
    pub fn is_empty(&self) -> bool {
        self.pages.read().is_empty()
    }
}

impl Default for PageArena {
    fn default() -> Self {
        Self::new()
    }
}

/// Reference-holding guard for an in-flight read of a page.
///
/// Dropping the pin releases its reference; if the owner reference was
/// already released by the garbage collector, the last pin frees the page.
pub struct PagePin {
    arena: Arc<PageArena>,
    id: PageId,
}

impl PagePin {
    /// The pinned page's id.
    pub fn id(&self) -> PageId {
        self.id
    }

    /// The pinned page's value.
    pub fn value(&self) -> Option<Value> {
        self.arena.get(self.id)
    }
}

impl Drop for PagePin {
    fn drop(&mut self) {
        self.arena.release(self.id);
    }
}
