//! Per-branch in-memory state with copy-on-write lookup.
//!
//! Each branch owns a map from (primitive tag, key) to a page in the
//! shared [`PageArena`]. A branch created from a base copies nothing: reads
//! walk parent links until a page is found, so the child mirrors the base
//! exactly until its own writes diverge. A write only ever touches the
//! writing branch's map, which is what isolates siblings from each other.

use crate::arena::{PageArena, PageId};
use parking_lot::RwLock;
use sediment_core::{BranchId, Error, Key, PrimitiveTag, Result, Value};
use std::collections::HashMap;
use std::sync::Arc;

type EntryKey = (PrimitiveTag, Key);

struct BranchPages {
    parent: Option<BranchId>,
    entries: HashMap<EntryKey, PageId>,
}

/// The in-memory store: authoritative per-branch state for all primitives.
///
/// All reads are served from here exclusively; the durability layer never
/// touches it.
pub struct BranchStore {
    arena: Arc<PageArena>,
    branches: RwLock<HashMap<BranchId, BranchPages>>,
}

impl BranchStore {
    /// Create an empty store.
    pub fn new() -> Self {
        BranchStore {
            arena: Arc::new(PageArena::new()),
            branches: RwLock::new(HashMap::new()),
        }
    }

    /// The shared page arena.
    pub fn arena(&self) -> &Arc<PageArena> {
        &self.arena
    }

    /// Register a branch. O(1): records the parent link, copies no data.
    pub fn register_branch(&self, id: BranchId, parent: Option<BranchId>) {
        self.branches.write().entry(id).or_insert(BranchPages {
            parent,
            entries: HashMap::new(),
        });
    }

    /// Whether a branch is registered.
    pub fn contains_branch(&self, id: BranchId) -> bool {
        self.branches.read().contains_key(&id)
    }

    /// Write a value. Allocates a fresh page owned by this branch; if the
    /// key was already written on this branch, the previous page loses its
    /// owner reference.
    pub fn write(&self, branch: BranchId, tag: PrimitiveTag, key: Key, value: Value) -> Result<()> {
        let page = self.arena.insert(value);
        let previous = {
            let mut branches = self.branches.write();
            let pages = branches
                .get_mut(&branch)
                .ok_or_else(|| Error::Internal(format!("branch {branch} not registered in store")))?;
            pages.entries.insert((tag, key), page)
        };
        if let Some(old) = previous {
            self.arena.release(old);
        }
        Ok(())
    }

    /// Copy-on-write read: resolve the key by walking parent links until a
    /// page is found. Independent of durability mode; takes only short
    /// read locks.
    pub fn get(&self, branch: BranchId, tag: PrimitiveTag, key: &Key) -> Option<Value> {
        let page = self.resolve_page(branch, tag, key)?;
        self.arena.get(page)
    }

    /// Resolve a key to its page id without reading the value.
    pub fn resolve_page(&self, branch: BranchId, tag: PrimitiveTag, key: &Key) -> Option<PageId> {
        let branches = self.branches.read();
        let lookup = (tag, key.clone());
        let mut cursor = Some(branch);
        while let Some(id) = cursor {
            let pages = branches.get(&id)?;
            if let Some(page) = pages.entries.get(&lookup) {
                return Some(*page);
            }
            cursor = pages.parent;
        }
        None
    }

    /// Number of keys written directly on this branch (excludes inherited).
    pub fn own_entry_count(&self, branch: BranchId) -> usize {
        self.branches
            .read()
            .get(&branch)
            .map(|pages| pages.entries.len())
            .unwrap_or(0)
    }

    /// Detach a branch, returning the pages it uniquely owned.
    ///
    /// Called by the garbage collector after tombstoning. The returned
    /// pages still hold their owner reference; the collector releases them
    /// and defers to in-flight reader pins.
    pub fn detach_branch(&self, branch: BranchId) -> Vec<PageId> {
        let mut branches = self.branches.write();
        match branches.remove(&branch) {
            Some(pages) => pages.entries.into_values().collect(),
            None => Vec::new(),
        }
    }
}

impl Default for BranchStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_root() -> (BranchStore, BranchId) {
        let store = BranchStore::new();
        let root = BranchId::new();
        store.register_branch(root, None);
        (store, root)
    }

    #[test]
    fn write_then_read() {
        let (store, root) = store_with_root();
        store
            .write(root, PrimitiveTag::Kv, Key::from("k1"), Value::from("v1"))
            .unwrap();
        assert_eq!(
            store.get(root, PrimitiveTag::Kv, &Key::from("k1")),
            Some(Value::from("v1"))
        );
    }

    #[test]
    fn read_unknown_key_is_none() {
        let (store, root) = store_with_root();
        assert_eq!(store.get(root, PrimitiveTag::Kv, &Key::from("missing")), None);
    }

    #[test]
    fn tags_namespace_keys() {
        let (store, root) = store_with_root();
        store
            .write(root, PrimitiveTag::Kv, Key::from("x"), Value::Int(1))
            .unwrap();
        store
            .write(root, PrimitiveTag::State, Key::from("x"), Value::Int(2))
            .unwrap();
        assert_eq!(
            store.get(root, PrimitiveTag::Kv, &Key::from("x")),
            Some(Value::Int(1))
        );
        assert_eq!(
            store.get(root, PrimitiveTag::State, &Key::from("x")),
            Some(Value::Int(2))
        );
    }

    #[test]
    fn child_mirrors_parent_until_divergence() {
        let (store, root) = store_with_root();
        store
            .write(root, PrimitiveTag::Kv, Key::from("k1"), Value::from("v1"))
            .unwrap();

        let child = BranchId::new();
        store.register_branch(child, Some(root));

        // Inherited read, no copy.
        assert_eq!(
            store.get(child, PrimitiveTag::Kv, &Key::from("k1")),
            Some(Value::from("v1"))
        );
        assert_eq!(store.own_entry_count(child), 0);

        // Divergent write isolates the child without touching the parent.
        store
            .write(child, PrimitiveTag::Kv, Key::from("k1"), Value::from("v2"))
            .unwrap();
        assert_eq!(
            store.get(child, PrimitiveTag::Kv, &Key::from("k1")),
            Some(Value::from("v2"))
        );
        assert_eq!(
            store.get(root, PrimitiveTag::Kv, &Key::from("k1")),
            Some(Value::from("v1"))
        );
    }

    #[test]
    fn grandchild_walks_whole_chain() {
        let (store, root) = store_with_root();
        store
            .write(root, PrimitiveTag::Kv, Key::from("deep"), Value::Int(9))
            .unwrap();

        let child = BranchId::new();
        store.register_branch(child, Some(root));
        let grandchild = BranchId::new();
        store.register_branch(grandchild, Some(child));

        assert_eq!(
            store.get(grandchild, PrimitiveTag::Kv, &Key::from("deep")),
            Some(Value::Int(9))
        );
    }

    #[test]
    fn overwrite_releases_previous_page() {
        let (store, root) = store_with_root();
        store
            .write(root, PrimitiveTag::Kv, Key::from("k"), Value::Int(1))
            .unwrap();
        let first = store
            .resolve_page(root, PrimitiveTag::Kv, &Key::from("k"))
            .unwrap();
        store
            .write(root, PrimitiveTag::Kv, Key::from("k"), Value::Int(2))
            .unwrap();
        assert!(!store.arena().contains(first));
    }

    #[test]
    fn detach_returns_owned_pages_only() {
        let (store, root) = store_with_root();
        store
            .write(root, PrimitiveTag::Kv, Key::from("base"), Value::Int(1))
            .unwrap();

        let child = BranchId::new();
        store.register_branch(child, Some(root));
        store
            .write(child, PrimitiveTag::Kv, Key::from("own"), Value::Int(2))
            .unwrap();

        let pages = store.detach_branch(child);
        assert_eq!(pages.len(), 1);
        // Parent data untouched.
        assert_eq!(
            store.get(root, PrimitiveTag::Kv, &Key::from("base")),
            Some(Value::Int(1))
        );
    }

    #[test]
    fn write_to_unregistered_branch_errors() {
        let store = BranchStore::new();
        let err = store
            .write(BranchId::new(), PrimitiveTag::Kv, Key::from("k"), Value::Null)
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }
}
