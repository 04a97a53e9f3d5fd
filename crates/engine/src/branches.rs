//! Branch metadata and lifecycle validation.
//!
//! The manager owns the lineage tree: every branch's [`BranchInfo`] plus a
//! name index over live branches. Lifecycle rules enforced here:
//!
//! - names are unique among live branches; a tombstone frees its name
//! - delete is rejected for a branch with live descendants (no cascade)
//! - tombstoned and reclaimed branches reject further operations
//!
//! The active pointer itself lives in the storage layer's pointer table;
//! callers coordinate the two.

use parking_lot::RwLock;
use sediment_core::{BranchId, BranchInfo, BranchState, Error, Result, SequenceNumber};
use std::collections::HashMap;

struct ManagerInner {
    branches: HashMap<BranchId, BranchInfo>,
    names: HashMap<String, BranchId>,
}

/// Owner of branch metadata and lifecycle transitions.
pub struct BranchManager {
    inner: RwLock<ManagerInner>,
}

impl BranchManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        BranchManager {
            inner: RwLock::new(ManagerInner {
                branches: HashMap::new(),
                names: HashMap::new(),
            }),
        }
    }

    /// Create a branch. O(1): records metadata only, copies no data.
    pub fn create(
        &self,
        name: impl Into<String>,
        parent: Option<BranchId>,
        created_seq: SequenceNumber,
        state: BranchState,
    ) -> Result<BranchId> {
        let name = name.into();
        let mut inner = self.inner.write();

        if inner.names.contains_key(&name) {
            return Err(Error::InvalidBranchOperation(format!(
                "branch name '{name}' is already in use"
            )));
        }
        if let Some(parent_id) = parent {
            let parent_info = inner
                .branches
                .get(&parent_id)
                .ok_or_else(|| Error::BranchNotFound(parent_id.to_string()))?;
            if !parent_info.is_live() {
                return Err(Error::InvalidBranchOperation(format!(
                    "cannot branch from {} branch '{}'",
                    parent_info.state, parent_info.name
                )));
            }
        }

        let id = BranchId::new();
        inner.names.insert(name.clone(), id);
        inner
            .branches
            .insert(id, BranchInfo::new(id, name, parent, created_seq, state));
        Ok(id)
    }

    /// Install metadata rebuilt by recovery, bypassing name validation for
    /// tombstoned entries (their names were already freed).
    pub fn install(&self, info: BranchInfo) {
        let mut inner = self.inner.write();
        if info.is_live() {
            inner.names.insert(info.name.clone(), info.id);
        }
        inner.branches.insert(info.id, info);
    }

    /// Metadata snapshot for a branch.
    pub fn get(&self, id: BranchId) -> Option<BranchInfo> {
        self.inner.read().branches.get(&id).cloned()
    }

    /// Resolve a live branch by name.
    pub fn resolve(&self, name: &str) -> Result<BranchId> {
        self.inner
            .read()
            .names
            .get(name)
            .copied()
            .ok_or_else(|| Error::BranchNotFound(name.to_string()))
    }

    /// Current lifecycle state of a branch.
    pub fn state(&self, id: BranchId) -> Option<BranchState> {
        self.inner.read().branches.get(&id).map(|info| info.state)
    }

    /// Whether any live branch names `id` as its parent. Tombstoned
    /// descendants do not count: they reject all operations, so they can
    /// never read through a reclaimed parent.
    pub fn has_live_descendants(&self, id: BranchId) -> bool {
        let inner = self.inner.read();
        inner
            .branches
            .values()
            .any(|info| info.parent == Some(id) && info.is_live())
    }

    /// Flip the active/inactive pair for a switch. Both transitions happen
    /// under one lock so no observer sees two active branches.
    pub fn activate(&self, target: BranchId, previous: Option<BranchId>) -> Result<()> {
        let mut inner = self.inner.write();
        {
            let info = inner
                .branches
                .get_mut(&target)
                .ok_or_else(|| Error::BranchNotFound(target.to_string()))?;
            if !info.is_live() {
                return Err(Error::InvalidBranchOperation(format!(
                    "cannot switch to {} branch '{}'",
                    info.state, info.name
                )));
            }
            info.state = BranchState::Active;
        }
        if let Some(prev) = previous {
            if prev != target {
                if let Some(info) = inner.branches.get_mut(&prev) {
                    if info.state == BranchState::Active {
                        info.state = BranchState::Inactive;
                    }
                }
            }
        }
        Ok(())
    }

    /// Soft-delete a branch. Rejected while descendants are live; the
    /// caller is responsible for rejecting the active branch first.
    pub fn tombstone(&self, id: BranchId) -> Result<()> {
        if self.has_live_descendants(id) {
            return Err(Error::InvalidBranchOperation(
                "cannot delete a branch with live descendants".into(),
            ));
        }
        let mut inner = self.inner.write();
        let info = inner
            .branches
            .get_mut(&id)
            .ok_or_else(|| Error::BranchNotFound(id.to_string()))?;
        match info.state {
            BranchState::Active => {
                return Err(Error::InvalidBranchOperation(format!(
                    "cannot delete the active branch '{}'",
                    info.name
                )))
            }
            BranchState::Tombstoned | BranchState::Reclaimed => {
                return Err(Error::InvalidBranchOperation(format!(
                    "branch '{}' is already deleted",
                    info.name
                )))
            }
            BranchState::Inactive => {}
        }
        info.tombstone();
        let name = info.name.clone();
        inner.names.remove(&name);
        Ok(())
    }

    /// Terminal transition, performed by the garbage collector.
    pub fn mark_reclaimed(&self, id: BranchId) {
        if let Some(info) = self.inner.write().branches.get_mut(&id) {
            info.reclaim();
        }
    }

    /// All branch metadata, in no particular order.
    pub fn list(&self) -> Vec<BranchInfo> {
        self.inner.read().branches.values().cloned().collect()
    }

    /// Ids of all tombstoned branches (reclamation backlog).
    pub fn tombstoned(&self) -> Vec<BranchId> {
        self.inner
            .read()
            .branches
            .values()
            .filter(|info| info.is_tombstoned())
            .map(|info| info.id)
            .collect()
    }
}

impl Default for BranchManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with_root() -> (BranchManager, BranchId) {
        let manager = BranchManager::new();
        let root = manager
            .create("main", None, 0, BranchState::Active)
            .unwrap();
        (manager, root)
    }

    #[test]
    fn create_records_lineage() {
        let (manager, root) = manager_with_root();
        let child = manager
            .create("dev", Some(root), 5, BranchState::Inactive)
            .unwrap();
        let info = manager.get(child).unwrap();
        assert_eq!(info.parent, Some(root));
        assert_eq!(info.created_seq, 5);
        assert_eq!(info.state, BranchState::Inactive);
    }

    #[test]
    fn duplicate_live_name_rejected() {
        let (manager, root) = manager_with_root();
        manager
            .create("dev", Some(root), 1, BranchState::Inactive)
            .unwrap();
        let err = manager
            .create("dev", Some(root), 2, BranchState::Inactive)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidBranchOperation(_)));
    }

    #[test]
    fn tombstone_frees_name_for_reuse() {
        let (manager, root) = manager_with_root();
        let dev = manager
            .create("dev", Some(root), 1, BranchState::Inactive)
            .unwrap();
        manager.tombstone(dev).unwrap();
        assert!(manager.resolve("dev").is_err());

        let reborn = manager
            .create("dev", Some(root), 2, BranchState::Inactive)
            .unwrap();
        assert_ne!(reborn, dev);
    }

    #[test]
    fn cannot_delete_active_branch() {
        let (manager, root) = manager_with_root();
        let err = manager.tombstone(root).unwrap_err();
        assert!(matches!(err, Error::InvalidBranchOperation(_)));
    }

    #[test]
    fn cannot_delete_branch_with_live_descendants() {
        let (manager, root) = manager_with_root();
        let mid = manager
            .create("mid", Some(root), 1, BranchState::Inactive)
            .unwrap();
        manager
            .create("leaf", Some(mid), 2, BranchState::Inactive)
            .unwrap();

        let err = manager.tombstone(mid).unwrap_err();
        assert!(matches!(err, Error::InvalidBranchOperation(_)));
    }

    #[test]
    fn delete_allowed_once_descendants_are_gone() {
        let (manager, root) = manager_with_root();
        let mid = manager
            .create("mid", Some(root), 1, BranchState::Inactive)
            .unwrap();
        let leaf = manager
            .create("leaf", Some(mid), 2, BranchState::Inactive)
            .unwrap();

        manager.tombstone(leaf).unwrap();
        manager.tombstone(mid).unwrap();
        assert_eq!(manager.state(mid), Some(BranchState::Tombstoned));
    }

    #[test]
    fn double_delete_rejected() {
        let (manager, root) = manager_with_root();
        let dev = manager
            .create("dev", Some(root), 1, BranchState::Inactive)
            .unwrap();
        manager.tombstone(dev).unwrap();
        assert!(manager.tombstone(dev).is_err());
    }

    #[test]
    fn switch_flips_both_states_atomically() {
        let (manager, root) = manager_with_root();
        let dev = manager
            .create("dev", Some(root), 1, BranchState::Inactive)
            .unwrap();

        manager.activate(dev, Some(root)).unwrap();
        assert_eq!(manager.state(dev), Some(BranchState::Active));
        assert_eq!(manager.state(root), Some(BranchState::Inactive));
    }

    #[test]
    fn cannot_switch_to_tombstoned_branch() {
        let (manager, root) = manager_with_root();
        let dev = manager
            .create("dev", Some(root), 1, BranchState::Inactive)
            .unwrap();
        manager.tombstone(dev).unwrap();
        assert!(manager.activate(dev, Some(root)).is_err());
    }

    #[test]
    fn cannot_branch_from_tombstoned_parent() {
        let (manager, root) = manager_with_root();
        let dev = manager
            .create("dev", Some(root), 1, BranchState::Inactive)
            .unwrap();
        manager.tombstone(dev).unwrap();
        assert!(manager
            .create("child", Some(dev), 2, BranchState::Inactive)
            .is_err());
    }

    #[test]
    fn tombstoned_backlog_lists_pending_reclamation() {
        let (manager, root) = manager_with_root();
        let dev = manager
            .create("dev", Some(root), 1, BranchState::Inactive)
            .unwrap();
        assert!(manager.tombstoned().is_empty());

        manager.tombstone(dev).unwrap();
        assert_eq!(manager.tombstoned(), vec![dev]);

        manager.mark_reclaimed(dev);
        assert!(manager.tombstoned().is_empty());
    }
}
