//! Branch lifecycle types.
//!
//! A branch is a copy-on-write snapshot of the whole dataset. Branches form
//! a tree via parent links and move through a strict lifecycle:
//!
//! ```text
//! Active ⇄ Inactive → Tombstoned → Reclaimed
//! ```
//!
//! - create spawns `Inactive` (or `Active` if it is the first branch)
//! - switch flips `Inactive → Active` for the target and `Active → Inactive`
//!   for the previous branch
//! - delete marks `Inactive → Tombstoned`; only legal for non-active
//!   branches without live descendants
//! - reclaim (`Tombstoned → Reclaimed`) is performed by the garbage
//!   collector and is terminal

use crate::types::{BranchId, SequenceNumber};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BranchState {
    /// The branch all unscoped operations target
    Active,
    /// Live but not the active branch
    Inactive,
    /// Soft-deleted; rejects new reads and writes, storage awaits reclamation
    Tombstoned,
    /// Storage reclaimed; terminal
    Reclaimed,
}

impl BranchState {
    /// Whether new reads and writes are accepted in this state.
    pub fn accepts_operations(&self) -> bool {
        matches!(self, BranchState::Active | BranchState::Inactive)
    }

    /// Whether this branch still pins storage (anything before `Reclaimed`).
    pub fn holds_storage(&self) -> bool {
        !matches!(self, BranchState::Reclaimed)
    }

    /// String representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BranchState::Active => "Active",
            BranchState::Inactive => "Inactive",
            BranchState::Tombstoned => "Tombstoned",
            BranchState::Reclaimed => "Reclaimed",
        }
    }
}

impl std::fmt::Display for BranchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metadata for one branch in the lineage tree.
///
/// Created on branch create, mutated only by lifecycle transitions, never
/// physically removed until reclamation completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchInfo {
    /// Branch identifier
    pub id: BranchId,
    /// Human-readable name, unique among live branches
    pub name: String,
    /// Parent in the lineage tree (None for the root branch)
    pub parent: Option<BranchId>,
    /// Store sequence number at creation (the divergence point)
    pub created_seq: SequenceNumber,
    /// Lifecycle state
    pub state: BranchState,
}

impl BranchInfo {
    /// Metadata for a freshly created branch.
    pub fn new(
        id: BranchId,
        name: impl Into<String>,
        parent: Option<BranchId>,
        created_seq: SequenceNumber,
        state: BranchState,
    ) -> Self {
        BranchInfo {
            id,
            name: name.into(),
            parent,
            created_seq,
            state,
        }
    }

    /// Soft-delete this branch. Visible to subsequent lookups immediately.
    pub fn tombstone(&mut self) {
        self.state = BranchState::Tombstoned;
    }

    /// Advance to the terminal `Reclaimed` state.
    pub fn reclaim(&mut self) {
        self.state = BranchState::Reclaimed;
    }

    /// Whether the branch is tombstoned (deleted but not yet reclaimed).
    pub fn is_tombstoned(&self) -> bool {
        self.state == BranchState::Tombstoned
    }

    /// Whether the branch accepts new reads and writes.
    pub fn is_live(&self) -> bool {
        self.state.accepts_operations()
    }
}
