//! Crash recovery: rebuild engine state from a WAL replay.
//!
//! Replay yields records in physical append order, which is not globally
//! sequence-ordered: a strict write can reach the log ahead of a buffered
//! write submitted earlier. Data records are therefore applied under a
//! per-key sequence guard, keeping only the highest-sequence value each
//! key saw. Control records rebuild the branch tree, tombstone set, and
//! active pointer.

use crate::control::{ControlRecord, WritePayload};
use sediment_core::{
    BranchId, BranchInfo, BranchState, Error, Key, PrimitiveTag, Result, SequenceNumber, Value,
};
use sediment_durability::WalRecord;
use std::collections::HashMap;

/// One surviving data write, already deduplicated per key.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveredWrite {
    /// Branch the write targets
    pub branch: BranchId,
    /// Primitive that owns the key
    pub tag: PrimitiveTag,
    /// Key
    pub key: Key,
    /// Highest-sequence value the key saw
    pub value: Value,
    /// Sequence of that value
    pub sequence: SequenceNumber,
}

/// Engine state rebuilt from the log.
#[derive(Debug, Default)]
pub struct RecoveredState {
    /// Every branch the log knows about, including tombstoned ones
    pub branches: Vec<BranchInfo>,
    /// Active branch at the time of the last switch (None if never set)
    pub active: Option<BranchId>,
    /// Surviving data writes, one per (branch, tag, key)
    pub writes: Vec<RecoveredWrite>,
    /// Highest sequence seen anywhere in the log
    pub max_sequence: SequenceNumber,
}

impl RecoveredState {
    /// Whether the log contained anything at all.
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty() && self.writes.is_empty()
    }
}

/// Rebuild engine state from replayed records.
///
/// Unknown branches referenced by data records are tolerated (their
/// create record may have been lost to truncation); those writes are
/// dropped with a warning rather than failing recovery.
pub fn rebuild(records: &[WalRecord]) -> Result<RecoveredState> {
    let mut branches: HashMap<BranchId, BranchInfo> = HashMap::new();
    let mut active: Option<BranchId> = None;
    let mut latest: HashMap<(BranchId, PrimitiveTag, Key), (Value, SequenceNumber)> =
        HashMap::new();
    let mut max_sequence = 0;
    let mut orphaned = 0u64;

    for record in records {
        max_sequence = max_sequence.max(record.sequence);

        if record.tag.is_control() {
            apply_control(
                &ControlRecord::decode(&record.payload)?,
                &mut branches,
                &mut active,
            )?;
            continue;
        }

        let payload = WritePayload::decode(&record.payload)?;
        if !branches.contains_key(&record.branch_id) {
            orphaned += 1;
            continue;
        }

        let slot = (record.branch_id, record.tag, payload.key);
        match latest.get(&slot) {
            Some((_, existing)) if *existing > record.sequence => {}
            _ => {
                latest.insert(slot, (payload.value, record.sequence));
            }
        }
    }

    if orphaned > 0 {
        tracing::warn!(
            writes = orphaned,
            "dropped replayed writes for branches with no create record"
        );
    }

    let writes = latest
        .into_iter()
        .map(|((branch, tag, key), (value, sequence))| RecoveredWrite {
            branch,
            tag,
            key,
            value,
            sequence,
        })
        .collect();

    Ok(RecoveredState {
        branches: branches.into_values().collect(),
        active,
        writes,
        max_sequence,
    })
}

fn apply_control(
    control: &ControlRecord,
    branches: &mut HashMap<BranchId, BranchInfo>,
    active: &mut Option<BranchId>,
) -> Result<()> {
    match control {
        ControlRecord::BranchCreate {
            id,
            name,
            parent,
            created_seq,
        } => {
            branches.insert(
                *id,
                BranchInfo::new(*id, name.clone(), *parent, *created_seq, BranchState::Inactive),
            );
        }
        ControlRecord::BranchSwitch { id } => {
            if !branches.contains_key(id) {
                return Err(Error::Corruption(format!(
                    "switch record references unknown branch {id}"
                )));
            }
            *active = Some(*id);
        }
        ControlRecord::BranchDelete { id } => {
            if let Some(info) = branches.get_mut(id) {
                info.tombstone();
            }
        }
    }
    Ok(())
}
