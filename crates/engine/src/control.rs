//! Engine-internal WAL payloads.
//!
//! Two payload families ride the log. Data records carry a key and value
//! for one primitive; control records carry branch metadata so lineage,
//! tombstones, and the active pointer survive restarts. Control records
//! are tagged [`PrimitiveTag::Control`] and never surface on the
//! primitive-facing API.

use sediment_core::{BranchId, Error, Key, Result, SequenceNumber, Value};
use serde::{Deserialize, Serialize};

/// Branch-metadata mutation, persisted in the ordinary WAL stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ControlRecord {
    /// A branch was created.
    BranchCreate {
        /// New branch id
        id: BranchId,
        /// Name, unique among live branches
        name: String,
        /// Parent branch (None for the root)
        parent: Option<BranchId>,
        /// Store sequence at the divergence point
        created_seq: SequenceNumber,
    },
    /// The active pointer moved to this branch.
    BranchSwitch {
        /// Newly active branch
        id: BranchId,
    },
    /// A branch was tombstoned.
    BranchDelete {
        /// Deleted branch
        id: BranchId,
    },
}

impl ControlRecord {
    /// Encode for the WAL.
    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Decode a control payload replayed from the WAL.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Serialization(e.to_string()))
    }
}

/// Data-record payload: one key and its new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WritePayload {
    /// Key within the primitive's namespace
    pub key: Key,
    /// New value
    pub value: Value,
}

impl WritePayload {
    /// Create a payload.
    pub fn new(key: Key, value: Value) -> Self {
        WritePayload { key, value }
    }

    /// Encode for the WAL.
    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Decode a data payload replayed from the WAL.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Serialization(e.to_string()))
    }
}
