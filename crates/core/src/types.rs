//! Fundamental identifiers used throughout the system:
//! - [`BranchId`]: unique identifier for a dataset branch
//! - [`PrimitiveTag`]: which logical primitive an operation belongs to
//! - [`Key`]: user-visible key within one primitive's namespace

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Monotonically increasing per-store sequence number.
///
/// Assigned to every write intent at submission time; WAL records for a
/// single branch are appended and flushed in sequence order.
pub type SequenceNumber = u64;

/// Unique identifier for a branch of the dataset.
///
/// Branches form a lineage tree via parent links. The id appears in:
/// - WAL records, for replay scoping
/// - the branch pointer table
/// - storage maps, for copy-on-write isolation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BranchId(Uuid);

impl BranchId {
    /// Create a new random BranchId using UUID v4.
    pub fn new() -> Self {
        BranchId(Uuid::new_v4())
    }

    /// Create a BranchId from raw bytes.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        BranchId(Uuid::from_bytes(bytes))
    }

    /// Raw bytes representation (used in the WAL record framing).
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for BranchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BranchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The logical primitive an operation belongs to.
///
/// Every write intent and WAL record carries a tag so that replay can route
/// payloads back to the right primitive. `Control` is reserved for the
/// engine's own branch-metadata records; it never appears on the
/// primitive-facing API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveTag {
    /// Key-value store
    Kv,
    /// Scalar state cell
    State,
    /// Append-only event log
    Event,
    /// Hierarchical document store
    Json,
    /// Vector index
    Vector,
    /// Engine-internal branch metadata record
    Control,
}

impl PrimitiveTag {
    /// All tags (for iteration in tests and introspection).
    pub const ALL: [PrimitiveTag; 6] = [
        PrimitiveTag::Kv,
        PrimitiveTag::State,
        PrimitiveTag::Event,
        PrimitiveTag::Json,
        PrimitiveTag::Vector,
        PrimitiveTag::Control,
    ];

    /// Single-byte encoding used in the WAL record framing.
    pub fn as_u8(&self) -> u8 {
        match self {
            PrimitiveTag::Kv => 0,
            PrimitiveTag::State => 1,
            PrimitiveTag::Event => 2,
            PrimitiveTag::Json => 3,
            PrimitiveTag::Vector => 4,
            PrimitiveTag::Control => 5,
        }
    }

    /// Decode from the WAL byte encoding.
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(PrimitiveTag::Kv),
            1 => Some(PrimitiveTag::State),
            2 => Some(PrimitiveTag::Event),
            3 => Some(PrimitiveTag::Json),
            4 => Some(PrimitiveTag::Vector),
            5 => Some(PrimitiveTag::Control),
            _ => None,
        }
    }

    /// Lowercase name, stable across releases.
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveTag::Kv => "kv",
            PrimitiveTag::State => "state",
            PrimitiveTag::Event => "event",
            PrimitiveTag::Json => "json",
            PrimitiveTag::Vector => "vector",
            PrimitiveTag::Control => "control",
        }
    }

    /// Whether this tag is reserved for engine-internal records.
    pub fn is_control(&self) -> bool {
        matches!(self, PrimitiveTag::Control)
    }
}

impl std::fmt::Display for PrimitiveTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User-visible key within one primitive's namespace.
///
/// Keys are only unique per (branch, primitive tag) pair; the storage layer
/// namespaces them accordingly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key(String);

impl Key {
    /// Create a key from anything string-like.
    pub fn new(key: impl Into<String>) -> Self {
        Key(key.into())
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key(s)
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_ids_are_unique() {
        let a = BranchId::new();
        let b = BranchId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn branch_id_byte_roundtrip() {
        let id = BranchId::new();
        let bytes = *id.as_bytes();
        assert_eq!(BranchId::from_bytes(bytes), id);
    }

    #[test]
    fn primitive_tag_byte_roundtrip() {
        for tag in PrimitiveTag::ALL {
            assert_eq!(PrimitiveTag::from_u8(tag.as_u8()), Some(tag));
        }
        assert_eq!(PrimitiveTag::from_u8(0xFF), None);
    }

    #[test]
    fn only_control_is_control() {
        for tag in PrimitiveTag::ALL {
            assert_eq!(tag.is_control(), tag == PrimitiveTag::Control);
        }
    }

    #[test]
    fn key_conversions() {
        let a = Key::from("user:1");
        let b = Key::new(String::from("user:1"));
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "user:1");
    }
}
