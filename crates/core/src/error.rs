//! Error taxonomy for the persistence substrate.
//!
//! Propagation policy:
//! - durability/I-O failures go to the caller of the specific write
//! - branch-lifecycle violations go to the caller of the branch operation
//! - GC and corruption-on-unused-segment failures are handled internally
//!   (logged and retried), never failing an unrelated caller

use thiserror::Error;

/// All substrate errors.
#[derive(Debug, Error)]
pub enum Error {
    /// WAL append or force-to-disk failed. Fatal to the triggering write
    /// only; the store keeps operating for other branches and operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Checksum mismatch or torn record detected on replay. Recoverable by
    /// truncating at the last valid record.
    #[error("corruption: {0}")]
    Corruption(String),

    /// Illegal branch lifecycle transition: deleting the active branch,
    /// deleting a branch with live descendants, operating on a tombstoned
    /// branch.
    #[error("invalid branch operation: {0}")]
    InvalidBranchOperation(String),

    /// Named branch does not exist.
    #[error("branch not found: {0}")]
    BranchNotFound(String),

    /// Unknown key on read.
    #[error("not found: {0}")]
    NotFound(String),

    /// Encoding or decoding of a payload or control record failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Garbage collection could not reclaim a branch's storage. Retried
    /// internally with backoff; never surfaced to primitive callers.
    #[error("reclamation failure: {0}")]
    ReclamationFailure(String),

    /// Bug or broken invariant.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for substrate operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Rebuild an I/O error so one failure can fail every receipt in a
    /// batch (`std::io::Error` is not `Clone`).
    pub fn io_again(kind: std::io::ErrorKind, message: impl Into<String>) -> Self {
        Error::Io(std::io::Error::new(kind, message.into()))
    }

    /// Check if this is a not-found error (key or branch).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::BranchNotFound(_))
    }

    /// Check if this error is retried internally rather than surfaced.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ReclamationFailure(_))
    }

    /// Check if this is a degraded-recovery condition rather than a fault
    /// in the caller's operation.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::Corruption(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_classification() {
        assert!(Error::NotFound("k".into()).is_not_found());
        assert!(Error::BranchNotFound("dev".into()).is_not_found());
        assert!(!Error::Corruption("tail".into()).is_not_found());
    }

    #[test]
    fn retryable_classification() {
        assert!(Error::ReclamationFailure("busy page".into()).is_retryable());
        assert!(!Error::Io(std::io::Error::other("fsync")).is_retryable());
    }

    #[test]
    fn io_again_preserves_kind() {
        let original = std::io::Error::new(std::io::ErrorKind::WriteZero, "disk full");
        let rebuilt = Error::io_again(original.kind(), original.to_string());
        match rebuilt {
            Error::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::WriteZero),
            other => panic!("expected Io, got {other:?}"),
        }
    }

    #[test]
    fn display_messages() {
        let err = Error::InvalidBranchOperation("cannot delete the active branch".into());
        assert_eq!(
            err.to_string(),
            "invalid branch operation: cannot delete the active branch"
        );
    }
}
