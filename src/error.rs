//! Unified error types for Sediment.
//!
//! Wraps internal errors and presents a stable interface to users; the
//! internal taxonomy can evolve without breaking callers.

use thiserror::Error;

/// All Sediment errors.
///
/// The canonical error type for the public API.
#[derive(Debug, Error)]
pub enum Error {
    /// Entity not found (key or value)
    #[error("not found: {0}")]
    NotFound(String),

    /// Named branch does not exist
    #[error("branch not found: {0}")]
    BranchNotFound(String),

    /// Illegal branch lifecycle transition: deleting the active branch,
    /// deleting a branch with live descendants, operating on a deleted
    /// branch
    #[error("invalid branch operation: {0}")]
    InvalidBranchOperation(String),

    /// Log corruption detected and handled during recovery
    #[error("corruption: {0}")]
    Corruption(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal error (bug or invariant violation)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for Sediment operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this is a not-found error (key or branch).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::BranchNotFound(_))
    }

    /// Check if this is a branch-lifecycle violation.
    pub fn is_branch_error(&self) -> bool {
        matches!(
            self,
            Error::BranchNotFound(_) | Error::InvalidBranchOperation(_)
        )
    }

    /// Check if this is a serious/unrecoverable error.
    pub fn is_serious(&self) -> bool {
        matches!(self, Error::Internal(_) | Error::Corruption(_))
    }
}

// Convert from internal core errors
impl From<sediment_core::Error> for Error {
    fn from(e: sediment_core::Error) -> Self {
        use sediment_core::Error as CoreError;
        match e {
            CoreError::Io(io_err) => Error::Io(io_err),
            CoreError::Corruption(msg) => Error::Corruption(msg),
            CoreError::InvalidBranchOperation(msg) => Error::InvalidBranchOperation(msg),
            CoreError::BranchNotFound(name) => Error::BranchNotFound(name),
            CoreError::NotFound(key) => Error::NotFound(key),
            CoreError::Serialization(msg) => Error::Serialization(msg),
            CoreError::ReclamationFailure(msg) => Error::Internal(msg),
            CoreError::Internal(msg) => Error::Internal(msg),
        }
    }
}
