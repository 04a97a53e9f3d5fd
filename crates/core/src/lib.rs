//! Core types for the Sediment persistence substrate.
//!
//! This crate defines the vocabulary shared by every layer of the store:
//! identifiers, values, the branch lifecycle, and the error taxonomy.
//! It has no I/O of its own.

pub mod branch;
pub mod error;
pub mod types;
pub mod value;

pub use branch::{BranchInfo, BranchState};
pub use error::{Error, Result};
pub use types::{BranchId, Key, PrimitiveTag, SequenceNumber};
pub use value::Value;
