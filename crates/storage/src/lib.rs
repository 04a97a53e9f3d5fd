//! In-memory storage layer for Sediment.
//!
//! This crate implements the store every primitive reads from:
//! - PageArena: reference-counted pages behind stable ids
//! - BranchStore: per-branch key maps with copy-on-write parent-chain lookup
//! - BranchPointerTable: active-branch pointer and live reference counts
//!
//! Durability lives elsewhere; nothing in this crate performs disk I/O.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arena;
pub mod branch_store;
pub mod pointer_table;

pub use arena::{PageArena, PageId, PagePin, ReleaseOutcome};
pub use branch_store::BranchStore;
pub use pointer_table::BranchPointerTable;
