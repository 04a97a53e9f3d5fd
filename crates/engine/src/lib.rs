//! Database engine for Sediment.
//!
//! Composes the storage and durability layers into an embedded store:
//! - [`Database`]: write/read paths, per-write durability, receipts
//! - [`BranchManager`]: branch lifecycle and lineage validation
//! - [`GarbageCollector`]: asynchronous reclamation of deleted branches
//! - recovery: WAL replay into a consistent in-memory state

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod branches;
pub mod config;
pub mod control;
pub mod database;
pub mod gc;
pub mod recovery;

pub use branches::BranchManager;
pub use config::{DatabaseBuilder, DatabaseConfig, DEFAULT_SEGMENT_SIZE};
pub use control::{ControlRecord, WritePayload};
pub use database::{Database, ReclamationStatus, DEFAULT_BRANCH};
pub use gc::GarbageCollector;
pub use recovery::{rebuild, RecoveredState, RecoveredWrite};

// The durability vocabulary is part of this crate's API surface.
pub use sediment_durability::{DurabilityMode, Receipt, WalCounters};
