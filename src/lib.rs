//! # Sediment
//!
//! Embedded multi-model data store: the durability and branch-management
//! core.
//!
//! Sediment stores typed values for several logical primitives behind one
//! write path with per-write durability control, git-like copy-on-write
//! branches over the whole dataset, and asynchronous reclamation of
//! deleted branches.
//!
//! ## Quick start
//!
//! ```no_run
//! use sediment::prelude::*;
//!
//! # fn main() -> sediment::Result<()> {
//! let db = Sediment::open("./my-store")?;
//!
//! // Writes acknowledge per the store's durability mode
//! db.set("user:1", Value::from("Alice"))?;
//!
//! // Branch the whole dataset in O(1), diverge, come back
//! db.create_branch("experiment")?;
//! db.switch_branch("experiment")?;
//! db.set("user:1", Value::from("Bob"))?;
//! db.switch_branch("main")?;
//! assert_eq!(db.get("user:1")?, Some(Value::from("Alice")));
//!
//! db.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Durability modes
//!
//! Every write carries a [`DurabilityMode`]:
//!
//! - `NoDurability` acknowledges immediately and never forces the disk
//! - `Buffered` coalesces concurrent writes into one fsync per window
//! - `Strict` forces the log before every acknowledgement
//!
//! Reads are identical under all three; only the acknowledgement timing
//! and crash-loss window differ.

#![warn(missing_docs)]

mod database;
mod error;

pub mod prelude;

// Re-export main entry points
pub use database::{Receipt, Sediment, SedimentBuilder};
pub use error::{Error, Result};

// Re-export the vocabulary types
pub use sediment_core::{BranchId, BranchInfo, BranchState, Key, PrimitiveTag, Value};
pub use sediment_engine::{DurabilityMode, ReclamationStatus};
