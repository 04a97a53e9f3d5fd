//! Convenience re-exports for common usage.
//!
//! ```no_run
//! use sediment::prelude::*;
//!
//! # fn main() -> sediment::Result<()> {
//! let db = Sediment::ephemeral()?;
//! db.set("key", Value::from("value"))?;
//! # Ok(())
//! # }
//! ```

pub use crate::database::{Receipt, Sediment, SedimentBuilder};
pub use crate::error::{Error, Result};
pub use sediment_core::{BranchId, BranchInfo, BranchState, Key, PrimitiveTag, Value};
pub use sediment_engine::{DurabilityMode, ReclamationStatus};
