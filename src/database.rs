//! Main database entry point for Sediment.

use crate::error::{Error, Result};
use sediment_core::{BranchId, BranchInfo, Key, PrimitiveTag, SequenceNumber, Value};
use sediment_engine::{DurabilityMode, ReclamationStatus};
use std::path::Path;
use std::sync::Arc;

use sediment_durability::Receipt as EngineReceipt;

/// The Sediment database.
///
/// The main entry point for all operations. Create one with
/// [`Sediment::open`], [`Sediment::ephemeral`], or [`Sediment::builder`].
///
/// # Example
///
/// ```no_run
/// use sediment::prelude::*;
///
/// # fn main() -> sediment::Result<()> {
/// let db = Sediment::open("./my-store")?;
///
/// db.set("user:1", Value::from("Alice"))?;
/// let name = db.get("user:1")?;
///
/// db.create_branch("experiment")?;
/// db.switch_branch("experiment")?;
///
/// db.close()?;
/// # Ok(())
/// # }
/// ```
pub struct Sediment {
    inner: Arc<sediment_engine::Database>,
}

/// Acknowledgement handle for a submitted write.
///
/// Resolution timing depends on the write's durability mode: immediate for
/// `NoDurability` and `Strict`, after the shared flush for `Buffered`.
pub struct Receipt {
    inner: EngineReceipt,
}

impl Receipt {
    /// Block until the write is acknowledged, returning its sequence
    /// number.
    pub fn wait(self) -> Result<SequenceNumber> {
        self.inner.wait().map_err(Error::from)
    }
}

impl Sediment {
    /// Open a database at the given path with buffered durability.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Sediment {
            inner: Arc::new(sediment_engine::Database::open(path)?),
        })
    }

    /// Create an ephemeral database with no disk I/O.
    ///
    /// Creates no files, keeps no WAL, and loses everything when dropped.
    /// Useful for tests and temporary computations.
    ///
    /// | Method | Disk files | Survives restart |
    /// |--------|------------|------------------|
    /// | `Sediment::ephemeral()` | None | No |
    /// | `Sediment::open_temp()` | Temp dir | Until dropped |
    /// | `Sediment::open(path)`  | User dir | Yes |
    pub fn ephemeral() -> Result<Self> {
        Ok(Sediment {
            inner: Arc::new(sediment_engine::Database::ephemeral()?),
        })
    }

    /// Open a durable database in a temporary directory removed on drop.
    pub fn open_temp() -> Result<Self> {
        Ok(Sediment {
            inner: Arc::new(sediment_engine::Database::open_temp()?),
        })
    }

    /// Create a builder for database configuration.
    ///
    /// ```no_run
    /// # use sediment::Sediment;
    /// # fn main() -> sediment::Result<()> {
    /// let db = Sediment::builder()
    ///     .path("./my-store")
    ///     .strict()
    ///     .open()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn builder() -> SedimentBuilder {
        SedimentBuilder {
            inner: sediment_engine::Database::builder(),
        }
    }

    // ---- data operations ----

    /// Set a key on the active branch, waiting for acknowledgement under
    /// the store's default durability mode.
    pub fn set(&self, key: impl Into<Key>, value: Value) -> Result<SequenceNumber> {
        self.inner
            .put(PrimitiveTag::Kv, key, value)?
            .wait()
            .map_err(Error::from)
    }

    /// Submit a write with an explicit primitive tag and durability mode,
    /// returning a receipt instead of waiting.
    pub fn submit(
        &self,
        tag: PrimitiveTag,
        key: impl Into<Key>,
        value: Value,
        mode: DurabilityMode,
    ) -> Result<Receipt> {
        let branch = self.inner.active_branch()?.id;
        let receipt = self.inner.put_on(branch, tag, key.into(), value, mode)?;
        Ok(Receipt { inner: receipt })
    }

    /// Get a key from the active branch.
    pub fn get(&self, key: impl Into<Key>) -> Result<Option<Value>> {
        self.inner
            .get(PrimitiveTag::Kv, &key.into())
            .map_err(Error::from)
    }

    /// Get a key under a specific primitive tag from the active branch.
    pub fn get_tagged(&self, tag: PrimitiveTag, key: impl Into<Key>) -> Result<Option<Value>> {
        self.inner.get(tag, &key.into()).map_err(Error::from)
    }

    // ---- branch operations ----

    /// Create a branch of the active branch. O(1); no data is copied.
    pub fn create_branch(&self, name: &str) -> Result<()> {
        self.inner.create_branch(name)?;
        Ok(())
    }

    /// Create a branch of a specific live base branch without switching to
    /// it first. Fails for unknown or deleted bases.
    pub fn create_branch_from(&self, name: &str, base: BranchId) -> Result<()> {
        self.inner.create_branch_from(name, base)?;
        Ok(())
    }

    /// Make the named branch active.
    pub fn switch_branch(&self, name: &str) -> Result<()> {
        self.inner.switch_branch(name)?;
        Ok(())
    }

    /// Delete the named branch. Returns immediately; storage is reclaimed
    /// in the background.
    pub fn delete_branch(&self, name: &str) -> Result<()> {
        self.inner.delete_branch(name).map_err(Error::from)
    }

    /// The active branch's metadata.
    pub fn current_branch(&self) -> Result<BranchInfo> {
        self.inner.active_branch().map_err(Error::from)
    }

    /// All branches, including deleted ones awaiting reclamation.
    pub fn list_branches(&self) -> Vec<BranchInfo> {
        self.inner.list_branches()
    }

    /// Reclamation progress for the branch previously known by `name`'s
    /// id. See [`ReclamationStatus`].
    pub fn reclamation_status(&self, id: BranchId) -> ReclamationStatus {
        self.inner.reclamation_status(id)
    }

    // ---- maintenance ----

    /// Flush pending buffered writes and force the log.
    pub fn flush(&self) -> Result<()> {
        self.inner.flush().map_err(Error::from)
    }

    /// Cumulative WAL counters (all zero for an ephemeral store).
    pub fn wal_counters(&self) -> sediment_durability::WalCounters {
        self.inner.wal_counters()
    }

    /// Flush and shut down background workers.
    pub fn close(self) -> Result<()> {
        self.inner.shutdown().map_err(Error::from)
    }

    /// Access the underlying engine database.
    ///
    /// Escape hatch for branch-scoped operations and explicit durability
    /// control beyond the facade.
    pub fn engine(&self) -> &sediment_engine::Database {
        &self.inner
    }
}

/// Builder for [`Sediment`] instances.
pub struct SedimentBuilder {
    inner: sediment_engine::DatabaseBuilder,
}

impl SedimentBuilder {
    /// Set the data directory, making the store durable.
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.inner = self.inner.path(path.as_ref());
        self
    }

    /// Default writes to no-durability acknowledgement.
    pub fn no_durability(mut self) -> Self {
        self.inner = self.inner.no_durability();
        self
    }

    /// Default writes to buffered durability with recommended settings.
    pub fn buffered(mut self) -> Self {
        self.inner = self.inner.buffered();
        self
    }

    /// Default writes to buffered durability with explicit settings.
    pub fn buffered_with(mut self, window_ms: u64, max_batch: usize) -> Self {
        self.inner = self.inner.buffered_with(window_ms, max_batch);
        self
    }

    /// Default writes to strict (fsync-per-write) durability.
    pub fn strict(mut self) -> Self {
        self.inner = self.inner.strict();
        self
    }

    /// Override the WAL segment rollover threshold.
    pub fn segment_size(mut self, bytes: u64) -> Self {
        self.inner = self.inner.segment_size(bytes);
        self
    }

    /// Open the database.
    pub fn open(self) -> Result<Sediment> {
        Ok(Sediment {
            inner: Arc::new(self.inner.open()?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_roundtrip() {
        let db = Sediment::ephemeral().unwrap();
        db.set("k", Value::from("v")).unwrap();
        assert_eq!(db.get("k").unwrap(), Some(Value::from("v")));
    }

    #[test]
    fn missing_key_is_none() {
        let db = Sediment::ephemeral().unwrap();
        assert_eq!(db.get("nope").unwrap(), None);
    }

    #[test]
    fn branch_round_trip_through_facade() {
        let db = Sediment::ephemeral().unwrap();
        db.set("k", Value::Int(1)).unwrap();

        db.create_branch("dev").unwrap();
        db.switch_branch("dev").unwrap();
        db.set("k", Value::Int(2)).unwrap();
        assert_eq!(db.get("k").unwrap(), Some(Value::Int(2)));

        db.switch_branch("main").unwrap();
        assert_eq!(db.get("k").unwrap(), Some(Value::Int(1)));
    }

    #[test]
    fn submit_returns_receipt() {
        let db = Sediment::ephemeral().unwrap();
        let receipt = db
            .submit(
                PrimitiveTag::State,
                "cell",
                Value::Int(7),
                DurabilityMode::NoDurability,
            )
            .unwrap();
        receipt.wait().unwrap();
        assert_eq!(
            db.get_tagged(PrimitiveTag::State, "cell").unwrap(),
            Some(Value::Int(7))
        );
    }

    #[test]
    fn close_is_clean() {
        let db = Sediment::ephemeral().unwrap();
        db.set("k", Value::Null).unwrap();
        db.close().unwrap();
    }
}
