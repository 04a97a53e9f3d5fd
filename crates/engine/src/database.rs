//! The database engine.
//!
//! Ties the layers together: the in-memory branch store serves every read,
//! the durability manager owns the WAL and acknowledgement policy, the
//! branch manager validates lifecycle transitions, and the garbage
//! collector reclaims tombstoned branches in the background.
//!
//! Write path: validate, assign a sequence number, apply to the in-memory
//! store, then hand a write intent to the durability manager. The returned
//! receipt resolves according to the write's durability mode. Read path:
//! in-memory lookup only; it never enters the durability layer and is
//! identical under every mode.

use crate::branches::BranchManager;
use crate::config::{DatabaseBuilder, DatabaseConfig};
use crate::control::{ControlRecord, WritePayload};
use crate::gc::GarbageCollector;
use crate::recovery;
use sediment_core::{
    BranchId, BranchInfo, BranchState, Error, Key, PrimitiveTag, Result, SequenceNumber, Value,
};
use sediment_durability::{
    DurabilityManager, DurabilityMode, Receipt, WalConfig, WalCounters, WalReader, WalRecord,
    WriteIntent,
};
use sediment_storage::{BranchPointerTable, BranchStore, PagePin};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Name of the branch created automatically in a fresh store.
pub const DEFAULT_BRANCH: &str = "main";

/// File holding the store's stable identity, shared by all WAL segments.
const STORE_ID_FILE: &str = "store.id";

/// Reclamation progress for a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReclamationStatus {
    /// Branch is live; nothing to reclaim
    NotDeleted,
    /// Tombstoned; the collector has not finished with it yet
    Pending,
    /// Storage fully reclaimed
    Reclaimed,
    /// Branch id is not known to this store
    Unknown,
}

/// An embedded multi-model store with branches and per-write durability.
pub struct Database {
    store: Arc<BranchStore>,
    pointers: Arc<BranchPointerTable>,
    branches: Arc<BranchManager>,
    durability: DurabilityManager,
    gc: GarbageCollector,
    sequence: AtomicU64,
    default_mode: DurabilityMode,
    _temp: Option<TempDir>,
}

impl Database {
    /// Open a durable store at `path` with buffered durability.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_config(DatabaseConfig::durable(path.as_ref()))
    }

    /// Open an ephemeral store: no WAL, no files, immediate acknowledgement.
    pub fn ephemeral() -> Result<Self> {
        Self::with_config(DatabaseConfig::ephemeral())
    }

    /// Open a durable store in a temporary directory that is removed when
    /// the database is dropped. Intended for tests and experiments.
    pub fn open_temp() -> Result<Self> {
        let temp = tempfile::tempdir()?;
        let mut db = Self::with_config(DatabaseConfig::durable(temp.path()))?;
        db._temp = Some(temp);
        Ok(db)
    }

    /// Start building a database configuration.
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::new()
    }

    /// Open with a resolved configuration.
    pub fn with_config(config: DatabaseConfig) -> Result<Self> {
        let store = Arc::new(BranchStore::new());
        let pointers = Arc::new(BranchPointerTable::new());
        let branches = Arc::new(BranchManager::new());

        let (durability, recovered) = match &config.path {
            Some(path) => {
                std::fs::create_dir_all(path)?;
                let wal_dir = path.join("wal");

                // Replay before opening the writer so a corrupted tail is
                // truncated first.
                let replay = WalReader::new(&wal_dir).replay()?;
                let state = recovery::rebuild(&replay.records)?;

                let store_uuid = load_or_create_store_id(path)?;
                let manager = DurabilityManager::open(
                    &wal_dir,
                    store_uuid,
                    WalConfig::new().with_segment_size(config.segment_size),
                    Duration::from_millis(config.batch_window_ms),
                    config.batch_max,
                )?;
                (manager, Some(state))
            }
            None => (DurabilityManager::ephemeral(), None),
        };

        let gc = GarbageCollector::start(store.clone(), pointers.clone(), branches.clone());
        let db = Database {
            store,
            pointers,
            branches,
            durability,
            gc,
            sequence: AtomicU64::new(1),
            default_mode: config.mode,
            _temp: None,
        };

        match recovered {
            Some(state) if !state.is_empty() => db.restore(state)?,
            _ => db.bootstrap()?,
        }

        Ok(db)
    }

    /// Install recovered state: branch tree, data, active pointer, and the
    /// reclamation backlog.
    fn restore(&self, state: recovery::RecoveredState) -> Result<()> {
        self.sequence
            .store(state.max_sequence + 1, Ordering::SeqCst);

        for info in &state.branches {
            if info.state.holds_storage() {
                self.store.register_branch(info.id, info.parent);
                self.pointers.register(info.id);
            }
            self.branches.install(info.clone());
        }

        for write in state.writes {
            self.store
                .write(write.branch, write.tag, write.key, write.value)?;
        }

        // Last switch wins; fall back to the default branch, then to any
        // live branch, if the switch record was lost to truncation.
        let active = state
            .active
            .filter(|id| self.branches.state(*id).is_some_and(|s| s.accepts_operations()))
            .or_else(|| self.branches.resolve(DEFAULT_BRANCH).ok())
            .or_else(|| {
                self.branches
                    .list()
                    .into_iter()
                    .find(|info| info.is_live())
                    .map(|info| info.id)
            });

        match active {
            Some(id) => {
                self.branches.activate(id, None)?;
                self.pointers.set_active(id);
            }
            None => {
                // Every branch in the log was deleted; start a fresh root.
                self.bootstrap()?;
            }
        }

        for id in self.branches.tombstoned() {
            self.gc.enqueue(id);
        }

        tracing::info!(
            branches = state.branches.len(),
            next_sequence = state.max_sequence + 1,
            "recovered store from log"
        );
        Ok(())
    }

    /// Create the default branch in a fresh (or fully deleted) store.
    fn bootstrap(&self) -> Result<()> {
        let seq = self.sequence.load(Ordering::SeqCst);
        let id = self
            .branches
            .create(DEFAULT_BRANCH, None, seq, BranchState::Active)?;
        self.store.register_branch(id, None);
        self.pointers.register(id);
        self.pointers.set_active(id);
        self.log_control(id, &ControlRecord::BranchCreate {
            id,
            name: DEFAULT_BRANCH.into(),
            parent: None,
            created_seq: seq,
        });
        self.log_control(id, &ControlRecord::BranchSwitch { id });
        Ok(())
    }

    // ---- write and read paths ----

    /// Write a value on the active branch with the store's default mode.
    pub fn put(&self, tag: PrimitiveTag, key: impl Into<Key>, value: Value) -> Result<Receipt> {
        let branch = self.active_branch_id()?;
        self.put_on(branch, tag, key.into(), value, self.default_mode)
    }

    /// Write a value on a specific branch with an explicit durability mode.
    ///
    /// The value is applied to the in-memory store before the intent is
    /// submitted; the receipt resolves when the chosen mode's
    /// acknowledgement condition is met.
    pub fn put_on(
        &self,
        branch: BranchId,
        tag: PrimitiveTag,
        key: Key,
        value: Value,
        mode: DurabilityMode,
    ) -> Result<Receipt> {
        if tag.is_control() {
            return Err(Error::InvalidBranchOperation(
                "the control tag is reserved for engine metadata".into(),
            ));
        }
        self.check_operable(branch)?;

        let sequence = self.next_sequence();
        let payload = WritePayload::new(key.clone(), value.clone()).encode()?;

        self.store.write(branch, tag, key, value)?;
        let intent = WriteIntent::new(branch, tag, sequence, payload, mode);
        Ok(self.durability.submit(intent))
    }

    /// Read a key on the active branch.
    pub fn get(&self, tag: PrimitiveTag, key: &Key) -> Result<Option<Value>> {
        let branch = self.active_branch_id()?;
        self.get_on(branch, tag, key)
    }

    /// Read a key on a specific branch, walking the copy-on-write parent
    /// chain. Never touches the durability layer.
    pub fn get_on(&self, branch: BranchId, tag: PrimitiveTag, key: &Key) -> Result<Option<Value>> {
        self.check_operable(branch)?;
        Ok(self.store.get(branch, tag, key))
    }

    /// Read a key and pin its page, deferring reclamation until the pin is
    /// dropped. For long-lived reads that must survive a concurrent delete.
    pub fn get_pinned(
        &self,
        branch: BranchId,
        tag: PrimitiveTag,
        key: &Key,
    ) -> Result<Option<PagePin>> {
        self.check_operable(branch)?;
        let page = self.store.resolve_page(branch, tag, key);
        Ok(page.and_then(|id| self.store.arena().pin(id)))
    }

    // ---- branch lifecycle ----

    /// Create a branch of the active branch. O(1): no data is copied; the
    /// child reads through to its parent until it diverges.
    pub fn create_branch(&self, name: impl Into<String>) -> Result<BranchId> {
        let parent = self.active_branch_id()?;
        self.create_branch_from(name, parent)
    }

    /// Create a branch of an arbitrary live base branch, without moving the
    /// active pointer. Rejected for unknown or deleted bases.
    pub fn create_branch_from(&self, name: impl Into<String>, base: BranchId) -> Result<BranchId> {
        let name = name.into();
        let created_seq = self.sequence.load(Ordering::SeqCst);

        let id = self
            .branches
            .create(name.clone(), Some(base), created_seq, BranchState::Inactive)?;
        self.store.register_branch(id, Some(base));
        self.pointers.register(id);

        self.log_control(id, &ControlRecord::BranchCreate {
            id,
            name,
            parent: Some(base),
            created_seq,
        });
        tracing::debug!(branch = %id, %base, "created branch");
        Ok(id)
    }

    /// Make the named branch active. O(1): flips the pointer and the two
    /// lifecycle states; persistence is an unforced control append and
    /// never gates the caller.
    pub fn switch_branch(&self, name: &str) -> Result<BranchId> {
        let id = self.branches.resolve(name)?;
        let previous = self.pointers.active();
        self.branches.activate(id, previous)?;
        self.pointers.set_active(id);

        self.log_control(id, &ControlRecord::BranchSwitch { id });
        tracing::debug!(branch = %id, "switched active branch");
        Ok(id)
    }

    /// Tombstone the named branch. Returns immediately; storage is
    /// reclaimed asynchronously. Rejected for the active branch and for
    /// branches with live descendants.
    pub fn delete_branch(&self, name: &str) -> Result<()> {
        let id = self.branches.resolve(name)?;
        if self.pointers.active() == Some(id) {
            return Err(Error::InvalidBranchOperation(format!(
                "cannot delete the active branch '{name}'"
            )));
        }
        self.branches.tombstone(id)?;

        self.log_control(id, &ControlRecord::BranchDelete { id });
        self.gc.enqueue(id);
        tracing::debug!(branch = %id, "tombstoned branch");
        Ok(())
    }

    /// Reclamation progress for a branch.
    pub fn reclamation_status(&self, id: BranchId) -> ReclamationStatus {
        match self.branches.state(id) {
            None => ReclamationStatus::Unknown,
            Some(BranchState::Tombstoned) => ReclamationStatus::Pending,
            Some(BranchState::Reclaimed) => ReclamationStatus::Reclaimed,
            Some(_) => ReclamationStatus::NotDeleted,
        }
    }

    /// Block until the collector has worked through its current backlog.
    /// Test and shutdown aid.
    pub fn await_reclamation(&self) {
        // Two rounds: a deferred task re-queues itself behind the first
        // barrier.
        self.gc.drain();
        self.gc.drain();
    }

    // ---- introspection ----

    /// The active branch's metadata.
    pub fn active_branch(&self) -> Result<BranchInfo> {
        let id = self.active_branch_id()?;
        self.branches
            .get(id)
            .ok_or_else(|| Error::Internal("active pointer references unknown branch".into()))
    }

    /// Resolve a live branch by name.
    pub fn branch(&self, name: &str) -> Result<BranchInfo> {
        let id = self.branches.resolve(name)?;
        self.branches
            .get(id)
            .ok_or_else(|| Error::BranchNotFound(name.to_string()))
    }

    /// All branches, including tombstoned and reclaimed ones.
    pub fn list_branches(&self) -> Vec<BranchInfo> {
        self.branches.list()
    }

    /// Cumulative WAL counters (zeroes for an ephemeral store).
    pub fn wal_counters(&self) -> WalCounters {
        self.durability.counters()
    }

    /// Whether writes survive a restart.
    pub fn is_durable(&self) -> bool {
        self.durability.is_durable()
    }

    // ---- maintenance ----

    /// Flush all pending buffered writes and force the WAL.
    pub fn flush(&self) -> Result<()> {
        self.durability.flush()
    }

    /// Flush, stop background workers, and close the log.
    pub fn shutdown(&self) -> Result<()> {
        self.gc.shutdown();
        self.durability.shutdown()
    }

    // ---- internals ----

    fn active_branch_id(&self) -> Result<BranchId> {
        self.pointers
            .active()
            .ok_or_else(|| Error::Internal("no active branch".into()))
    }

    fn check_operable(&self, branch: BranchId) -> Result<()> {
        match self.branches.state(branch) {
            None => Err(Error::BranchNotFound(branch.to_string())),
            Some(state) if state.accepts_operations() => Ok(()),
            Some(state) => Err(Error::InvalidBranchOperation(format!(
                "branch {branch} is {state}"
            ))),
        }
    }

    fn next_sequence(&self) -> SequenceNumber {
        self.sequence.fetch_add(1, Ordering::SeqCst)
    }

    /// Persist a branch-metadata record. Control writes never gate their
    /// caller; an encode failure is logged and the in-memory transition
    /// stands.
    fn log_control(&self, branch: BranchId, control: &ControlRecord) {
        match control.encode() {
            Ok(payload) => {
                let sequence = self.next_sequence();
                let record = WalRecord::new(PrimitiveTag::Control, branch, sequence, payload);
                self.durability.submit_background(record);
            }
            Err(err) => {
                tracing::error!(%branch, error = %err, "failed to encode control record");
            }
        }
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            tracing::warn!(error = %err, "shutdown during drop failed");
        }
    }
}

/// Read the store's identity file, creating it on first open.
fn load_or_create_store_id(path: &Path) -> Result<[u8; 16]> {
    let id_path = path.join(STORE_ID_FILE);
    match std::fs::read(&id_path) {
        Ok(bytes) if bytes.len() == 16 => {
            let mut id = [0u8; 16];
            id.copy_from_slice(&bytes);
            Ok(id)
        }
        Ok(_) => Err(Error::Corruption(format!(
            "store id file {} has the wrong size",
            id_path.display()
        ))),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            let id = *uuid::Uuid::new_v4().as_bytes();
            std::fs::write(&id_path, id)?;
            Ok(id)
        }
        Err(err) => Err(err.into()),
    }
}
