//! Database configuration and builder.

use crate::database::Database;
use sediment_core::Result;
use sediment_durability::DurabilityMode;
use std::path::PathBuf;

/// Default WAL segment rollover threshold.
pub const DEFAULT_SEGMENT_SIZE: u64 = 64 * 1024 * 1024;

/// Default flush window for buffered writes, in milliseconds.
pub const DEFAULT_BATCH_WINDOW_MS: u64 = 5;

/// Default number of buffered writes per window before an early flush.
pub const DEFAULT_BATCH_MAX: usize = 256;

/// Resolved configuration for opening a database.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Data directory; `None` opens an ephemeral store with no files.
    pub path: Option<PathBuf>,
    /// Default durability mode for writes that do not pick their own.
    pub mode: DurabilityMode,
    /// WAL segment rollover threshold in bytes.
    pub segment_size: u64,
    /// Flush window for buffered writes, in milliseconds.
    pub batch_window_ms: u64,
    /// Buffered writes per window before an early flush.
    pub batch_max: usize,
}

impl DatabaseConfig {
    /// Durable store at `path` with buffered durability.
    pub fn durable(path: impl Into<PathBuf>) -> Self {
        DatabaseConfig {
            path: Some(path.into()),
            mode: DurabilityMode::Buffered,
            segment_size: DEFAULT_SEGMENT_SIZE,
            batch_window_ms: DEFAULT_BATCH_WINDOW_MS,
            batch_max: DEFAULT_BATCH_MAX,
        }
    }

    /// In-memory store: no WAL, no files, nothing survives a restart.
    pub fn ephemeral() -> Self {
        DatabaseConfig {
            path: None,
            mode: DurabilityMode::NoDurability,
            segment_size: DEFAULT_SEGMENT_SIZE,
            batch_window_ms: DEFAULT_BATCH_WINDOW_MS,
            batch_max: DEFAULT_BATCH_MAX,
        }
    }
}

/// Fluent builder for [`Database`] instances.
///
/// ```no_run
/// # use sediment_engine::Database;
/// # fn main() -> sediment_core::Result<()> {
/// let db = Database::builder()
///     .path("/data/mystore")
///     .strict()
///     .open()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseBuilder {
    config: DatabaseConfig,
}

impl DatabaseBuilder {
    /// Start from ephemeral defaults.
    pub fn new() -> Self {
        DatabaseBuilder {
            config: DatabaseConfig::ephemeral(),
        }
    }

    /// Set the data directory, making the store durable.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = Some(path.into());
        if matches!(self.config.mode, DurabilityMode::NoDurability) {
            self.config.mode = DurabilityMode::Buffered;
        }
        self
    }

    /// Default writes to no-durability acknowledgement.
    pub fn no_durability(mut self) -> Self {
        self.config.mode = DurabilityMode::NoDurability;
        self
    }

    /// Default writes to buffered durability with the default window.
    pub fn buffered(mut self) -> Self {
        self.config.mode = DurabilityMode::Buffered;
        self
    }

    /// Default writes to buffered durability with an explicit flush window
    /// and batch cap. The settings apply to every buffered write on this
    /// store, whatever its submission path.
    pub fn buffered_with(mut self, window_ms: u64, max_batch: usize) -> Self {
        self.config.mode = DurabilityMode::Buffered;
        self.config.batch_window_ms = window_ms;
        self.config.batch_max = max_batch;
        self
    }

    /// Default writes to strict (fsync-per-write) durability.
    pub fn strict(mut self) -> Self {
        self.config.mode = DurabilityMode::Strict;
        self
    }

    /// Override the WAL segment rollover threshold.
    pub fn segment_size(mut self, bytes: u64) -> Self {
        self.config.segment_size = bytes;
        self
    }

    /// Open the database.
    pub fn open(self) -> Result<Database> {
        Database::with_config(self.config)
    }
}

impl Default for DatabaseBuilder {
    fn default() -> Self {
        Self::new()
    }
}
