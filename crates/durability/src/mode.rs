//! Durability modes.
//!
//! A mode is attached to every write intent and controls when (or whether)
//! a force-to-disk call gates acknowledgement. Mode dispatch happens in
//! exactly one place ([`crate::manager::DurabilityManager::submit`]); the
//! read path never consults the mode.
//!
//! | Mode | WAL | fsync | Ack |
//! |------|-----|-------|-----|
//! | NoDurability | unforced append | never | immediate |
//! | Buffered | batched append | one per window | after shared flush |
//! | Strict | immediate append | one per write | after that fsync |

/// Per-write durability policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurabilityMode {
    /// In-memory acknowledgement. Records are appended to the WAL without
    /// forcing them to stable media; zero fsync syscalls, all unflushed
    /// data lost on crash.
    NoDurability,

    /// Coalesce with concurrently submitted writes; one fsync serves the
    /// whole window. Acknowledged only after that shared fsync returns.
    /// The window duration and batch cap are store construction settings,
    /// not per-write parameters.
    Buffered,

    /// fsync before every acknowledgement. Exactly one force-to-disk call
    /// per write, on the submitting thread.
    Strict,
}

impl DurabilityMode {
    /// Whether acknowledgement requires an fsync on the submitting thread.
    pub fn forces_per_write(&self) -> bool {
        matches!(self, DurabilityMode::Strict)
    }

    /// Whether intents are handed to the batch scheduler.
    pub fn is_buffered(&self) -> bool {
        matches!(self, DurabilityMode::Buffered)
    }

    /// Human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            DurabilityMode::NoDurability => "no durability (fastest, data lost on crash)",
            DurabilityMode::Buffered => "buffered fsync (amortized, bounded loss window)",
            DurabilityMode::Strict => "strict fsync (safest, slowest)",
        }
    }
}

impl Default for DurabilityMode {
    fn default() -> Self {
        DurabilityMode::Buffered
    }
}
