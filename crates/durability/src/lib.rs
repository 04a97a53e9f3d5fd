//! Durability layer for Sediment.
//!
//! This crate implements write-ahead logging and the durability contract:
//! - Segmented append-only WAL with CRC32-framed records
//! - Per-write durability modes: NoDurability, Buffered (default), Strict
//! - Batch scheduler amortizing one fsync across a flush window
//! - Replay with truncate-at-last-valid-record corruption handling
//!
//! The manager is the only place a mode is interpreted; the read path
//! never enters this crate.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batcher;
pub mod format;
pub mod intent;
pub mod manager;
pub mod mode;
pub mod reader;
pub mod wal;

pub use batcher::BatchScheduler;
pub use format::{RecordError, SegmentHeader, WalRecord};
pub use intent::{Receipt, WriteIntent};
pub use manager::DurabilityManager;
pub use mode::DurabilityMode;
pub use reader::{CorruptionNotice, Replay, WalReader};
pub use wal::{Wal, WalConfig, WalCounters};
