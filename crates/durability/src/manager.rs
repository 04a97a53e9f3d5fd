//! Durability manager.
//!
//! The single place where a write's durability mode is interpreted.
//! Everything above this layer submits a [`WriteIntent`] and waits on the
//! returned [`Receipt`]; everything below appends and forces when told.
//!
//! An ephemeral manager carries no WAL at all: every receipt resolves
//! immediately and no file is ever created.

use crate::batcher::BatchScheduler;
use crate::format::WalRecord;
use crate::intent::{Receipt, WriteIntent};
use crate::mode::DurabilityMode;
use crate::wal::{Wal, WalConfig, WalCounters};
use parking_lot::Mutex;
use sediment_core::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Routes write intents to the WAL according to their durability mode.
pub struct DurabilityManager {
    wal: Option<Arc<Mutex<Wal>>>,
    batcher: Option<BatchScheduler>,
}

impl DurabilityManager {
    /// Open a durable manager over a WAL directory.
    ///
    /// `batch_window` and `batch_cap` configure the buffered-mode
    /// scheduler; strict and no-durability intents bypass it.
    pub fn open(
        dir: impl AsRef<Path>,
        store_uuid: [u8; 16],
        config: WalConfig,
        batch_window: Duration,
        batch_cap: usize,
    ) -> Result<Self> {
        let wal = Arc::new(Mutex::new(Wal::open(dir.as_ref(), store_uuid, config)?));
        let batcher = BatchScheduler::start(wal.clone(), batch_window, batch_cap);
        Ok(DurabilityManager {
            wal: Some(wal),
            batcher: Some(batcher),
        })
    }

    /// An ephemeral manager: no WAL, no files, immediate acknowledgement.
    pub fn ephemeral() -> Self {
        DurabilityManager {
            wal: None,
            batcher: None,
        }
    }

    /// Whether writes survive a process restart.
    pub fn is_durable(&self) -> bool {
        self.wal.is_some()
    }

    /// Submit a write intent. Mode dispatch happens here and only here.
    pub fn submit(&self, intent: WriteIntent) -> Receipt {
        let sequence = intent.sequence;
        let mode = intent.mode;

        let wal = match &self.wal {
            Some(wal) => wal,
            // Ephemeral store: nothing to log, acknowledge now.
            None => return Receipt::ready(sequence),
        };

        match mode {
            DurabilityMode::NoDurability => {
                // Appended so a later flush or shutdown can still persist
                // it, but never forced and acknowledged immediately.
                let outcome = wal.lock().append(&intent.into_record());
                match outcome {
                    Ok(_) => Receipt::ready(sequence),
                    Err(err) => Receipt::failed(err.into()),
                }
            }
            DurabilityMode::Buffered => match &self.batcher {
                Some(batcher) => Receipt::Pending(batcher.submit(intent.into_record())),
                None => Receipt::failed(sediment_core::Error::Internal(
                    "buffered write submitted without a batch scheduler".into(),
                )),
            },
            DurabilityMode::Strict => {
                let record = intent.into_record();
                let outcome = {
                    let mut wal = wal.lock();
                    wal.append(&record).and_then(|_| wal.force())
                };
                match outcome {
                    Ok(()) => Receipt::ready(sequence),
                    Err(err) => Receipt::failed(err.into()),
                }
            }
        }
    }

    /// Append a record that must not gate any caller: best-effort
    /// persistence for control metadata.
    ///
    /// Appends inline and unforced. Inline matters: metadata must land in
    /// the log before any later write that references it, and the batcher
    /// would reorder it behind writes already on disk. The force is left
    /// to the next flush, so the caller never waits on the disk.
    pub fn submit_background(&self, record: WalRecord) {
        if let Some(wal) = &self.wal {
            if let Err(err) = wal.lock().append(&record) {
                tracing::warn!(error = %err, "background control append failed");
            }
        }
    }

    /// Flush all pending buffered writes and force the WAL.
    pub fn flush(&self) -> Result<()> {
        if let Some(batcher) = &self.batcher {
            batcher.flush_now();
        }
        if let Some(wal) = &self.wal {
            wal.lock().force()?;
        }
        Ok(())
    }

    /// Cumulative WAL counters, or zeroes for an ephemeral manager.
    pub fn counters(&self) -> WalCounters {
        match &self.wal {
            Some(wal) => wal.lock().counters(),
            None => WalCounters::default(),
        }
    }

    /// Closed segments a checkpoint may remove. Empty when ephemeral.
    pub fn removable_segments(&self) -> Result<Vec<u64>> {
        match &self.wal {
            Some(wal) => Ok(wal.lock().removable_segments()?),
            None => Ok(Vec::new()),
        }
    }

    /// Flush outstanding work and stop the scheduler thread.
    pub fn shutdown(&self) -> Result<()> {
        if let Some(batcher) = &self.batcher {
            batcher.shutdown();
        }
        if let Some(wal) = &self.wal {
            wal.lock().force()?;
        }
        Ok(())
    }
}

impl Drop for DurabilityManager {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sediment_core::{BranchId, PrimitiveTag};
    use tempfile::tempdir;

    fn open_manager(dir: &std::path::Path) -> DurabilityManager {
        DurabilityManager::open(
            dir.join("wal"),
            [1; 16],
            WalConfig::new(),
            Duration::from_millis(5),
            256,
        )
        .unwrap()
    }

    fn intent(sequence: u64, mode: DurabilityMode) -> WriteIntent {
        WriteIntent::new(BranchId::new(), PrimitiveTag::Kv, sequence, vec![0; 8], mode)
    }

    #[test]
    fn no_durability_never_syncs() {
        let dir = tempdir().unwrap();
        let manager = open_manager(dir.path());

        for i in 1..=20 {
            manager
                .submit(intent(i, DurabilityMode::NoDurability))
                .wait()
                .unwrap();
        }

        let counters = manager.counters();
        assert_eq!(counters.appends, 20);
        assert_eq!(counters.sync_calls, 0);
    }

    #[test]
    fn strict_syncs_exactly_once_per_write() {
        let dir = tempdir().unwrap();
        let manager = open_manager(dir.path());

        for i in 1..=5 {
            manager
                .submit(intent(i, DurabilityMode::Strict))
                .wait()
                .unwrap();
        }

        let counters = manager.counters();
        assert_eq!(counters.appends, 5);
        assert_eq!(counters.sync_calls, 5);
    }

    #[test]
    fn buffered_amortizes_syncs() {
        let dir = tempdir().unwrap();
        let manager = open_manager(dir.path());

        let receipts: Vec<_> = (1..=30)
            .map(|i| manager.submit(intent(i, DurabilityMode::Buffered)))
            .collect();
        for receipt in receipts {
            receipt.wait().unwrap();
        }

        let counters = manager.counters();
        assert_eq!(counters.appends, 30);
        assert!(counters.sync_calls < 30);
        assert!(counters.sync_calls >= 1);
    }

    #[test]
    fn modes_mix_on_one_log() {
        let dir = tempdir().unwrap();
        let manager = open_manager(dir.path());

        manager
            .submit(intent(1, DurabilityMode::NoDurability))
            .wait()
            .unwrap();
        let buffered = manager.submit(intent(2, DurabilityMode::Buffered));
        manager
            .submit(intent(3, DurabilityMode::Strict))
            .wait()
            .unwrap();
        buffered.wait().unwrap();

        assert_eq!(manager.counters().appends, 3);
    }

    #[test]
    fn ephemeral_acknowledges_without_files() {
        let manager = DurabilityManager::ephemeral();
        assert!(!manager.is_durable());

        let receipt = manager.submit(intent(1, DurabilityMode::Strict));
        assert_eq!(receipt.wait().unwrap(), 1);
        assert_eq!(manager.counters(), WalCounters::default());
    }

    #[test]
    fn flush_persists_unforced_appends() {
        let dir = tempdir().unwrap();
        let manager = open_manager(dir.path());

        manager
            .submit(intent(1, DurabilityMode::NoDurability))
            .wait()
            .unwrap();
        assert_eq!(manager.counters().sync_calls, 0);

        manager.flush().unwrap();
        assert_eq!(manager.counters().sync_calls, 1);
    }
}
