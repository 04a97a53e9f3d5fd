//! Batch scheduler for buffered writes.
//!
//! A dedicated worker thread collects buffered intents and flushes them as
//! a group: append every record, then exactly one force-to-disk call for
//! the whole batch. A flush triggers when the window timer expires, when
//! the batch hits its size cap, or when a caller demands one. An empty
//! window never touches the disk.

use crate::format::WalRecord;
use crate::wal::Wal;
use parking_lot::Mutex;
use sediment_core::{Error, Result, SequenceNumber};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// A buffered write waiting for its window to flush.
struct PendingWrite {
    record: WalRecord,
    done: mpsc::Sender<Result<SequenceNumber>>,
}

enum Msg {
    Write(PendingWrite),
    /// Flush whatever is pending now; ack when the force completes.
    Flush(mpsc::Sender<()>),
    Shutdown,
}

/// Background scheduler that amortizes force-to-disk calls across
/// concurrently submitted writes.
pub struct BatchScheduler {
    sender: mpsc::Sender<Msg>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl BatchScheduler {
    /// Spawn the worker thread over a shared WAL writer.
    pub fn start(wal: Arc<Mutex<Wal>>, window: Duration, max_batch: usize) -> Self {
        let (sender, receiver) = mpsc::channel();
        let handle = std::thread::Builder::new()
            .name("sediment-batcher".into())
            .spawn(move || run_worker(wal, receiver, window, max_batch))
            .ok();

        if handle.is_none() {
            tracing::error!("failed to spawn batch scheduler thread");
        }

        BatchScheduler {
            sender,
            handle: Mutex::new(handle),
        }
    }

    /// Enqueue a record; the returned receiver resolves after the batch
    /// containing it has been forced to disk.
    pub fn submit(&self, record: WalRecord) -> mpsc::Receiver<Result<SequenceNumber>> {
        let (done, receipt) = mpsc::channel();
        let pending = PendingWrite { record, done };
        if let Err(mpsc::SendError(Msg::Write(pending))) = self.sender.send(Msg::Write(pending)) {
            let _ = pending
                .done
                .send(Err(Error::Internal("batch scheduler is shut down".into())));
        }
        receipt
    }

    /// Force a flush of everything currently pending and wait for it.
    pub fn flush_now(&self) {
        let (ack, done) = mpsc::channel();
        if self.sender.send(Msg::Flush(ack)).is_ok() {
            let _ = done.recv();
        }
    }

    /// Flush remaining writes and stop the worker.
    pub fn shutdown(&self) {
        let _ = self.sender.send(Msg::Shutdown);
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for BatchScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(
    wal: Arc<Mutex<Wal>>,
    receiver: mpsc::Receiver<Msg>,
    window: Duration,
    max_batch: usize,
) {
    let mut batch: Vec<PendingWrite> = Vec::new();
    let mut deadline: Option<Instant> = None;

    loop {
        let msg = match deadline {
            Some(due) => {
                let now = Instant::now();
                if now >= due {
                    flush(&wal, &mut batch);
                    deadline = None;
                    continue;
                }
                match receiver.recv_timeout(due - now) {
                    Ok(msg) => msg,
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        flush(&wal, &mut batch);
                        deadline = None;
                        continue;
                    }
                    Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match receiver.recv() {
                Ok(msg) => msg,
                Err(_) => break,
            },
        };

        match msg {
            Msg::Write(pending) => {
                if batch.is_empty() {
                    deadline = Some(Instant::now() + window);
                }
                batch.push(pending);
                if batch.len() >= max_batch {
                    flush(&wal, &mut batch);
                    deadline = None;
                }
            }
            Msg::Flush(ack) => {
                flush(&wal, &mut batch);
                deadline = None;
                let _ = ack.send(());
            }
            Msg::Shutdown => break,
        }
    }

    // Drain on the way out so no receipt is left dangling.
    flush(&wal, &mut batch);
    while let Ok(msg) = receiver.try_recv() {
        match msg {
            Msg::Write(pending) => batch.push(pending),
            Msg::Flush(ack) => {
                let _ = ack.send(());
            }
            Msg::Shutdown => {}
        }
    }
    flush(&wal, &mut batch);
}

/// Append the whole batch, force once, resolve every receipt.
fn flush(wal: &Arc<Mutex<Wal>>, batch: &mut Vec<PendingWrite>) {
    if batch.is_empty() {
        return;
    }

    let pending = std::mem::take(batch);
    let outcome = {
        let mut wal = wal.lock();
        let records: Vec<WalRecord> = pending.iter().map(|p| p.record.clone()).collect();
        wal.append_batch(&records).and_then(|_| wal.force())
    };

    match outcome {
        Ok(()) => {
            tracing::trace!(writes = pending.len(), "flushed buffered batch");
            for write in pending {
                let _ = write.done.send(Ok(write.record.sequence));
            }
        }
        Err(err) => {
            tracing::error!(error = %err, writes = pending.len(), "batch flush failed");
            let kind = err.kind();
            let message = err.to_string();
            for write in pending {
                let _ = write.done.send(Err(Error::io_again(kind, &message)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::WalConfig;
    use sediment_core::{BranchId, PrimitiveTag};
    use tempfile::tempdir;

    fn open_wal(dir: &std::path::Path) -> Arc<Mutex<Wal>> {
        Arc::new(Mutex::new(
            Wal::open(dir.join("wal"), [1; 16], WalConfig::new()).unwrap(),
        ))
    }

    fn record(sequence: u64) -> WalRecord {
        WalRecord::new(PrimitiveTag::Kv, BranchId::new(), sequence, vec![0; 16])
    }

    #[test]
    fn single_write_flushes_within_window() {
        let dir = tempdir().unwrap();
        let wal = open_wal(dir.path());
        let scheduler = BatchScheduler::start(wal.clone(), Duration::from_millis(5), 256);

        let receipt = scheduler.submit(record(1));
        assert_eq!(receipt.recv().unwrap().unwrap(), 1);
        assert_eq!(wal.lock().counters().sync_calls, 1);

        scheduler.shutdown();
    }

    #[test]
    fn batch_shares_one_sync() {
        let dir = tempdir().unwrap();
        let wal = open_wal(dir.path());
        // Long window so every write lands in the same batch.
        let scheduler = BatchScheduler::start(wal.clone(), Duration::from_millis(200), 256);

        let receipts: Vec<_> = (1..=50).map(|i| scheduler.submit(record(i))).collect();
        scheduler.flush_now();

        for receipt in receipts {
            receipt.recv().unwrap().unwrap();
        }
        let counters = wal.lock().counters();
        assert_eq!(counters.appends, 50);
        assert_eq!(counters.sync_calls, 1);

        scheduler.shutdown();
    }

    #[test]
    fn max_batch_triggers_early_flush() {
        let dir = tempdir().unwrap();
        let wal = open_wal(dir.path());
        let scheduler = BatchScheduler::start(wal.clone(), Duration::from_secs(60), 4);

        let receipts: Vec<_> = (1..=4).map(|i| scheduler.submit(record(i))).collect();
        // Resolves without flush_now because the size cap fired.
        for receipt in receipts {
            receipt
                .recv_timeout(Duration::from_secs(5))
                .unwrap()
                .unwrap();
        }
        assert_eq!(wal.lock().counters().sync_calls, 1);

        scheduler.shutdown();
    }

    #[test]
    fn empty_flush_never_syncs() {
        let dir = tempdir().unwrap();
        let wal = open_wal(dir.path());
        let scheduler = BatchScheduler::start(wal.clone(), Duration::from_millis(5), 256);

        scheduler.flush_now();
        scheduler.flush_now();
        assert_eq!(wal.lock().counters().sync_calls, 0);

        scheduler.shutdown();
    }

    #[test]
    fn shutdown_drains_pending_writes() {
        let dir = tempdir().unwrap();
        let wal = open_wal(dir.path());
        let scheduler = BatchScheduler::start(wal.clone(), Duration::from_secs(60), 256);

        let receipts: Vec<_> = (1..=10).map(|i| scheduler.submit(record(i))).collect();
        scheduler.shutdown();

        for receipt in receipts {
            receipt.recv().unwrap().unwrap();
        }
        assert_eq!(wal.lock().counters().appends, 10);
    }

    #[test]
    fn concurrent_submitters_all_resolve() {
        let dir = tempdir().unwrap();
        let wal = open_wal(dir.path());
        let scheduler = Arc::new(BatchScheduler::start(
            wal.clone(),
            Duration::from_millis(5),
            256,
        ));

        let mut handles = Vec::new();
        for t in 0..8u64 {
            let scheduler = scheduler.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..25u64 {
                    let receipt = scheduler.submit(record(t * 100 + i));
                    receipt.recv().unwrap().unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let counters = wal.lock().counters();
        assert_eq!(counters.appends, 200);
        // Amortization: far fewer syncs than writes.
        assert!(counters.sync_calls < 200);

        scheduler.shutdown();
    }
}
