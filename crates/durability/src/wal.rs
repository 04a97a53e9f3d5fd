//! Segmented write-ahead log writer.
//!
//! The log is append-only. Segments roll over at a size threshold; closed
//! segments are immutable. The writer owns the force-to-disk boundary and
//! keeps cumulative counters so callers can observe exactly how many fsync
//! calls a workload triggered.

use crate::format::{SegmentHeader, WalRecord, SEGMENT_HEADER_SIZE};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// WAL configuration.
#[derive(Debug, Clone)]
pub struct WalConfig {
    /// Segment rollover threshold in bytes.
    pub segment_size: u64,
}

impl WalConfig {
    /// Default configuration: 64 MiB segments.
    pub fn new() -> Self {
        WalConfig {
            segment_size: 64 * 1024 * 1024,
        }
    }

    /// Override the segment rollover threshold.
    pub fn with_segment_size(mut self, bytes: u64) -> Self {
        self.segment_size = bytes;
        self
    }

    /// Small segments for tests that exercise rotation.
    pub fn for_testing() -> Self {
        WalConfig { segment_size: 4096 }
    }
}

impl Default for WalConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Cumulative WAL operation counters.
///
/// Accumulate over the writer's lifetime and are never reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalCounters {
    /// Total records appended
    pub appends: u64,
    /// Total force-to-disk (fsync) calls
    pub sync_calls: u64,
    /// Total bytes written to segments
    pub bytes_written: u64,
}

/// A single WAL segment file.
///
/// Only the active segment is writable; closed segments are immutable.
pub struct WalSegment {
    file: File,
    segment_number: u64,
    write_position: u64,
    path: PathBuf,
    closed: bool,
}

impl WalSegment {
    /// Create a new segment file and write its header.
    pub fn create(dir: &Path, segment_number: u64, store_uuid: [u8; 16]) -> std::io::Result<Self> {
        let path = Self::segment_path(dir, segment_number);
        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .read(true)
            .open(&path)?;

        let header = SegmentHeader::new(segment_number, store_uuid);
        file.write_all(&header.to_bytes())?;

        Ok(WalSegment {
            file,
            segment_number,
            write_position: SEGMENT_HEADER_SIZE as u64,
            path,
            closed: false,
        })
    }

    /// Open an existing segment for appending, validating its header.
    pub fn open_append(dir: &Path, segment_number: u64) -> std::io::Result<Self> {
        let path = Self::segment_path(dir, segment_number);
        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;

        let mut header_bytes = [0u8; SEGMENT_HEADER_SIZE];
        file.read_exact(&mut header_bytes)?;
        let header = SegmentHeader::from_bytes(&header_bytes)
            .filter(SegmentHeader::is_valid)
            .ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::InvalidData, "invalid segment header")
            })?;
        if header.segment_number != segment_number {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "segment number mismatch: expected {segment_number}, got {}",
                    header.segment_number
                ),
            ));
        }

        let write_position = file.seek(SeekFrom::End(0))?;
        Ok(WalSegment {
            file,
            segment_number,
            write_position,
            path,
            closed: false,
        })
    }

    /// Path for a segment number: `wal-NNNNNN.seg`.
    pub fn segment_path(dir: &Path, segment_number: u64) -> PathBuf {
        dir.join(format!("wal-{segment_number:06}.seg"))
    }

    /// Segment number.
    pub fn segment_number(&self) -> u64 {
        self.segment_number
    }

    /// Current size in bytes.
    pub fn size(&self) -> u64 {
        self.write_position
    }

    /// File path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append bytes. Errors once the segment is closed.
    pub fn write(&mut self, data: &[u8]) -> std::io::Result<()> {
        if self.closed {
            return Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "cannot write to closed segment",
            ));
        }
        self.file.write_all(data)?;
        self.write_position += data.len() as u64;
        Ok(())
    }

    /// Force written bytes to stable storage.
    pub fn sync(&mut self) -> std::io::Result<()> {
        self.file.sync_all()
    }

    /// Sync and mark immutable.
    pub fn close(&mut self) -> std::io::Result<()> {
        if !self.closed {
            self.file.sync_all()?;
            self.closed = true;
        }
        Ok(())
    }
}

/// The write-ahead log writer.
///
/// Append-path serialization is the caller's concern: the durability
/// manager wraps the writer in a mutex so record ordering stays
/// well-defined. The writer itself decides nothing about durability
/// modes; it appends when told and forces when told.
pub struct Wal {
    dir: PathBuf,
    store_uuid: [u8; 16],
    config: WalConfig,
    segment: WalSegment,
    has_unsynced_data: bool,
    counters: WalCounters,
}

impl Wal {
    /// Open the WAL in `dir`, resuming the latest segment or creating the
    /// first one.
    pub fn open(
        dir: impl Into<PathBuf>,
        store_uuid: [u8; 16],
        config: WalConfig,
    ) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let segment = match Self::latest_segment_number(&dir) {
            Some(num) => match WalSegment::open_append(&dir, num) {
                Ok(seg) => seg,
                // Unreadable active segment: leave it for the reader's
                // corruption handling and start a fresh one.
                Err(_) => WalSegment::create(&dir, num + 1, store_uuid)?,
            },
            None => WalSegment::create(&dir, 1, store_uuid)?,
        };

        Ok(Wal {
            dir,
            store_uuid,
            config,
            segment,
            has_unsynced_data: false,
            counters: WalCounters::default(),
        })
    }

    /// Append a single record without forcing it to stable storage.
    ///
    /// Returns the byte offset of the record within its segment.
    pub fn append(&mut self, record: &WalRecord) -> std::io::Result<u64> {
        let bytes = record.to_bytes();

        if self.segment.size() + bytes.len() as u64 > self.config.segment_size {
            self.rotate()?;
        }

        let offset = self.segment.size();
        self.segment.write(&bytes)?;
        self.has_unsynced_data = true;
        self.counters.appends += 1;
        self.counters.bytes_written += bytes.len() as u64;
        Ok(offset)
    }

    /// Append a batch of records as one unit (rotation may still occur at
    /// a record boundary). No force-to-disk happens here.
    pub fn append_batch(&mut self, records: &[WalRecord]) -> std::io::Result<()> {
        for record in records {
            self.append(record)?;
        }
        Ok(())
    }

    /// Force all appended records to stable storage.
    ///
    /// A no-op (and not counted) when nothing is pending; the counters
    /// therefore reflect actual fsync syscalls.
    pub fn force(&mut self) -> std::io::Result<()> {
        if !self.has_unsynced_data {
            return Ok(());
        }
        self.segment.sync()?;
        self.has_unsynced_data = false;
        self.counters.sync_calls += 1;
        Ok(())
    }

    /// Roll over to a new segment, closing the current one.
    ///
    /// Closing forces the outgoing segment; that fsync is counted so the
    /// counters reflect every force-to-disk syscall the writer issues.
    fn rotate(&mut self) -> std::io::Result<()> {
        self.segment.close()?;
        self.counters.sync_calls += 1;
        self.has_unsynced_data = false;
        let next = self.segment.segment_number() + 1;
        self.segment = WalSegment::create(&self.dir, next, self.store_uuid)?;
        Ok(())
    }

    /// Snapshot of the cumulative counters.
    pub fn counters(&self) -> WalCounters {
        self.counters
    }

    /// Current (active) segment number.
    pub fn current_segment(&self) -> u64 {
        self.segment.segment_number()
    }

    /// WAL directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All segment numbers in order.
    pub fn list_segments(&self) -> std::io::Result<Vec<u64>> {
        let mut segments = Self::segment_numbers(&self.dir)?;
        segments.sort_unstable();
        Ok(segments)
    }

    /// Checkpoint hook: closed segments older than the active one.
    ///
    /// These are the segments a consistent checkpoint may remove once it
    /// supersedes them. Checkpointing itself lives outside the WAL.
    pub fn removable_segments(&self) -> std::io::Result<Vec<u64>> {
        let active = self.current_segment();
        Ok(self
            .list_segments()?
            .into_iter()
            .filter(|&n| n < active)
            .collect())
    }

    /// Flush and close the writer.
    pub fn close(mut self) -> std::io::Result<()> {
        self.force()?;
        self.segment.close()
    }

    fn latest_segment_number(dir: &Path) -> Option<u64> {
        Self::segment_numbers(dir).ok()?.into_iter().max()
    }

    fn segment_numbers(dir: &Path) -> std::io::Result<Vec<u64>> {
        let mut numbers = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(num) = name
                .strip_prefix("wal-")
                .and_then(|rest| rest.strip_suffix(".seg"))
                .and_then(|digits| digits.parse::<u64>().ok())
            {
                numbers.push(num);
            }
        }
        Ok(numbers)
    }
}

impl Drop for Wal {
    fn drop(&mut self) {
        if self.has_unsynced_data {
            let _ = self.segment.sync();
        }
    }
}
