//! WAL replay.
//!
//! Reads segments in order and yields every valid record. A checksum
//! mismatch or torn tail truncates the log at the last valid record and
//! stops replay there; corruption is surfaced as a degraded-recovery
//! notice, never a crash.

use crate::format::{SegmentHeader, WalRecord, SEGMENT_HEADER_SIZE};
use crate::wal::WalSegment;
use std::fs::OpenOptions;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Where and why replay stopped early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptionNotice {
    /// Segment in which the bad record was found
    pub segment_number: u64,
    /// Byte offset at which the segment was truncated
    pub truncated_at: u64,
    /// Parse failure that triggered the truncation
    pub reason: String,
}

/// Result of a full WAL replay.
#[derive(Debug, Default)]
pub struct Replay {
    /// Every valid record, in append order
    pub records: Vec<WalRecord>,
    /// Set when the tail was truncated due to corruption
    pub corruption: Option<CorruptionNotice>,
}

impl Replay {
    /// Whether recovery was degraded by truncation.
    pub fn is_degraded(&self) -> bool {
        self.corruption.is_some()
    }
}

/// Replays WAL segments from a directory.
pub struct WalReader {
    dir: PathBuf,
}

impl WalReader {
    /// Create a reader over the WAL directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        WalReader { dir: dir.into() }
    }

    /// Replay every segment in order.
    ///
    /// On the first invalid record the containing segment is physically
    /// truncated at the last valid boundary, a warning is logged, and
    /// replay stops: records written after a corruption point are not
    /// trusted even if their own checksums pass.
    pub fn replay(&self) -> std::io::Result<Replay> {
        let mut replay = Replay::default();

        if !self.dir.exists() {
            return Ok(replay);
        }

        for segment_number in self.segment_numbers()? {
            match self.replay_segment(segment_number, &mut replay.records)? {
                None => {}
                Some(notice) => {
                    tracing::warn!(
                        segment = notice.segment_number,
                        offset = notice.truncated_at,
                        reason = %notice.reason,
                        "WAL corruption detected; truncated at last valid record"
                    );
                    replay.corruption = Some(notice);
                    break;
                }
            }
        }

        Ok(replay)
    }

    /// Replay one segment, appending valid records to `out`.
    ///
    /// Returns a notice if the segment had to be truncated.
    fn replay_segment(
        &self,
        segment_number: u64,
        out: &mut Vec<WalRecord>,
    ) -> std::io::Result<Option<CorruptionNotice>> {
        let path = WalSegment::segment_path(&self.dir, segment_number);
        let mut bytes = Vec::new();
        OpenOptions::new()
            .read(true)
            .open(&path)?
            .read_to_end(&mut bytes)?;

        if bytes.len() < SEGMENT_HEADER_SIZE {
            return Ok(Some(self.truncate(
                &path,
                segment_number,
                0,
                "segment shorter than header",
            )?));
        }

        let mut header_bytes = [0u8; SEGMENT_HEADER_SIZE];
        header_bytes.copy_from_slice(&bytes[..SEGMENT_HEADER_SIZE]);
        match SegmentHeader::from_bytes(&header_bytes) {
            Some(header) if header.is_valid() => {}
            _ => {
                return Ok(Some(self.truncate(
                    &path,
                    segment_number,
                    0,
                    "invalid segment header",
                )?));
            }
        }

        let mut offset = SEGMENT_HEADER_SIZE;
        while offset < bytes.len() {
            match WalRecord::from_bytes(&bytes[offset..]) {
                Ok((record, consumed)) => {
                    out.push(record);
                    offset += consumed;
                }
                Err(reason) => {
                    let notice =
                        self.truncate(&path, segment_number, offset as u64, &reason.to_string())?;
                    return Ok(Some(notice));
                }
            }
        }

        Ok(None)
    }

    /// Physically truncate a segment at `position`.
    fn truncate(
        &self,
        path: &Path,
        segment_number: u64,
        position: u64,
        reason: &str,
    ) -> std::io::Result<CorruptionNotice> {
        let file = OpenOptions::new().write(true).open(path)?;
        file.set_len(position)?;
        file.sync_all()?;
        Ok(CorruptionNotice {
            segment_number,
            truncated_at: position,
            reason: reason.to_string(),
        })
    }

    fn segment_numbers(&self) -> std::io::Result<Vec<u64>> {
        let mut numbers = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
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
        numbers.sort_unstable();
        Ok(numbers)
    }
}
