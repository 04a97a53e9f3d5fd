//! WAL segment and record framing.
//!
//! Segments are named `wal-NNNNNN.seg` with a fixed 32-byte header.
//!
//! ```text
//! Segment:
//! ┌────────────────────────────────────┐
//! │ Segment header (32 bytes)          │
//! ├────────────────────────────────────┤
//! │ Record 1                           │
//! │ Record 2                           │
//! │ ...                                │
//! └────────────────────────────────────┘
//!
//! Record:
//! ┌────────────┬─────────┬─────┬──────────────┬──────────┬─────────┬──────────┐
//! │ Length (4) │ Ver (1) │ Tag │ BranchId(16) │ Seq (8)  │ Payload │ CRC32(4) │
//! └────────────┴─────────┴─────┴──────────────┴──────────┴─────────┴──────────┘
//! ```
//!
//! The length field covers everything after itself (version through CRC).
//! Records are self-delimiting and immutable once written; a checksum
//! mismatch on replay marks the corruption point for truncation.

use crc32fast::Hasher;
use sediment_core::{BranchId, PrimitiveTag, SequenceNumber};

/// Magic bytes identifying a WAL segment file.
pub const SEGMENT_MAGIC: [u8; 4] = *b"SEDW";

/// Current segment format version.
pub const SEGMENT_FORMAT_VERSION: u32 = 1;

/// Size of the segment header in bytes.
pub const SEGMENT_HEADER_SIZE: usize = 32;

/// Current record format version.
pub const RECORD_FORMAT_VERSION: u8 = 1;

/// Fixed-size portion of a record: version + tag + branch id + sequence.
const RECORD_FIXED_LEN: usize = 1 + 1 + 16 + 8;

/// WAL segment header (32 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Magic bytes: "SEDW"
    pub magic: [u8; 4],
    /// Format version for forward compatibility
    pub format_version: u32,
    /// Segment number (monotonically increasing)
    pub segment_number: u64,
    /// Store UUID, identical across all segments of one store
    pub store_uuid: [u8; 16],
}

impl SegmentHeader {
    /// Create a header for a new segment.
    pub fn new(segment_number: u64, store_uuid: [u8; 16]) -> Self {
        SegmentHeader {
            magic: SEGMENT_MAGIC,
            format_version: SEGMENT_FORMAT_VERSION,
            segment_number,
            store_uuid,
        }
    }

    /// Serialize to the fixed on-disk layout.
    pub fn to_bytes(&self) -> [u8; SEGMENT_HEADER_SIZE] {
        let mut bytes = [0u8; SEGMENT_HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4..8].copy_from_slice(&self.format_version.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.segment_number.to_le_bytes());
        bytes[16..32].copy_from_slice(&self.store_uuid);
        bytes
    }

    /// Deserialize from the fixed on-disk layout.
    pub fn from_bytes(bytes: &[u8; SEGMENT_HEADER_SIZE]) -> Option<Self> {
        Some(SegmentHeader {
            magic: bytes[0..4].try_into().ok()?,
            format_version: u32::from_le_bytes(bytes[4..8].try_into().ok()?),
            segment_number: u64::from_le_bytes(bytes[8..16].try_into().ok()?),
            store_uuid: bytes[16..32].try_into().ok()?,
        })
    }

    /// Check magic bytes.
    pub fn is_valid(&self) -> bool {
        self.magic == SEGMENT_MAGIC
    }
}

/// One durable record: a write intent as it appears on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct WalRecord {
    /// Which primitive the payload belongs to
    pub tag: PrimitiveTag,
    /// Branch the mutation targets
    pub branch_id: BranchId,
    /// Store-wide sequence number assigned at submission
    pub sequence: SequenceNumber,
    /// Opaque payload owned by the submitting primitive
    pub payload: Vec<u8>,
}

impl WalRecord {
    /// Create a record.
    pub fn new(
        tag: PrimitiveTag,
        branch_id: BranchId,
        sequence: SequenceNumber,
        payload: Vec<u8>,
    ) -> Self {
        WalRecord {
            tag,
            branch_id,
            sequence,
            payload,
        }
    }

    /// Serialize to the framed on-disk layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(RECORD_FIXED_LEN + self.payload.len());
        body.push(RECORD_FORMAT_VERSION);
        body.push(self.tag.as_u8());
        body.extend_from_slice(self.branch_id.as_bytes());
        body.extend_from_slice(&self.sequence.to_le_bytes());
        body.extend_from_slice(&self.payload);

        let crc = compute_crc(&body);
        let total_len = body.len() + 4;

        let mut record = Vec::with_capacity(4 + total_len);
        record.extend_from_slice(&(total_len as u32).to_le_bytes());
        record.extend_from_slice(&body);
        record.extend_from_slice(&crc.to_le_bytes());
        record
    }

    /// Deserialize one record from the front of `bytes`.
    ///
    /// Returns the record and the number of bytes consumed.
    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, usize), RecordError> {
        if bytes.len() < 4 {
            return Err(RecordError::Incomplete);
        }

        let length = u32::from_le_bytes(bytes[0..4].try_into().unwrap()) as usize;
        if length < RECORD_FIXED_LEN + 4 {
            return Err(RecordError::InvalidFormat);
        }
        if bytes.len() < 4 + length {
            return Err(RecordError::Incomplete);
        }

        let body = &bytes[4..4 + length - 4];
        let stored_crc = u32::from_le_bytes(bytes[4 + length - 4..4 + length].try_into().unwrap());
        let computed_crc = compute_crc(body);
        if computed_crc != stored_crc {
            return Err(RecordError::ChecksumMismatch {
                expected: stored_crc,
                computed: computed_crc,
            });
        }

        let version = body[0];
        if version != RECORD_FORMAT_VERSION {
            return Err(RecordError::UnsupportedVersion(version));
        }
        let tag = PrimitiveTag::from_u8(body[1]).ok_or(RecordError::UnknownTag(body[1]))?;
        let branch_id = BranchId::from_bytes(body[2..18].try_into().unwrap());
        let sequence = u64::from_le_bytes(body[18..26].try_into().unwrap());
        let payload = body[26..].to_vec();

        Ok((
            WalRecord {
                tag,
                branch_id,
                sequence,
                payload,
            },
            4 + length,
        ))
    }

    /// Encoded size of this record on disk.
    pub fn encoded_len(&self) -> usize {
        4 + RECORD_FIXED_LEN + self.payload.len() + 4
    }
}

fn compute_crc(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Record parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// Not enough bytes for a complete record (torn tail)
    #[error("incomplete record")]
    Incomplete,

    /// Framing is malformed
    #[error("invalid record format")]
    InvalidFormat,

    /// Checksum verification failed
    #[error("checksum mismatch: expected {expected:08x}, computed {computed:08x}")]
    ChecksumMismatch {
        /// Checksum stored in the record
        expected: u32,
        /// Checksum computed over the body
        computed: u32,
    },

    /// Unsupported record format version
    #[error("unsupported record format version: {0}")]
    UnsupportedVersion(u8),

    /// Unknown primitive tag byte
    #[error("unknown primitive tag: {0}")]
    UnknownTag(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> WalRecord {
        WalRecord::new(
            PrimitiveTag::Kv,
            BranchId::new(),
            42,
            vec![1, 2, 3, 4, 5],
        )
    }

    #[test]
    fn segment_header_roundtrip() {
        let header = SegmentHeader::new(12345, [0xAB; 16]);
        let parsed = SegmentHeader::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(parsed, header);
        assert!(parsed.is_valid());
    }

    #[test]
    fn segment_header_invalid_magic() {
        let mut header = SegmentHeader::new(1, [0; 16]);
        header.magic = *b"XXXX";
        assert!(!header.is_valid());
    }

    #[test]
    fn record_roundtrip() {
        let record = sample_record();
        let bytes = record.to_bytes();
        assert_eq!(bytes.len(), record.encoded_len());

        let (parsed, consumed) = WalRecord::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, record);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn record_empty_payload() {
        let record = WalRecord::new(PrimitiveTag::Control, BranchId::new(), 1, Vec::new());
        let (parsed, _) = WalRecord::from_bytes(&record.to_bytes()).unwrap();
        assert!(parsed.payload.is_empty());
    }

    #[test]
    fn corrupted_body_fails_checksum() {
        let mut bytes = sample_record().to_bytes();
        bytes[10] ^= 0xFF;
        assert!(matches!(
            WalRecord::from_bytes(&bytes),
            Err(RecordError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn torn_tail_is_incomplete() {
        let bytes = sample_record().to_bytes();
        // Cut the record in half, as a crash mid-write would.
        let torn = &bytes[..bytes.len() / 2];
        assert!(matches!(
            WalRecord::from_bytes(torn),
            Err(RecordError::Incomplete)
        ));
    }

    #[test]
    fn unknown_tag_rejected() {
        let record = sample_record();
        let mut bytes = record.to_bytes();
        // Patch the tag byte and fix up the checksum so only the tag is bad.
        bytes[5] = 0x7F;
        let length = u32::from_le_bytes(bytes[0..4].try_into().unwrap()) as usize;
        let crc = compute_crc(&bytes[4..4 + length - 4]);
        let crc_offset = 4 + length - 4;
        bytes[crc_offset..crc_offset + 4].copy_from_slice(&crc.to_le_bytes());

        assert!(matches!(
            WalRecord::from_bytes(&bytes),
            Err(RecordError::UnknownTag(0x7F))
        ));
    }

    #[test]
    fn records_parse_in_sequence() {
        let records = vec![
            WalRecord::new(PrimitiveTag::Kv, BranchId::new(), 1, vec![1]),
            WalRecord::new(PrimitiveTag::Event, BranchId::new(), 2, vec![2, 2]),
            WalRecord::new(PrimitiveTag::Control, BranchId::new(), 3, vec![]),
        ];

        let mut all = Vec::new();
        for record in &records {
            all.extend_from_slice(&record.to_bytes());
        }

        let mut offset = 0;
        for expected in &records {
            let (parsed, consumed) = WalRecord::from_bytes(&all[offset..]).unwrap();
            assert_eq!(&parsed, expected);
            offset += consumed;
        }
        assert_eq!(offset, all.len());
    }
}
