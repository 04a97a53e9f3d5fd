//! Write intents and acknowledgement receipts.
//!
//! Primitives hand the durability manager a [`WriteIntent`] and get back a
//! [`Receipt`]. The receipt resolves immediately for modes that acknowledge
//! on the submitting thread, or when the batch scheduler's shared flush
//! completes for buffered intents.

use crate::format::WalRecord;
use crate::mode::DurabilityMode;
use sediment_core::{BranchId, Error, PrimitiveTag, Result, SequenceNumber};
use std::sync::mpsc;

/// A mutation bound for the write-ahead log.
#[derive(Debug, Clone)]
pub struct WriteIntent {
    /// Branch the mutation targets
    pub branch_id: BranchId,
    /// Primitive that owns the payload
    pub tag: PrimitiveTag,
    /// Store-wide sequence number assigned at submission
    pub sequence: SequenceNumber,
    /// Serialized mutation, opaque to the durability layer
    pub payload: Vec<u8>,
    /// Durability policy for this write
    pub mode: DurabilityMode,
}

impl WriteIntent {
    /// Create an intent.
    pub fn new(
        branch_id: BranchId,
        tag: PrimitiveTag,
        sequence: SequenceNumber,
        payload: Vec<u8>,
        mode: DurabilityMode,
    ) -> Self {
        WriteIntent {
            branch_id,
            tag,
            sequence,
            payload,
            mode,
        }
    }

    /// Convert into the on-disk record form.
    pub fn into_record(self) -> WalRecord {
        WalRecord::new(self.tag, self.branch_id, self.sequence, self.payload)
    }
}

/// Acknowledgement handle for a submitted write.
///
/// Holds either an already-resolved outcome or a channel the batch
/// scheduler resolves after the shared flush.
#[derive(Debug)]
pub enum Receipt {
    /// Outcome known at submission time.
    Ready(Result<SequenceNumber>),
    /// Outcome arrives when the intent's flush window completes.
    Pending(mpsc::Receiver<Result<SequenceNumber>>),
}

impl Receipt {
    /// A receipt that resolved successfully at submission.
    pub fn ready(sequence: SequenceNumber) -> Self {
        Receipt::Ready(Ok(sequence))
    }

    /// A receipt that failed at submission.
    pub fn failed(error: Error) -> Self {
        Receipt::Ready(Err(error))
    }

    /// Block until the write is acknowledged.
    ///
    /// For buffered intents this waits out the flush window; for all
    /// other modes it returns immediately.
    pub fn wait(self) -> Result<SequenceNumber> {
        match self {
            Receipt::Ready(result) => result,
            Receipt::Pending(receiver) => receiver
                .recv()
                .map_err(|_| Error::Internal("durability worker dropped a pending write".into()))?,
        }
    }

    /// Whether the outcome is already known.
    pub fn is_ready(&self) -> bool {
        matches!(self, Receipt::Ready(_))
    }
}
