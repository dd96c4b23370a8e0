pub use crate::{
    format::SLOTS_PER_ERA,
    pool::{BufferPool, PooledBuffer},
    store::EraStore,
    summary::{summarize_era_file, GroupSummary},
};

pub mod format;

mod pool;
mod store;
mod summary;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

use thiserror::Error;
use types::primitives::Slot;

#[derive(Debug, Error)]
pub enum Error {
    #[error("entry reserved bytes are not zero: {reserved:02x?}")]
    ReservedBytesNotZero { reserved: [u8; 2] },
    #[error("expected entry of type {expected:02x?}, found type {actual:02x?}")]
    UnexpectedEntryType {
        expected: format::EntryType,
        actual: format::EntryType,
    },
    #[error("expected slot-index payload of {expected} bytes, found {actual}")]
    UnexpectedSlotIndexLength { expected: u64, actual: u64 },
    #[error("expected slot-index count {expected}, found {actual}")]
    UnexpectedSlotIndexCount { expected: u64, actual: u64 },
    #[error("group ending at {group_end} is too short to hold its slot indices")]
    GroupTooShort { group_end: u64 },
    #[error("slot-index offset {relative} from base {base} is out of bounds")]
    OffsetOutOfBounds { base: u64, relative: i64 },
    #[error("states can only be read at era boundaries, requested slot {slot}")]
    StateSlotMisaligned { slot: Slot },
    #[error("expected terminal state at slot {expected}, found slot {actual}")]
    StateSlotMismatch { expected: Slot, actual: Slot },
    #[error("no era file covers slot {slot}")]
    EraNotAvailable { slot: Slot },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
