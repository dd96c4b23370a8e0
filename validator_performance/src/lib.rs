pub use crate::{
    compute::{process_epoch, EpochLookup},
    jobs::{clamped_range, update_performance, Cancellation},
    store::{get_performance, last_epoch, perf_key, put_performance, reset, PERF_KEY_PREFIX},
    word::{ValidatorPerformance, HEAD_DISTANCE_UNKNOWN},
};

mod compute;
mod jobs;
mod store;
mod word;

use thiserror::Error as ThisError;
use types::primitives::{CommitteeIndex, Epoch, Slot};

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(
        "aggregation bitfield of {actual} bits does not match \
         committee of {expected} members in epoch {epoch}"
    )]
    AggregationBitsMismatch {
        epoch: Epoch,
        expected: usize,
        actual: usize,
    },
    #[error("attestation at slot {slot} references committee {committee_index} out of range")]
    CommitteeOutOfRange {
        slot: Slot,
        committee_index: CommitteeIndex,
    },
    #[error(
        "attestation for slot {attestation_slot} claims inclusion \
         at earlier slot {inclusion_slot}"
    )]
    InclusionBeforeAttestation {
        attestation_slot: Slot,
        inclusion_slot: Slot,
    },
    #[error("attestation slot {slot} is outside its target epoch {epoch}")]
    AttestationSlotOutsideEpoch { slot: Slot, epoch: Epoch },
    #[error("interrupted")]
    Interrupted,
}
