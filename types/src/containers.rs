use ssz::BitList;

use crate::primitives::{CommitteeIndex, Epoch, Slot, H256};

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Checkpoint {
    pub epoch: Epoch,
    pub root: H256,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct AttestationData {
    pub slot: Slot,
    pub index: CommitteeIndex,
    pub beacon_block_root: H256,
    pub source: Checkpoint,
    pub target: Checkpoint,
}

/// The subset of an on-chain attestation the performance pipeline reads.
/// The aggregate signature is skipped at decode time; nothing here
/// verifies signatures.
#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct Attestation {
    pub aggregation_bits: BitList,
    pub data: AttestationData,
}
