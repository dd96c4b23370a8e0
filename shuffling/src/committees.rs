use anyhow::Result;
use types::{
    config::Spec,
    consts::DOMAIN_BEACON_ATTESTER,
    nonstandard::BoundedIndex,
    primitives::{Epoch, ValidatorIndex, H256},
};

use crate::shuffle_slice;

/// `hash(domain_type ‖ epoch ‖ mix)` where `mix` is the randao mix at
/// `epoch + EPOCHS_PER_HISTORICAL_VECTOR − MIN_SEED_LOOKAHEAD − 1`.
/// The caller resolves the mix; this keeps the seed free of any
/// assumption about where mixes are stored.
#[must_use]
pub fn attester_shuffling_seed(epoch: Epoch, mix: H256) -> H256 {
    hashing::hash_32_64_256(DOMAIN_BEACON_ATTESTER, epoch, mix)
}

#[must_use]
pub fn committee_count_per_slot(spec: &Spec, active_validator_count: u64) -> u64 {
    (active_validator_count / spec.slots_per_epoch / spec.target_committee_size)
        .clamp(1, spec.max_committees_per_slot)
}

/// The committee assignment of one epoch: the active validator set
/// shuffled by the epoch's seed and partitioned into
/// `SLOTS_PER_EPOCH × committees_per_slot` equal slices.
pub struct EpochShuffling {
    pub epoch: Epoch,
    /// Active validator indices in registry order.
    pub active_indices: Vec<ValidatorIndex>,
    pub committees_per_slot: u64,
    shuffled: Vec<ValidatorIndex>,
    slots_per_epoch: u64,
}

impl EpochShuffling {
    pub fn new(
        spec: &Spec,
        indices_bounded: &[BoundedIndex],
        seed: H256,
        epoch: Epoch,
    ) -> Result<Self> {
        let active_indices = indices_bounded
            .iter()
            .filter(|bounded| bounded.is_active_at(epoch))
            .map(|bounded| bounded.index)
            .collect::<Vec<_>>();

        let committees_per_slot =
            committee_count_per_slot(spec, active_indices.len().try_into()?);

        let mut shuffled = active_indices.clone();
        shuffle_slice(&mut shuffled, seed, spec.shuffle_round_count)?;

        Ok(Self {
            epoch,
            active_indices,
            committees_per_slot,
            shuffled,
            slots_per_epoch: spec.slots_per_epoch,
        })
    }

    /// The committee at (`slot_in_epoch`, `committee_index`), following
    /// `compute_committee`: slice `[n·i/c, n·(i+1)/c)` of the shuffled set,
    /// where `i` counts committees from the start of the epoch.
    #[must_use]
    pub fn committee(&self, slot_in_epoch: u64, committee_index: u64) -> Option<&[ValidatorIndex]> {
        if slot_in_epoch >= self.slots_per_epoch || committee_index >= self.committees_per_slot {
            return None;
        }

        let validator_count = self.shuffled.len() as u64;
        let committees_in_epoch = self.committees_per_slot * self.slots_per_epoch;
        let index_in_epoch = slot_in_epoch * self.committees_per_slot + committee_index;

        let start = (validator_count * index_in_epoch / committees_in_epoch) as usize;
        let end = (validator_count * (index_in_epoch + 1) / committees_in_epoch) as usize;

        Some(&self.shuffled[start..end])
    }

    #[must_use]
    pub fn max_active_index(&self) -> Option<ValidatorIndex> {
        self.active_indices.iter().copied().max()
    }
}
