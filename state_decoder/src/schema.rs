//! Serialized beacon-state and block layouts, per fork.
//!
//! Only offsets of the projected fields are computed. The four forks share
//! their fixed-part layout up to and including `slashings`; the fields that
//! changed across forks all sit after it, so the forks differ here only in
//! the minimum size a state must have to be considered well-formed.

use ssz::BYTES_PER_LENGTH_OFFSET;
use types::{config::Spec, nonstandard::Phase, primitives::H256};

/// pubkey, withdrawal_credentials, effective_balance, slashed,
/// activation_eligibility_epoch, activation_epoch, exit_epoch,
/// withdrawable_epoch
pub const VALIDATOR_SIZE: usize = 48 + 32 + 8 + 1 + 8 + 8 + 8 + 8;
pub const VALIDATOR_ACTIVATION_EPOCH_POSITION: usize = 48 + 32 + 8 + 1 + 8;
pub const VALIDATOR_EXIT_EPOCH_POSITION: usize = VALIDATOR_ACTIVATION_EPOCH_POSITION + 8;

const FORK_SIZE: usize = 4 + 4 + 8;
const BEACON_BLOCK_HEADER_SIZE: usize = 8 + 8 + 32 + 32 + 32;
const ETH1_DATA_SIZE: usize = 32 + 8 + 32;
const CHECKPOINT_SIZE: usize = 8 + 32;
const JUSTIFICATION_BITS_SIZE: usize = 1;

#[derive(Clone, Copy, Debug)]
pub struct StateSchema {
    pub phase: Phase,
    pub block_roots_position: usize,
    pub block_roots_count: usize,
    pub randao_mixes_position: usize,
    pub randao_mixes_count: usize,
    pub validators_offset_position: usize,
    pub balances_offset_position: usize,
    pub minimum_size: usize,
}

impl StateSchema {
    #[must_use]
    pub fn new(spec: &Spec, phase: Phase) -> Self {
        let block_roots_count = spec.slots_per_historical_root as usize;
        let randao_mixes_count = spec.epochs_per_historical_vector as usize;
        let roots_vector_size = block_roots_count * H256::len_bytes();

        // genesis_time, genesis_validators_root, slot, fork, latest_block_header
        let block_roots_position = 8 + 32 + 8 + FORK_SIZE + BEACON_BLOCK_HEADER_SIZE;
        // block_roots, state_roots, historical_roots offset, eth1_data,
        // eth1_data_votes offset, eth1_deposit_index
        let validators_offset_position = block_roots_position
            + 2 * roots_vector_size
            + BYTES_PER_LENGTH_OFFSET
            + ETH1_DATA_SIZE
            + BYTES_PER_LENGTH_OFFSET
            + 8;
        let balances_offset_position = validators_offset_position + BYTES_PER_LENGTH_OFFSET;
        let randao_mixes_position = balances_offset_position + BYTES_PER_LENGTH_OFFSET;

        // slashings
        let after_slashings = randao_mixes_position
            + randao_mixes_count * H256::len_bytes()
            + spec.epochs_per_slashings_vector as usize * 8;

        let sync_committee_size = spec.sync_committee_size as usize * 48 + 48;

        // Up to Altair the epoch attestation (or participation) fields are
        // two offsets; every later addition is appended at the end.
        let epoch_fields = 2 * BYTES_PER_LENGTH_OFFSET
            + JUSTIFICATION_BITS_SIZE
            + 3 * CHECKPOINT_SIZE;

        let tail = match phase {
            Phase::Phase0 => epoch_fields,
            Phase::Altair => epoch_fields + BYTES_PER_LENGTH_OFFSET + 2 * sync_committee_size,
            Phase::Bellatrix => {
                epoch_fields + 2 * BYTES_PER_LENGTH_OFFSET + 2 * sync_committee_size
            }
            Phase::Capella => {
                epoch_fields + 3 * BYTES_PER_LENGTH_OFFSET + 2 * sync_committee_size + 8 + 8
            }
        };

        Self {
            phase,
            block_roots_position,
            block_roots_count,
            randao_mixes_position,
            randao_mixes_count,
            validators_offset_position,
            balances_offset_position,
            minimum_size: after_slashings + tail,
        }
    }
}

/// message offset, signature
pub const SIGNED_BLOCK_FIXED_SIZE: usize = BYTES_PER_LENGTH_OFFSET + 96;
/// slot, proposer_index, parent_root, state_root, body offset
pub const BLOCK_FIXED_SIZE: usize = 8 + 8 + 32 + 32 + BYTES_PER_LENGTH_OFFSET;

/// randao_reveal, eth1_data, graffiti, then the offsets of
/// proposer_slashings and attester_slashings.
pub const ATTESTATIONS_OFFSET_POSITION: usize =
    96 + ETH1_DATA_SIZE + 32 + 2 * BYTES_PER_LENGTH_OFFSET;
pub const DEPOSITS_OFFSET_POSITION: usize =
    ATTESTATIONS_OFFSET_POSITION + BYTES_PER_LENGTH_OFFSET;

/// aggregation_bits offset, data, signature
pub const ATTESTATION_FIXED_SIZE: usize = BYTES_PER_LENGTH_OFFSET + 128 + 96;

/// Minimum size of the fixed part of a block body at `phase`. Phase0 ends
/// with the voluntary_exits offset; Altair appends the sync aggregate,
/// Bellatrix the execution payload offset, Capella the BLS change offset.
#[must_use]
pub const fn body_fixed_size(spec: &Spec, phase: Phase) -> usize {
    let phase0 = DEPOSITS_OFFSET_POSITION + 2 * BYTES_PER_LENGTH_OFFSET;
    let sync_aggregate = spec.sync_committee_size as usize / 8 + 96;

    match phase {
        Phase::Phase0 => phase0,
        Phase::Altair => phase0 + sync_aggregate,
        Phase::Bellatrix => phase0 + sync_aggregate + BYTES_PER_LENGTH_OFFSET,
        Phase::Capella => phase0 + sync_aggregate + 2 * BYTES_PER_LENGTH_OFFSET,
    }
}
