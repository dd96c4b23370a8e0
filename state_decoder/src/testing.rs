//! Synthetic phase0 SSZ states and blocks for tests.

use ssz::BYTES_PER_LENGTH_OFFSET;
use types::{
    config::Spec,
    containers::Attestation,
    nonstandard::Phase,
    primitives::{Epoch, Slot, H256},
};

use crate::{
    decode_state,
    schema::{
        body_fixed_size, ATTESTATIONS_OFFSET_POSITION, ATTESTATION_FIXED_SIZE, BLOCK_FIXED_SIZE,
        DEPOSITS_OFFSET_POSITION, SIGNED_BLOCK_FIXED_SIZE, VALIDATOR_ACTIVATION_EPOCH_POSITION,
        VALIDATOR_EXIT_EPOCH_POSITION, VALIDATOR_SIZE,
    },
    StateSchema, StateView,
};

pub struct StateBuilder<'spec> {
    spec: &'spec Spec,
    slot: Slot,
    block_roots: Vec<H256>,
    randao_mixes: Vec<H256>,
    validators: Vec<(Epoch, Epoch)>,
}

impl<'spec> StateBuilder<'spec> {
    #[must_use]
    pub fn new(spec: &'spec Spec) -> Self {
        Self {
            spec,
            slot: 0,
            block_roots: vec![H256::zero(); spec.slots_per_historical_root as usize],
            randao_mixes: vec![H256::zero(); spec.epochs_per_historical_vector as usize],
            validators: vec![],
        }
    }

    #[must_use]
    pub const fn slot(mut self, slot: Slot) -> Self {
        self.slot = slot;
        self
    }

    #[must_use]
    pub fn block_root(mut self, index: usize, root: H256) -> Self {
        self.block_roots[index] = root;
        self
    }

    #[must_use]
    pub fn block_roots(mut self, roots: Vec<H256>) -> Self {
        assert_eq!(roots.len(), self.block_roots.len());
        self.block_roots = roots;
        self
    }

    #[must_use]
    pub fn randao_mix(mut self, index: usize, mix: H256) -> Self {
        self.randao_mixes[index] = mix;
        self
    }

    #[must_use]
    pub fn validator(mut self, activation_epoch: Epoch, exit_epoch: Epoch) -> Self {
        self.validators.push((activation_epoch, exit_epoch));
        self
    }

    #[must_use]
    pub fn validators(mut self, count: usize, activation_epoch: Epoch, exit_epoch: Epoch) -> Self {
        self.validators
            .extend(std::iter::repeat_n((activation_epoch, exit_epoch), count));
        self
    }

    #[must_use]
    pub fn build(self) -> Vec<u8> {
        let schema = StateSchema::new(self.spec, Phase::Phase0);
        let fixed_size = schema.minimum_size;

        let mut bytes = vec![0; fixed_size];

        // slot follows genesis_time and genesis_validators_root
        bytes[40..48].copy_from_slice(&self.slot.to_le_bytes());

        write_roots(&mut bytes, schema.block_roots_position, &self.block_roots);
        write_roots(&mut bytes, schema.randao_mixes_position, &self.randao_mixes);

        // Variable fields in field order: historical_roots, eth1_data_votes,
        // validators, balances, previous and current epoch attestations.
        // All but the validator registry stay empty.
        let roots_vector_size = self.block_roots.len() * H256::len_bytes();
        let historical_offset_position = schema.block_roots_position + 2 * roots_vector_size;
        let votes_offset_position = historical_offset_position + BYTES_PER_LENGTH_OFFSET + 72;
        let previous_offset_position = schema.randao_mixes_position
            + self.randao_mixes.len() * H256::len_bytes()
            + self.spec.epochs_per_slashings_vector as usize * 8;
        let current_offset_position = previous_offset_position + BYTES_PER_LENGTH_OFFSET;

        let registry_end = fixed_size + self.validators.len() * VALIDATOR_SIZE;

        write_offset(&mut bytes, historical_offset_position, fixed_size);
        write_offset(&mut bytes, votes_offset_position, fixed_size);
        write_offset(&mut bytes, schema.validators_offset_position, fixed_size);
        write_offset(&mut bytes, schema.balances_offset_position, registry_end);
        write_offset(&mut bytes, previous_offset_position, registry_end);
        write_offset(&mut bytes, current_offset_position, registry_end);

        for (activation_epoch, exit_epoch) in self.validators {
            let mut record = [0; VALIDATOR_SIZE];
            record[VALIDATOR_ACTIVATION_EPOCH_POSITION..VALIDATOR_ACTIVATION_EPOCH_POSITION + 8]
                .copy_from_slice(&activation_epoch.to_le_bytes());
            record[VALIDATOR_EXIT_EPOCH_POSITION..VALIDATOR_EXIT_EPOCH_POSITION + 8]
                .copy_from_slice(&exit_epoch.to_le_bytes());
            bytes.extend_from_slice(&record);
        }

        bytes
    }

    #[must_use]
    pub fn build_view(self) -> StateView {
        let spec = self.spec;
        decode_state(spec, Phase::Phase0, &self.build())
            .expect("synthetic state should decode")
    }
}

pub struct BlockBuilder<'spec> {
    spec: &'spec Spec,
    slot: Slot,
    attestations: Vec<Attestation>,
}

impl<'spec> BlockBuilder<'spec> {
    #[must_use]
    pub const fn new(spec: &'spec Spec, slot: Slot) -> Self {
        Self {
            spec,
            slot,
            attestations: vec![],
        }
    }

    #[must_use]
    pub fn attestation(mut self, attestation: Attestation) -> Self {
        self.attestations.push(attestation);
        self
    }

    #[must_use]
    pub fn build(self) -> Vec<u8> {
        let attestations = encode_attestations(&self.attestations);

        let body_fixed = body_fixed_size(self.spec, Phase::Phase0);
        let mut body = vec![0; body_fixed];

        // proposer_slashings and attester_slashings are empty lists at the
        // start of the variable section.
        write_offset(&mut body, ATTESTATIONS_OFFSET_POSITION - 8, body_fixed);
        write_offset(&mut body, ATTESTATIONS_OFFSET_POSITION - 4, body_fixed);
        write_offset(&mut body, ATTESTATIONS_OFFSET_POSITION, body_fixed);
        write_offset(
            &mut body,
            DEPOSITS_OFFSET_POSITION,
            body_fixed + attestations.len(),
        );
        write_offset(
            &mut body,
            DEPOSITS_OFFSET_POSITION + 4,
            body_fixed + attestations.len(),
        );
        body.extend_from_slice(&attestations);

        let mut message = vec![0; BLOCK_FIXED_SIZE];
        message[..8].copy_from_slice(&self.slot.to_le_bytes());
        write_offset(&mut message, BLOCK_FIXED_SIZE - 4, BLOCK_FIXED_SIZE);
        message.extend_from_slice(&body);

        let mut bytes = vec![0; SIGNED_BLOCK_FIXED_SIZE];
        write_offset(&mut bytes, 0, SIGNED_BLOCK_FIXED_SIZE);
        bytes.extend_from_slice(&message);
        bytes
    }
}

fn encode_attestations(attestations: &[Attestation]) -> Vec<u8> {
    let table_size = attestations.len() * BYTES_PER_LENGTH_OFFSET;

    let elements = attestations
        .iter()
        .map(|attestation| {
            let bits = attestation.aggregation_bits.to_ssz();
            let mut element = vec![0; ATTESTATION_FIXED_SIZE];
            let data = attestation.data;

            write_offset(&mut element, 0, ATTESTATION_FIXED_SIZE);
            element[4..12].copy_from_slice(&data.slot.to_le_bytes());
            element[12..20].copy_from_slice(&data.index.to_le_bytes());
            element[20..52].copy_from_slice(data.beacon_block_root.as_bytes());
            element[52..60].copy_from_slice(&data.source.epoch.to_le_bytes());
            element[60..92].copy_from_slice(data.source.root.as_bytes());
            element[92..100].copy_from_slice(&data.target.epoch.to_le_bytes());
            element[100..132].copy_from_slice(data.target.root.as_bytes());
            element.extend_from_slice(&bits);
            element
        })
        .collect::<Vec<_>>();

    let mut bytes = vec![];
    let mut position = table_size;

    for element in &elements {
        bytes.extend_from_slice(
            &u32::try_from(position)
                .expect("test attestations fit in u32")
                .to_le_bytes(),
        );
        position += element.len();
    }

    for element in &elements {
        bytes.extend_from_slice(element);
    }

    bytes
}

fn write_offset(bytes: &mut [u8], position: usize, offset: usize) {
    bytes[position..position + BYTES_PER_LENGTH_OFFSET].copy_from_slice(
        &u32::try_from(offset)
            .expect("test offsets fit in u32")
            .to_le_bytes(),
    );
}

fn write_roots(bytes: &mut [u8], position: usize, roots: &[H256]) {
    for (index, root) in roots.iter().enumerate() {
        let start = position + index * H256::len_bytes();
        bytes[start..start + H256::len_bytes()].copy_from_slice(root.as_bytes());
    }
}
