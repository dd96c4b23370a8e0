//! Projects era-archived beacon states and signed blocks into the handful
//! of fields the performance pipeline reads. Fork selection is a total
//! function of the spec's fork-activation epochs; the decoder never probes.

pub use crate::schema::{StateSchema, VALIDATOR_SIZE};

pub mod schema;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

use ssz::BitList;
use thiserror::Error;
use types::{
    config::Spec,
    containers::{Attestation, AttestationData, Checkpoint},
    nonstandard::{BoundedIndex, Phase},
    primitives::{Epoch, Slot, H256},
};

use crate::schema::{
    body_fixed_size, ATTESTATIONS_OFFSET_POSITION, ATTESTATION_FIXED_SIZE, BLOCK_FIXED_SIZE,
    DEPOSITS_OFFSET_POSITION, SIGNED_BLOCK_FIXED_SIZE, VALIDATOR_ACTIVATION_EPOCH_POSITION,
    VALIDATOR_EXIT_EPOCH_POSITION,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Read(#[from] ssz::ReadError),
    #[error("{phase:?} state of {actual} bytes is shorter than the minimum {expected}")]
    StateTooShort {
        phase: Phase,
        expected: usize,
        actual: usize,
    },
    #[error("{phase:?} block body of {actual} bytes is shorter than the minimum {expected}")]
    BodyTooShort {
        phase: Phase,
        expected: usize,
        actual: usize,
    },
    #[error("validator registry of {length} bytes is not a whole number of records")]
    ValidatorRegistryMisaligned { length: usize },
    #[error("expected attestation fixed part of {expected} bytes, found offset {actual}")]
    AttestationShapeInvalid { expected: usize, actual: usize },
    #[error("loaded block at slot {decoded}, requested slot {requested}")]
    SlotMismatch { requested: Slot, decoded: Slot },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ValidatorBounds {
    pub activation_epoch: Epoch,
    pub exit_epoch: Epoch,
}

/// The downstream projection of a beacon state.
#[derive(Debug)]
pub struct StateView {
    pub slot: Slot,
    pub block_roots: Vec<H256>,
    pub randao_mixes: Vec<H256>,
    pub validators: Vec<ValidatorBounds>,
}

impl StateView {
    #[must_use]
    pub fn bounded_indices(&self) -> Vec<BoundedIndex> {
        (0..)
            .zip(&self.validators)
            .map(|(index, validator)| BoundedIndex {
                index,
                activation_epoch: validator.activation_epoch,
                exit_epoch: validator.exit_epoch,
            })
            .collect()
    }
}

/// The downstream projection of a signed beacon block.
#[derive(Debug)]
pub struct BlockView {
    pub slot: Slot,
    pub attestations: Vec<Attestation>,
}

pub fn decode_state(spec: &Spec, phase: Phase, bytes: &[u8]) -> Result<StateView, Error> {
    let schema = StateSchema::new(spec, phase);

    if bytes.len() < schema.minimum_size {
        return Err(Error::StateTooShort {
            phase,
            expected: schema.minimum_size,
            actual: bytes.len(),
        });
    }

    // slot follows genesis_time and genesis_validators_root
    let slot = ssz::read_u64(bytes, 40)?;

    let block_roots =
        ssz::read_h256_vector(bytes, schema.block_roots_position, schema.block_roots_count)?;
    let randao_mixes =
        ssz::read_h256_vector(bytes, schema.randao_mixes_position, schema.randao_mixes_count)?;

    let registry_start = ssz::read_offset(bytes, schema.validators_offset_position)?;
    let registry_end = ssz::read_offset(bytes, schema.balances_offset_position)?;
    let registry = ssz::subslice(bytes, registry_start, registry_end)?;

    if registry.len() % VALIDATOR_SIZE != 0 {
        return Err(Error::ValidatorRegistryMisaligned {
            length: registry.len(),
        });
    }

    let validators = registry
        .chunks_exact(VALIDATOR_SIZE)
        .map(|record| {
            Ok(ValidatorBounds {
                activation_epoch: ssz::read_u64(record, VALIDATOR_ACTIVATION_EPOCH_POSITION)?,
                exit_epoch: ssz::read_u64(record, VALIDATOR_EXIT_EPOCH_POSITION)?,
            })
        })
        .collect::<Result<_, ssz::ReadError>>()?;

    Ok(StateView {
        slot,
        block_roots,
        randao_mixes,
        validators,
    })
}

/// Decodes the attestations of the signed block serialized in `bytes`.
/// A slot disagreeing with `slot` means the archive handed back the wrong
/// block and fails the decode.
pub fn decode_block(
    spec: &Spec,
    phase: Phase,
    bytes: &[u8],
    slot: Slot,
) -> Result<BlockView, Error> {
    let message_start = ssz::read_offset(bytes, 0)?;

    if message_start != SIGNED_BLOCK_FIXED_SIZE {
        return Err(ssz::ReadError::ListFirstOffsetMismatch {
            expected: SIGNED_BLOCK_FIXED_SIZE,
            actual: message_start,
        }
        .into());
    }

    let message = ssz::subslice(bytes, message_start, bytes.len())?;
    let decoded = ssz::read_u64(message, 0)?;

    if decoded != slot {
        return Err(Error::SlotMismatch {
            requested: slot,
            decoded,
        });
    }

    let body_start = ssz::read_offset(message, BLOCK_FIXED_SIZE - 4)?;

    if body_start != BLOCK_FIXED_SIZE {
        return Err(ssz::ReadError::ListFirstOffsetMismatch {
            expected: BLOCK_FIXED_SIZE,
            actual: body_start,
        }
        .into());
    }

    let body = ssz::subslice(message, body_start, message.len())?;
    let minimum = body_fixed_size(spec, phase);

    if body.len() < minimum {
        return Err(Error::BodyTooShort {
            phase,
            expected: minimum,
            actual: body.len(),
        });
    }

    let attestations_start = ssz::read_offset(body, ATTESTATIONS_OFFSET_POSITION)?;
    let attestations_end = ssz::read_offset(body, DEPOSITS_OFFSET_POSITION)?;
    let attestations_bytes = ssz::subslice(body, attestations_start, attestations_end)?;

    let attestations = ssz::variable_list_bounds(attestations_bytes)?
        .into_iter()
        .map(|(start, end)| {
            let element = ssz::subslice(attestations_bytes, start, end)?;
            decode_attestation(spec, element)
        })
        .collect::<Result<_, _>>()?;

    Ok(BlockView {
        slot: decoded,
        attestations,
    })
}

fn decode_attestation(spec: &Spec, bytes: &[u8]) -> Result<Attestation, Error> {
    let bits_start = ssz::read_offset(bytes, 0)?;

    if bits_start != ATTESTATION_FIXED_SIZE {
        return Err(Error::AttestationShapeInvalid {
            expected: ATTESTATION_FIXED_SIZE,
            actual: bits_start,
        });
    }

    let data = AttestationData {
        slot: ssz::read_u64(bytes, 4)?,
        index: ssz::read_u64(bytes, 12)?,
        beacon_block_root: ssz::read_h256(bytes, 20)?,
        source: Checkpoint {
            epoch: ssz::read_u64(bytes, 52)?,
            root: ssz::read_h256(bytes, 60)?,
        },
        target: Checkpoint {
            epoch: ssz::read_u64(bytes, 92)?,
            root: ssz::read_h256(bytes, 100)?,
        },
    };

    // The aggregate signature at 132..228 is skipped; nothing downstream
    // verifies it.
    let bits = ssz::subslice(bytes, bits_start, bytes.len())?;
    let aggregation_bits = BitList::from_ssz(bits, spec.max_validators_per_committee)?;

    Ok(Attestation {
        aggregation_bits,
        data,
    })
}

#[cfg(test)]
mod tests {
    use ssz::BitList;
    use types::consts::FAR_FUTURE_EPOCH;

    use crate::testing::{BlockBuilder, StateBuilder};

    use super::*;

    #[test]
    fn state_round_trips_through_the_projection() {
        let spec = Spec::minimal();

        let view = StateBuilder::new(&spec)
            .slot(512)
            .block_root(3, H256::repeat_byte(0xaa))
            .randao_mix(7, H256::repeat_byte(0xbb))
            .validator(0, FAR_FUTURE_EPOCH)
            .validator(2, 9)
            .build_view();

        assert_eq!(view.slot, 512);
        assert_eq!(view.block_roots.len(), 64);
        assert_eq!(view.block_roots[3], H256::repeat_byte(0xaa));
        assert_eq!(view.randao_mixes[7], H256::repeat_byte(0xbb));
        assert_eq!(
            view.validators,
            [
                ValidatorBounds {
                    activation_epoch: 0,
                    exit_epoch: FAR_FUTURE_EPOCH,
                },
                ValidatorBounds {
                    activation_epoch: 2,
                    exit_epoch: 9,
                },
            ],
        );

        let bounded = view.bounded_indices();
        assert_eq!(bounded[1].index, 1);
        assert_eq!(bounded[1].activation_epoch, 2);
    }

    #[test]
    fn truncated_state_is_rejected() {
        let spec = Spec::minimal();
        let bytes = StateBuilder::new(&spec).build();

        assert!(matches!(
            decode_state(&spec, Phase::Phase0, &bytes[..bytes.len() - 1]),
            Err(Error::StateTooShort { .. }),
        ));
    }

    #[test]
    fn block_attestations_round_trip() {
        let spec = Spec::minimal();

        let attestation = Attestation {
            aggregation_bits: BitList::from_bits([true, false, true]),
            data: AttestationData {
                slot: 41,
                index: 1,
                beacon_block_root: H256::repeat_byte(0x01),
                source: Checkpoint::default(),
                target: Checkpoint {
                    epoch: 5,
                    root: H256::repeat_byte(0x02),
                },
            },
        };

        let bytes = BlockBuilder::new(&spec, 42)
            .attestation(attestation.clone())
            .build();

        let view = decode_block(&spec, Phase::Phase0, &bytes, 42)
            .expect("synthetic block should decode");

        assert_eq!(view.slot, 42);
        assert_eq!(view.attestations, [attestation]);
    }

    #[test]
    fn wrong_slot_fails_the_decode() {
        let spec = Spec::minimal();
        let bytes = BlockBuilder::new(&spec, 42).build();

        assert!(matches!(
            decode_block(&spec, Phase::Phase0, &bytes, 43),
            Err(Error::SlotMismatch {
                requested: 43,
                decoded: 42,
            }),
        ));
    }

    #[test]
    fn empty_block_has_no_attestations() {
        let spec = Spec::minimal();
        let bytes = BlockBuilder::new(&spec, 0).build();

        let view = decode_block(&spec, Phase::Phase0, &bytes, 0)
            .expect("synthetic block should decode");

        assert!(view.attestations.is_empty());
    }
}
