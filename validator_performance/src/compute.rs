use anyhow::Result;
use shuffling::{attester_shuffling_seed, EpochShuffling};
use types::{
    config::Spec,
    containers::{Attestation, AttestationData},
    nonstandard::BoundedIndex,
    primitives::{Epoch, Slot, H256},
};

use crate::{
    word::{ValidatorPerformance, HEAD_DISTANCE_UNKNOWN},
    Error,
};

/// Chain data the per-epoch computation draws on. Implemented once per job
/// with references into the loaded era states.
pub trait EpochLookup {
    /// The root of the block at `slot`, taken from a state's
    /// `block_roots` vector. Empty slots repeat the preceding root there,
    /// which is exactly what the head-distance walk wants.
    fn block_root(&self, slot: Slot) -> Result<H256>;

    /// Attestations of the block at `slot`; empty when the slot has no
    /// block.
    fn attestations(&self, slot: Slot) -> Result<Vec<Attestation>>;

    /// The randao mix the attester shuffling of `epoch` is seeded from.
    fn randao_mix(&self, epoch: Epoch) -> Result<H256>;
}

/// Attestation performance of every validator for the epoch *before*
/// `current_epoch`, judged with one epoch of hindsight: an attestation
/// voting in epoch `N` may be included up to the end of epoch `N+1`, so
/// the result for epoch `N` is complete once `current_epoch == N+1`.
///
/// At genesis the previous epoch is the current one and only its own
/// slots are scanned.
pub fn process_epoch(
    spec: &Spec,
    lookup: &impl EpochLookup,
    indices_bounded: &[BoundedIndex],
    current_epoch: Epoch,
) -> Result<Vec<ValidatorPerformance>> {
    let previous_epoch = current_epoch.saturating_sub(1);
    let previous_start = spec.epoch_start_slot(previous_epoch);

    let scanned_slots = if previous_epoch == current_epoch {
        spec.slots_per_epoch
    } else {
        2 * spec.slots_per_epoch
    };

    let roots = (0..spec.slots_per_epoch)
        .map(|offset| lookup.block_root(previous_start + offset))
        .collect::<Result<Vec<_>>>()?;

    let blocks = (0..scanned_slots)
        .map(|offset| {
            let slot = previous_start + offset;
            Ok((slot, lookup.attestations(slot)?))
        })
        .collect::<Result<Vec<_>>>()?;

    let mix = lookup.randao_mix(previous_epoch)?;
    let seed = attester_shuffling_seed(previous_epoch, mix);
    let shuffling = EpochShuffling::new(spec, indices_bounded, seed, previous_epoch)?;

    // Validators that activated late leave gaps; those entries stay zero.
    let length = shuffling
        .max_active_index()
        .map_or(0, |index| index as usize + 1);
    let mut performance = vec![ValidatorPerformance::default(); length];

    for index in &shuffling.active_indices {
        performance[*index as usize] = ValidatorPerformance::EXISTS;
    }

    let expected_target_root = roots[0];

    // Blocks come earliest first, so the first inclusion of a validator's
    // attestation is the one that sticks, matching the on-chain reward
    // rule for duplicate inclusions.
    for (inclusion_slot, attestations) in blocks {
        for attestation in attestations {
            let data = attestation.data;

            // A conflicting second vote for the same target is slashable
            // and not interesting here.
            if data.target.epoch != previous_epoch {
                continue;
            }

            if data.slot < previous_start
                || data.slot >= previous_start + spec.slots_per_epoch
            {
                return Err(Error::AttestationSlotOutsideEpoch {
                    slot: data.slot,
                    epoch: previous_epoch,
                }
                .into());
            }

            if inclusion_slot < data.slot {
                return Err(Error::InclusionBeforeAttestation {
                    attestation_slot: data.slot,
                    inclusion_slot,
                }
                .into());
            }

            let target_correct = data.target.root == expected_target_root;
            let head_distance = head_distance(&roots, previous_start, &data);
            let inclusion_distance =
                u8::try_from(inclusion_slot - data.slot).unwrap_or(u8::MAX);

            let word =
                ValidatorPerformance::attested(target_correct, head_distance, inclusion_distance);

            let committee = shuffling
                .committee(data.slot - previous_start, data.index)
                .ok_or(Error::CommitteeOutOfRange {
                    slot: data.slot,
                    committee_index: data.index,
                })?;

            if attestation.aggregation_bits.len() != committee.len() {
                return Err(Error::AggregationBitsMismatch {
                    epoch: previous_epoch,
                    expected: committee.len(),
                    actual: attestation.aggregation_bits.len(),
                }
                .into());
            }

            for bit_index in attestation.aggregation_bits.set_bits() {
                let entry = &mut performance[committee[bit_index] as usize];

                if !entry.is_credited() {
                    *entry = word;
                }
            }
        }
    }

    Ok(performance)
}

/// Steps backwards from the attested slot until the attested head root
/// appears in `roots`. Distance 1 means the attestation pointed at the
/// root of its own slot.
fn head_distance(roots: &[H256], previous_start: Slot, data: &AttestationData) -> u8 {
    let mut distance: u32 = 1;

    for slot in (previous_start..=data.slot).rev() {
        if data.beacon_block_root == roots[(slot - previous_start) as usize] {
            return u8::try_from(distance).unwrap_or(HEAD_DISTANCE_UNKNOWN);
        }

        distance += 1;
    }

    HEAD_DISTANCE_UNKNOWN
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use anyhow::bail;
    use ssz::BitList;
    use types::{
        consts::FAR_FUTURE_EPOCH,
        containers::{AttestationData, Checkpoint},
    };

    use super::*;

    /// Fixed chain data for direct `process_epoch` tests.
    struct MapLookup {
        roots: Vec<H256>,
        attestations: HashMap<Slot, Vec<Attestation>>,
        mix: H256,
    }

    impl MapLookup {
        fn new(spec: &Spec) -> Self {
            Self {
                roots: (0..2 * spec.slots_per_epoch)
                    .map(|slot| H256::from_low_u64_be(slot + 1))
                    .collect(),
                attestations: HashMap::new(),
                mix: H256::repeat_byte(0x99),
            }
        }
    }

    impl EpochLookup for MapLookup {
        fn block_root(&self, slot: Slot) -> Result<H256> {
            match self.roots.get(slot as usize) {
                Some(root) => Ok(*root),
                None => bail!("slot {slot} beyond fixture roots"),
            }
        }

        fn attestations(&self, slot: Slot) -> Result<Vec<Attestation>> {
            Ok(self.attestations.get(&slot).cloned().unwrap_or_default())
        }

        fn randao_mix(&self, _epoch: Epoch) -> Result<H256> {
            Ok(self.mix)
        }
    }

    fn all_active(count: u64) -> Vec<BoundedIndex> {
        (0..count)
            .map(|index| BoundedIndex {
                index,
                activation_epoch: 0,
                exit_epoch: FAR_FUTURE_EPOCH,
            })
            .collect()
    }

    fn single_committee(spec: &Spec, lookup: &MapLookup, indices: &[BoundedIndex]) -> EpochShuffling {
        let seed = attester_shuffling_seed(0, lookup.mix);
        EpochShuffling::new(spec, indices, seed, 0).expect("shuffling should succeed")
    }

    // An attestation at `slot` with all bits set over the committee there,
    // voting the canonical head and target.
    fn full_attestation(
        spec: &Spec,
        lookup: &MapLookup,
        indices: &[BoundedIndex],
        slot: Slot,
        committee_index: u64,
    ) -> Attestation {
        let shuffling = single_committee(spec, lookup, indices);
        let committee = shuffling
            .committee(slot, committee_index)
            .expect("fixture committee exists");

        Attestation {
            aggregation_bits: BitList::from_bits(vec![true; committee.len()]),
            data: AttestationData {
                slot,
                index: committee_index,
                beacon_block_root: lookup.roots[slot as usize],
                source: Checkpoint::default(),
                target: Checkpoint {
                    epoch: 0,
                    root: lookup.roots[0],
                },
            },
        }
    }

    // The genesis epoch is judged against itself with no attestations:
    // everyone active is marked as existing and nothing more.
    #[test]
    fn genesis_epoch_marks_active_validators() -> Result<()> {
        let spec = Spec::minimal();
        let lookup = MapLookup::new(&spec);
        let indices = all_active(64);

        let performance = process_epoch(&spec, &lookup, &indices, 0)?;

        assert_eq!(performance.len(), 64);
        assert!(performance
            .iter()
            .all(|word| *word == ValidatorPerformance::EXISTS));

        Ok(())
    }

    #[test]
    fn perfect_attestation_is_credited_to_the_committee() -> Result<()> {
        let spec = Spec::minimal();
        let mut lookup = MapLookup::new(&spec);
        let indices = all_active(64);

        let attestation = full_attestation(&spec, &lookup, &indices, 1, 0);
        // Included in the very next slot.
        lookup.attestations.insert(2, vec![attestation]);

        let shuffling = single_committee(&spec, &lookup, &indices);
        let committee = shuffling.committee(1, 0).expect("fixture committee exists");

        let performance = process_epoch(&spec, &lookup, &indices, 1)?;
        let expected = ValidatorPerformance::attested(true, 1, 1);

        assert_eq!(expected.to_u32(), 0x01 | 0xff << 16 | 1 << 24 | 1 << 8);

        for index in 0..64 {
            if committee.contains(&index) {
                assert_eq!(performance[index as usize], expected);
            } else {
                assert_eq!(performance[index as usize], ValidatorPerformance::EXISTS);
            }
        }

        Ok(())
    }

    #[test]
    fn unknown_head_is_marked_and_target_still_counts() -> Result<()> {
        let spec = Spec::minimal();
        let mut lookup = MapLookup::new(&spec);
        let indices = all_active(64);

        let mut attestation = full_attestation(&spec, &lookup, &indices, 1, 0);
        attestation.data.beacon_block_root = H256::repeat_byte(0xde);
        lookup.attestations.insert(2, vec![attestation]);

        let shuffling = single_committee(&spec, &lookup, &indices);
        let member = shuffling.committee(1, 0).expect("fixture committee exists")[0];

        let performance = process_epoch(&spec, &lookup, &indices, 1)?;
        let word = performance[member as usize];

        assert_eq!(word.head_distance(), HEAD_DISTANCE_UNKNOWN);
        assert!(word.target_correct());
        assert_eq!(word.inclusion_distance(), 1);

        Ok(())
    }

    #[test]
    fn head_distance_counts_steps_back() -> Result<()> {
        let spec = Spec::minimal();
        let mut lookup = MapLookup::new(&spec);
        let indices = all_active(64);

        let mut attestation = full_attestation(&spec, &lookup, &indices, 3, 0);
        // Vote for the head two slots back.
        attestation.data.beacon_block_root = lookup.roots[1];
        lookup.attestations.insert(4, vec![attestation]);

        let shuffling = single_committee(&spec, &lookup, &indices);
        let member = shuffling.committee(3, 0).expect("fixture committee exists")[0];

        let performance = process_epoch(&spec, &lookup, &indices, 1)?;

        assert_eq!(performance[member as usize].head_distance(), 3);

        Ok(())
    }

    #[test]
    fn earliest_inclusion_wins() -> Result<()> {
        let spec = Spec::minimal();
        let mut lookup = MapLookup::new(&spec);
        let indices = all_active(64);

        let attestation = full_attestation(&spec, &lookup, &indices, 1, 0);
        lookup.attestations.insert(3, vec![attestation.clone()]);
        lookup.attestations.insert(6, vec![attestation]);

        let shuffling = single_committee(&spec, &lookup, &indices);
        let member = shuffling.committee(1, 0).expect("fixture committee exists")[0];

        let performance = process_epoch(&spec, &lookup, &indices, 1)?;

        assert_eq!(performance[member as usize].inclusion_distance(), 2);

        Ok(())
    }

    #[test]
    fn attestations_for_other_targets_are_skipped() -> Result<()> {
        let spec = Spec::minimal();
        let mut lookup = MapLookup::new(&spec);
        let indices = all_active(64);

        let mut attestation = full_attestation(&spec, &lookup, &indices, 1, 0);
        attestation.data.target.epoch = 7;
        lookup.attestations.insert(2, vec![attestation]);

        let performance = process_epoch(&spec, &lookup, &indices, 1)?;

        assert!(performance
            .iter()
            .all(|word| *word == ValidatorPerformance::EXISTS));

        Ok(())
    }

    #[test]
    fn wrong_bitfield_length_is_fatal() {
        let spec = Spec::minimal();
        let mut lookup = MapLookup::new(&spec);
        let indices = all_active(64);

        let mut attestation = full_attestation(&spec, &lookup, &indices, 1, 0);
        attestation.aggregation_bits = BitList::from_bits([true]);
        lookup.attestations.insert(2, vec![attestation]);

        let error = process_epoch(&spec, &lookup, &indices, 1)
            .expect_err("mismatched bitfield must fail");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::AggregationBitsMismatch { .. }),
        ));
    }

    #[test]
    fn out_of_range_committee_is_fatal() {
        let spec = Spec::minimal();
        let mut lookup = MapLookup::new(&spec);
        let indices = all_active(64);

        let mut attestation = full_attestation(&spec, &lookup, &indices, 1, 0);
        attestation.data.index = 100;
        lookup.attestations.insert(2, vec![attestation]);

        let error = process_epoch(&spec, &lookup, &indices, 1)
            .expect_err("committee index out of range must fail");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::CommitteeOutOfRange { .. }),
        ));
    }

    #[test]
    fn late_activations_leave_gaps() -> Result<()> {
        let spec = Spec::minimal();
        let lookup = MapLookup::new(&spec);

        let mut indices = all_active(8);
        indices[3].activation_epoch = 100;

        let performance = process_epoch(&spec, &lookup, &indices, 0)?;

        assert_eq!(performance.len(), 8);
        assert!(!performance[3].exists());
        assert!(performance[7].exists());

        Ok(())
    }
}
