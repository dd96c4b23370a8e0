use serde::Deserialize;

use crate::{
    nonstandard::Phase,
    primitives::{Epoch, Slot},
};

/// Chain parameters customizable at runtime.
///
/// Standard configurations express these as `SCREAMING_SNAKE_CASE` keys,
/// which is also how spec files serialize them. Only the parameters this
/// workspace consumes are listed; unknown keys in a spec file are ignored.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Spec {
    pub slots_per_epoch: u64,
    pub slots_per_historical_root: u64,
    pub epochs_per_historical_vector: u64,
    pub epochs_per_slashings_vector: u64,
    pub sync_committee_size: u64,
    pub min_seed_lookahead: u64,
    pub shuffle_round_count: u8,
    pub target_committee_size: u64,
    pub max_committees_per_slot: u64,
    pub max_validators_per_committee: usize,

    pub altair_fork_epoch: Epoch,
    pub bellatrix_fork_epoch: Epoch,
    pub capella_fork_epoch: Epoch,
}

impl Default for Spec {
    fn default() -> Self {
        Self::mainnet()
    }
}

impl Spec {
    #[must_use]
    pub const fn mainnet() -> Self {
        Self {
            slots_per_epoch: 32,
            slots_per_historical_root: 8192,
            epochs_per_historical_vector: 65536,
            epochs_per_slashings_vector: 8192,
            sync_committee_size: 512,
            min_seed_lookahead: 1,
            shuffle_round_count: 90,
            target_committee_size: 128,
            max_committees_per_slot: 64,
            max_validators_per_committee: 2048,
            altair_fork_epoch: 74_240,
            bellatrix_fork_epoch: 144_896,
            capella_fork_epoch: 194_048,
        }
    }

    /// A tiny configuration for tests: short epochs and a single
    /// committee per slot for small validator sets.
    #[must_use]
    pub const fn minimal() -> Self {
        Self {
            slots_per_epoch: 8,
            slots_per_historical_root: 64,
            epochs_per_historical_vector: 64,
            epochs_per_slashings_vector: 64,
            sync_committee_size: 32,
            min_seed_lookahead: 1,
            shuffle_round_count: 10,
            target_committee_size: 4,
            max_committees_per_slot: 4,
            max_validators_per_committee: 2048,
            altair_fork_epoch: Epoch::MAX,
            bellatrix_fork_epoch: Epoch::MAX,
            capella_fork_epoch: Epoch::MAX,
        }
    }

    #[must_use]
    pub const fn epoch_at_slot(&self, slot: Slot) -> Epoch {
        slot / self.slots_per_epoch
    }

    #[must_use]
    pub const fn epoch_start_slot(&self, epoch: Epoch) -> Slot {
        epoch * self.slots_per_epoch
    }

    #[must_use]
    pub const fn phase_at_epoch(&self, epoch: Epoch) -> Phase {
        if epoch >= self.capella_fork_epoch {
            Phase::Capella
        } else if epoch >= self.bellatrix_fork_epoch {
            Phase::Bellatrix
        } else if epoch >= self.altair_fork_epoch {
            Phase::Altair
        } else {
            Phase::Phase0
        }
    }

    #[must_use]
    pub const fn phase_at_slot(&self, slot: Slot) -> Phase {
        self.phase_at_epoch(self.epoch_at_slot(slot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_schedule_is_total_and_ordered() {
        let spec = Spec::mainnet();

        assert_eq!(spec.phase_at_epoch(0), Phase::Phase0);
        assert_eq!(spec.phase_at_epoch(74_239), Phase::Phase0);
        assert_eq!(spec.phase_at_epoch(74_240), Phase::Altair);
        assert_eq!(spec.phase_at_epoch(144_896), Phase::Bellatrix);
        assert_eq!(spec.phase_at_epoch(194_048), Phase::Capella);
        assert_eq!(spec.phase_at_epoch(u64::MAX), Phase::Capella);
    }

    #[test]
    fn spec_files_use_screaming_snake_case() {
        let spec: Spec = serde_json::from_str(
            r#"{"SLOTS_PER_EPOCH": 16, "CAPELLA_FORK_EPOCH": 7}"#,
        )
        .expect("spec file should deserialize");

        assert_eq!(spec.slots_per_epoch, 16);
        assert_eq!(spec.capella_fork_epoch, 7);
        assert_eq!(
            spec.epochs_per_historical_vector,
            Spec::mainnet().epochs_per_historical_vector,
        );
    }

    #[test]
    fn epoch_slot_arithmetic() {
        let spec = Spec::mainnet();

        assert_eq!(spec.epoch_at_slot(0), 0);
        assert_eq!(spec.epoch_at_slot(31), 0);
        assert_eq!(spec.epoch_at_slot(32), 1);
        assert_eq!(spec.epoch_start_slot(2), 64);
    }
}
