use core::time::Duration;
use std::{sync::atomic::{AtomicBool, Ordering}, thread::Builder};

use anyhow::{bail, ensure, Context as _, Result};
use crossbeam_channel::SendTimeoutError;
use database::Database;
use era_store::{EraStore, SLOTS_PER_ERA};
use log::{debug, info};
use parking_lot::Mutex;
use state_decoder::decode_state;
use types::{
    config::Spec,
    containers::Attestation,
    primitives::{Epoch, Slot, H256},
};

use crate::{compute::{process_epoch, EpochLookup}, store, Error};

const SEND_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Cooperative cancellation shared by a job group. The first real failure
/// trips the token and is kept as the group's result; an external cancel
/// trips it without a cause and surfaces as [`Error::Interrupted`].
#[derive(Default)]
pub struct Cancellation {
    cancelled: AtomicBool,
    cause: Mutex<Option<anyhow::Error>>,
}

impl Cancellation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn trip(&self, error: anyhow::Error) {
        // A worker that merely observed the cancellation must not
        // overwrite the cause of it.
        if !matches!(error.downcast_ref(), Some(Error::Interrupted)) {
            let mut cause = self.cause.lock();

            if cause.is_none() {
                *cause = Some(error);
            }
        }

        self.cancel();
    }

    fn take_cause(&self) -> Option<anyhow::Error> {
        self.cause.lock().take()
    }
}

#[derive(Clone, Copy, Debug)]
struct PerfJob {
    start: Epoch,
    end: Epoch,
}

/// Clamps a requested epoch range to what the era store can serve.
///
/// The start is raised to two epochs past the earliest era's first epoch:
/// the record for an epoch needs the block roots of the epoch before it
/// and the inclusion window reaching one epoch past it, and both must
/// fall inside archived eras.
pub fn clamped_range(
    spec: &Spec,
    era_store: &EraStore,
    start: Epoch,
    end: Epoch,
) -> Result<(Epoch, Epoch)> {
    let Some((min_slot, max_slot)) = era_store.bounds() else {
        bail!("era store holds no era files");
    };

    let min_epoch = spec.epoch_at_slot(min_slot);
    let max_epoch = spec.epoch_at_slot(max_slot);
    ensure!(min_epoch < max_epoch, "era store covers no epochs");

    let epochs_per_era = SLOTS_PER_ERA / spec.slots_per_epoch;

    let mut clamped_start = start;
    let mut clamped_end = end;

    if min_epoch > start.saturating_add(epochs_per_era - 2) {
        clamped_start = min_epoch - epochs_per_era + 2;
        log::warn!("raising start epoch to {clamped_start} (earliest era starts at {min_epoch})");
    }

    if max_epoch < end {
        clamped_end = max_epoch;
        log::warn!("lowering end epoch to {clamped_end} (latest era ends there)");
    }

    Ok((clamped_start, clamped_end))
}

/// Computes and stores performance records for epochs in `[start, end)`.
///
/// The range is split into era-aligned jobs fed to `workers` threads over
/// a bounded channel; each job loads its era states once and walks its
/// epochs in order. Cancellation is checked between epochs and between
/// block reads; scheduled jobs drain without starting once tripped.
pub fn update_performance(
    database: &Database,
    spec: &Spec,
    era_store: &EraStore,
    start: Epoch,
    end: Epoch,
    workers: usize,
    cancellation: &Cancellation,
) -> Result<()> {
    ensure!(start <= end, "invalid epoch range {start}..{end}");
    ensure!(
        (1..=128).contains(&workers),
        "worker count {workers} is out of range",
    );

    let epochs_per_era = SLOTS_PER_ERA / spec.slots_per_epoch;

    info!("computing performance for epochs {start}..{end} with {workers} workers");

    let (sender, receiver) = crossbeam_channel::bounded::<PerfJob>(workers);

    std::thread::scope(|scope| -> Result<()> {
        for index in 0..workers {
            let receiver = receiver.clone();

            Builder::new()
                .name(format!("perf-worker-{index}"))
                .spawn_scoped(scope, move || {
                    for job in receiver {
                        if cancellation.is_cancelled() {
                            continue;
                        }

                        if let Err(error) = run_job(database, spec, era_store, job, cancellation)
                        {
                            cancellation.trip(error.context(format!(
                                "job for epochs {}..{} failed",
                                job.start, job.end,
                            )));
                        }
                    }
                })?;
        }

        // Jobs are era-sized: a bigger unit starves workers, a smaller one
        // repeats the era state loads that dominate the cost.
        let mut epoch = start;

        'producer: while epoch < end && !cancellation.is_cancelled() {
            let era_boundary = epoch + (epochs_per_era - epoch % epochs_per_era);
            let mut job = PerfJob {
                start: epoch,
                end: era_boundary.min(end),
            };

            loop {
                match sender.send_timeout(job, SEND_CHECK_INTERVAL) {
                    Ok(()) => break,
                    Err(SendTimeoutError::Timeout(returned)) => {
                        if cancellation.is_cancelled() {
                            break 'producer;
                        }

                        job = returned;
                    }
                    Err(SendTimeoutError::Disconnected(_)) => break 'producer,
                }
            }

            epoch = era_boundary;
        }

        drop(sender);

        Ok(())
    })?;

    if let Some(cause) = cancellation.take_cause() {
        return Err(cause);
    }

    if cancellation.is_cancelled() {
        return Err(Error::Interrupted.into());
    }

    info!("finished computing performance for epochs {start}..{end}");

    Ok(())
}

fn run_job(
    database: &Database,
    spec: &Spec,
    era_store: &EraStore,
    job: PerfJob,
    cancellation: &Cancellation,
) -> Result<()> {
    // Block-root lookups index era-length windows of the states'
    // `block_roots` vectors.
    ensure!(
        spec.slots_per_historical_root == SLOTS_PER_ERA,
        "spec's historical root vector does not match the era length",
    );

    debug!("starting job for epochs {}..{}", job.start, job.end);

    let epochs_per_era = SLOTS_PER_ERA / spec.slots_per_epoch;

    let mut current_era_epoch = job.end;
    let remainder = job.end % epochs_per_era;

    if remainder > 0 {
        current_era_epoch += epochs_per_era - remainder;
    }

    let current_era_slot = spec.epoch_start_slot(current_era_epoch);

    let current_state = {
        let bytes = era_store.state_ssz(current_era_slot)?;
        decode_state(spec, spec.phase_at_epoch(current_era_epoch), &bytes)
            .with_context(|| format!("failed to decode state at slot {current_era_slot}"))?
    };

    ensure!(
        current_state.slot == current_era_slot,
        "terminal state at slot {current_era_slot} decoded with slot {}",
        current_state.slot,
    );

    let indices_bounded = current_state.bounded_indices();

    // Epochs near the era start read block roots reaching into the
    // previous era, archived in the previous era's terminal state.
    let mut previous_roots = None;

    if current_era_epoch >= epochs_per_era {
        let previous_era_epoch = current_era_epoch - epochs_per_era;

        if previous_era_epoch + 2 >= job.start {
            let previous_era_slot = spec.epoch_start_slot(previous_era_epoch);
            let bytes = era_store.state_ssz(previous_era_slot)?;
            let state =
                decode_state(spec, spec.phase_at_epoch(previous_era_epoch), &bytes)
                    .with_context(|| {
                        format!("failed to decode state at slot {previous_era_slot}")
                    })?;

            previous_roots = Some(state.block_roots);
        }
    }

    let lookup = EraLookup {
        spec,
        era_store,
        cancellation,
        current_era_slot,
        current_era_epoch,
        current_roots: &current_state.block_roots,
        previous_roots: previous_roots.as_deref(),
        randao_mixes: &current_state.randao_mixes,
    };

    for current_epoch in job.start..job.end {
        if cancellation.is_cancelled() {
            return Err(Error::Interrupted.into());
        }

        let performance = process_epoch(spec, &lookup, &indices_bounded, current_epoch)
            .with_context(|| format!("failed to process epoch {current_epoch}"))?;

        store::put_performance(database, current_epoch, &performance)?;
    }

    debug!("finished job for epochs {}..{}", job.start, job.end);

    Ok(())
}

/// Chain lookups for one job, backed by the two loaded era states.
struct EraLookup<'job> {
    spec: &'job Spec,
    era_store: &'job EraStore,
    cancellation: &'job Cancellation,
    current_era_slot: Slot,
    current_era_epoch: Epoch,
    current_roots: &'job [H256],
    previous_roots: Option<&'job [H256]>,
    randao_mixes: &'job [H256],
}

impl EpochLookup for EraLookup<'_> {
    fn block_root(&self, slot: Slot) -> Result<H256> {
        ensure!(
            slot <= self.current_era_slot,
            "cannot get block root of slot {slot}, the loaded era stops at slot {}",
            self.current_era_slot,
        );

        if slot + SLOTS_PER_ERA >= self.current_era_slot {
            return Ok(self.current_roots[(slot % SLOTS_PER_ERA) as usize]);
        }

        if let Some(previous_roots) = self.previous_roots {
            if slot + 2 * SLOTS_PER_ERA >= self.current_era_slot {
                return Ok(previous_roots[(slot % SLOTS_PER_ERA) as usize]);
            }
        }

        bail!("slot {slot} is older than the loaded era states")
    }

    fn attestations(&self, slot: Slot) -> Result<Vec<Attestation>> {
        if self.cancellation.is_cancelled() {
            return Err(Error::Interrupted.into());
        }

        // The genesis block carries no attestations and is not archived.
        if slot == 0 {
            return Ok(vec![]);
        }

        let Some(bytes) = self.era_store.block_ssz(slot)? else {
            return Ok(vec![]);
        };

        let view = state_decoder::decode_block(
            self.spec,
            self.spec.phase_at_slot(slot),
            &bytes,
            slot,
        )
        .with_context(|| format!("failed to decode block at slot {slot}"))?;

        Ok(view.attestations)
    }

    fn randao_mix(&self, epoch: Epoch) -> Result<H256> {
        ensure!(
            epoch <= self.current_era_epoch,
            "epoch {epoch} is after the loaded era state at epoch {}",
            self.current_era_epoch,
        );
        ensure!(
            epoch + self.spec.epochs_per_historical_vector >= self.current_era_epoch,
            "epoch {epoch} has fallen out of the randao mix ring buffer",
        );

        let index = (epoch + self.spec.epochs_per_historical_vector
            - self.spec.min_seed_lookahead
            - 1)
            % self.spec.epochs_per_historical_vector;

        Ok(self.randao_mixes[index as usize])
    }
}
