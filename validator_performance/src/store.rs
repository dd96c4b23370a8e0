use anyhow::{anyhow, Result};
use database::Database;
use snap::raw::{Decoder, Encoder};
use types::{
    config::Spec,
    primitives::{Epoch, Slot},
};

use crate::word::ValidatorPerformance;

/// Performance keys: a 3-byte prefix followed by the big-endian epoch, so
/// byte-ordered iteration follows epoch order. The epoch is the boundary
/// the data became complete at: the record under epoch `N` describes
/// epoch `N − 1`'s duties with the inclusion window closed.
pub const PERF_KEY_PREFIX: &[u8; 3] = b"prf";

const KEY_SIZE: usize = PERF_KEY_PREFIX.len() + size_of::<Epoch>();

#[must_use]
pub fn perf_key(epoch: Epoch) -> [u8; KEY_SIZE] {
    let mut key = [0; KEY_SIZE];
    key[..3].copy_from_slice(PERF_KEY_PREFIX);
    key[3..].copy_from_slice(&epoch.to_be_bytes());
    key
}

/// Values are snappy block-compressed little-endian u32 arrays. Validators
/// mostly behave alike in an epoch and there are a lot of them, so the
/// records compress very well.
pub fn put_performance(
    database: &Database,
    epoch: Epoch,
    performance: &[ValidatorPerformance],
) -> Result<()> {
    let mut bytes = Vec::with_capacity(performance.len() * 4);

    for word in performance {
        bytes.extend_from_slice(&word.to_u32().to_le_bytes());
    }

    let compressed = Encoder::new().compress_vec(&bytes)?;

    database.put(perf_key(epoch), compressed)
}

pub fn get_performance(
    database: &Database,
    epoch: Epoch,
) -> Result<Option<Vec<ValidatorPerformance>>> {
    let Some(compressed) = database.get(perf_key(epoch))? else {
        return Ok(None);
    };

    let bytes = Decoder::new().decompress_vec(&compressed)?;

    if bytes.len() % 4 != 0 {
        return Err(anyhow!(
            "performance record for epoch {epoch} has a truncated word: {} bytes",
            bytes.len(),
        ));
    }

    let performance = bytes
        .chunks_exact(4)
        .map(|chunk| {
            ValidatorPerformance::from_u32(u32::from_le_bytes(
                chunk.try_into().expect("chunks are exactly 4 bytes"),
            ))
        })
        .collect();

    Ok(Some(performance))
}

/// The highest epoch with a stored record, found by a reverse scan over
/// the key prefix.
pub fn last_epoch(database: &Database) -> Result<Option<Epoch>> {
    let Some(result) = database.descending_from(perf_key(Epoch::MAX))?.next() else {
        return Ok(None);
    };

    let (key, _) = result?;

    if !key.starts_with(PERF_KEY_PREFIX) {
        return Ok(None);
    }

    let epoch = key[3..]
        .try_into()
        .map(Epoch::from_be_bytes)
        .map_err(|_| anyhow!("performance key of unexpected length: {}", key.len()))?;

    Ok(Some(epoch))
}

/// Deletes every record from the epoch containing `from_slot` onward in
/// one batch, so a rewind never leaves interior gaps. A single range
/// delete covers the newest record too: a failure part way through must
/// not leave `last_epoch` pointing at a record whose predecessors are
/// gone.
pub fn reset(database: &Database, spec: &Spec, from_slot: Slot) -> Result<()> {
    let reset_epoch = spec.epoch_at_slot(from_slot);

    let Some(last) = last_epoch(database)? else {
        return Ok(());
    };

    if last < reset_epoch {
        return Ok(());
    }

    database.delete_range(perf_key(reset_epoch)..perf_key(last + 1))
}
