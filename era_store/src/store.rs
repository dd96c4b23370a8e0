use std::{
    collections::BTreeMap,
    io::{Seek, SeekFrom},
    path::{Path, PathBuf},
    sync::Arc,
};

use fs_err::File;
use log::debug;
use types::primitives::Slot;

use crate::{
    format::{
        block_entry_position, check_block_slot_index_count, read_compressed_entry,
        state_entry_position, COMPRESSED_BEACON_STATE_TYPE, COMPRESSED_SIGNED_BLOCK_TYPE,
        SLOTS_PER_ERA,
    },
    pool::{BufferPool, PooledBuffer},
    Error,
};

// Decompressed mainnet states run to roughly 100 MB, blocks to a few MB.
const STATE_BUFFER_CAPACITY: usize = 100_000_000;
const BLOCK_BUFFER_CAPACITY: usize = 10_000_000;

/// Random access into a directory of `.era` files.
///
/// Files are indexed by the starting slot of their final group's terminal
/// state and opened on demand; only the index is kept in memory. The
/// decompression buffer pools are shared across all readers of the store.
pub struct EraStore {
    // era file paths indexed by terminal-state starting slot
    files: BTreeMap<Slot, PathBuf>,
    state_buffers: Arc<BufferPool>,
    block_buffers: Arc<BufferPool>,
}

impl EraStore {
    pub fn load(directory: impl AsRef<Path>) -> Result<Self, Error> {
        let mut files = BTreeMap::new();

        collect_era_files(directory.as_ref(), &mut files)?;

        debug!("indexed {} era files", files.len());

        Ok(Self {
            files,
            state_buffers: Arc::new(BufferPool::new(STATE_BUFFER_CAPACITY)),
            block_buffers: Arc::new(BufferPool::new(BLOCK_BUFFER_CAPACITY)),
        })
    }

    /// Minimum and maximum terminal-state slots across loaded files.
    #[must_use]
    pub fn bounds(&self) -> Option<(Slot, Slot)> {
        let min = *self.files.first_key_value()?.0;
        let max = *self.files.last_key_value()?.0;
        Some((min, max))
    }

    /// Decompressed SSZ bytes of the terminal beacon state at `slot`,
    /// which must be a multiple of the era length.
    pub fn state_ssz(&self, slot: Slot) -> Result<PooledBuffer<'_>, Error> {
        if slot % SLOTS_PER_ERA != 0 {
            return Err(Error::StateSlotMisaligned { slot });
        }

        let mut file = self.open_era(slot)?;
        let group_end = file.seek(SeekFrom::End(0))?;
        let (position, starting_slot) = state_entry_position(&mut file, group_end)?;

        if starting_slot != slot {
            return Err(Error::StateSlotMismatch {
                expected: slot,
                actual: starting_slot,
            });
        }

        let mut buffer = self.state_buffers.checkout();
        read_compressed_entry(
            &mut file,
            position,
            COMPRESSED_BEACON_STATE_TYPE,
            &mut buffer,
        )?;

        Ok(buffer)
    }

    /// Decompressed SSZ bytes of the signed block at `slot`, or `None`
    /// when the chain had no block there.
    pub fn block_ssz(&self, slot: Slot) -> Result<Option<PooledBuffer<'_>>, Error> {
        // Blocks lead up to their group's terminal state, so a block at
        // `slot` lives in the file keyed by the next era boundary.
        let era_slot = slot - slot % SLOTS_PER_ERA + SLOTS_PER_ERA;

        let mut file = self.open_era(era_slot)?;
        let group_end = file.seek(SeekFrom::End(0))?;

        check_block_slot_index_count(&mut file, group_end)?;

        let Some(position) = block_entry_position(&mut file, slot % SLOTS_PER_ERA, group_end)?
        else {
            return Ok(None);
        };

        let mut buffer = self.block_buffers.checkout();
        read_compressed_entry(
            &mut file,
            position,
            COMPRESSED_SIGNED_BLOCK_TYPE,
            &mut buffer,
        )?;

        Ok(Some(buffer))
    }

    fn open_era(&self, slot: Slot) -> Result<File, Error> {
        let path = self
            .files
            .get(&slot)
            .ok_or(Error::EraNotAvailable { slot })?;

        File::open(path).map_err(Into::into)
    }
}

fn collect_era_files(directory: &Path, files: &mut BTreeMap<Slot, PathBuf>) -> Result<(), Error> {
    for entry in fs_err::read_dir(directory)? {
        let entry = entry?;
        let path = entry.path();

        if entry.file_type()?.is_dir() {
            collect_era_files(&path, files)?;
        } else if path.extension().is_some_and(|extension| extension == "era") {
            let mut file = File::open(&path)?;
            let group_end = file.seek(SeekFrom::End(0))?;
            let (_, starting_slot) = state_entry_position(&mut file, group_end)?;

            debug!("indexed {} at slot {starting_slot}", path.display());
            files.insert(starting_slot, path);
        }
    }

    Ok(())
}
