//! Synthetic era files for tests.

use std::{io::Write as _, path::Path};

use types::primitives::Slot;

use crate::{
    format::{
        EntryType, BLOCK_SLOT_INDEX_SIZE, COMPRESSED_BEACON_STATE_TYPE,
        COMPRESSED_SIGNED_BLOCK_TYPE, SLOTS_PER_ERA, SLOT_INDEX_TYPE, STATE_SLOT_INDEX_SIZE,
        VERSION_TYPE,
    },
    Error,
};

/// Assembles a single-group `.era` file from uncompressed payloads.
pub struct EraFileBuilder {
    state_slot: Slot,
    state: Vec<u8>,
    blocks: Vec<(u64, Vec<u8>)>,
}

impl EraFileBuilder {
    /// `state_slot` is the slot of the terminal state and must be a
    /// multiple of the era length. A group at slot 0 carries no blocks
    /// and no block slot-index.
    #[must_use]
    pub fn new(state_slot: Slot) -> Self {
        assert_eq!(state_slot % SLOTS_PER_ERA, 0, "state slot must open an era");

        Self {
            state_slot,
            state: vec![],
            blocks: vec![],
        }
    }

    #[must_use]
    pub fn state(mut self, ssz: Vec<u8>) -> Self {
        self.state = ssz;
        self
    }

    /// Adds the block for the `index`-th slot of the era.
    #[must_use]
    pub fn block(mut self, index: u64, ssz: Vec<u8>) -> Self {
        assert!(index < SLOTS_PER_ERA, "block index exceeds era length");
        self.blocks.push((index, ssz));
        self
    }

    #[must_use]
    pub fn build(mut self) -> Vec<u8> {
        self.blocks.sort_by_key(|(index, _)| *index);

        let mut bytes = vec![];

        write_entry(&mut bytes, VERSION_TYPE, &[]);

        let mut block_positions = [0_i64; SLOTS_PER_ERA as usize];

        for (index, ssz) in &self.blocks {
            block_positions[*index as usize] = bytes.len() as i64;
            write_entry(&mut bytes, COMPRESSED_SIGNED_BLOCK_TYPE, &compress(ssz));
        }

        let state_position = bytes.len() as i64;
        write_entry(&mut bytes, COMPRESSED_BEACON_STATE_TYPE, &compress(&self.state));

        if self.state_slot != 0 {
            let index_base = bytes.len() as i64;
            let mut payload = vec![];
            payload.extend_from_slice(&(self.state_slot - SLOTS_PER_ERA).to_le_bytes());

            for position in block_positions {
                let relative = if position == 0 { 0 } else { position - index_base };
                payload.extend_from_slice(&relative.to_le_bytes());
            }

            payload.extend_from_slice(&SLOTS_PER_ERA.to_le_bytes());
            write_entry(&mut bytes, SLOT_INDEX_TYPE, &payload);

            assert_eq!(
                bytes.len() as i64 - index_base,
                BLOCK_SLOT_INDEX_SIZE as i64,
            );
        }

        let index_base = bytes.len() as i64;
        let mut payload = vec![];
        payload.extend_from_slice(&self.state_slot.to_le_bytes());
        payload.extend_from_slice(&(state_position - index_base).to_le_bytes());
        payload.extend_from_slice(&1_u64.to_le_bytes());
        write_entry(&mut bytes, SLOT_INDEX_TYPE, &payload);

        assert_eq!(
            bytes.len() as i64 - index_base,
            STATE_SLOT_INDEX_SIZE as i64,
        );

        bytes
    }

    pub fn write_to(self, path: impl AsRef<Path>) -> Result<(), Error> {
        fs_err::write(path, self.build()).map_err(Into::into)
    }
}

fn write_entry(bytes: &mut Vec<u8>, entry_type: EntryType, payload: &[u8]) {
    bytes.extend_from_slice(&entry_type);
    bytes.extend_from_slice(
        &u32::try_from(payload.len())
            .expect("test payloads fit in u32")
            .to_le_bytes(),
    );
    bytes.extend_from_slice(&[0, 0]);
    bytes.extend_from_slice(payload);
}

fn compress(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = snap::write::FrameEncoder::new(vec![]);
    encoder.write_all(bytes).expect("writing to a Vec succeeds");
    encoder.into_inner().expect("flushing to a Vec succeeds")
}
