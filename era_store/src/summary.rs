use std::{
    io::{Seek, SeekFrom},
    path::Path,
};

use fs_err::File;
use types::primitives::Slot;

use crate::{
    format::{block_entry_position, group_start_position, state_entry_position, SLOTS_PER_ERA},
    Error,
};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct GroupSummary {
    pub state_slot: Slot,
    pub blocks_present: u64,
}

/// Walks an era file backwards group by group, reporting each group's
/// terminal-state slot and how many of its slots carry a block.
pub fn summarize_era_file(path: impl AsRef<Path>) -> Result<Vec<GroupSummary>, Error> {
    let mut file = File::open(path.as_ref())?;
    let mut group_end = file.seek(SeekFrom::End(0))?;
    let mut summaries = vec![];

    loop {
        let (_, state_slot) = state_entry_position(&mut file, group_end)?;

        let mut blocks_present = 0;

        if state_slot != 0 {
            for index in 0..SLOTS_PER_ERA {
                if block_entry_position(&mut file, index, group_end)?.is_some() {
                    blocks_present += 1;
                }
            }
        }

        summaries.push(GroupSummary {
            state_slot,
            blocks_present,
        });

        if state_slot == 0 {
            break;
        }

        group_end = group_start_position(&mut file, group_end)?;

        if group_end == 0 {
            break;
        }
    }

    summaries.reverse();
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use crate::testing::EraFileBuilder;

    use super::*;

    #[test]
    fn summary_counts_present_blocks() -> Result<(), Error> {
        let directory = TempDir::new().expect("temporary directory should be created");
        let path = directory.path().join("an.era");

        EraFileBuilder::new(SLOTS_PER_ERA)
            .state(b"state".to_vec())
            .block(0, b"first".to_vec())
            .block(17, b"second".to_vec())
            .write_to(&path)?;

        assert_eq!(
            summarize_era_file(&path)?,
            [GroupSummary {
                state_slot: SLOTS_PER_ERA,
                blocks_present: 2,
            }],
        );

        Ok(())
    }

    #[test]
    fn genesis_group_has_no_block_index() -> Result<(), Error> {
        let directory = TempDir::new().expect("temporary directory should be created");
        let path = directory.path().join("genesis.era");

        EraFileBuilder::new(0)
            .state(b"genesis state".to_vec())
            .write_to(&path)?;

        assert_eq!(
            summarize_era_file(&path)?,
            [GroupSummary {
                state_slot: 0,
                blocks_present: 0,
            }],
        );

        Ok(())
    }
}
