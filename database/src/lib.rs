//! Ordered byte-keyed storage for the performance and tile stores.
//!
//! Keys iterate in byte order, which is what makes the stores' big-endian
//! key schemas work: a reverse scan from the top of a prefix lands on the
//! newest epoch, and rewinding a span of epochs is one range delete.
//! Values are stored verbatim; compression belongs to the stores layered
//! on top.

use core::ops::Range;
use std::path::Path;

use anyhow::Result;
use bytesize::ByteSize;
use itertools::Either;

use crate::{in_memory::InMemory, on_disk::OnDisk};

mod in_memory;
mod on_disk;

#[derive(Clone, Copy)]
pub enum DatabaseMode {
    ReadOnly,
    ReadWrite,
}

impl DatabaseMode {
    #[must_use]
    pub const fn is_read_only(self) -> bool {
        matches!(self, Self::ReadOnly)
    }

    const fn file_mode(self) -> u16 {
        match self {
            // MDBX takes the UNIX permissions to create files with;
            // zero means open an existing environment only.
            Self::ReadOnly => 0,
            Self::ReadWrite => 0o600,
        }
    }

    // `mdbx_mode_t` is wider on Linux than elsewhere.
    #[cfg(target_os = "linux")]
    pub(crate) fn permissions(self) -> u32 {
        self.file_mode().into()
    }

    #[cfg(not(target_os = "linux"))]
    pub(crate) const fn permissions(self) -> u16 {
        self.file_mode()
    }
}

pub struct Database(Backend);

enum Backend {
    OnDisk(OnDisk),
    InMemory(InMemory),
}

impl Database {
    pub fn persistent(
        name: &str,
        directory: impl AsRef<Path>,
        max_size: ByteSize,
        mode: DatabaseMode,
    ) -> Result<Self> {
        OnDisk::open(name, directory.as_ref(), max_size, mode)
            .map(Backend::OnDisk)
            .map(Self)
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self(Backend::InMemory(InMemory::default()))
    }

    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Option<Vec<u8>>> {
        match self.backend() {
            Backend::OnDisk(database) => database.get(key.as_ref()),
            Backend::InMemory(database) => Ok(database.get(key.as_ref())),
        }
    }

    pub fn contains_key(&self, key: impl AsRef<[u8]>) -> Result<bool> {
        match self.backend() {
            Backend::OnDisk(database) => database.contains(key.as_ref()),
            Backend::InMemory(database) => Ok(database.contains(key.as_ref())),
        }
    }

    pub fn put(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<()> {
        self.put_batch(core::iter::once((key, value)))
    }

    /// Writes all pairs in one transaction. Either every pair becomes
    /// visible or none does.
    pub fn put_batch(
        &self,
        pairs: impl IntoIterator<Item = (impl AsRef<[u8]>, impl AsRef<[u8]>)>,
    ) -> Result<()> {
        match self.backend() {
            Backend::OnDisk(database) => database.put_batch(pairs),
            Backend::InMemory(database) => {
                database.put_batch(pairs);
                Ok(())
            }
        }
    }

    /// Deleting an absent key is not an error.
    pub fn delete(&self, key: impl AsRef<[u8]>) -> Result<()> {
        match self.backend() {
            Backend::OnDisk(database) => database.delete(key.as_ref()),
            Backend::InMemory(database) => {
                database.delete(key.as_ref());
                Ok(())
            }
        }
    }

    /// Deletes all keys in `range` in one transaction.
    pub fn delete_range(&self, range: Range<impl AsRef<[u8]>>) -> Result<()> {
        let start = range.start.as_ref();
        let end = range.end.as_ref();

        match self.backend() {
            Backend::OnDisk(database) => database.delete_range(start, end),
            Backend::InMemory(database) => {
                database.delete_range(start, end);
                Ok(())
            }
        }
    }

    /// Iterates pairs with keys at or above `start`, in ascending key
    /// order. The iterator observes a snapshot of the database taken
    /// when it is created.
    pub fn ascending_from(
        &self,
        start: impl AsRef<[u8]>,
    ) -> Result<impl Iterator<Item = Result<(Vec<u8>, Vec<u8>)>>> {
        match self.backend() {
            Backend::OnDisk(database) => {
                database.ascending(start.as_ref().to_vec()).map(Either::Left)
            }
            Backend::InMemory(database) => {
                Ok(Either::Right(database.ascending(start.as_ref().to_vec())))
            }
        }
    }

    /// Iterates pairs with keys at or below `end`, in descending key
    /// order, under the same snapshot semantics.
    pub fn descending_from(
        &self,
        end: impl AsRef<[u8]>,
    ) -> Result<impl Iterator<Item = Result<(Vec<u8>, Vec<u8>)>>> {
        match self.backend() {
            Backend::OnDisk(database) => {
                database.descending(end.as_ref().to_vec()).map(Either::Left)
            }
            Backend::InMemory(database) => {
                Ok(Either::Right(database.descending(end.as_ref().to_vec())))
            }
        }
    }

    /// The last pair whose key is at or below `key`.
    pub fn prev(&self, key: impl AsRef<[u8]>) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        match self.backend() {
            Backend::OnDisk(database) => database.prev(key.as_ref()),
            Backend::InMemory(database) => Ok(database.prev(key.as_ref())),
        }
    }

    /// The first pair whose key is at or above `key`.
    pub fn next(&self, key: impl AsRef<[u8]>) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        match self.backend() {
            Backend::OnDisk(database) => database.next(key.as_ref()),
            Backend::InMemory(database) => Ok(database.next(key.as_ref())),
        }
    }

    const fn backend(&self) -> &Backend {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use test_case::test_case;

    use super::*;

    type Constructor = fn() -> Result<Database>;

    // Fixtures mirror the real keyspaces sharing a database in spirit:
    // "prf"-prefixed big-endian epochs and "til"-prefixed tile columns.
    fn epoch_key(epoch: u64) -> Vec<u8> {
        let mut key = b"prf".to_vec();
        key.extend_from_slice(&epoch.to_be_bytes());
        key
    }

    fn epoch_of(key: &[u8]) -> u64 {
        u64::from_be_bytes(key[3..].try_into().expect("epoch keys hold a u64"))
    }

    fn tile_key(zoom: u8, tile_x: u32) -> Vec<u8> {
        let mut key = b"til".to_vec();
        key.push(zoom);
        key.extend_from_slice(&tile_x.to_be_bytes());
        key
    }

    fn record(epoch: u64) -> Vec<u8> {
        format!("record {epoch}").into_bytes()
    }

    fn keys_of(
        pairs: impl Iterator<Item = Result<(Vec<u8>, Vec<u8>)>>,
    ) -> Result<Vec<Vec<u8>>> {
        pairs.map(|pair| Ok(pair?.0)).collect()
    }

    fn populate(database: &Database) -> Result<()> {
        database.put_batch((0..6).map(|epoch| (epoch_key(epoch), record(epoch))))?;
        database.put(tile_key(0, 0), "base tile")?;
        database.put(tile_key(1, 0), "downsampled tile")?;
        Ok(())
    }

    fn on_disk_database() -> Result<Database> {
        let database = Database::persistent(
            "test",
            TempDir::new()?,
            ByteSize::mib(1),
            DatabaseMode::ReadWrite,
        )?;

        populate(&database)?;
        Ok(database)
    }

    fn in_memory_database() -> Result<Database> {
        let database = Database::in_memory();
        populate(&database)?;
        Ok(database)
    }

    #[test_case(on_disk_database)]
    #[test_case(in_memory_database)]
    fn epoch_records_round_trip(constructor: Constructor) -> Result<()> {
        let database = constructor()?;

        assert_eq!(database.get(epoch_key(3))?, Some(record(3)));
        assert_eq!(database.get(epoch_key(6))?, None);
        assert!(database.contains_key(tile_key(1, 0))?);
        assert!(!database.contains_key(tile_key(2, 0))?);

        Ok(())
    }

    #[test_case(on_disk_database)]
    #[test_case(in_memory_database)]
    fn rewriting_an_epoch_keeps_the_last_record(constructor: Constructor) -> Result<()> {
        let database = constructor()?;

        database.put_batch([
            (epoch_key(2), b"stale".as_slice()),
            (epoch_key(2), b"recomputed".as_slice()),
        ])?;

        assert_eq!(database.get(epoch_key(2))?, Some(b"recomputed".to_vec()));

        Ok(())
    }

    #[test_case(on_disk_database)]
    #[test_case(in_memory_database)]
    fn deleting_an_absent_epoch_is_harmless(constructor: Constructor) -> Result<()> {
        let database = constructor()?;

        database.delete(epoch_key(99))?;
        database.delete(epoch_key(3))?;

        assert_eq!(database.get(epoch_key(3))?, None);
        assert_eq!(database.get(epoch_key(4))?, Some(record(4)));

        Ok(())
    }

    // The shape of a performance-store rewind: one range delete covering
    // an epoch span, leaving the other keyspace untouched.
    #[test_case(on_disk_database)]
    #[test_case(in_memory_database)]
    fn range_delete_rewinds_an_epoch_span(constructor: Constructor) -> Result<()> {
        let database = constructor()?;

        database.delete_range(epoch_key(2)..epoch_key(5))?;

        let remaining = keys_of(database.ascending_from(epoch_key(0))?)?
            .into_iter()
            .take_while(|key| key.starts_with(b"prf"))
            .map(|key| epoch_of(&key))
            .collect::<Vec<_>>();

        assert_eq!(remaining, [0, 1, 5]);
        assert!(database.contains_key(tile_key(0, 0))?);

        Ok(())
    }

    #[test_case(on_disk_database)]
    #[test_case(in_memory_database)]
    fn ascending_scan_orders_epochs_before_tiles(constructor: Constructor) -> Result<()> {
        let database = constructor()?;

        let keys = keys_of(database.ascending_from(b"prf")?)?;

        let expected = (0..6)
            .map(epoch_key)
            .chain([tile_key(0, 0), tile_key(1, 0)])
            .collect::<Vec<_>>();

        assert_eq!(keys, expected);

        Ok(())
    }

    // The shape of `last_epoch`: a reverse scan from the top of the
    // epoch keyspace starts at the newest record.
    #[test_case(on_disk_database)]
    #[test_case(in_memory_database)]
    fn reverse_scan_starts_at_the_newest_epoch(constructor: Constructor) -> Result<()> {
        let database = constructor()?;

        let keys = keys_of(database.descending_from(epoch_key(u64::MAX))?)?;

        assert_eq!(keys.len(), 6);
        assert_eq!(epoch_of(&keys[0]), 5);
        assert_eq!(epoch_of(&keys[5]), 0);

        Ok(())
    }

    #[test_case(on_disk_database)]
    #[test_case(in_memory_database)]
    fn descending_from_a_present_key_includes_it(constructor: Constructor) -> Result<()> {
        let database = constructor()?;

        let keys = keys_of(database.descending_from(epoch_key(2))?)?;

        assert_eq!(
            keys,
            [epoch_key(2), epoch_key(1), epoch_key(0)],
        );

        Ok(())
    }

    #[test_case(on_disk_database)]
    #[test_case(in_memory_database)]
    fn prev_and_next_bracket_missing_epochs(constructor: Constructor) -> Result<()> {
        let database = constructor()?;

        // Nothing sorts below the epoch prefix itself.
        assert_eq!(database.prev(b"prf")?, None);

        assert_eq!(
            database.prev(epoch_key(3))?,
            Some((epoch_key(3), record(3))),
        );
        assert_eq!(
            database.prev(epoch_key(100))?,
            Some((epoch_key(5), record(5))),
        );

        assert_eq!(
            database.next(epoch_key(4))?,
            Some((epoch_key(4), record(4))),
        );
        assert_eq!(
            database.next(epoch_key(6))?,
            Some((tile_key(0, 0), b"base tile".to_vec())),
        );
        assert_eq!(database.next(tile_key(2, 0))?, None);

        Ok(())
    }

    // A scan started before a rewind must keep seeing the old records,
    // like a tile request racing a reset.
    #[test_case(on_disk_database)]
    #[test_case(in_memory_database)]
    fn scans_are_isolated_from_later_writes(constructor: Constructor) -> Result<()> {
        let database = constructor()?;

        let scan = database.ascending_from(epoch_key(0))?;

        database.delete_range(epoch_key(0)..tile_key(255, u32::MAX))?;
        assert_eq!(database.get(epoch_key(0))?, None);

        assert_eq!(keys_of(scan)?.len(), 8);

        Ok(())
    }
}
