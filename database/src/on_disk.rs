use std::path::Path;

use anyhow::Result;
use bytesize::ByteSize;
use libmdbx::{DatabaseFlags, Environment, Geometry, WriteFlags};
use log::info;

use crate::DatabaseMode;

const GROWTH_STEP: ByteSize = ByteSize::mib(256);
const MAX_NAMED_DATABASES: usize = 4;

/// The MDBX backend. Every operation runs in its own transaction; read
/// transactions double as the snapshots scans iterate under.
pub(crate) struct OnDisk {
    name: String,
    environment: Environment,
}

impl OnDisk {
    pub(crate) fn open(
        name: &str,
        directory: &Path,
        max_size: ByteSize,
        mode: DatabaseMode,
    ) -> Result<Self> {
        if !mode.is_read_only() {
            fs_err::create_dir_all(directory)?;
        }

        let environment = Environment::builder()
            .set_max_dbs(MAX_NAMED_DATABASES)
            .set_geometry(Geometry {
                size: Some(..usize::try_from(max_size.as_u64())?),
                growth_step: Some(isize::try_from(GROWTH_STEP.as_u64())?),
                shrink_threshold: None,
                page_size: None,
            })
            .open_with_permissions(directory, mode.permissions())?;

        if !mode.is_read_only() {
            let transaction = environment.begin_rw_txn()?;
            transaction.create_db(Some(name), DatabaseFlags::default())?;
            transaction.commit()?;
        }

        info!("database {name} at {}", directory.display());

        Ok(Self {
            name: name.to_owned(),
            environment,
        })
    }

    pub(crate) fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let transaction = self.environment.begin_ro_txn()?;
        let table = transaction.open_db(Some(&self.name))?;

        transaction
            .get::<Vec<u8>>(table.dbi(), key)
            .map_err(Into::into)
    }

    pub(crate) fn contains(&self, key: &[u8]) -> Result<bool> {
        let transaction = self.environment.begin_ro_txn()?;
        let table = transaction.open_db(Some(&self.name))?;

        Ok(transaction.get::<()>(table.dbi(), key)?.is_some())
    }

    pub(crate) fn put_batch(
        &self,
        pairs: impl IntoIterator<Item = (impl AsRef<[u8]>, impl AsRef<[u8]>)>,
    ) -> Result<()> {
        let transaction = self.environment.begin_rw_txn()?;
        let table = transaction.open_db(Some(&self.name))?;

        for (key, value) in pairs {
            transaction.put(table.dbi(), key, value, WriteFlags::default())?;
        }

        transaction.commit()?;

        Ok(())
    }

    pub(crate) fn delete(&self, key: &[u8]) -> Result<()> {
        let transaction = self.environment.begin_rw_txn()?;
        let table = transaction.open_db(Some(&self.name))?;

        // Deleting an absent key reports false rather than failing.
        transaction.del(table.dbi(), key, None)?;
        transaction.commit()?;

        Ok(())
    }

    pub(crate) fn delete_range(&self, start: &[u8], end: &[u8]) -> Result<()> {
        let transaction = self.environment.begin_rw_txn()?;
        let table = transaction.open_db(Some(&self.name))?;

        let mut cursor = transaction.cursor(&table)?;
        let mut pair = cursor.set_range::<Vec<u8>, ()>(start)?;

        while let Some((key, ())) = pair {
            if key.as_slice() >= end {
                break;
            }

            cursor.del(WriteFlags::default())?;
            pair = cursor.next()?;
        }

        transaction.commit()?;

        Ok(())
    }

    pub(crate) fn ascending(
        &self,
        start: Vec<u8>,
    ) -> Result<impl Iterator<Item = Result<(Vec<u8>, Vec<u8>)>>> {
        let transaction = self.environment.begin_ro_txn()?;
        let table = transaction.open_db(Some(&self.name))?;
        let mut cursor = transaction.cursor(&table)?;

        let mut seek = Some(start);

        Ok(core::iter::from_fn(move || {
            let step = match seek.take() {
                Some(start) => cursor.set_range::<Vec<u8>, Vec<u8>>(start.as_slice()),
                None => cursor.next(),
            };

            step.map_err(anyhow::Error::from).transpose()
        }))
    }

    pub(crate) fn descending(
        &self,
        end: Vec<u8>,
    ) -> Result<impl Iterator<Item = Result<(Vec<u8>, Vec<u8>)>>> {
        let transaction = self.environment.begin_ro_txn()?;
        let table = transaction.open_db(Some(&self.name))?;
        let mut cursor = transaction.cursor(&table)?;

        let mut seek = Some(end);

        Ok(core::iter::from_fn(move || {
            let step = match seek.take() {
                // Seeking lands on the first key at or above `end`;
                // step back when it overshoots, or start from the tail
                // when nothing is above.
                Some(end) => match cursor.set_range::<Vec<u8>, Vec<u8>>(end.as_slice()) {
                    Ok(Some((key, value))) => {
                        if key.as_slice() <= end.as_slice() {
                            Ok(Some((key, value)))
                        } else {
                            cursor.prev()
                        }
                    }
                    Ok(None) => cursor.last(),
                    Err(error) => Err(error),
                },
                None => cursor.prev(),
            };

            step.map_err(anyhow::Error::from).transpose()
        }))
    }

    pub(crate) fn prev(&self, key: &[u8]) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let transaction = self.environment.begin_ro_txn()?;
        let table = transaction.open_db(Some(&self.name))?;
        let mut cursor = transaction.cursor(&table)?;

        let pair = match cursor.set_range::<Vec<u8>, Vec<u8>>(key)? {
            Some((found, value)) if found.as_slice() == key => Some((found, value)),
            Some(_) => cursor.prev()?,
            None => cursor.last()?,
        };

        Ok(pair)
    }

    pub(crate) fn next(&self, key: &[u8]) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let transaction = self.environment.begin_ro_txn()?;
        let table = transaction.open_db(Some(&self.name))?;
        let mut cursor = transaction.cursor(&table)?;

        cursor.set_range(key).map_err(Into::into)
    }
}
