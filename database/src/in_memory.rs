use std::sync::Arc;

use im::OrdMap;
use parking_lot::Mutex;

// `OrdMap` clones share structure, so taking a whole-map snapshot under
// the lock is cheap. Keys and values are `Arc<[u8]>` for the same reason:
// snapshots and the live map share their bytes.
type Snapshot = OrdMap<Arc<[u8]>, Arc<[u8]>>;

/// The in-memory backend. Scans operate on a snapshot taken at creation,
/// giving the same isolation an MDBX read transaction provides.
#[derive(Default)]
pub(crate) struct InMemory {
    map: Mutex<Snapshot>,
}

impl InMemory {
    fn snapshot(&self) -> Snapshot {
        self.map.lock().clone()
    }

    pub(crate) fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.map.lock().get(key).map(|value| value.to_vec())
    }

    pub(crate) fn contains(&self, key: &[u8]) -> bool {
        self.map.lock().contains_key(key)
    }

    pub(crate) fn put_batch(
        &self,
        pairs: impl IntoIterator<Item = (impl AsRef<[u8]>, impl AsRef<[u8]>)>,
    ) {
        let mut map = self.map.lock();

        // Mutate a copy and swap it in whole, so a panic part way
        // through publishes nothing.
        let mut updated = map.clone();

        for (key, value) in pairs {
            updated.insert(key.as_ref().into(), value.as_ref().into());
        }

        *map = updated;
    }

    pub(crate) fn delete(&self, key: &[u8]) {
        self.map.lock().remove(key);
    }

    pub(crate) fn delete_range(&self, start: &[u8], end: &[u8]) {
        let mut map = self.map.lock();

        let doomed = map
            .range(start..end)
            .map(|(key, _)| Arc::clone(key))
            .collect::<Vec<_>>();

        for key in doomed {
            map.remove(&key);
        }
    }

    pub(crate) fn ascending(
        &self,
        start: Vec<u8>,
    ) -> impl Iterator<Item = anyhow::Result<(Vec<u8>, Vec<u8>)>> {
        self.snapshot()
            .into_iter()
            .skip_while(move |(key, _)| key.as_ref() < start.as_slice())
            .map(|(key, value)| Ok((key.to_vec(), value.to_vec())))
    }

    pub(crate) fn descending(
        &self,
        end: Vec<u8>,
    ) -> impl Iterator<Item = anyhow::Result<(Vec<u8>, Vec<u8>)>> {
        self.snapshot()
            .into_iter()
            .rev()
            .skip_while(move |(key, _)| key.as_ref() > end.as_slice())
            .map(|(key, value)| Ok((key.to_vec(), value.to_vec())))
    }

    pub(crate) fn prev(&self, key: &[u8]) -> Option<(Vec<u8>, Vec<u8>)> {
        self.map
            .lock()
            .get_prev(key)
            .map(|(key, value)| (key.to_vec(), value.to_vec()))
    }

    pub(crate) fn next(&self, key: &[u8]) -> Option<(Vec<u8>, Vec<u8>)> {
        self.map
            .lock()
            .get_next(key)
            .map(|(key, value)| (key.to_vec(), value.to_vec()))
    }
}
