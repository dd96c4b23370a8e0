use core::ops::{Deref, DerefMut};

use parking_lot::Mutex;

/// A pool of byte buffers shared between workers. Checked-out buffers are
/// cleared before use and returned on drop, so the large decompression
/// allocations are made once per worker rather than once per read.
pub struct BufferPool {
    initial_capacity: usize,
    buffers: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    #[must_use]
    pub const fn new(initial_capacity: usize) -> Self {
        Self {
            initial_capacity,
            buffers: Mutex::new(Vec::new()),
        }
    }

    pub fn checkout(&self) -> PooledBuffer<'_> {
        let mut buffer = self
            .buffers
            .lock()
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(self.initial_capacity));

        buffer.clear();

        PooledBuffer { pool: self, buffer }
    }
}

pub struct PooledBuffer<'pool> {
    pool: &'pool BufferPool,
    buffer: Vec<u8>,
}

impl Deref for PooledBuffer<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.buffer
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buffer
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        let buffer = core::mem::take(&mut self.buffer);
        self.pool.buffers.lock().push(buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkout_reuses_returned_buffers() {
        let pool = BufferPool::new(16);

        let pointer = {
            let mut buffer = pool.checkout();
            buffer.extend_from_slice(b"stale contents");
            buffer.as_ptr()
        };

        let buffer = pool.checkout();

        assert_eq!(buffer.as_ptr(), pointer);
        assert!(buffer.is_empty(), "checked-out buffers must be reset");
    }

    #[test]
    fn concurrent_checkouts_get_distinct_buffers() {
        let pool = BufferPool::new(16);

        let first = pool.checkout();
        let second = pool.checkout();

        assert_ne!(first.as_ptr(), second.as_ptr());
    }
}
