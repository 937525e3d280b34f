use std::ops::{Deref, DerefMut};
use std::sync::Mutex;

pub const COPY_BUFFER_SIZE: usize = 1 << 20;
const MAX_IDLE_BUFFERS: usize = 16;

/// Pool of fixed-size copy buffers shared by concurrent uploads.
pub struct BufferPool {
    idle: Mutex<Vec<Vec<u8>>>,
    size: usize,
}

impl BufferPool {
    pub fn new(size: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            size,
        }
    }

    pub fn get(&self) -> PooledBuffer<'_> {
        let buf = self
            .idle
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| vec![0; self.size]);
        PooledBuffer {
            buf: Some(buf),
            pool: self,
        }
    }

    pub fn idle(&self) -> usize {
        self.idle.lock().unwrap().len()
    }

    fn release(&self, buf: Vec<u8>) {
        let mut idle = self.idle.lock().unwrap();
        if idle.len() < MAX_IDLE_BUFFERS {
            idle.push(buf);
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(COPY_BUFFER_SIZE)
    }
}

/// A buffer borrowed from a [`BufferPool`]; goes back to the pool on drop.
pub struct PooledBuffer<'a> {
    buf: Option<Vec<u8>>,
    pool: &'a BufferPool,
}

impl Deref for PooledBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or_default()
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or_default()
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}
