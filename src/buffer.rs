//! Pooled growable byte buffer shared by the request serializer and the
//! response decoder.
//!
//! The buffer follows a reserve/commit discipline:
//! - `reserve(size_hint)` hands out a writable tail region of at least
//!   `size_hint` bytes, growing the backing storage when needed
//! - `commit(n)` advances the write cursor by the number of bytes actually
//!   produced into that region
//!
//! Backing storage comes from a process-wide pool. On drop the written
//! prefix is zeroed and the storage is returned to the pool, so one
//! decode's bytes can never leak into the next acquisition. Growth only
//! ever extends the backing vector; committed bytes are addressed by index,
//! so offset/length markers issued before a growth stay valid after it.
//!
//! # Example
//!
//! ```
//! use libsql_http_client::buffer::PooledBufWriter;
//!
//! let mut buf = PooledBufWriter::acquire(64);
//! let region = buf.reserve(5).unwrap();
//! region[..5].copy_from_slice(b"hello");
//! buf.commit(5);
//!
//! assert_eq!(buf.written_span(), b"hello");
//! ```

use std::io;
use std::sync::Mutex;

use crate::error::{LibSqlClientError, Result};

/// Minimum backing allocation, to avoid pathological regrowth for small
/// messages.
pub const MIN_BUFFER_SIZE: usize = 256;

/// Maximum number of buffers retained by the shared pool.
const MAX_POOLED_BUFFERS: usize = 8;

/// Buffers larger than this are dropped on release instead of pooled.
const MAX_POOLED_CAPACITY: usize = 1024 * 1024;

/// Largest supported backing allocation.
const MAX_CAPACITY: usize = isize::MAX as usize;

static POOL: Mutex<Vec<Vec<u8>>> = Mutex::new(Vec::new());

/// Growable byte sink backed by pooled storage.
///
/// The write cursor only moves forward via `commit`; `written_span` and
/// `span` expose committed bytes for reading. Dropping the writer zeroes
/// the written prefix and returns the storage to the pool.
#[derive(Debug)]
pub struct PooledBufWriter {
    /// Full-length, zero-initialized backing storage.
    buf: Vec<u8>,
    /// Number of committed bytes.
    written: usize,
    /// Size of the region handed out by the most recent `reserve`.
    reserved: usize,
}

impl PooledBufWriter {
    /// Acquire a buffer with at least `initial_hint` bytes of capacity.
    ///
    /// Reuses pooled storage when a large-enough buffer is available,
    /// otherwise allocates fresh zeroed storage.
    pub fn acquire(initial_hint: usize) -> Self {
        let want = initial_hint.max(MIN_BUFFER_SIZE);
        let buf = {
            let mut pool = POOL.lock().unwrap_or_else(|e| e.into_inner());
            match pool.iter().position(|b| b.len() >= want) {
                Some(index) => pool.swap_remove(index),
                None => vec![0u8; want],
            }
        };
        Self {
            buf,
            written: 0,
            reserved: 0,
        }
    }

    /// Number of committed bytes.
    #[inline]
    pub fn written(&self) -> usize {
        self.written
    }

    /// All committed bytes.
    #[inline]
    pub fn written_span(&self) -> &[u8] {
        &self.buf[..self.written]
    }

    /// A committed region by offset and length.
    ///
    /// # Panics
    ///
    /// Panics if the region extends past the committed prefix.
    #[inline]
    pub fn span(&self, offset: usize, len: usize) -> &[u8] {
        assert!(
            offset + len <= self.written,
            "span {offset}+{len} reaches past the {} committed bytes",
            self.written
        );
        &self.buf[offset..offset + len]
    }

    /// Reserve a writable region of at least `size_hint` bytes.
    ///
    /// Grows the backing storage when free capacity is short. Growth adds
    /// `max(size_hint, max(current_len, MIN_BUFFER_SIZE))` bytes, clamped
    /// to the platform allocation cap.
    ///
    /// # Errors
    ///
    /// Returns [`LibSqlClientError::BufferCapacity`] when even the clamped
    /// size cannot hold the requested write.
    pub fn reserve(&mut self, size_hint: usize) -> Result<&mut [u8]> {
        let hint = size_hint.max(1);
        if hint > self.free() {
            self.grow(hint)?;
        }
        self.reserved = self.buf.len() - self.written;
        Ok(&mut self.buf[self.written..])
    }

    /// Advance the write cursor by exactly `count` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `count` exceeds the region handed out by the most recent
    /// `reserve`. This is a programming-contract violation, not a
    /// recoverable condition.
    pub fn commit(&mut self, count: usize) {
        assert!(
            count <= self.reserved,
            "commit of {count} bytes exceeds the {} reserved",
            self.reserved
        );
        self.written += count;
        self.reserved -= count;
    }

    #[inline]
    fn free(&self) -> usize {
        self.buf.len() - self.written
    }

    fn grow(&mut self, size_hint: usize) -> Result<()> {
        let len = self.buf.len();
        let grow_by = size_hint.max(len.max(MIN_BUFFER_SIZE));

        let new_len = match len.checked_add(grow_by) {
            Some(n) if n <= MAX_CAPACITY => n,
            _ => {
                let required = self
                    .written
                    .checked_add(size_hint)
                    .filter(|&r| r <= MAX_CAPACITY)
                    .ok_or(LibSqlClientError::BufferCapacity {
                        requested: self.written.saturating_add(size_hint),
                    })?;
                required.max(len)
            }
        };

        self.buf.resize(new_len, 0);
        Ok(())
    }
}

impl io::Write for PooledBufWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let region = self
            .reserve(data.len())
            .map_err(|e| io::Error::new(io::ErrorKind::OutOfMemory, e.to_string()))?;
        region[..data.len()].copy_from_slice(data);
        self.commit(data.len());
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for PooledBufWriter {
    fn drop(&mut self) {
        self.buf[..self.written].fill(0);
        self.written = 0;
        self.reserved = 0;

        if self.buf.len() <= MAX_POOLED_CAPACITY {
            let mut pool = POOL.lock().unwrap_or_else(|e| e.into_inner());
            if pool.len() < MAX_POOLED_BUFFERS {
                pool.push(std::mem::take(&mut self.buf));
            }
        }
    }
}
