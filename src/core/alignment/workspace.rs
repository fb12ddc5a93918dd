//! Per-worker scratch arena.
//!
//! Each worker owns exactly one [`Arena`] for its whole lifetime. The buffer
//! grows to the largest request seen so far and is never shrunk, so after the
//! first few reads the extension step runs without allocating.

use crate::pipelines::linear::error::EngineError;

/// Growable byte buffer reused across reads by one worker.
#[derive(Debug, Default)]
pub struct Arena {
    buf: Vec<u8>,
    grow_events: usize,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arena pre-grown to `len` bytes.
    pub fn with_capacity(len: usize) -> Result<Self, EngineError> {
        let mut arena = Self::new();
        arena.ensure(len)?;
        Ok(arena)
    }

    /// Grows the buffer to at least `len` bytes.
    ///
    /// Allocation failure is reported instead of aborting the process.
    pub fn ensure(&mut self, len: usize) -> Result<(), EngineError> {
        if len <= self.buf.len() {
            return Ok(());
        }
        let extra = len - self.buf.len();
        self.buf
            .try_reserve_exact(extra)
            .map_err(|_| EngineError::ResourceExhausted { requested: len })?;
        self.buf.resize(len, 0);
        self.grow_events += 1;
        log::trace!("arena grown to {len} bytes");
        Ok(())
    }

    /// Scratch slice of exactly `len` bytes. Contents are left over from
    /// earlier requests; callers overwrite what they read.
    pub fn scratch(&mut self, len: usize) -> Result<&mut [u8], EngineError> {
        self.ensure(len)?;
        Ok(&mut self.buf[..len])
    }

    /// Current size, i.e. the largest request served so far.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Number of times the buffer had to grow.
    pub fn grow_events(&self) -> usize {
        self.grow_events
    }
}
