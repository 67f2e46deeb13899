use bytes::{Buf, Bytes, BytesMut};

use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Bounded FIFO byte buffer.
///
/// Holds bytes received from the transport but not yet consumed by the
/// decoder, or bytes queued for the transport but not yet written. The
/// backing storage grows on demand up to `capacity`; an append that would go
/// past it is rejected whole and leaves the existing contents untouched.
#[derive(Debug)]
pub struct ByteAccumulator {
    buf: BytesMut,
    capacity: usize,
}

impl ByteAccumulator {
    /// Create an empty accumulator that will hold at most `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity.min(INITIAL_BUFFER_CAPACITY)),
            capacity,
        }
    }

    /// Append `bytes` after the current contents.
    ///
    /// Fails with [`FrameError::CapacityExceeded`] if the result would be
    /// larger than the configured capacity. Nothing is appended in that case.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        let attempted = self.buf.len().saturating_add(bytes.len());
        if attempted > self.capacity {
            return Err(FrameError::CapacityExceeded {
                attempted,
                capacity: self.capacity,
            });
        }
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Remove and return the first `n` bytes.
    ///
    /// Returns `None`, removing nothing, if fewer than `n` bytes are buffered.
    pub fn drain(&mut self, n: usize) -> Option<Bytes> {
        if n > self.buf.len() {
            return None;
        }
        Some(self.buf.split_to(n).freeze())
    }

    /// Discard the first `n` bytes, or everything if fewer are buffered.
    pub fn advance(&mut self, n: usize) {
        self.buf.advance(n.min(self.buf.len()));
    }

    /// View the buffered bytes without consuming them.
    pub fn peek(&self) -> &[u8] {
        &self.buf
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Maximum number of bytes this accumulator will hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// How many more bytes can be appended before hitting capacity.
    pub fn remaining_capacity(&self) -> usize {
        self.capacity.saturating_sub(self.buf.len())
    }

    /// Drop all buffered bytes.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
