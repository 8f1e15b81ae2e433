//! Lock-guarded context buffer for cross-thread sessions.

use super::ContextBuffer;
use crate::error::Result;
use candle_core::{Device, Tensor};
use parking_lot::Mutex;

/// A [`ContextBuffer`] behind a mutex, for sessions whose buffer is shared
/// across threads.
///
/// `push` holds the lock for the whole push-then-evict transition, so
/// concurrent writers cannot interleave between append and eviction.
#[derive(Debug)]
pub struct SharedContextBuffer {
    inner: Mutex<ContextBuffer>,
}

impl SharedContextBuffer {
    /// Create a shared buffer holding at most `capacity` entries.
    pub fn new(capacity: usize, device: Device) -> Self {
        Self {
            inner: Mutex::new(ContextBuffer::new(capacity, device)),
        }
    }

    /// Append a representation, evicting the oldest entry on overflow.
    pub fn push(&self, representation: Tensor) {
        self.inner.lock().push(representation);
    }

    /// Stack all buffered entries in insertion order.
    pub fn get_context_tensor(&self) -> Result<Tensor> {
        self.inner.lock().get_context_tensor()
    }

    /// Remove all buffered entries.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Current number of buffered entries.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the buffer holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
