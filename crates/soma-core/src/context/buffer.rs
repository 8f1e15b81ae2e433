//! Bounded FIFO context buffer.

use crate::error::Result;
use candle_core::{DType, Device, Tensor};
use std::collections::VecDeque;

/// Default context window capacity.
pub const DEFAULT_CONTEXT_CAPACITY: usize = 8192;

/// Capacity-bounded store of representations with FIFO eviction.
///
/// Entries are kept in insertion order. A push that would exceed the
/// capacity silently evicts the single oldest entry; eviction is never an
/// error. Push and evict are O(1).
#[derive(Debug, Clone)]
pub struct ContextBuffer {
    /// Buffered representations, oldest at the front.
    entries: VecDeque<Tensor>,
    /// Maximum number of entries retained.
    capacity: usize,
    /// Device used for the empty context tensor.
    device: Device,
}

impl ContextBuffer {
    /// Create a buffer holding at most `capacity` entries.
    pub fn new(capacity: usize, device: Device) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_CONTEXT_CAPACITY)),
            capacity,
            device,
        }
    }

    /// Create a buffer with the default capacity (8192).
    pub fn with_default_capacity(device: Device) -> Self {
        Self::new(DEFAULT_CONTEXT_CAPACITY, device)
    }

    /// Append a representation at the back of the buffer.
    ///
    /// When the buffer is already full, exactly one entry is evicted from
    /// the front before this call returns.
    pub fn push(&mut self, representation: Tensor) {
        self.entries.push_back(representation);
        if self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Stack all buffered entries along a new leading axis, in insertion
    /// order.
    ///
    /// An empty buffer yields an explicitly empty tensor of shape `(0,)`
    /// rather than an error.
    pub fn get_context_tensor(&self) -> Result<Tensor> {
        if self.entries.is_empty() {
            return Ok(Tensor::zeros(0, DType::F32, &self.device)?);
        }
        let entries: Vec<&Tensor> = self.entries.iter().collect();
        Ok(Tensor::stack(&entries, 0)?)
    }

    /// Remove all buffered entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Current number of buffered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the buffer holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
