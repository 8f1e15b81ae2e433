//! Session-scoped context memory.
//!
//! A bounded rolling window of previously computed representations.
//! Callers push representations as a session progresses and can retrieve
//! the full buffered history as one stacked tensor; when the buffer is
//! full, the oldest entry is evicted first.
//!
//! The buffer is never consulted by the transformation pipeline itself;
//! it is caller-managed session state.

mod buffer;
mod shared;

pub use buffer::{ContextBuffer, DEFAULT_CONTEXT_CAPACITY};
pub use shared::SharedContextBuffer;
