//! # Soma Core
//!
//! Core engine for attention-based sequence transformation with
//! session-scoped context windows.
//!
//! This crate provides:
//! - **Transformation pipeline**: input projection, sinusoidal positional
//!   encoding, a stack of self-attention encoder blocks, and an output
//!   projection back to the input width
//! - **Context buffer**: a capacity-bounded rolling store of
//!   representations with FIFO eviction for long-running sessions
//!
//! The pipeline is immutable after construction and safe to share across
//! threads for read-only use. The context buffer is per-session mutable
//! state; see [`context::SharedContextBuffer`] for a lock-guarded variant.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod context;
pub mod error;
pub mod model;

pub use error::{Result, SomaError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::context::{ContextBuffer, SharedContextBuffer};
    pub use crate::error::{Result, SomaError};
    pub use crate::model::{Pipeline, PipelineConfig};
}
