//! # Soma
//!
//! Attention-based sequence transformation with session-scoped context
//! windows.
//!
//! Soma turns batches of numeric vector sequences into same-shaped batches
//! through a learned mixing pipeline, and keeps a bounded rolling window of
//! representations across calls within a session:
//! - **Shape-preserving forward pass**: projection, positional encoding,
//!   stacked self-attention, output projection
//! - **Padding masks**: exclude designated positions from attention
//! - **Bounded context**: FIFO-evicting rolling history per session
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use soma::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut session = Session::builder()
//!         .input_dim(512)
//!         .hidden_dim(1024)
//!         .num_layers(6)
//!         .build()?;
//!
//!     let output = session.transform(&input, None)?;
//!     session.remember(summary);
//!     let history = session.context()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// Re-export core crate
pub use soma_core::*;

mod session;

pub use session::{Session, SessionBuilder, SessionConfig};

/// Commonly used types.
pub mod prelude {
    pub use crate::session::{Session, SessionBuilder, SessionConfig};
    pub use crate::{
        context::{ContextBuffer, SharedContextBuffer},
        error::{Result, SomaError},
        model::{Pipeline, PipelineConfig},
    };

    // Re-export useful external types
    pub use anyhow;
    pub use tracing;
}
