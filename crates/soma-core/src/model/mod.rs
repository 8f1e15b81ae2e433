//! Sequence transformation pipeline.
//!
//! Provides the forward-only transformation stack:
//! - Pipeline configuration
//! - Input/output projections
//! - Sinusoidal positional encoding
//! - Self-attention encoder layers

mod config;
mod ffn;
mod layer;
mod norm;
mod pipeline;
mod positional;
mod projection;

pub use config::PipelineConfig;
pub use ffn::FeedForward;
pub use layer::{padding_mask, EncoderLayer, SelfAttention};
pub use norm::LayerNorm;
pub use pipeline::Pipeline;
pub use positional::PositionalEncoding;
pub use projection::{InputProjection, OutputProjection};
