//! Error types for Soma Core.

use thiserror::Error;

/// Result type alias for Soma operations.
pub type Result<T> = std::result::Result<T, SomaError>;

/// Errors that can occur in Soma operations.
#[derive(Error, Debug)]
pub enum SomaError {
    /// Shape mismatch between declared dimensions and actual tensors.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Invalid configuration parameters.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// I/O error.
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    /// Candle tensor error.
    #[error("tensor error: {0}")]
    TensorError(#[from] candle_core::Error),
}
