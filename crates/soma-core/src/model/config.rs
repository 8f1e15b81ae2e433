//! Pipeline configuration.

use crate::error::SomaError;
use serde::{Deserialize, Serialize};

/// Configuration for a transformation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Input (and output) vector width.
    pub input_dim: usize,
    /// Internal working width.
    pub hidden_dim: usize,
    /// Number of encoder layers.
    pub num_layers: usize,
    /// Number of attention heads.
    pub num_heads: usize,
    /// Feed-forward inner width.
    pub ffn_dim: usize,
    /// Maximum sequence length covered by the positional table.
    pub max_len: usize,
    /// Dropout probability (training mode only).
    pub dropout: f32,
    /// Layer norm epsilon.
    pub layer_norm_eps: f64,
}

impl PipelineConfig {
    /// Per-head width.
    pub fn head_dim(&self) -> usize {
        self.hidden_dim / self.num_heads
    }

    /// Check parameters for internal consistency.
    pub fn validate(&self) -> crate::Result<()> {
        if self.input_dim == 0 || self.hidden_dim == 0 || self.num_layers == 0 {
            return Err(SomaError::InvalidConfig(
                "input_dim, hidden_dim and num_layers must be nonzero".into(),
            ));
        }
        if self.num_heads == 0 || self.hidden_dim % self.num_heads != 0 {
            return Err(SomaError::InvalidConfig(format!(
                "hidden_dim {} not divisible by num_heads {}",
                self.hidden_dim, self.num_heads
            )));
        }
        if self.max_len == 0 {
            return Err(SomaError::InvalidConfig("max_len must be nonzero".into()));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(SomaError::InvalidConfig(format!(
                "dropout {} outside [0, 1)",
                self.dropout
            )));
        }
        Ok(())
    }

    /// Load from JSON file.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dim: 512,
            hidden_dim: 1024,
            num_layers: 6,
            num_heads: 8,
            ffn_dim: 2048,
            max_len: 5000,
            dropout: 0.1,
            layer_norm_eps: 1e-5,
        }
    }
}
