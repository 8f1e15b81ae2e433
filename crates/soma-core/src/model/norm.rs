//! Layer normalization.
//!
//! # Formula
//!
//! `LayerNorm(x) = (x - mean(x)) / sqrt(var(x) + eps) * weight + bias`
//!
//! Mean and variance are taken over the last dimension.

use crate::error::Result;
use candle_core::{DType, Device, Tensor, D};

/// Layer normalization over the last dimension.
#[derive(Debug, Clone)]
pub struct LayerNorm {
    /// Learnable scale: [hidden_dim]
    weight: Tensor,
    /// Learnable shift: [hidden_dim]
    bias: Tensor,
    /// Small constant for numerical stability.
    eps: f64,
    /// Hidden dimension.
    hidden_dim: usize,
}

impl LayerNorm {
    /// Create with provided parameters.
    pub fn new(weight: Tensor, bias: Tensor, eps: f64) -> Result<Self> {
        let hidden_dim = weight.dims()[0];
        Ok(Self {
            weight,
            bias,
            eps,
            hidden_dim,
        })
    }

    /// Create with identity parameters (scale one, shift zero).
    pub fn identity(hidden_dim: usize, eps: f64, device: &Device) -> Result<Self> {
        let weight = Tensor::ones(hidden_dim, DType::F32, device)?;
        let bias = Tensor::zeros(hidden_dim, DType::F32, device)?;
        Ok(Self {
            weight,
            bias,
            eps,
            hidden_dim,
        })
    }

    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor [..., hidden_dim]
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let mean = x.mean_keepdim(D::Minus1)?;
        let centered = x.broadcast_sub(&mean)?;

        let var = centered.sqr()?.mean_keepdim(D::Minus1)?;
        let denom = (var + self.eps)?.sqrt()?;

        let normalized = centered.broadcast_div(&denom)?;
        let output = normalized
            .broadcast_mul(&self.weight)?
            .broadcast_add(&self.bias)?;

        Ok(output)
    }

    /// Get the hidden dimension.
    pub fn hidden_dim(&self) -> usize {
        self.hidden_dim
    }

    /// Get epsilon value.
    pub fn eps(&self) -> f64 {
        self.eps
    }
}
