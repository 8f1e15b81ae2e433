//! Input and output projections.
//!
//! The input projection lifts vectors from `input_dim` to `hidden_dim` and
//! rescales by `sqrt(hidden_dim)` so the embedded signal stays comparable
//! in magnitude to the positional encoding added afterwards. The output
//! projection maps the final hidden states back to `input_dim`.

use crate::error::{Result, SomaError};
use candle_core::{DType, Device, Tensor};

/// Affine projection from input width to hidden width, scaled by
/// `sqrt(hidden_dim)`.
#[derive(Debug, Clone)]
pub struct InputProjection {
    /// Weight: [hidden_dim, input_dim]
    weight: Tensor,
    /// Bias: [hidden_dim]
    bias: Tensor,
    /// Input width.
    input_dim: usize,
    /// Hidden width.
    hidden_dim: usize,
}

impl InputProjection {
    /// Create with provided weights.
    pub fn new(weight: Tensor, bias: Tensor) -> Result<Self> {
        let dims = weight.dims();
        if dims.len() != 2 || bias.dims() != &[dims[0]] {
            return Err(SomaError::ShapeMismatch(format!(
                "input projection: weight {:?} incompatible with bias {:?}",
                weight.dims(),
                bias.dims()
            )));
        }
        Ok(Self {
            input_dim: dims[1],
            hidden_dim: dims[0],
            weight,
            bias,
        })
    }

    /// Create with random weights (for testing).
    pub fn random(input_dim: usize, hidden_dim: usize, device: &Device) -> Result<Self> {
        let weight = Tensor::randn(0.0f32, 0.02, &[hidden_dim, input_dim], device)?;
        let bias = Tensor::zeros(hidden_dim, DType::F32, device)?;
        Ok(Self {
            weight,
            bias,
            input_dim,
            hidden_dim,
        })
    }

    /// Forward pass.
    ///
    /// Input: [batch, seq_len, input_dim]
    /// Output: [batch, seq_len, hidden_dim], multiplied by `sqrt(hidden_dim)`.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (batch, seq_len, width) = x.dims3()?;
        if width != self.input_dim {
            return Err(SomaError::ShapeMismatch(format!(
                "input projection: expected last dim {}, got {}",
                self.input_dim, width
            )));
        }

        let x_2d = x.reshape((batch * seq_len, self.input_dim))?;
        let out = x_2d.matmul(&self.weight.t()?)?.broadcast_add(&self.bias)?;
        let out = out.reshape((batch, seq_len, self.hidden_dim))?;

        let scale = (self.hidden_dim as f64).sqrt();
        Ok((out * scale)?)
    }

    /// Get the input width.
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Get the hidden width.
    pub fn hidden_dim(&self) -> usize {
        self.hidden_dim
    }
}

/// Affine projection from hidden width back to input width.
#[derive(Debug, Clone)]
pub struct OutputProjection {
    /// Weight: [input_dim, hidden_dim]
    weight: Tensor,
    /// Bias: [input_dim]
    bias: Tensor,
    /// Hidden width.
    hidden_dim: usize,
    /// Output width.
    output_dim: usize,
}

impl OutputProjection {
    /// Create with provided weights.
    pub fn new(weight: Tensor, bias: Tensor) -> Result<Self> {
        let dims = weight.dims();
        if dims.len() != 2 || bias.dims() != &[dims[0]] {
            return Err(SomaError::ShapeMismatch(format!(
                "output projection: weight {:?} incompatible with bias {:?}",
                weight.dims(),
                bias.dims()
            )));
        }
        Ok(Self {
            hidden_dim: dims[1],
            output_dim: dims[0],
            weight,
            bias,
        })
    }

    /// Create with random weights (for testing).
    pub fn random(hidden_dim: usize, output_dim: usize, device: &Device) -> Result<Self> {
        let weight = Tensor::randn(0.0f32, 0.02, &[output_dim, hidden_dim], device)?;
        let bias = Tensor::zeros(output_dim, DType::F32, device)?;
        Ok(Self {
            weight,
            bias,
            hidden_dim,
            output_dim,
        })
    }

    /// Forward pass.
    ///
    /// Input: [batch, seq_len, hidden_dim]
    /// Output: [batch, seq_len, output_dim]
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (batch, seq_len, width) = x.dims3()?;
        if width != self.hidden_dim {
            return Err(SomaError::ShapeMismatch(format!(
                "output projection: expected last dim {}, got {}",
                self.hidden_dim, width
            )));
        }

        let x_2d = x.reshape((batch * seq_len, self.hidden_dim))?;
        let out = x_2d.matmul(&self.weight.t()?)?.broadcast_add(&self.bias)?;
        Ok(out.reshape((batch, seq_len, self.output_dim))?)
    }

    /// Get the output width.
    pub fn output_dim(&self) -> usize {
        self.output_dim
    }
}
