//! Position-wise feed-forward network.
//!
//! Two affine maps with a ReLU in between, applied independently at every
//! sequence position:
//!
//! `FFN(x) = relu(x @ W1^T + b1) @ W2^T + b2`

use crate::error::{Result, SomaError};
use candle_core::{DType, Device, Tensor};

/// Position-wise feed-forward block.
#[derive(Debug, Clone)]
pub struct FeedForward {
    /// First projection: [ffn_dim, hidden_dim]
    w1: Tensor,
    /// First bias: [ffn_dim]
    b1: Tensor,
    /// Second projection: [hidden_dim, ffn_dim]
    w2: Tensor,
    /// Second bias: [hidden_dim]
    b2: Tensor,
    /// Hidden dimension.
    hidden_dim: usize,
    /// Inner dimension.
    ffn_dim: usize,
}

impl FeedForward {
    /// Create with provided weights.
    pub fn new(w1: Tensor, b1: Tensor, w2: Tensor, b2: Tensor) -> Result<Self> {
        let hidden_dim = w1.dims()[1];
        let ffn_dim = w1.dims()[0];
        if w2.dims() != &[hidden_dim, ffn_dim] {
            return Err(SomaError::ShapeMismatch(format!(
                "feed-forward: w2 {:?} incompatible with w1 {:?}",
                w2.dims(),
                w1.dims()
            )));
        }
        Ok(Self {
            w1,
            b1,
            w2,
            b2,
            hidden_dim,
            ffn_dim,
        })
    }

    /// Create with random weights (for testing).
    pub fn random(hidden_dim: usize, ffn_dim: usize, device: &Device) -> Result<Self> {
        let w1 = Tensor::randn(0.0f32, 0.02, &[ffn_dim, hidden_dim], device)?;
        let b1 = Tensor::zeros(ffn_dim, DType::F32, device)?;
        let w2 = Tensor::randn(0.0f32, 0.02, &[hidden_dim, ffn_dim], device)?;
        let b2 = Tensor::zeros(hidden_dim, DType::F32, device)?;

        Ok(Self {
            w1,
            b1,
            w2,
            b2,
            hidden_dim,
            ffn_dim,
        })
    }

    /// Create with zero weights (for testing specific behaviors).
    pub fn zeros(hidden_dim: usize, ffn_dim: usize, device: &Device) -> Result<Self> {
        let w1 = Tensor::zeros(&[ffn_dim, hidden_dim], DType::F32, device)?;
        let b1 = Tensor::zeros(ffn_dim, DType::F32, device)?;
        let w2 = Tensor::zeros(&[hidden_dim, ffn_dim], DType::F32, device)?;
        let b2 = Tensor::zeros(hidden_dim, DType::F32, device)?;

        Ok(Self {
            w1,
            b1,
            w2,
            b2,
            hidden_dim,
            ffn_dim,
        })
    }

    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor [batch, seq_len, hidden_dim]
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (batch, seq_len, width) = x.dims3()?;
        if width != self.hidden_dim {
            return Err(SomaError::ShapeMismatch(format!(
                "feed-forward: expected last dim {}, got {}",
                self.hidden_dim, width
            )));
        }

        let x_2d = x.reshape((batch * seq_len, self.hidden_dim))?;

        let inner = x_2d.matmul(&self.w1.t()?)?.broadcast_add(&self.b1)?;
        let activated = inner.relu()?;
        let out = activated.matmul(&self.w2.t()?)?.broadcast_add(&self.b2)?;

        Ok(out.reshape((batch, seq_len, self.hidden_dim))?)
    }

    /// Get the hidden dimension.
    pub fn hidden_dim(&self) -> usize {
        self.hidden_dim
    }

    /// Get the inner dimension.
    pub fn ffn_dim(&self) -> usize {
        self.ffn_dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_ffn() -> FeedForward {
        FeedForward::random(64, 128, &Device::Cpu).unwrap()
    }

    #[test]
    fn ffn_creation() {
        let ffn = create_test_ffn();
        assert_eq!(ffn.hidden_dim(), 64);
        assert_eq!(ffn.ffn_dim(), 128);
    }

    #[test]
    fn ffn_preserves_shape() {
        let ffn = create_test_ffn();

        let x = Tensor::randn(0.0f32, 1.0, &[2, 16, 64], &Device::Cpu).unwrap();
        let output = ffn.forward(&x).unwrap();

        assert_eq!(output.dims(), &[2, 16, 64]);
    }

    #[test]
    fn ffn_zeros_gives_zeros() {
        let ffn = FeedForward::zeros(32, 64, &Device::Cpu).unwrap();

        let x = Tensor::randn(0.0f32, 1.0, &[1, 4, 32], &Device::Cpu).unwrap();
        let output = ffn.forward(&x).unwrap();

        let sum: f32 = output.abs().unwrap().sum_all().unwrap().to_scalar().unwrap();
        assert!(sum < 1e-6, "expected near-zero output, got sum={sum}");
    }

    #[test]
    fn ffn_rejects_wrong_width() {
        let ffn = create_test_ffn();

        let x = Tensor::randn(0.0f32, 1.0, &[1, 4, 32], &Device::Cpu).unwrap();
        assert!(ffn.forward(&x).is_err());
    }

    #[test]
    fn ffn_mismatched_weights_rejected() {
        let w1 = Tensor::zeros(&[128, 64], DType::F32, &Device::Cpu).unwrap();
        let b1 = Tensor::zeros(128, DType::F32, &Device::Cpu).unwrap();
        let w2 = Tensor::zeros(&[32, 128], DType::F32, &Device::Cpu).unwrap();
        let b2 = Tensor::zeros(32, DType::F32, &Device::Cpu).unwrap();

        assert!(FeedForward::new(w1, b1, w2, b2).is_err());
    }
}
