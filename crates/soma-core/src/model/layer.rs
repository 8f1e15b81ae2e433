//! Encoder layer implementation.
//!
//! A single encoder block combining:
//! - Multi-head self-attention over the sequence axis
//! - Residual connection and layer norm
//! - Position-wise feed-forward network
//! - Residual connection and layer norm
//!
//! Normalization follows the residual additions (post-norm order).

use super::{FeedForward, LayerNorm};
use crate::error::{Result, SomaError};
use candle_core::{DType, Device, Tensor};

/// Multi-head self-attention module.
#[derive(Debug, Clone)]
pub struct SelfAttention {
    /// Query projection: [hidden_dim, hidden_dim]
    q_proj: Tensor,
    /// Key projection: [hidden_dim, hidden_dim]
    k_proj: Tensor,
    /// Value projection: [hidden_dim, hidden_dim]
    v_proj: Tensor,
    /// Output projection: [hidden_dim, hidden_dim]
    o_proj: Tensor,
    /// Projection biases: [hidden_dim] each.
    q_bias: Tensor,
    k_bias: Tensor,
    v_bias: Tensor,
    o_bias: Tensor,
    /// Number of attention heads.
    num_heads: usize,
    /// Head dimension.
    head_dim: usize,
    /// Hidden size.
    hidden_dim: usize,
}

impl SelfAttention {
    /// Create attention with provided weights.
    ///
    /// Each projection is [hidden_dim, hidden_dim] with a [hidden_dim]
    /// bias; `hidden_dim` is taken from the query projection.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        q_proj: Tensor,
        k_proj: Tensor,
        v_proj: Tensor,
        o_proj: Tensor,
        q_bias: Tensor,
        k_bias: Tensor,
        v_bias: Tensor,
        o_bias: Tensor,
        num_heads: usize,
    ) -> Result<Self> {
        let hidden_dim = q_proj.dims()[1];
        if num_heads == 0 || hidden_dim % num_heads != 0 {
            return Err(SomaError::InvalidConfig(format!(
                "hidden_dim {hidden_dim} not divisible by num_heads {num_heads}"
            )));
        }
        Ok(Self {
            q_proj,
            k_proj,
            v_proj,
            o_proj,
            q_bias,
            k_bias,
            v_bias,
            o_bias,
            num_heads,
            head_dim: hidden_dim / num_heads,
            hidden_dim,
        })
    }

    /// Create attention with random weights (for testing).
    pub fn random(hidden_dim: usize, num_heads: usize, device: &Device) -> Result<Self> {
        if num_heads == 0 || hidden_dim % num_heads != 0 {
            return Err(SomaError::InvalidConfig(format!(
                "hidden_dim {hidden_dim} not divisible by num_heads {num_heads}"
            )));
        }

        let proj = |dev: &Device| Tensor::randn(0.0f32, 0.02, &[hidden_dim, hidden_dim], dev);
        let bias = |dev: &Device| Tensor::zeros(hidden_dim, DType::F32, dev);

        Ok(Self {
            q_proj: proj(device)?,
            k_proj: proj(device)?,
            v_proj: proj(device)?,
            o_proj: proj(device)?,
            q_bias: bias(device)?,
            k_bias: bias(device)?,
            v_bias: bias(device)?,
            o_bias: bias(device)?,
            num_heads,
            head_dim: hidden_dim / num_heads,
            hidden_dim,
        })
    }

    /// Compute Q, K, V projections.
    ///
    /// Returns (query, key, value) tensors reshaped for attention, each
    /// [batch, num_heads, seq_len, head_dim].
    pub fn project(&self, x: &Tensor) -> Result<(Tensor, Tensor, Tensor)> {
        let (batch, seq_len, width) = x.dims3()?;
        if width != self.hidden_dim {
            return Err(SomaError::ShapeMismatch(format!(
                "attention: expected last dim {}, got {}",
                self.hidden_dim, width
            )));
        }

        let x_2d = x.reshape((batch * seq_len, self.hidden_dim))?;

        let q = x_2d.matmul(&self.q_proj.t()?)?.broadcast_add(&self.q_bias)?;
        let k = x_2d.matmul(&self.k_proj.t()?)?.broadcast_add(&self.k_bias)?;
        let v = x_2d.matmul(&self.v_proj.t()?)?.broadcast_add(&self.v_bias)?;

        // [batch, seq, num_heads, head_dim] -> [batch, num_heads, seq, head_dim]
        let split = |t: Tensor| -> Result<Tensor> {
            Ok(t.reshape((batch, seq_len, self.num_heads, self.head_dim))?
                .transpose(1, 2)?
                .contiguous()?)
        };

        Ok((split(q)?, split(k)?, split(v)?))
    }

    /// Scaled dot-product attention.
    ///
    /// `mask`, when present, is an additive tensor broadcastable to the
    /// score shape [batch, num_heads, seq_len, seq_len]; `-inf` entries
    /// suppress the corresponding keys.
    pub fn attend(
        &self,
        q: &Tensor,
        k: &Tensor,
        v: &Tensor,
        mask: Option<&Tensor>,
    ) -> Result<Tensor> {
        let scale = 1.0 / (self.head_dim as f64).sqrt();

        let scores = q.matmul(&k.transpose(2, 3)?.contiguous()?)?;
        let scores = (scores * scale)?;

        let scores = if let Some(mask) = mask {
            scores.broadcast_add(mask)?
        } else {
            scores
        };

        let weights = candle_nn::ops::softmax(&scores, candle_core::D::Minus1)?;
        Ok(weights.matmul(v)?)
    }

    /// Merge heads and apply the output projection.
    ///
    /// Input: [batch, num_heads, seq_len, head_dim]
    /// Output: [batch, seq_len, hidden_dim]
    pub fn output(&self, attn: &Tensor) -> Result<Tensor> {
        let dims = attn.dims();
        let batch = dims[0];
        let seq_len = dims[2];

        let x = attn.transpose(1, 2)?.contiguous()?;
        let x_2d = x.reshape((batch * seq_len, self.hidden_dim))?;
        let out = x_2d.matmul(&self.o_proj.t()?)?.broadcast_add(&self.o_bias)?;

        Ok(out.reshape((batch, seq_len, self.hidden_dim))?)
    }

    /// Full attention sublayer: project, attend, merge.
    pub fn forward(&self, x: &Tensor, mask: Option<&Tensor>) -> Result<Tensor> {
        let (q, k, v) = self.project(x)?;
        let attn = self.attend(&q, &k, &v, mask)?;
        self.output(&attn)
    }

    /// Get the number of heads.
    pub fn num_heads(&self) -> usize {
        self.num_heads
    }

    /// Get the head dimension.
    pub fn head_dim(&self) -> usize {
        self.head_dim
    }
}

/// A single encoder layer.
#[derive(Debug, Clone)]
pub struct EncoderLayer {
    /// Self-attention.
    attention: SelfAttention,
    /// Norm after the attention residual.
    norm1: LayerNorm,
    /// Feed-forward network.
    ffn: FeedForward,
    /// Norm after the feed-forward residual.
    norm2: LayerNorm,
    /// Dropout probability (training mode only).
    dropout: f32,
}

impl EncoderLayer {
    /// Create a new encoder layer from parts.
    pub fn new(
        attention: SelfAttention,
        norm1: LayerNorm,
        ffn: FeedForward,
        norm2: LayerNorm,
        dropout: f32,
    ) -> Self {
        Self {
            attention,
            norm1,
            ffn,
            norm2,
            dropout,
        }
    }

    /// Create an encoder layer with random weights (for testing).
    pub fn random(
        hidden_dim: usize,
        num_heads: usize,
        ffn_dim: usize,
        eps: f64,
        dropout: f32,
        device: &Device,
    ) -> Result<Self> {
        let attention = SelfAttention::random(hidden_dim, num_heads, device)?;
        let norm1 = LayerNorm::identity(hidden_dim, eps, device)?;
        let ffn = FeedForward::random(hidden_dim, ffn_dim, device)?;
        let norm2 = LayerNorm::identity(hidden_dim, eps, device)?;

        Ok(Self {
            attention,
            norm1,
            ffn,
            norm2,
            dropout,
        })
    }

    /// Deterministic forward pass (inference mode).
    pub fn forward(&self, x: &Tensor, mask: Option<&Tensor>) -> Result<Tensor> {
        self.forward_t(x, mask, false)
    }

    /// Forward pass with an explicit training-mode toggle.
    ///
    /// When `train` is set, dropout perturbs the attention and feed-forward
    /// outputs before their residual additions; inference is a no-op.
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor [batch, seq_len, hidden_dim]
    /// * `mask` - Optional additive attention mask
    /// * `train` - Enable stochastic regularization
    pub fn forward_t(&self, x: &Tensor, mask: Option<&Tensor>, train: bool) -> Result<Tensor> {
        let attn = self.attention.forward(x, mask)?;
        let attn = if train {
            candle_nn::ops::dropout(&attn, self.dropout)?
        } else {
            attn
        };
        let x = self.norm1.forward(&(x + attn)?)?;

        let ff = self.ffn.forward(&x)?;
        let ff = if train {
            candle_nn::ops::dropout(&ff, self.dropout)?
        } else {
            ff
        };
        self.norm2.forward(&(&x + ff)?)
    }

    /// Get the attention module.
    pub fn attention(&self) -> &SelfAttention {
        &self.attention
    }

    /// Get the feed-forward module.
    pub fn ffn(&self) -> &FeedForward {
        &self.ffn
    }
}

/// Convert a per-position indicator mask into an additive attention mask.
///
/// `mask` is [batch, seq_len] with nonzero entries marking positions to
/// exclude from attention. The result is [batch, 1, 1, seq_len] holding
/// `-inf` at masked keys and `0` elsewhere, ready to broadcast-add onto
/// attention scores.
pub fn padding_mask(mask: &Tensor) -> Result<Tensor> {
    let (batch, seq_len) = mask.dims2()?;

    let on_true = Tensor::full(f32::NEG_INFINITY, (batch, seq_len), mask.device())?;
    let on_false = Tensor::zeros((batch, seq_len), DType::F32, mask.device())?;

    let additive = mask
        .to_dtype(DType::U8)?
        .where_cond(&on_true, &on_false)?;

    Ok(additive.reshape((batch, 1, 1, seq_len))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_layer() -> EncoderLayer {
        EncoderLayer::random(64, 8, 128, 1e-5, 0.1, &Device::Cpu).unwrap()
    }

    #[test]
    fn attention_projection_shapes() {
        let attn = SelfAttention::random(64, 8, &Device::Cpu).unwrap();

        // [batch=2, seq=8, hidden=64]
        let x = Tensor::randn(0.0f32, 1.0, &[2, 8, 64], &Device::Cpu).unwrap();
        let (q, k, v) = attn.project(&x).unwrap();

        assert_eq!(q.dims(), &[2, 8, 8, 8]); // [batch, num_heads, seq, head_dim]
        assert_eq!(k.dims(), &[2, 8, 8, 8]);
        assert_eq!(v.dims(), &[2, 8, 8, 8]);
    }

    #[test]
    fn attention_forward_shape() {
        let attn = SelfAttention::random(64, 8, &Device::Cpu).unwrap();

        let x = Tensor::randn(0.0f32, 1.0, &[2, 10, 64], &Device::Cpu).unwrap();
        let out = attn.forward(&x, None).unwrap();

        assert_eq!(out.dims(), &[2, 10, 64]);
    }

    #[test]
    fn attention_rejects_indivisible_heads() {
        assert!(SelfAttention::random(65, 8, &Device::Cpu).is_err());
    }

    #[test]
    fn layer_forward_shape() {
        let layer = create_test_layer();

        let x = Tensor::randn(0.0f32, 1.0, &[1, 16, 64], &Device::Cpu).unwrap();
        let output = layer.forward(&x, None).unwrap();

        assert_eq!(output.dims(), &[1, 16, 64]);
    }

    #[test]
    fn layer_forward_with_mask() {
        let layer = create_test_layer();

        let x = Tensor::randn(0.0f32, 1.0, &[2, 8, 64], &Device::Cpu).unwrap();
        let indicator =
            Tensor::from_slice(&[0u8, 0, 0, 0, 0, 0, 1, 1], (1, 8), &Device::Cpu)
                .unwrap()
                .broadcast_as((2, 8))
                .unwrap()
                .contiguous()
                .unwrap();
        let mask = padding_mask(&indicator).unwrap();

        let output = layer.forward(&x, Some(&mask)).unwrap();
        assert_eq!(output.dims(), &[2, 8, 64]);
    }

    #[test]
    fn padding_mask_shape_and_values() {
        let indicator = Tensor::from_slice(&[0u8, 1, 0, 1], (1, 4), &Device::Cpu).unwrap();
        let mask = padding_mask(&indicator).unwrap();

        assert_eq!(mask.dims(), &[1, 1, 1, 4]);

        let vals: Vec<f32> = mask.flatten_all().unwrap().to_vec1().unwrap();
        assert!(vals[0] == 0.0);
        assert!(vals[1].is_infinite() && vals[1] < 0.0);
        assert!(vals[2] == 0.0);
        assert!(vals[3].is_infinite() && vals[3] < 0.0);
    }

    #[test]
    fn padding_mask_accepts_float_indicator() {
        let indicator = Tensor::from_slice(&[0.0f32, 1.0], (1, 2), &Device::Cpu).unwrap();
        let mask = padding_mask(&indicator).unwrap();

        let vals: Vec<f32> = mask.flatten_all().unwrap().to_vec1().unwrap();
        assert!(vals[0] == 0.0);
        assert!(vals[1].is_infinite());
    }

    #[test]
    fn masked_keys_get_zero_weight() {
        let attn = SelfAttention::random(32, 8, &Device::Cpu).unwrap();

        let x = Tensor::randn(0.0f32, 1.0, &[1, 4, 32], &Device::Cpu).unwrap();
        let indicator = Tensor::from_slice(&[0u8, 0, 0, 1], (1, 4), &Device::Cpu).unwrap();
        let mask = padding_mask(&indicator).unwrap();

        let (q, k, v) = attn.project(&x).unwrap();
        let scores = q.matmul(&k.transpose(2, 3).unwrap().contiguous().unwrap()).unwrap();
        let scores = (scores * (1.0 / (attn.head_dim() as f64).sqrt())).unwrap();
        let scores = scores.broadcast_add(&mask).unwrap();
        let weights = candle_nn::ops::softmax(&scores, candle_core::D::Minus1).unwrap();

        // Weight toward the masked key (last column) must be zero for
        // every head and query position.
        let flat: Vec<f32> = weights.flatten_all().unwrap().to_vec1().unwrap();
        for (i, w) in flat.iter().enumerate() {
            if i % 4 == 3 {
                assert!(w.abs() < 1e-7, "masked weight {w} at {i}");
            }
        }
    }

    #[test]
    fn deterministic_without_training() {
        let layer = create_test_layer();

        let x = Tensor::randn(0.0f32, 1.0, &[1, 8, 64], &Device::Cpu).unwrap();
        let a: Vec<f32> = layer
            .forward(&x, None)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1()
            .unwrap();
        let b: Vec<f32> = layer
            .forward(&x, None)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1()
            .unwrap();

        assert_eq!(a, b);
    }
}
