//! Sinusoidal positional encoding.
//!
//! Position information is injected by adding a fixed sine/cosine table to
//! the embedded sequence, so it survives the order-agnostic attention
//! mixing that follows.
//!
//! # Formula
//!
//! For position `p` and dimension pair index `i`:
//! `table[p][2i] = sin(p / 10000^(2i/d))`,
//! `table[p][2i+1] = cos(p / 10000^(2i/d))`
//!
//! # Reference
//!
//! [Attention Is All You Need](https://arxiv.org/abs/1706.03762), §3.5

use crate::error::{Result, SomaError};
use candle_core::{Device, Tensor};

/// Precomputed positional encoding table.
///
/// The table covers positions `[0, max_len)` and is immutable for the
/// lifetime of the pipeline.
#[derive(Debug, Clone)]
pub struct PositionalEncoding {
    /// Encoding table: [max_len, hidden_dim]
    table: Tensor,
    /// Hidden width.
    hidden_dim: usize,
    /// Maximum position covered.
    max_len: usize,
}

impl PositionalEncoding {
    /// Build the encoding table.
    pub fn new(hidden_dim: usize, max_len: usize, device: &Device) -> Result<Self> {
        let mut data = vec![0.0f32; max_len * hidden_dim];
        for p in 0..max_len {
            for i in 0..hidden_dim.div_ceil(2) {
                let freq = 1.0 / 10000f64.powf(2.0 * i as f64 / hidden_dim as f64);
                let angle = p as f64 * freq;
                data[p * hidden_dim + 2 * i] = angle.sin() as f32;
                if 2 * i + 1 < hidden_dim {
                    data[p * hidden_dim + 2 * i + 1] = angle.cos() as f32;
                }
            }
        }
        let table = Tensor::from_slice(&data, (max_len, hidden_dim), device)?;

        Ok(Self {
            table,
            hidden_dim,
            max_len,
        })
    }

    /// Add the first `seq_len` table rows to an embedded sequence,
    /// broadcast across the batch.
    ///
    /// Input: [batch, seq_len, hidden_dim]
    ///
    /// Fails with a shape error when `seq_len` exceeds the table length;
    /// the table is never indexed out of range.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (_batch, seq_len, width) = x.dims3()?;
        if width != self.hidden_dim {
            return Err(SomaError::ShapeMismatch(format!(
                "positional encoding: expected last dim {}, got {}",
                self.hidden_dim, width
            )));
        }
        if seq_len > self.max_len {
            return Err(SomaError::ShapeMismatch(format!(
                "sequence length {} exceeds positional table length {}",
                seq_len, self.max_len
            )));
        }

        let pe = self.table.narrow(0, 0, seq_len)?.unsqueeze(0)?;
        Ok(x.broadcast_add(&pe)?)
    }

    /// Get the maximum position covered.
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Get the hidden width.
    pub fn hidden_dim(&self) -> usize {
        self.hidden_dim
    }
}
