//! The full sequence transformation pipeline.
//!
//! Composes the forward path: input projection, positional encoding,
//! the encoder stack, and the output projection. The output batch always
//! has the same shape as the input batch.

use super::{padding_mask, EncoderLayer, InputProjection, OutputProjection};
use super::{PipelineConfig, PositionalEncoding};
use crate::error::{Result, SomaError};
use candle_core::{Device, Tensor};

/// Attention-based sequence transformation pipeline.
///
/// Immutable after construction; a single instance can serve any number of
/// concurrent read-only forward calls.
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline configuration.
    config: PipelineConfig,
    /// Input projection with sqrt(hidden_dim) scaling.
    embedding: InputProjection,
    /// Precomputed positional table.
    positional: PositionalEncoding,
    /// Encoder stack, applied in order.
    layers: Vec<EncoderLayer>,
    /// Projection back to the input width.
    output: OutputProjection,
    /// Device for computation.
    device: Device,
}

impl Pipeline {
    /// Create a pipeline with randomly initialized parameters.
    ///
    /// Parameter learning is external to this crate; callers with trained
    /// weights assemble the modules directly and use [`Pipeline::new`].
    pub fn random(config: PipelineConfig, device: &Device) -> Result<Self> {
        config.validate()?;

        let embedding = InputProjection::random(config.input_dim, config.hidden_dim, device)?;
        let positional = PositionalEncoding::new(config.hidden_dim, config.max_len, device)?;

        let layers = (0..config.num_layers)
            .map(|_| {
                EncoderLayer::random(
                    config.hidden_dim,
                    config.num_heads,
                    config.ffn_dim,
                    config.layer_norm_eps,
                    config.dropout,
                    device,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let output = OutputProjection::random(config.hidden_dim, config.input_dim, device)?;

        Ok(Self {
            config,
            embedding,
            positional,
            layers,
            output,
            device: device.clone(),
        })
    }

    /// Assemble a pipeline from prebuilt modules.
    pub fn new(
        config: PipelineConfig,
        embedding: InputProjection,
        positional: PositionalEncoding,
        layers: Vec<EncoderLayer>,
        output: OutputProjection,
        device: Device,
    ) -> Result<Self> {
        config.validate()?;
        if layers.len() != config.num_layers {
            return Err(SomaError::InvalidConfig(format!(
                "expected {} layers, got {}",
                config.num_layers,
                layers.len()
            )));
        }
        Ok(Self {
            config,
            embedding,
            positional,
            layers,
            output,
            device,
        })
    }

    /// Deterministic forward pass (inference mode).
    ///
    /// # Arguments
    ///
    /// * `x` - Input batch [batch, seq_len, input_dim]
    /// * `mask` - Optional [batch, seq_len] indicator; nonzero positions
    ///   are excluded from attention
    ///
    /// Returns a tensor with exactly the input shape.
    pub fn forward(&self, x: &Tensor, mask: Option<&Tensor>) -> Result<Tensor> {
        self.forward_t(x, mask, false)
    }

    /// Forward pass with an explicit training-mode toggle.
    ///
    /// `train` enables dropout on the embedded input and inside each
    /// encoder layer; with it unset the pass is fully deterministic.
    pub fn forward_t(&self, x: &Tensor, mask: Option<&Tensor>, train: bool) -> Result<Tensor> {
        let (batch, seq_len, _) = x.dims3()?;

        let additive = match mask {
            Some(m) => {
                let (mask_batch, mask_len) = m.dims2()?;
                if mask_batch != batch || mask_len != seq_len {
                    return Err(SomaError::ShapeMismatch(format!(
                        "mask shape ({mask_batch}, {mask_len}) does not match \
                         batch ({batch}, {seq_len})"
                    )));
                }
                Some(padding_mask(m)?)
            }
            None => None,
        };

        let mut hidden = self.embedding.forward(x)?;
        hidden = self.positional.forward(&hidden)?;
        if train {
            hidden = candle_nn::ops::dropout(&hidden, self.config.dropout)?;
        }

        for layer in &self.layers {
            hidden = layer.forward_t(&hidden, additive.as_ref(), train)?;
        }

        self.output.forward(&hidden)
    }

    /// Get pipeline configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Get device.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Number of encoder layers.
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;

    fn small_config() -> PipelineConfig {
        PipelineConfig {
            input_dim: 32,
            hidden_dim: 64,
            num_layers: 2,
            num_heads: 8,
            ffn_dim: 128,
            max_len: 64,
            dropout: 0.1,
            layer_norm_eps: 1e-5,
        }
    }

    fn create_test_pipeline() -> Pipeline {
        Pipeline::random(small_config(), &Device::Cpu).unwrap()
    }

    #[test]
    fn forward_preserves_shape() {
        let pipeline = create_test_pipeline();

        let x = Tensor::randn(0.0f32, 1.0, &[2, 10, 32], &Device::Cpu).unwrap();
        let out = pipeline.forward(&x, None).unwrap();

        assert_eq!(out.dims(), x.dims());
    }

    #[test]
    fn forward_with_default_dims() {
        // Default-sized pipeline is large; scale the smoke test down to a
        // single short sequence.
        let config = PipelineConfig {
            num_layers: 1,
            max_len: 16,
            ..Default::default()
        };
        let pipeline = Pipeline::random(config, &Device::Cpu).unwrap();

        let x = Tensor::randn(0.0f32, 1.0, &[1, 4, 512], &Device::Cpu).unwrap();
        let out = pipeline.forward(&x, None).unwrap();

        assert_eq!(out.dims(), &[1, 4, 512]);
    }

    #[test]
    fn forward_rejects_wrong_input_width() {
        let pipeline = create_test_pipeline();

        let x = Tensor::randn(0.0f32, 1.0, &[2, 10, 16], &Device::Cpu).unwrap();
        assert!(matches!(
            pipeline.forward(&x, None),
            Err(SomaError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn forward_rejects_overlong_sequence() {
        let pipeline = create_test_pipeline();

        let x = Tensor::randn(0.0f32, 1.0, &[1, 65, 32], &Device::Cpu).unwrap();
        assert!(matches!(
            pipeline.forward(&x, None),
            Err(SomaError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn forward_rejects_mismatched_mask() {
        let pipeline = create_test_pipeline();

        let x = Tensor::randn(0.0f32, 1.0, &[2, 10, 32], &Device::Cpu).unwrap();
        let mask = Tensor::zeros((2, 8), DType::U8, &Device::Cpu).unwrap();

        assert!(matches!(
            pipeline.forward(&x, Some(&mask)),
            Err(SomaError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn inference_is_deterministic() {
        let pipeline = create_test_pipeline();

        let x = Tensor::randn(0.0f32, 1.0, &[1, 8, 32], &Device::Cpu).unwrap();
        let a: Vec<f32> = pipeline
            .forward(&x, None)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1()
            .unwrap();
        let b: Vec<f32> = pipeline
            .forward(&x, None)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1()
            .unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn masked_positions_do_not_leak() {
        // Changing the input at a masked position must leave unmasked
        // positions' output untouched.
        let pipeline = create_test_pipeline();
        let seq_len = 6usize;

        let x = Tensor::randn(0.0f32, 1.0, &[1, seq_len, 32], &Device::Cpu).unwrap();
        let mut indicator = vec![0u8; seq_len];
        indicator[seq_len - 1] = 1;
        let mask = Tensor::from_slice(&indicator, (1, seq_len), &Device::Cpu).unwrap();

        let base = pipeline.forward(&x, Some(&mask)).unwrap();

        // Perturb only the masked position.
        let noise = Tensor::randn(0.0f32, 10.0, &[1, 1, 32], &Device::Cpu).unwrap();
        let perturbed_last = (x.narrow(1, seq_len - 1, 1).unwrap() + noise).unwrap();
        let x2 = Tensor::cat(
            &[x.narrow(1, 0, seq_len - 1).unwrap(), perturbed_last],
            1,
        )
        .unwrap();

        let out = pipeline.forward(&x2, Some(&mask)).unwrap();

        let a: Vec<f32> = base
            .narrow(1, 0, seq_len - 1)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1()
            .unwrap();
        let b: Vec<f32> = out
            .narrow(1, 0, seq_len - 1)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1()
            .unwrap();

        for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
            assert!((x - y).abs() < 1e-4, "position {i}: {x} vs {y}");
        }
    }

    #[test]
    fn layer_count_mismatch_rejected() {
        let config = small_config();
        let device = Device::Cpu;

        let embedding =
            InputProjection::random(config.input_dim, config.hidden_dim, &device).unwrap();
        let positional =
            PositionalEncoding::new(config.hidden_dim, config.max_len, &device).unwrap();
        let output =
            OutputProjection::random(config.hidden_dim, config.input_dim, &device).unwrap();

        let result = Pipeline::new(config, embedding, positional, vec![], output, device);
        assert!(matches!(result, Err(SomaError::InvalidConfig(_))));
    }
}
