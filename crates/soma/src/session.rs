//! High-level session facade.
//!
//! A [`Session`] bundles an immutable transformation pipeline with a
//! per-session context buffer. The two stay independent: `transform` never
//! reads the buffer, and buffered history only changes through `remember`.

use anyhow::Result;
use candle_core::{Device, Tensor};
use soma_core::context::{ContextBuffer, DEFAULT_CONTEXT_CAPACITY};
use soma_core::model::{Pipeline, PipelineConfig};
use tracing::{debug, trace};

/// Configuration for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Pipeline parameters.
    pub pipeline: PipelineConfig,
    /// Context window capacity.
    pub max_context_length: usize,
    /// Run forward passes with stochastic regularization enabled.
    pub training: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            max_context_length: DEFAULT_CONTEXT_CAPACITY,
            training: false,
        }
    }
}

/// Builder for creating a [`Session`].
pub struct SessionBuilder {
    config: SessionConfig,
    device: Device,
}

impl SessionBuilder {
    /// Create a new session builder.
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
            device: Device::Cpu,
        }
    }

    /// Set input (and output) vector width.
    pub fn input_dim(mut self, dim: usize) -> Self {
        self.config.pipeline.input_dim = dim;
        self
    }

    /// Set internal working width.
    pub fn hidden_dim(mut self, dim: usize) -> Self {
        self.config.pipeline.hidden_dim = dim;
        self
    }

    /// Set number of encoder layers.
    pub fn num_layers(mut self, n: usize) -> Self {
        self.config.pipeline.num_layers = n;
        self
    }

    /// Set context window capacity.
    pub fn max_context_length(mut self, n: usize) -> Self {
        self.config.max_context_length = n;
        self
    }

    /// Enable training-mode (stochastic) forward passes.
    pub fn training(mut self, training: bool) -> Self {
        self.config.training = training;
        self
    }

    /// Set the device for computation.
    pub fn device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Set pipeline configuration directly.
    pub fn pipeline_config(mut self, config: PipelineConfig) -> Self {
        self.config.pipeline = config;
        self
    }

    /// Build the session.
    pub fn build(self) -> Result<Session> {
        let pipeline = Pipeline::random(self.config.pipeline.clone(), &self.device)?;
        let buffer = ContextBuffer::new(self.config.max_context_length, self.device.clone());

        debug!(
            input_dim = self.config.pipeline.input_dim,
            hidden_dim = self.config.pipeline.hidden_dim,
            num_layers = self.config.pipeline.num_layers,
            max_context_length = self.config.max_context_length,
            "session created"
        );

        Ok(Session {
            config: self.config,
            pipeline,
            buffer,
        })
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A transformation pipeline paired with session-scoped context memory.
pub struct Session {
    config: SessionConfig,
    pipeline: Pipeline,
    buffer: ContextBuffer,
}

impl Session {
    /// Create a new session builder.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Get session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Get the underlying pipeline.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Transform a batch of sequences.
    ///
    /// Output shape equals input shape. `mask` is an optional
    /// `[batch, seq_len]` indicator of positions to exclude from
    /// attention. Deterministic unless the session was built with
    /// `training(true)`.
    pub fn transform(&self, x: &Tensor, mask: Option<&Tensor>) -> Result<Tensor> {
        let dims = x.dims();
        debug!(?dims, masked = mask.is_some(), "transforming batch");

        let out = self.pipeline.forward_t(x, mask, self.config.training)?;
        Ok(out)
    }

    /// Push a representation into the session's context window.
    ///
    /// Evicts the oldest entry when the window is full.
    pub fn remember(&mut self, representation: Tensor) {
        trace!(len = self.buffer.len() + 1, "context push");
        self.buffer.push(representation);
    }

    /// Stack the buffered history in insertion order.
    ///
    /// Returns an empty `(0,)` tensor for a fresh session.
    pub fn context(&self) -> Result<Tensor> {
        Ok(self.buffer.get_context_tensor()?)
    }

    /// Number of representations currently buffered.
    pub fn context_len(&self) -> usize {
        self.buffer.len()
    }

    /// Drop all buffered context.
    pub fn clear_context(&mut self) {
        debug!(dropped = self.buffer.len(), "context cleared");
        self.buffer.clear();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("context_len", &self.buffer.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_session() -> Session {
        Session::builder()
            .input_dim(32)
            .hidden_dim(64)
            .num_layers(2)
            .max_context_length(4)
            .build()
            .unwrap()
    }

    #[test]
    fn transform_preserves_shape() {
        let session = small_session();

        let x = Tensor::randn(0.0f32, 1.0, &[2, 6, 32], &Device::Cpu).unwrap();
        let out = session.transform(&x, None).unwrap();

        assert_eq!(out.dims(), x.dims());
    }

    #[test]
    fn remember_and_context_roundtrip() {
        let mut session = small_session();
        assert_eq!(session.context().unwrap().dims(), &[0]);

        for _ in 0..6 {
            session.remember(Tensor::zeros(64, candle_core::DType::F32, &Device::Cpu).unwrap());
        }

        // Capacity 4: only the last four survive.
        assert_eq!(session.context_len(), 4);
        assert_eq!(session.context().unwrap().dims(), &[4, 64]);
    }

    #[test]
    fn clear_context_resets_session_memory() {
        let mut session = small_session();
        session.remember(Tensor::zeros(64, candle_core::DType::F32, &Device::Cpu).unwrap());

        session.clear_context();
        assert_eq!(session.context_len(), 0);
    }

    #[test]
    fn builder_rejects_bad_dims() {
        let result = Session::builder().hidden_dim(100).build();
        assert!(result.is_err());
    }
}
