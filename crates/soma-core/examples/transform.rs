//! Sequence transformation example.
//!
//! Builds a small pipeline, runs a batch through it with and without a
//! padding mask, and fills a context buffer past capacity.
//!
//! Run with:
//! ```bash
//! cargo run -p soma-core --example transform
//! ```

use candle_core::{Device, Tensor};
use soma_core::context::ContextBuffer;
use soma_core::model::{Pipeline, PipelineConfig};

fn main() -> anyhow::Result<()> {
    let device = Device::Cpu;

    let config = PipelineConfig {
        input_dim: 64,
        hidden_dim: 128,
        num_layers: 2,
        max_len: 256,
        ffn_dim: 256,
        ..Default::default()
    };

    println!("Sequence Transformation Example");
    println!("===============================\n");
    println!(
        "Pipeline: {} layers, {} hidden, {} heads",
        config.num_layers, config.hidden_dim, config.num_heads
    );

    let pipeline = Pipeline::random(config, &device)?;

    // Plain forward pass.
    let x = Tensor::randn(0.0f32, 1.0, &[2, 10, 64], &device)?;
    let out = pipeline.forward(&x, None)?;
    println!("\nforward: {:?} -> {:?}", x.dims(), out.dims());

    // Forward pass with the trailing positions masked out.
    let indicator: Vec<u8> = (0..10).map(|i| u8::from(i >= 7)).collect();
    let mask = Tensor::from_slice(&indicator, (1, 10), &device)?
        .broadcast_as((2, 10))?
        .contiguous()?;
    let masked = pipeline.forward(&x, Some(&mask))?;
    println!("masked forward: {:?} -> {:?}", x.dims(), masked.dims());

    // Session memory: push past capacity and read back the window.
    let mut buffer = ContextBuffer::new(4, device.clone());
    for step in 0..6 {
        let representation = Tensor::randn(0.0f32, 1.0, &[128], &device)?;
        buffer.push(representation);
        println!("pushed step {step}, buffer holds {}", buffer.len());
    }

    let context = buffer.get_context_tensor()?;
    println!("\ncontext tensor: {:?} (last {} steps)", context.dims(), buffer.len());

    Ok(())
}
