//! Session example.
//!
//! Runs a long-lived session: transforms a stream of batches and keeps a
//! rolling window of per-step summary representations.
//!
//! Run with:
//! ```bash
//! cargo run -p soma --example session
//! ```

use candle_core::{Device, Tensor};
use soma::prelude::*;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut session = Session::builder()
        .input_dim(64)
        .hidden_dim(128)
        .num_layers(2)
        .max_context_length(8)
        .build()?;

    println!("Session Example");
    println!("===============\n");

    let device = Device::Cpu;
    for step in 0..12 {
        let batch = Tensor::randn(0.0f32, 1.0, &[1, 16, 64], &device)?;
        let output = session.transform(&batch, None)?;

        // Keep the final position's hidden-width view as the step summary.
        let summary = output.narrow(1, 15, 1)?.flatten_all()?;
        session.remember(summary);

        println!(
            "step {step:2}: output {:?}, context {} entries",
            output.dims(),
            session.context_len()
        );
    }

    let history = session.context()?;
    println!("\nrolling context window: {:?}", history.dims());

    Ok(())
}
