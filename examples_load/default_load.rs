use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::error;

use log_sink_adapters::init::{init_tracing_with_config, LayerConfig};
use log_sink_adapters::noop_sink::NoopSink;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = LayerConfig {
        channel_buffer: 50_000,
        enable_stdout: false,
        ..LayerConfig::default()
    };
    let guard = init_tracing_with_config(Box::new(NoopSink::default()), config)?;

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(target: "load", iteration = i, "load test error");
    }

    let elapsed = start.elapsed();
    println!(
        "sent {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    sleep(Duration::from_millis(200)).await;
    guard.shutdown().await?;
    Ok(())
}
