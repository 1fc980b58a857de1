use anyhow::Context;
use bridge::bridge::DeviceBridge;
use clap::Parser;
use log::info;
use std::path::PathBuf;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::DeviceConfig;

mod bridge;
mod generator;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Simulated FieldScan rover")]
struct Args {
    /// Load a device config from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    port: Option<u16>,
    /// Seed for the telemetry and detection generator
    #[arg(long)]
    seed: Option<u64>,
    /// Listen on all interfaces instead of loopback
    #[arg(long, default_value_t = false)]
    public: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match args.config {
        Some(path) => DeviceConfig::load(path)?,
        None => DeviceConfig::default(),
    };
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(seed) = args.seed {
        config.generator.seed = seed;
    }
    config.public |= args.public;

    let bridge = DeviceBridge::new(&config);
    let address = config.bind_address();

    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating runtime for the device server")?;
    runtime.block_on(async move {
        let (bound, server) = warp::serve(bridge.routes())
            .try_bind_with_graceful_shutdown(address, async {
                if let Err(err) = signal::ctrl_c().await {
                    log::warn!("ctrl-c handler failed: {err}");
                }
            })
            .with_context(|| format!("binding device server on {address}"))?;
        info!("device simulator listening on http://{bound} (Ctrl+C to stop)");
        server.await;
        info!("device simulator stopped");
        Ok::<(), anyhow::Error>(())
    })
}
