use std::sync::Arc;

use clap::Parser;

use sidelight_bridge::Bridge;
use sidelight_store::{AnnotationStore, FrameRegistry};
use sidelight_sync::{Discovery, FrameSync};
use sidelight_telemetry::{init_telemetry, TelemetryConfig};

#[derive(Parser, Debug)]
#[command(name = "sidelight", about = "Sidebar/frame annotation sync service")]
struct Args {
    /// Emit JSON log lines instead of human-readable output.
    #[arg(long)]
    json_logs: bool,

    /// Capacity of the frame discovery feed.
    #[arg(long, default_value_t = 64)]
    discovery_capacity: usize,

    /// Capacity of the upstream sidebar event broadcast.
    #[arg(long, default_value_t = 256)]
    event_capacity: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_telemetry(&TelemetryConfig {
        json: args.json_logs,
        ..TelemetryConfig::default()
    });

    tracing::info!("Starting sidelight");

    let store = Arc::new(AnnotationStore::new());
    let frames = Arc::new(FrameRegistry::new());
    let bridge = Arc::new(Bridge::new());
    let engine = FrameSync::new(
        Arc::clone(&store),
        Arc::clone(&frames),
        Arc::clone(&bridge),
        args.event_capacity,
    );

    let (discovery_tx, discovery) = Discovery::feed(args.discovery_capacity);
    let _pump = Arc::clone(&engine).connect(discovery);

    // The transport layer pushes a channel here for every frame it locates;
    // the feed stays open for the life of the process.
    let _discovery_tx = discovery_tx;

    tracing::info!("Sidelight ready, watching for frames");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    Ok(())
}
