//! BLE host RPC server - main entry point.
//!
//! Starts the RPC server with both services:
//! - host: BLE stack lifecycle (init/start/deinit)
//! - gap: parameter updates (set_param)

use ble_host_rpc::ipc::handlers::{GapService, HostService, LoggingGapHandler, LoggingHostHandler};
use ble_host_rpc::ipc::RpcServer;
use ble_host_rpc::Config;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "ble-host-server", about = "Serve the BLE host and GAP services over TCP")]
struct Args {
    /// JSON configuration file.
    #[arg(long, env = "BLE_HOST_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address, overrides the configuration file.
    #[arg(long, env = "BLE_HOST_LISTEN_ADDR")]
    listen: Option<String>,

    /// Emit JSON logs.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(listen) = args.listen {
        config.server.listen_addr = listen;
    }
    config.observability.json_logs |= args.log_json;
    config.validate()?;

    // Initialize observability
    ble_host_rpc::observability::init_tracing(&config.observability);

    let mut server = RpcServer::new(config.server.listen_addr.clone(), config.ipc.clone());
    server.add_service(Arc::new(HostService::new(LoggingHostHandler)));
    server.add_service(Arc::new(GapService::new(LoggingGapHandler)));

    tracing::info!(addr = %config.server.listen_addr, "Starting BLE host service");
    tracing::info!("  ✓ host: init, start, deinit");
    tracing::info!("  ✓ gap: set_param");

    tokio::select! {
        result = server.serve() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupt received");
            server.shutdown();
        }
    }

    Ok(())
}
