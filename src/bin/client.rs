//! Demo client: drives the host lifecycle and a GAP parameter update.

use ble_host_rpc::ipc::handlers::{GapClient, HostClient};
use ble_host_rpc::ipc::RpcClient;
use ble_host_rpc::Config;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "ble-host-client", about = "Call the BLE host and GAP services")]
struct Args {
    /// JSON configuration file.
    #[arg(long, env = "BLE_HOST_CONFIG")]
    config: Option<PathBuf>,

    /// Server address, overrides the configuration file.
    #[arg(long, env = "BLE_HOST_LISTEN_ADDR")]
    connect: Option<String>,

    /// Parameter id passed to set_param.
    #[arg(long, default_value_t = 5, allow_negative_numbers = true)]
    param: i32,

    /// Value passed to set_param.
    #[arg(long, default_value_t = 99, allow_negative_numbers = true)]
    value: i32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(addr) = args.connect {
        config.server.listen_addr = addr;
    }
    ble_host_rpc::observability::init_tracing(&config.observability);

    let mut client = RpcClient::connect(config.server.listen_addr.as_str(), config.ipc.clone()).await?;

    HostClient::new(&mut client).init().await?;
    tracing::info!("host.init ok");

    let result = GapClient::new(&mut client).set_param(args.param, args.value).await?;
    tracing::info!(param = args.param, value = args.value, result, "gap.set_param ok");

    HostClient::new(&mut client).deinit().await?;
    tracing::info!("host.deinit ok");

    Ok(())
}
