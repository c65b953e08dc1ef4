//! Mona relay server
//!
//! Watches a contract for state-change events and pushes each one to every
//! connected WebSocket client.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::{Parser, ValueEnum};
use config::{ConfigLoader, ConfigOverrides};
use mona_core::Relay;
use server::{build_router, run_server};
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format of the log lines.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Mona - on-chain state relay
#[derive(Parser, Debug)]
#[command(name = "mona-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./mona-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:5000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Override only the listen port
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// JSON-RPC endpoint of the node, overrides `ledger.rpc_url`
    #[arg(long, env = "MONA_RPC_URL")]
    rpc_url: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing
    init_tracing(args.log_format);

    tracing::info!("Starting mona-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = ConfigLoader::new(
        &args.config,
        ConfigOverrides {
            listen: args.listen,
            port: args.port,
            rpc_url: args.rpc_url,
        },
    );
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;

    let listen_addr = loaded_config.server.listen;
    tracing::info!(
        "Configuration loaded from {:?} (event: {}, contract: {})",
        args.config,
        loaded_config.relay.ledger.schema.signature(),
        loaded_config.relay.ledger.contract_address
    );

    let relay = Relay::new(loaded_config.relay);

    // Start polling the external log
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = relay.spawn_poller(shutdown_rx).map_err(|e| {
        tracing::error!("Failed to start the ledger poller: {}", e);
        e
    })?;

    // Build the router
    let router = build_router(AppState::new(relay));

    // Run the server
    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    // Stop the poller
    let _ = shutdown_tx.send(true);
    if let Err(e) = poller.await {
        tracing::error!("Poller task failed: {}", e);
    }
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}
