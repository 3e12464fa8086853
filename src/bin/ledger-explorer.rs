#![forbid(unsafe_code)]
//! Ledger explorer API server

use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use ledger_explorer::api::{run_api_server, Explorer};
use ledger_explorer::cache::CachedLedger;
use ledger_explorer::config::{load_config, DEFAULT_CONFIG_PATH};
use ledger_explorer::ledger::{LedgerClient, RpcLedgerClient};
use ledger_explorer::sidecar::SidecarClient;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Port to listen on (overrides config and PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Node WebSocket endpoint (overrides config and SAS_SUBSTRATE_URL)
    #[arg(long)]
    endpoint: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = load_config(&cli.config)?;
    if let Some(endpoint) = cli.endpoint {
        config.ledger.endpoint = endpoint;
        config.validate()?;
    }

    let rpc: Arc<dyn LedgerClient> = Arc::new(RpcLedgerClient::new(
        config.ledger.endpoint.clone(),
        config.ledger.runtime.clone(),
    ));
    let client: Arc<dyn LedgerClient> = if config.cache.block_capacity > 0 {
        Arc::new(CachedLedger::new(rpc, config.cache.block_capacity))
    } else {
        rpc
    };

    let mut explorer = Explorer::new(client, &config.scan);
    if let Some(url) = &config.api.sidecar_url {
        explorer = explorer.with_sidecar(SidecarClient::new(url.clone())?);
    }

    tracing::info!(
        endpoint = %config.ledger.endpoint,
        cache_capacity = config.cache.block_capacity,
        sidecar = config.api.sidecar_url.as_deref().unwrap_or("disabled"),
        "Starting ledger explorer"
    );

    run_api_server(Arc::new(explorer), cli.port.or(Some(config.api.port))).await
}
