//! Hosted entry point: serves the same tools with a structured config
//! (`sshHost`, `sshPort`, `sshUsername`, `sshPassword`) supplied by the
//! hosting platform as a JSON, TOML or YAML file.

use anyhow::{Context, Result};
use jsonrpc_stdio_server::ServerBuilder;
use ssh_mcp_server::McpServer;
use std::path::PathBuf;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    ssh_mcp_server::init_logging();

    if let Err(e) = run().await {
        error!("Fatal error in main(): {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("SSH_MCP_CONFIG").map(PathBuf::from))
        .context("usage: ssh-mcp-hosted <config-file> (or set SSH_MCP_CONFIG)")?;

    info!("Loading hosted configuration from {}", path.display());
    let hosted = ssh_mcp_server::config::load_hosted_config(&path)?;

    // Invalid config stops here
    let server = McpServer::from_hosted_config(hosted)?;

    let io = server.into_io_handler()?;
    info!("SSH MCP Server (hosted) is running on stdio");
    ServerBuilder::new(io).build().await;

    info!("SSH MCP Server shutting down");
    Ok(())
}
