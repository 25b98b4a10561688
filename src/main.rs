use anyhow::Result;
use jsonrpc_stdio_server::ServerBuilder;
use ssh_mcp_server::{ConfigResolver, EnvResolver, McpServer};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    ssh_mcp_server::init_logging();

    if let Err(e) = run().await {
        error!("Fatal error in main(): {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    info!("Starting SSH MCP Server");

    // Parameters are re-read per call; this only surfaces misconfiguration early.
    if let Err(e) = EnvResolver::new().resolve() {
        warn!("{}", e.message());
    }

    // Create MCP server and register methods
    let io = McpServer::from_env().into_io_handler()?;

    // Start stdio server
    let server = ServerBuilder::new(io).build();

    info!("SSH MCP Server is running on stdio");

    server.await;

    info!("SSH MCP Server shutting down");
    Ok(())
}
