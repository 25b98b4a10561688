pub mod config;
pub mod error;
pub mod mcp_server;
pub mod ssh_client;
pub mod tools;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use config::{ConfigResolver, EnvResolver, HostedConfig, ServerConfig, SshConfig};
pub use error::{Result, SshMcpError};
pub use mcp_server::McpServer;
pub use ssh_client::{CommandResult, RemoteExecutor, Ssh2Executor};
pub use tools::ToolResponse;

/// Installs the JSON log subscriber. Logs go to stderr; stdout carries
/// protocol frames only.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();
}
