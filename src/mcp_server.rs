use crate::config::{ConfigResolver, EnvResolver, HostedConfig, ServerConfig, StaticResolver};
use crate::error::{Result, SshMcpError};
use crate::ssh_client::{RemoteExecutor, Ssh2Executor};
use crate::tools::{self, RunParams, ToolResponse};
use jsonrpc_core::{IoHandler, Params, Value};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

pub const SERVER_NAME: &str = "ssh-mcp-server";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub struct McpServer {
    resolver: Arc<dyn ConfigResolver>,
    executor: Arc<dyn RemoteExecutor>,
}

impl McpServer {
    /// Local mode: connection parameters come from `SSH_*` variables,
    /// re-read on every invocation.
    pub fn from_env() -> Self {
        let config = ServerConfig::default();
        Self::new(
            Arc::new(EnvResolver::new()),
            Arc::new(Ssh2Executor::new(&config)),
        )
    }

    /// Hosted mode: the platform injects a structured config which must
    /// validate before the server exists.
    pub fn from_hosted_config(hosted: HostedConfig) -> Result<Self> {
        let ssh_config = hosted.validate()?;
        let config = ServerConfig::default();
        Ok(Self::new(
            Arc::new(StaticResolver::new(ssh_config)),
            Arc::new(Ssh2Executor::new(&config)),
        ))
    }

    pub fn new(resolver: Arc<dyn ConfigResolver>, executor: Arc<dyn RemoteExecutor>) -> Self {
        Self { resolver, executor }
    }

    pub fn register_methods(&self, io: &mut IoHandler) -> Result<()> {
        let server_info = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "serverInfo": {
                "name": SERVER_NAME,
                "version": SERVER_VERSION
            },
            "capabilities": {
                "tools": {}
            }
        });

        io.add_sync_method("initialize", move |_: Params| Ok(server_info.clone()));

        io.add_notification("notifications/initialized", |_: Params| {
            debug!("Client finished initialization");
        });

        io.add_sync_method("ping", |_: Params| Ok(json!({})));

        io.add_sync_method("tools/list", |_: Params| {
            Ok(json!({
                "tools": tools::get_tool_definitions()
            }))
        });

        let resolver = self.resolver.clone();
        let executor = self.executor.clone();

        io.add_method("tools/call", move |params: Params| {
            let resolver = resolver.clone();
            let executor = executor.clone();
            let invocation = Uuid::new_v4();

            Box::pin(
                async move {
                    let params: ToolCallParams = params.parse()?;
                    info!("Tool call: {}", params.name);

                    let response = call_tool(params, resolver.as_ref(), executor.as_ref())
                        .await
                        .map_err(|e| {
                            warn!("Rejected tool call: {}", e);
                            jsonrpc_core::Error::invalid_params(e.message())
                        })?;

                    serde_json::to_value(response).map_err(|_| jsonrpc_core::Error::internal_error())
                }
                .instrument(tracing::info_span!("tool_call", %invocation)),
            )
        });

        Ok(())
    }

    /// Builds a handler with every MCP method registered.
    pub fn into_io_handler(self) -> Result<IoHandler> {
        let mut io = IoHandler::new();
        self.register_methods(&mut io)?;
        Ok(io)
    }
}

/// Dispatches a validated `tools/call`. Only protocol-level problems
/// (unknown tool, arguments violating the input schema) are `Err`; every
/// SSH failure is folded into an error-flagged `ToolResponse`.
pub async fn call_tool(
    params: ToolCallParams,
    resolver: &dyn ConfigResolver,
    executor: &dyn RemoteExecutor,
) -> Result<ToolResponse> {
    match params.name.as_str() {
        tools::TEST_CONNECTION_TOOL => Ok(tools::ssh_test_connection(resolver, executor).await),
        tools::RUN_TOOL => {
            let run = RunParams::parse(params.arguments)?;
            Ok(tools::ssh_run(run, resolver, executor).await)
        }
        _ => Err(SshMcpError::McpProtocol(format!("Unknown tool: {}", params.name))),
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default = "empty_arguments")]
    pub arguments: Value,
}

fn empty_arguments() -> Value {
    json!({})
}
