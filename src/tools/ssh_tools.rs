use super::ToolResponse;
use crate::config::ConfigResolver;
use crate::error::{Result, SshMcpError};
use crate::ssh_client::{CommandResult, RemoteExecutor};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

pub const PROBE_COMMAND: &str = "hostname";
pub const CONNECTION_FAILED_PREFIX: &str = "SSH connection failed: ";
pub const COMMAND_FAILED_PREFIX: &str = "SSH command failed: ";

#[derive(Debug, Deserialize)]
pub struct RunParams {
    pub command: String,
}

impl RunParams {
    /// Rejects arguments that do not match the `ssh_run` input schema.
    pub fn parse(arguments: Value) -> Result<Self> {
        let params: RunParams = serde_json::from_value(arguments)
            .map_err(|e| SshMcpError::Validation(format!("Invalid arguments for ssh_run: {}", e)))?;
        if params.command.is_empty() {
            return Err(SshMcpError::Validation(
                "command: String must contain at least 1 character(s)".to_string(),
            ));
        }
        Ok(params)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProbeReport<'a> {
    exit_code: i32,
    stdout: &'a str,
    stderr: &'a str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    truncated: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunReport<'a> {
    command: &'a str,
    exit_code: i32,
    stdout: &'a str,
    stderr: &'a str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    truncated: bool,
}

async fn resolve_and_execute(
    resolver: &dyn ConfigResolver,
    executor: &dyn RemoteExecutor,
    command: &str,
) -> Result<CommandResult> {
    let config = resolver.resolve()?;
    executor.execute(&config, command).await
}

fn failure(prefix: &str, err: &SshMcpError) -> ToolResponse {
    ToolResponse::error(format!("{}{}", prefix, err.message()))
}

/// Runs the fixed probe command and reports the remote hostname.
pub async fn ssh_test_connection(
    resolver: &dyn ConfigResolver,
    executor: &dyn RemoteExecutor,
) -> ToolResponse {
    let outcome = resolve_and_execute(resolver, executor, PROBE_COMMAND)
        .await
        .and_then(|result| {
            let report = ProbeReport {
                exit_code: result.exit_code,
                stdout: result.stdout.trim(),
                stderr: result.stderr.trim(),
                truncated: result.truncated,
            };
            Ok(serde_json::to_string_pretty(&report)?)
        });

    match outcome {
        Ok(text) => {
            info!("SSH connection test succeeded");
            ToolResponse::text(text)
        }
        Err(e) => {
            error!("SSH connection test failed: {}", e);
            failure(CONNECTION_FAILED_PREFIX, &e)
        }
    }
}

/// Runs a caller-supplied command. A non-zero remote exit code is reported,
/// not treated as a tool error.
pub async fn ssh_run(
    params: RunParams,
    resolver: &dyn ConfigResolver,
    executor: &dyn RemoteExecutor,
) -> ToolResponse {
    let outcome = resolve_and_execute(resolver, executor, &params.command)
        .await
        .and_then(|result| {
            let report = RunReport {
                command: &params.command,
                exit_code: result.exit_code,
                stdout: result.stdout.trim(),
                stderr: result.stderr.trim(),
                truncated: result.truncated,
            };
            Ok(serde_json::to_string_pretty(&report)?)
        });

    match outcome {
        Ok(text) => {
            info!("Remote command completed");
            ToolResponse::text(text)
        }
        Err(e) => {
            let stage = if e.is_connection_stage() { "connect" } else { "execute" };
            error!(stage, "Remote command failed: {}", e);
            failure(COMMAND_FAILED_PREFIX, &e)
        }
    }
}
