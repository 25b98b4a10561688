use thiserror::Error;

#[derive(Error, Debug)]
pub enum SshMcpError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("SSH connection error: {0}")]
    Connection(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Command execution failed: {0}")]
    Execution(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("MCP protocol error: {0}")]
    McpProtocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SSH2 error: {0}")]
    Ssh2(#[from] ssh2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl SshMcpError {
    /// Message shown to tool callers. Carries no variant label so the
    /// adapter's own prefix is never doubled.
    pub fn message(&self) -> String {
        match self {
            Self::Configuration(msg)
            | Self::Connection(msg)
            | Self::AuthenticationFailed(msg)
            | Self::Timeout(msg)
            | Self::Execution(msg)
            | Self::Validation(msg)
            | Self::McpProtocol(msg) => msg.clone(),
            Self::Io(e) => e.to_string(),
            Self::Ssh2(e) => e.message().to_string(),
            Self::Json(e) => e.to_string(),
            Self::Other(e) => e.to_string(),
        }
    }

    /// True for failures raised before a session was open.
    pub fn is_connection_stage(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_)
                | Self::Connection(_)
                | Self::AuthenticationFailed(_)
                | Self::Timeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SshMcpError>;
