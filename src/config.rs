use crate::error::{Result, SshMcpError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(15);

/// Process-wide settings that do not vary per invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub ready_timeout: Duration,
    pub max_output_bytes: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ready_timeout: std::env::var("SSH_READY_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|ms: &u64| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_READY_TIMEOUT),
            max_output_bytes: std::env::var("SSH_MAX_OUTPUT_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|bytes: &usize| *bytes > 0),
        }
    }
}

/// Parameters for a single password-authenticated connection.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for SshConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Produces connection parameters for one tool invocation.
pub trait ConfigResolver: Send + Sync {
    fn resolve(&self) -> Result<SshConfig>;
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resolves connection parameters from `SSH_*` environment variables.
pub struct EnvResolver {
    lookup: EnvLookup,
}

impl EnvResolver {
    pub fn new() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            lookup: Box::new(lookup),
        }
    }

    fn var(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.is_empty())
    }
}

impl Default for EnvResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigResolver for EnvResolver {
    fn resolve(&self) -> Result<SshConfig> {
        let host = self.var("SSH_HOST");
        let username = self.var("SSH_USERNAME");
        let password = self.var("SSH_PASSWORD");

        let missing: Vec<&str> = [
            ("SSH_HOST", host.is_none()),
            ("SSH_USERNAME", username.is_none()),
            ("SSH_PASSWORD", password.is_none()),
        ]
        .into_iter()
        .filter(|(_, absent)| *absent)
        .map(|(name, _)| name)
        .collect();

        let (Some(host), Some(username), Some(password)) = (host, username, password) else {
            return Err(SshMcpError::Configuration(format!(
                "Missing required environment variables: {}. Configure them in your MCP server config.",
                missing.join(", ")
            )));
        };

        let port = match self.var("SSH_PORT") {
            Some(raw) => parse_port(raw.trim()).ok_or_else(|| {
                SshMcpError::Configuration(format!(
                    "SSH_PORT must be an integer between 1 and 65535, got \"{}\"",
                    raw
                ))
            })?,
            None => DEFAULT_SSH_PORT,
        };

        Ok(SshConfig {
            host,
            port,
            username,
            password,
        })
    }
}

fn parse_port(raw: &str) -> Option<u16> {
    raw.parse::<u16>().ok().filter(|port| *port > 0)
}

/// Structured configuration injected by a hosting platform.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostedConfig {
    #[serde(alias = "sshhost")]
    pub ssh_host: String,
    #[serde(alias = "sshport", default = "default_hosted_port")]
    pub ssh_port: i64,
    #[serde(alias = "sshusername")]
    pub ssh_username: String,
    #[serde(alias = "sshpassword")]
    pub ssh_password: String,
}

fn default_hosted_port() -> i64 {
    i64::from(DEFAULT_SSH_PORT)
}

impl HostedConfig {
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| SshMcpError::Configuration(e.to_string()))
    }

    pub fn validate(&self) -> Result<SshConfig> {
        if self.ssh_port <= 0 {
            return Err(SshMcpError::Configuration(
                "sshPort: Number must be greater than 0".to_string(),
            ));
        }
        let port = u16::try_from(self.ssh_port).map_err(|_| {
            SshMcpError::Configuration(format!(
                "sshPort: Number must be less than or equal to {}",
                u16::MAX
            ))
        })?;

        Ok(SshConfig {
            host: self.ssh_host.clone(),
            port,
            username: self.ssh_username.clone(),
            password: self.ssh_password.clone(),
        })
    }
}

/// Reads a hosted configuration file. The format follows the extension.
pub fn load_hosted_config(path: &Path) -> Result<HostedConfig> {
    ::config::Config::builder()
        .add_source(::config::File::from(path))
        .build()
        .and_then(|settings| settings.try_deserialize::<HostedConfig>())
        .map_err(|e| SshMcpError::Configuration(format!("{}: {}", path.display(), e)))
}

impl fmt::Debug for HostedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostedConfig")
            .field("ssh_host", &self.ssh_host)
            .field("ssh_port", &self.ssh_port)
            .field("ssh_username", &self.ssh_username)
            .field("ssh_password", &"<redacted>")
            .finish()
    }
}

/// Serves a configuration that was validated up front.
#[derive(Debug, Clone)]
pub struct StaticResolver {
    config: SshConfig,
}

impl StaticResolver {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }
}

impl ConfigResolver for StaticResolver {
    fn resolve(&self) -> Result<SshConfig> {
        Ok(self.config.clone())
    }
}
