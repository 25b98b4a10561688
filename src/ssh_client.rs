use crate::config::{ServerConfig, SshConfig};
use crate::error::{Result, SshMcpError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ssh2::Session;
use std::io::{ErrorKind, Read};
use std::ops::Deref;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const READ_CHUNK: usize = 8192;
/// `LIBSSH2_ERROR_TIMEOUT`
const LIBSSH2_TIMEOUT: i32 = -9;

/// Outcome of one remote command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

pub struct SshClient;

impl SshClient {
    /// Opens a password-authenticated session. TCP connect, handshake and
    /// authentication must finish within `ready_timeout`.
    pub fn connect(config: &SshConfig, ready_timeout: Duration) -> Result<Session> {
        info!("Connecting to {}@{}:{}", config.username, config.host, config.port);
        let started = Instant::now();

        // Establish TCP connection
        let tcp = Self::open_tcp(config, ready_timeout, started)?;

        // Create SSH session
        let mut session = Session::new()
            .map_err(|e| SshMcpError::Connection(format!("Session creation failed: {}", e)))?;
        session.set_timeout(Self::remaining_ms(ready_timeout, started)?);
        session.set_tcp_stream(tcp);

        session
            .handshake()
            .map_err(|e| Self::map_ready_error(e, ready_timeout, started, "SSH handshake failed"))?;

        // Log host key for troubleshooting
        if let Some((host_key, _)) = session.host_key() {
            debug!("Host key fingerprint: SHA256:{}", Self::calculate_fingerprint(host_key));
        }

        // Authenticate (password only, no keyboard-interactive fallback)
        session.set_timeout(Self::remaining_ms(ready_timeout, started)?);
        Self::authenticate(&session, config, ready_timeout, started)?;

        // Readiness window is over; command execution is unbounded.
        session.set_timeout(0);

        info!("Successfully connected to {}@{}", config.username, config.host);
        Ok(session)
    }

    fn open_tcp(config: &SshConfig, ready_timeout: Duration, started: Instant) -> Result<TcpStream> {
        // DNS is not bounded by the readiness window; getaddrinfo cannot be interrupted.
        let addrs: Vec<SocketAddr> = (config.host.as_str(), config.port)
            .to_socket_addrs()
            .map_err(|e| {
                SshMcpError::Connection(format!("getaddrinfo failed for {}: {}", config.host, e))
            })?
            .collect();

        let mut last_error = None;
        for addr in addrs {
            let remaining = ready_timeout
                .checked_sub(started.elapsed())
                .filter(|d| !d.is_zero())
                .ok_or_else(|| Self::ready_timeout_error(ready_timeout))?;
            match TcpStream::connect_timeout(&addr, remaining) {
                Ok(tcp) => return Ok(tcp),
                Err(e) if e.kind() == ErrorKind::TimedOut => {
                    last_error = Some(Self::ready_timeout_error(ready_timeout));
                }
                Err(e) => {
                    debug!("TCP connect to {} failed: {}", addr, e);
                    last_error = Some(SshMcpError::Connection(format!(
                        "connect {} {}",
                        addr, e
                    )));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            SshMcpError::Connection(format!("No addresses found for {}", config.host))
        }))
    }

    fn authenticate(
        session: &Session,
        config: &SshConfig,
        ready_timeout: Duration,
        started: Instant,
    ) -> Result<()> {
        debug!("Attempting password authentication");
        session
            .userauth_password(&config.username, &config.password)
            .map_err(|e| {
                if Self::is_timeout(&e, ready_timeout, started) {
                    Self::ready_timeout_error(ready_timeout)
                } else {
                    SshMcpError::AuthenticationFailed(e.message().to_string())
                }
            })?;

        if !session.authenticated() {
            return Err(SshMcpError::AuthenticationFailed(
                "All configured authentication methods failed".to_string(),
            ));
        }
        Ok(())
    }

    fn remaining_ms(ready_timeout: Duration, started: Instant) -> Result<u32> {
        let remaining = ready_timeout
            .checked_sub(started.elapsed())
            .filter(|d| !d.is_zero())
            .ok_or_else(|| Self::ready_timeout_error(ready_timeout))?;
        Ok(u32::try_from(remaining.as_millis()).unwrap_or(u32::MAX).max(1))
    }

    fn map_ready_error(
        e: ssh2::Error,
        ready_timeout: Duration,
        started: Instant,
        context: &str,
    ) -> SshMcpError {
        if Self::is_timeout(&e, ready_timeout, started) {
            Self::ready_timeout_error(ready_timeout)
        } else {
            SshMcpError::Connection(format!("{}: {}", context, e.message()))
        }
    }

    fn is_timeout(e: &ssh2::Error, ready_timeout: Duration, started: Instant) -> bool {
        e.code() == ssh2::ErrorCode::Session(LIBSSH2_TIMEOUT) || started.elapsed() >= ready_timeout
    }

    fn ready_timeout_error(ready_timeout: Duration) -> SshMcpError {
        SshMcpError::Timeout(format!(
            "Timed out while waiting for handshake after {}ms",
            ready_timeout.as_millis()
        ))
    }

    pub fn calculate_fingerprint(host_key: &[u8]) -> String {
        use base64::{engine::general_purpose, Engine as _};
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(host_key);
        general_purpose::STANDARD_NO_PAD.encode(hasher.finalize())
    }

    /// Runs `command` without a PTY and buffers both streams until the
    /// channel closes. `max_output` caps each stream; excess bytes are
    /// drained and dropped.
    pub fn execute_command(
        session: &Session,
        command: &str,
        max_output: Option<usize>,
    ) -> Result<CommandResult> {
        debug!("Executing command: {}", command);

        let mut channel = session
            .channel_session()
            .map_err(|e| SshMcpError::Execution(format!("Channel creation failed: {}", e.message())))?;

        channel
            .exec(command)
            .map_err(|e| SshMcpError::Execution(format!("Command execution failed: {}", e.message())))?;

        // Poll both streams so a full stderr window never stalls stdout.
        session.set_blocking(false);
        let mut stdout = OutputBuffer::new(max_output);
        let mut stderr = OutputBuffer::new(max_output);
        let mut stderr_stream = channel.stderr();
        let mut buf = [0u8; READ_CHUNK];

        let read_result = loop {
            let mut progressed = false;

            match channel.read(&mut buf) {
                Ok(n) if n > 0 => {
                    stdout.push(&buf[..n]);
                    progressed = true;
                }
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                Err(e) => break Err(SshMcpError::Execution(format!("Failed to read stdout: {}", e))),
            }

            match stderr_stream.read(&mut buf) {
                Ok(n) if n > 0 => {
                    stderr.push(&buf[..n]);
                    progressed = true;
                }
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                Err(e) => break Err(SshMcpError::Execution(format!("Failed to read stderr: {}", e))),
            }

            if !progressed && channel.eof() {
                break Ok(());
            }
            if !progressed {
                std::thread::sleep(POLL_INTERVAL);
            }
        };
        session.set_blocking(true);
        read_result?;

        channel
            .wait_close()
            .map_err(|e| SshMcpError::Execution(format!("Failed to close channel: {}", e.message())))?;

        let exit_code = channel.exit_status().unwrap_or(0);
        let truncated = stdout.truncated || stderr.truncated;
        if truncated {
            warn!("Output of '{}' exceeded the configured cap and was truncated", command);
        }

        debug!("Command completed with exit code: {}", exit_code);
        Ok(CommandResult {
            exit_code,
            stdout: stdout.into_string(),
            stderr: stderr.into_string(),
            truncated,
        })
    }
}

/// Byte accumulator for one output stream.
#[derive(Debug, Default)]
pub(crate) struct OutputBuffer {
    bytes: Vec<u8>,
    limit: Option<usize>,
    pub(crate) truncated: bool,
}

impl OutputBuffer {
    pub(crate) fn new(limit: Option<usize>) -> Self {
        Self {
            bytes: Vec::new(),
            limit,
            truncated: false,
        }
    }

    pub(crate) fn push(&mut self, chunk: &[u8]) {
        let room = match self.limit {
            Some(limit) => limit.saturating_sub(self.bytes.len()),
            None => chunk.len(),
        };
        if chunk.len() > room {
            self.truncated = true;
        }
        self.bytes.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }

    pub(crate) fn into_string(self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Owns a session for the duration of one invocation and disconnects it
/// exactly once, whichever path the invocation takes.
pub struct SessionGuard {
    session: Session,
    closed: bool,
}

impl SessionGuard {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            closed: false,
        }
    }

    /// Sends a disconnect. Later calls, including the one from `Drop`, do nothing.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.session.disconnect(None, "closing", None) {
            debug!("Ignoring error while closing SSH session: {}", e);
        }
    }
}

impl Deref for SessionGuard {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.session
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.close();
    }
}

/// Runs one command on a freshly opened session.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn execute(&self, config: &SshConfig, command: &str) -> Result<CommandResult>;
}

/// `RemoteExecutor` backed by libssh2. Blocking work runs on tokio's
/// blocking pool.
#[derive(Debug, Clone)]
pub struct Ssh2Executor {
    ready_timeout: Duration,
    max_output_bytes: Option<usize>,
}

impl Ssh2Executor {
    pub fn new(server_config: &ServerConfig) -> Self {
        Self {
            ready_timeout: server_config.ready_timeout,
            max_output_bytes: server_config.max_output_bytes,
        }
    }
}

#[async_trait]
impl RemoteExecutor for Ssh2Executor {
    async fn execute(&self, config: &SshConfig, command: &str) -> Result<CommandResult> {
        let config = config.clone();
        let command = command.to_string();
        let ready_timeout = self.ready_timeout;
        let max_output = self.max_output_bytes;

        tokio::task::spawn_blocking(move || -> Result<CommandResult> {
            // A failed connect leaves nothing to close
            let mut guard = SessionGuard::new(SshClient::connect(&config, ready_timeout)?);

            let result = SshClient::execute_command(&guard, &command, max_output);

            guard.close();
            result
        })
        .await
        .map_err(|e| SshMcpError::Execution(format!("Task join error: {}", e)))?
    }
}
