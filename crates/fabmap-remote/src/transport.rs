// Transport seam between the executor and the wire.
//
// The executor only ever talks to a `Transport`: one-shot `exec` for
// command-capable devices, and a raw `ShellChannel` for interactive CLIs.
// `SshTransport` is the production implementation; tests supply fakes.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::auth::Credentials;
use crate::command::RemoteCommand;
use crate::error::Error;

/// Default SSH port.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// A device to open sessions against, with the credentials to use.
#[derive(Debug, Clone)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub credentials: Credentials,
}

impl Target {
    pub fn new(host: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SSH_PORT,
            credentials,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.credentials.username, self.host, self.port)
    }
}

/// Bounded waits applied to every network suspension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecOptions {
    /// TCP connect + SSH handshake + authentication.
    pub connect_timeout: Duration,
    /// Whole-command budget for non-interactive execution.
    pub command_timeout: Duration,
    /// Per-transition wait inside an interactive prompt script.
    pub prompt_timeout: Duration,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(30),
            prompt_timeout: Duration::from_secs(15),
        }
    }
}

/// Result of a non-interactive command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the server closed the channel without reporting one.
    pub exit_status: Option<u32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_status.is_none_or(|s| s == 0)
    }
}

/// Raw byte stream of an interactive PTY shell.
///
/// Exactly one command is in flight at a time; the prompt script decides
/// what to send next based on what has been received.
#[async_trait]
pub trait ShellChannel: Send {
    /// Write bytes to the remote shell.
    async fn send(&mut self, data: &[u8]) -> Result<(), Error>;

    /// Next chunk of output. `Ok(None)` means the remote side closed.
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, Error>;

    /// Close the channel and the session behind it.
    async fn close(&mut self);
}

/// A way of reaching devices.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Run a single command non-interactively and collect its output.
    async fn exec(
        &self,
        target: &Target,
        command: &RemoteCommand,
        options: &ExecOptions,
    ) -> Result<CommandOutput, Error>;

    /// Open an authenticated PTY shell.
    async fn open_shell(
        &self,
        target: &Target,
        options: &ExecOptions,
    ) -> Result<Box<dyn ShellChannel>, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_exit_status_counts_as_success() {
        let out = CommandOutput {
            stdout: "sw1\n".into(),
            ..CommandOutput::default()
        };
        assert!(out.success());

        let failed = CommandOutput {
            exit_status: Some(127),
            ..CommandOutput::default()
        };
        assert!(!failed.success());
    }

    #[test]
    fn target_display_omits_secrets() {
        let creds = Credentials::password("admin", "hunter2".to_string().into());
        let target = Target::new("10.0.0.1", creds).with_port(2222);
        assert_eq!(target.to_string(), "admin@10.0.0.1:2222");
    }
}
