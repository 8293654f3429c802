// SSH transport built on `russh`.
//
// One TCP connection per session: connect, authenticate, open a single
// channel, run, disconnect. Nothing is pooled or cached between calls,
// so every session carries exactly the credentials it was given.

use std::sync::Arc;

use async_trait::async_trait;
use russh::client::{self, Handle, Msg};
use russh::{Channel, ChannelMsg, Disconnect};
use russh_keys::key;
use secrecy::ExposeSecret;
use tracing::{debug, trace, warn};

use crate::auth::AuthMethod;
use crate::command::RemoteCommand;
use crate::error::Error;
use crate::transport::{CommandOutput, ExecOptions, ShellChannel, Target, Transport};

/// PTY geometry for interactive shells. Wide enough that tabular CLI
/// output is never wrapped, tall enough to keep pagers quiet.
const PTY_COLUMNS: u32 = 512;
const PTY_ROWS: u32 = 1000;
const PTY_TERM: &str = "vt100";

// ── Host key policy ─────────────────────────────────────────────────

/// Accepts any server host key.
///
/// Discovery runs inside a closed management network against devices
/// whose keys are not enrolled anywhere; an interactive "unknown host"
/// prompt would stall the run, so the decision is made up front.
struct AcceptAnyHostKey {
    host: String,
}

#[async_trait]
impl client::Handler for AcceptAnyHostKey {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &key::PublicKey,
    ) -> Result<bool, Self::Error> {
        trace!(
            host = %self.host,
            key_type = server_public_key.name(),
            "accepting server host key"
        );
        Ok(true)
    }
}

// ── Transport ───────────────────────────────────────────────────────

/// Production [`Transport`] over SSH.
#[derive(Debug, Clone, Default)]
pub struct SshTransport {
    _private: (),
}

impl SshTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect and authenticate, bounded by `connect_timeout`.
    async fn connect(
        &self,
        target: &Target,
        options: &ExecOptions,
    ) -> Result<Handle<AcceptAnyHostKey>, Error> {
        let config = Arc::new(client::Config {
            inactivity_timeout: Some(options.command_timeout),
            ..client::Config::default()
        });
        let handler = AcceptAnyHostKey {
            host: target.host.clone(),
        };

        debug!(target = %target, "opening SSH session");
        let connect = client::connect(config, (target.host.as_str(), target.port), handler);
        let mut handle = match tokio::time::timeout(options.connect_timeout, connect).await {
            Err(_) => {
                return Err(Error::unreachable(
                    &target.host,
                    format!(
                        "connect timed out after {}s",
                        options.connect_timeout.as_secs()
                    ),
                ));
            }
            Ok(Err(e)) => return Err(Error::unreachable(&target.host, e)),
            Ok(Ok(handle)) => handle,
        };

        let authenticated = tokio::time::timeout(
            options.connect_timeout,
            authenticate(&mut handle, target),
        )
        .await
        .map_err(|_| Error::unreachable(&target.host, "authentication timed out"))??;

        if !authenticated {
            close_session(&handle).await;
            return Err(Error::AuthFailed {
                host: target.host.clone(),
                username: target.credentials.username.clone(),
                reason: "credentials rejected by server".into(),
            });
        }

        Ok(handle)
    }
}

async fn authenticate(
    handle: &mut Handle<AcceptAnyHostKey>,
    target: &Target,
) -> Result<bool, Error> {
    let username = target.credentials.username.clone();
    let auth_failed = |reason: String| Error::AuthFailed {
        host: target.host.clone(),
        username: target.credentials.username.clone(),
        reason,
    };

    match &target.credentials.auth {
        AuthMethod::Password(password) => handle
            .authenticate_password(username, password.expose_secret())
            .await
            .map_err(|e| Error::unreachable(&target.host, e)),
        AuthMethod::KeyFile { path, passphrase } => {
            let key = russh_keys::load_secret_key(
                path,
                passphrase.as_ref().map(|p| p.expose_secret()),
            )
            .map_err(|e| auth_failed(format!("cannot load key {}: {e}", path.display())))?;
            handle
                .authenticate_publickey(username, Arc::new(key))
                .await
                .map_err(|e| Error::unreachable(&target.host, e))
        }
    }
}

async fn close_session(handle: &Handle<AcceptAnyHostKey>) {
    if let Err(e) = handle
        .disconnect(Disconnect::ByApplication, "", "English")
        .await
    {
        trace!(error = %e, "disconnect failed (session already gone)");
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn exec(
        &self,
        target: &Target,
        command: &RemoteCommand,
        options: &ExecOptions,
    ) -> Result<CommandOutput, Error> {
        let handle = self.connect(target, options).await?;
        let result = run_exec(&handle, target, command).await;
        close_session(&handle).await;
        result
    }

    async fn open_shell(
        &self,
        target: &Target,
        options: &ExecOptions,
    ) -> Result<Box<dyn ShellChannel>, Error> {
        let handle = self.connect(target, options).await?;
        let session_err = |e: russh::Error| Error::unreachable(&target.host, e);

        let channel = match handle.channel_open_session().await {
            Ok(channel) => channel,
            Err(e) => {
                close_session(&handle).await;
                return Err(session_err(e));
            }
        };
        let setup = async {
            channel
                .request_pty(true, PTY_TERM, PTY_COLUMNS, PTY_ROWS, 0, 0, &[])
                .await?;
            channel.request_shell(true).await
        };
        if let Err(e) = setup.await {
            close_session(&handle).await;
            return Err(session_err(e));
        }

        Ok(Box::new(SshShell {
            host: target.host.clone(),
            handle,
            channel,
            closed: false,
        }))
    }
}

async fn run_exec(
    handle: &Handle<AcceptAnyHostKey>,
    target: &Target,
    command: &RemoteCommand,
) -> Result<CommandOutput, Error> {
    let session_err = |e: russh::Error| Error::unreachable(&target.host, e);
    let mut channel = handle.channel_open_session().await.map_err(session_err)?;
    let line = command.command_line();
    trace!(host = %target.host, command = %line, "exec");
    channel.exec(true, line.as_bytes()).await.map_err(session_err)?;

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut exit_status = None;

    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
            ChannelMsg::ExtendedData { ref data, .. } => stderr.extend_from_slice(data),
            ChannelMsg::ExitStatus { exit_status: code } => exit_status = Some(code),
            ChannelMsg::Close => break,
            _ => {}
        }
    }

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        exit_status,
    })
}

// ── Interactive shell ───────────────────────────────────────────────

struct SshShell {
    host: String,
    handle: Handle<AcceptAnyHostKey>,
    channel: Channel<Msg>,
    closed: bool,
}

#[async_trait]
impl ShellChannel for SshShell {
    async fn send(&mut self, data: &[u8]) -> Result<(), Error> {
        self.channel
            .data(data)
            .await
            .map_err(|e| Error::unreachable(&self.host, e))
    }

    async fn recv(&mut self) -> Result<Option<Vec<u8>>, Error> {
        loop {
            match self.channel.wait().await {
                Some(ChannelMsg::Data { ref data } | ChannelMsg::ExtendedData { ref data, .. }) => {
                    return Ok(Some(data.to_vec()));
                }
                Some(ChannelMsg::Eof | ChannelMsg::Close) | None => return Ok(None),
                Some(_) => {}
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.channel.eof().await {
            trace!(host = %self.host, error = %e, "eof on closed channel");
        }
        if let Err(e) = self.channel.close().await {
            trace!(host = %self.host, error = %e, "close on closed channel");
        }
        close_session(&self.handle).await;
    }
}

impl Drop for SshShell {
    fn drop(&mut self) {
        if !self.closed {
            // Dropping the handle tears down the connection task; this only
            // fires when the owning future was cancelled mid-session.
            warn!(host = %self.host, "interactive session dropped without close");
        }
    }
}
