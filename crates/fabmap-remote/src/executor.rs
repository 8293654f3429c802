// ── Remote executor ──
//
// Runs allow-listed commands against one device at a time. Every
// network wait is bounded: `connect_timeout` inside the transport,
// `command_timeout` around a whole exec, `prompt_timeout` per
// interactive state.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::auth::SessionMode;
use crate::command::RemoteCommand;
use crate::error::Error;
use crate::interactive::{PromptProfile, PromptScript, Transcript, run_script};
use crate::ssh::SshTransport;
use crate::transport::{CommandOutput, ExecOptions, Target, Transport};

/// Issues read-only commands through a [`Transport`].
#[derive(Clone)]
pub struct Executor {
    transport: Arc<dyn Transport>,
    options: ExecOptions,
}

impl Executor {
    /// Executor over SSH.
    pub fn ssh(options: ExecOptions) -> Self {
        Self::new(Arc::new(SshTransport::new()), options)
    }

    pub fn new(transport: Arc<dyn Transport>, options: ExecOptions) -> Self {
        Self { transport, options }
    }

    pub fn options(&self) -> &ExecOptions {
        &self.options
    }

    /// Run `command` in exec mode.
    ///
    /// A non-zero exit status is a `CommandError` carrying stderr. A
    /// command that outlives `command_timeout` leaves the session in an
    /// unknown state and is reported as `Unreachable`.
    pub async fn execute(
        &self,
        target: &Target,
        command: &RemoteCommand,
    ) -> Result<CommandOutput, Error> {
        debug!(host = %target.host, mode = %SessionMode::Exec, command = %command, "executing");

        let output = tokio::time::timeout(
            self.options.command_timeout,
            self.transport.exec(target, command, &self.options),
        )
        .await
        .map_err(|_| {
            Error::unreachable(
                &target.host,
                format!(
                    "`{}` gave no result within {}s",
                    command.command_line(),
                    self.options.command_timeout.as_secs()
                ),
            )
        })??;

        check_exit(target, command, output)
    }

    /// Run `command` through a scripted PTY session.
    ///
    /// The channel is closed on every exit path.
    pub async fn execute_interactive(
        &self,
        target: &Target,
        command: &RemoteCommand,
        profile: &PromptProfile,
    ) -> Result<Transcript, Error> {
        debug!(
            host = %target.host,
            mode = %SessionMode::Interactive,
            command = %command,
            "executing"
        );

        let mut channel = self.transport.open_shell(target, &self.options).await?;
        let script = PromptScript::new(
            profile.clone(),
            command.command_line(),
            target.credentials.auth.password().cloned(),
        );

        let result = run_script(
            channel.as_mut(),
            script,
            target,
            self.options.prompt_timeout,
        )
        .await;
        channel.close().await;

        if let Err(ref e) = result {
            warn!(host = %target.host, command = %command, error = %e, "interactive command failed");
        }
        result
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn check_exit(
    target: &Target,
    command: &RemoteCommand,
    output: CommandOutput,
) -> Result<CommandOutput, Error> {
    if output.success() {
        return Ok(output);
    }
    let detail = match output.stderr.trim() {
        "" => "command reported failure".to_owned(),
        stderr => stderr.to_owned(),
    };
    Err(Error::CommandError {
        host: target.host.clone(),
        command: command.command_line(),
        exit_status: output.exit_status,
        detail,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::auth::Credentials;
    use crate::transport::ShellChannel;

    struct Scripted {
        output: CommandOutput,
        delay: Duration,
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn exec(
            &self,
            _target: &Target,
            _command: &RemoteCommand,
            _options: &ExecOptions,
        ) -> Result<CommandOutput, Error> {
            tokio::time::sleep(self.delay).await;
            Ok(self.output.clone())
        }

        async fn open_shell(
            &self,
            target: &Target,
            _options: &ExecOptions,
        ) -> Result<Box<dyn ShellChannel>, Error> {
            Err(Error::unreachable(&target.host, "no shell"))
        }
    }

    fn target() -> Target {
        Target::new("10.0.0.5", Credentials::password("root", "pw".to_string().into()))
    }

    fn executor(output: CommandOutput, delay: Duration) -> Executor {
        Executor::new(Arc::new(Scripted { output, delay }), ExecOptions::default())
    }

    #[tokio::test]
    async fn returns_stdout_on_success() {
        let exec = executor(
            CommandOutput {
                stdout: "node07\n".into(),
                exit_status: Some(0),
                ..CommandOutput::default()
            },
            Duration::ZERO,
        );
        let out = exec.execute(&target(), &RemoteCommand::Hostname).await.unwrap();
        assert_eq!(out.stdout, "node07\n");
    }

    #[tokio::test]
    async fn nonzero_exit_is_command_error() {
        let exec = executor(
            CommandOutput {
                stderr: "nv: command not found\n".into(),
                exit_status: Some(127),
                ..CommandOutput::default()
            },
            Duration::ZERO,
        );
        let err = exec
            .execute(&target(), &RemoteCommand::OsRelease)
            .await
            .unwrap_err();
        match err {
            Error::CommandError {
                exit_status,
                detail,
                ..
            } => {
                assert_eq!(exit_status, Some(127));
                assert_eq!(detail, "nv: command not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_command_times_out() {
        let exec = executor(CommandOutput::default(), Duration::from_secs(600));
        let err = exec
            .execute(&target(), &RemoteCommand::Hostname)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unreachable { ref reason, .. } if reason.contains("hostname")));
        assert!(err.is_session_fatal());
    }

    #[tokio::test]
    async fn shell_open_failure_propagates() {
        let exec = executor(CommandOutput::default(), Duration::ZERO);
        let err = exec
            .execute_interactive(&target(), &RemoteCommand::ShowVersion, &PromptProfile::onyx())
            .await
            .unwrap_err();
        assert!(err.is_session_fatal());
    }
}
