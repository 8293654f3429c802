// fabmap-remote: read-only command execution against fabric switches and nodes
//
// Two delivery modes share one seam: `exec` for devices with a normal
// shell, and a scripted PTY exchange for CLIs that only speak
// prompt-and-reply. Only commands in the `RemoteCommand` allow-list can
// be sent.

pub mod auth;
pub mod command;
pub mod error;
pub mod executor;
pub mod interactive;
pub mod ssh;
pub mod transport;

pub use auth::{AuthMethod, AuthStrategy, Credentials, SessionMode};
pub use command::{BridgeDomain, CommandKind, InterfaceName, RemoteCommand};
pub use error::{Error, FailureKind};
pub use executor::Executor;
pub use interactive::{PromptProfile, PromptScript, SessionState, Transcript, run_script};
pub use ssh::SshTransport;
pub use transport::{CommandOutput, DEFAULT_SSH_PORT, ExecOptions, ShellChannel, Target, Transport};
