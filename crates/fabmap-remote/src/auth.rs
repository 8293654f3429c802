use std::fmt;
use std::path::PathBuf;

use secrecy::SecretString;

/// Which authentication strategy a set of credentials uses.
///
/// Marker enum (no data) -- the actual secret material lives in [`AuthMethod`].
/// Useful for logging the auth flow without carrying secrets around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    /// SSH password authentication.
    Password,
    /// SSH public-key authentication from a private key file.
    PublicKey,
}

/// Secret material for one SSH login.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// Password auth. Also answers the CLI-level `Password:` prompt that
    /// some switch shells print after the transport handshake.
    Password(SecretString),

    /// Private key on disk, optionally passphrase-protected.
    KeyFile {
        path: PathBuf,
        passphrase: Option<SecretString>,
    },
}

impl AuthMethod {
    pub fn strategy(&self) -> AuthStrategy {
        match self {
            Self::Password(_) => AuthStrategy::Password,
            Self::KeyFile { .. } => AuthStrategy::PublicKey,
        }
    }

    /// The password, if this is password auth.
    pub fn password(&self) -> Option<&SecretString> {
        match self {
            Self::Password(p) => Some(p),
            Self::KeyFile { .. } => None,
        }
    }
}

/// Credentials for one device role.
///
/// Supplied by the caller for every session; this crate never generates,
/// prompts for, or caches credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub auth: AuthMethod,
}

impl Credentials {
    pub fn password(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            auth: AuthMethod::Password(password),
        }
    }

    pub fn key_file(
        username: impl Into<String>,
        path: impl Into<PathBuf>,
        passphrase: Option<SecretString>,
    ) -> Self {
        Self {
            username: username.into(),
            auth: AuthMethod::KeyFile {
                path: path.into(),
                passphrase,
            },
        }
    }
}

/// How commands are delivered to a device.
///
/// Determines whether a PTY-backed shell and a prompt script are needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// One `exec` request per command; stdout + exit status come back.
    Exec,
    /// PTY shell driven by [`PromptScript`](crate::interactive::PromptScript):
    /// wait for prompt, send command, wait for prompt again.
    Interactive,
}

impl SessionMode {
    pub fn requires_pty(self) -> bool {
        matches!(self, Self::Interactive)
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exec => f.write_str("exec"),
            Self::Interactive => f.write_str("interactive"),
        }
    }
}
