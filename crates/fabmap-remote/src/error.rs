use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse classification of a remote failure.
///
/// Collectors record this per device; the detail string travels alongside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Unreachable,
    AuthFailed,
    PromptTimeout,
    CommandError,
}

/// Top-level error type for the `fabmap-remote` crate.
///
/// Every variant is recoverable from the caller's point of view: a failed
/// session only ever affects the device it was opened against.
#[derive(Debug, Error)]
pub enum Error {
    // ── Connection ──────────────────────────────────────────────────
    /// TCP connect, SSH handshake, or an overall timeout failed.
    #[error("{host} unreachable: {reason}")]
    Unreachable { host: String, reason: String },

    // ── Authentication ──────────────────────────────────────────────
    /// Credentials were rejected (fail closed, never retried).
    #[error("authentication failed for {username}@{host}: {reason}")]
    AuthFailed {
        host: String,
        username: String,
        reason: String,
    },

    // ── Interactive sessions ────────────────────────────────────────
    /// The expected prompt did not appear within the bounded wait.
    #[error("{host}: timed out after {waited_ms}ms in state {state} waiting for {expected}")]
    PromptTimeout {
        host: String,
        state: String,
        expected: String,
        waited_ms: u64,
    },

    // ── Command ─────────────────────────────────────────────────────
    /// Non-zero exit status, CLI error text, or a session that closed early.
    #[error("{host}: `{command}` failed (exit {exit_status:?}): {detail}")]
    CommandError {
        host: String,
        command: String,
        exit_status: Option<u32>,
        detail: String,
    },

    // ── Allow-list ──────────────────────────────────────────────────
    /// A command argument failed allow-list validation.
    #[error("invalid {field}: {reason}")]
    InvalidArgument { field: &'static str, reason: String },
}

impl Error {
    /// Classify this error for per-device failure reporting.
    ///
    /// `InvalidArgument` never reaches a device; it is reported as a
    /// command error should it ever be surfaced that way.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Unreachable { .. } => FailureKind::Unreachable,
            Self::AuthFailed { .. } => FailureKind::AuthFailed,
            Self::PromptTimeout { .. } => FailureKind::PromptTimeout,
            Self::CommandError { .. } | Self::InvalidArgument { .. } => FailureKind::CommandError,
        }
    }

    /// `true` when the device itself could not be reached or logged into.
    ///
    /// Such failures make any further command against the same device
    /// pointless.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Self::Unreachable { .. } | Self::AuthFailed { .. })
    }

    pub(crate) fn unreachable(host: &str, reason: impl ToString) -> Self {
        Self::Unreachable {
            host: host.to_owned(),
            reason: reason.to_string(),
        }
    }
}
