// ── Per-device failures ──
//
// A failed device never aborts a run. Each failure is recorded once, at
// the stage where it happened, and travels with the result.

use serde::{Deserialize, Serialize};
use strum::Display;

use super::device::{DeviceId, DeviceRole};

/// What went wrong, at the granularity reports care about.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    Unreachable,
    AuthFailed,
    PromptTimeout,
    CommandError,
    ParseError,
}

impl From<fabmap_remote::FailureKind> for FailureKind {
    fn from(kind: fabmap_remote::FailureKind) -> Self {
        match kind {
            fabmap_remote::FailureKind::Unreachable => Self::Unreachable,
            fabmap_remote::FailureKind::AuthFailed => Self::AuthFailed,
            fabmap_remote::FailureKind::PromptTimeout => Self::PromptTimeout,
            fabmap_remote::FailureKind::CommandError => Self::CommandError,
        }
    }
}

/// Collection step a failure belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CollectionStage {
    /// Dialect detection.
    Probe,
    /// Hostname lookup.
    Identity,
    MacTable,
    NetworkConfig,
    InterfaceAddress,
    /// The per-device deadline expired.
    Deadline,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceFailure {
    pub device_id: DeviceId,
    pub role: DeviceRole,
    pub stage: CollectionStage,
    pub kind: FailureKind,
    pub detail: String,
}

impl DeviceFailure {
    pub fn from_remote(
        device_id: &DeviceId,
        role: DeviceRole,
        stage: CollectionStage,
        err: &fabmap_remote::Error,
    ) -> Self {
        Self {
            device_id: device_id.clone(),
            role,
            stage,
            kind: err.kind().into(),
            detail: err.to_string(),
        }
    }
}
