// ── Device domain types ──

use std::fmt;

use fabmap_remote::{DEFAULT_SSH_PORT, SessionMode};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Stable identifier of a device within one run: its management address,
/// suffixed with `:port` when a non-default SSH port is used.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeviceRole {
    Switch,
    Node,
}

/// Switch command dialect. Selects one parser and one session strategy.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SwitchDialect {
    /// Declarative CLI with JSON output; non-interactive exec.
    Cumulus,
    /// Legacy interactive CLI; needs a prompt script.
    Onyx,
}

impl SwitchDialect {
    pub fn session_mode(self) -> SessionMode {
        match self {
            Self::Cumulus => SessionMode::Exec,
            Self::Onyx => SessionMode::Interactive,
        }
    }
}

/// Operating system family of a collected device.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OsDialect {
    Cumulus,
    Onyx,
    NodeLinux,
}

impl From<SwitchDialect> for OsDialect {
    fn from(d: SwitchDialect) -> Self {
        match d {
            SwitchDialect::Cumulus => Self::Cumulus,
            SwitchDialect::Onyx => Self::Onyx,
        }
    }
}

/// Statically supplied description of a device to collect from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSpec {
    pub id: DeviceId,
    pub address: String,
    pub port: u16,
    pub role: DeviceRole,
    /// Declared dialect; `None` means probe. Ignored for nodes.
    pub dialect: Option<SwitchDialect>,
}

impl DeviceSpec {
    pub fn switch(address: impl Into<String>) -> Self {
        Self::new(address.into(), DeviceRole::Switch)
    }

    pub fn node(address: impl Into<String>) -> Self {
        Self::new(address.into(), DeviceRole::Node)
    }

    fn new(address: String, role: DeviceRole) -> Self {
        Self {
            id: DeviceId::new(address.clone()),
            address,
            port: DEFAULT_SSH_PORT,
            role,
            dialect: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self.id = if port == DEFAULT_SSH_PORT {
            DeviceId::new(self.address.clone())
        } else {
            DeviceId::new(format!("{}:{port}", self.address))
        };
        self
    }

    pub fn with_dialect(mut self, dialect: SwitchDialect) -> Self {
        self.dialect = Some(dialect);
        self
    }
}

/// A device that was successfully reached during collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub role: DeviceRole,
    pub dialect: OsDialect,
    pub hostname: Option<String>,
}

impl Device {
    /// Hostname when known, otherwise the device id.
    pub fn display_name(&self) -> &str {
        self.hostname.as_deref().unwrap_or(self.id.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn nondefault_port_is_part_of_the_id() {
        let spec = DeviceSpec::switch("10.0.0.1").with_port(2222);
        assert_eq!(spec.id.as_str(), "10.0.0.1:2222");
        let spec = DeviceSpec::node("10.0.0.2").with_port(22);
        assert_eq!(spec.id.as_str(), "10.0.0.2");
    }

    #[test]
    fn dialect_parses_case_insensitively() {
        assert_eq!("Onyx".parse::<SwitchDialect>().unwrap(), SwitchDialect::Onyx);
        assert_eq!("cumulus".parse::<SwitchDialect>().unwrap(), SwitchDialect::Cumulus);
        assert!("nxos".parse::<SwitchDialect>().is_err());
    }

    #[test]
    fn dialect_selects_session_mode() {
        assert!(SwitchDialect::Onyx.session_mode().requires_pty());
        assert!(!SwitchDialect::Cumulus.session_mode().requires_pty());
    }
}
