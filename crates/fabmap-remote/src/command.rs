// ── Command allow-list ──
//
// Every command this crate can send to a device is a variant of
// `RemoteCommand`. There is no way to construct a free-form command
// string: the two parameterised variants only accept validated
// operator-supplied names, never text collected from a device.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::EnumDiscriminants;

use crate::error::Error;

/// Longest accepted bridge-domain / interface name.
const MAX_NAME_LEN: usize = 32;

fn validate_name(field: &'static str, raw: &str) -> Result<String, Error> {
    if raw.is_empty() || raw.len() > MAX_NAME_LEN {
        return Err(Error::InvalidArgument {
            field,
            reason: format!("'{raw}' must be 1-{MAX_NAME_LEN} characters"),
        });
    }
    if raw.starts_with('-') {
        return Err(Error::InvalidArgument {
            field,
            reason: format!("'{raw}' must not start with '-'"),
        });
    }
    if let Some(bad) = raw
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-')))
    {
        return Err(Error::InvalidArgument {
            field,
            reason: format!("'{raw}' contains forbidden character {bad:?}"),
        });
    }
    Ok(raw.to_owned())
}

// ── Validated arguments ─────────────────────────────────────────────

/// Name of a switch bridge domain (e.g. `br_default`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BridgeDomain(String);

impl BridgeDomain {
    pub fn new(raw: impl AsRef<str>) -> Result<Self, Error> {
        validate_name("bridge domain", raw.as_ref()).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BridgeDomain {
    fn default() -> Self {
        Self("br_default".to_owned())
    }
}

impl TryFrom<String> for BridgeDomain {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BridgeDomain> for String {
    fn from(b: BridgeDomain) -> Self {
        b.0
    }
}

impl fmt::Display for BridgeDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of a node network interface (e.g. `eth0`, `eth0.100`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InterfaceName(String);

impl InterfaceName {
    pub fn new(raw: impl AsRef<str>) -> Result<Self, Error> {
        let name = validate_name("interface name", raw.as_ref())?;
        // Linux caps interface names at IFNAMSIZ - 1.
        if name.len() > 15 {
            return Err(Error::InvalidArgument {
                field: "interface name",
                reason: format!("'{name}' is longer than 15 characters"),
            });
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for InterfaceName {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<InterfaceName> for String {
    fn from(i: InterfaceName) -> Self {
        i.0
    }
}

impl fmt::Display for InterfaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── RemoteCommand ───────────────────────────────────────────────────

/// Fixed path holding per-interface network configuration on nodes.
pub const NETWORK_CONFIG_GLOB: &str = "/etc/sysconfig/network-scripts/ifcfg-*";

/// The complete set of commands that may be issued to any device.
///
/// All of them are read-only queries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumDiscriminants)]
#[strum_discriminants(name(CommandKind), derive(Hash, PartialOrd, Ord))]
pub enum RemoteCommand {
    /// Capability probe for the exec-capable (Cumulus) dialect.
    OsRelease,
    /// System identity on Cumulus switches and Linux nodes.
    Hostname,
    /// Capability probe for the interactive-only (Onyx) dialect.
    ShowVersion,
    /// Structured MAC-forwarding-table query for one bridge domain.
    BridgeMacTable { bridge: BridgeDomain },
    /// Tabular MAC-forwarding-table query on the interactive CLI.
    MacAddressTable,
    /// Dump of the node's interface configuration files.
    NetworkConfig,
    /// Address query for one node interface.
    InterfaceAddress { interface: InterfaceName },
}

impl RemoteCommand {
    /// The exact command line sent to the device.
    pub fn command_line(&self) -> String {
        match self {
            Self::OsRelease => "cat /etc/os-release".to_owned(),
            Self::Hostname => "hostname".to_owned(),
            Self::ShowVersion => "show version".to_owned(),
            Self::BridgeMacTable { bridge } => {
                format!("nv show bridge domain {bridge} mac-table -o json")
            }
            Self::MacAddressTable => "show mac-address-table".to_owned(),
            Self::NetworkConfig => format!("head -v -n 200 {NETWORK_CONFIG_GLOB}"),
            Self::InterfaceAddress { interface } => format!("ip addr show dev {interface}"),
        }
    }

    pub fn kind(&self) -> CommandKind {
        CommandKind::from(self)
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}
