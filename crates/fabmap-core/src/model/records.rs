// ── Collected records ──
//
// Normalized output of the dialect parsers. Nothing here knows about
// topology; the correlator is the only consumer that relates records
// across devices.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use super::device::DeviceId;
use super::mac::MacAddress;

/// One row of a switch forwarding table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MacTableEntry {
    pub switch_id: DeviceId,
    pub port: String,
    pub mac: MacAddress,
    /// Bridge domain the entry was read from, when the dialect has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan: Option<u16>,
}

/// A MAC address owned by the switch itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ControlPlaneMac {
    pub switch_id: DeviceId,
    pub mac: MacAddress,
}

/// One network interface of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InterfaceRecord {
    pub node_id: DeviceId,
    pub name: String,
    pub mac: MacAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<IpAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix_len: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan: Option<u16>,
    /// Physical interface a tagged sub-interface rides on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl InterfaceRecord {
    pub fn is_subinterface(&self) -> bool {
        self.parent.is_some()
    }
}
