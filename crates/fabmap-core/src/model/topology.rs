// ── Topology graph ──
//
// The single product of correlation. Built once through
// `TopologyGraph::new`, which checks that every reference points at a
// collected device of the right role; read-only afterwards. All
// collections are ordered so that equal inputs serialize identically.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use strum::Display;

use super::device::{Device, DeviceId, DeviceRole};
use super::mac::MacAddress;
use crate::error::CoreError;

// ── Edges ───────────────────────────────────────────────────────────

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EdgeConfidence {
    /// The MAC identified exactly one node interface and the port no other node.
    Exact,
    /// Several candidates; reported as-is, never tie-broken.
    Ambiguous,
}

/// Switch port to node interface attachment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TopologyEdge {
    pub switch_id: DeviceId,
    pub switch_port: String,
    pub node_id: DeviceId,
    pub node_interface: String,
    pub mac: MacAddress,
    pub confidence: EdgeConfidence,
}

// ── Inter-switch links ──────────────────────────────────────────────

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LinkConfidence {
    /// Each switch learned the other's control-plane MAC.
    Corroborated,
    /// Only one side observed the other.
    OneSided,
    /// Both sides observed each other, but on more than one port on at
    /// least one side, so ports cannot be paired. Each observed port gets
    /// its own link with the peer port unknown.
    Ambiguous,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LinkEnd {
    pub switch_id: DeviceId,
    /// `None` when this side's port was not observed.
    pub port: Option<String>,
}

/// Switch-to-switch link. Ends are stored with `a < b`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct InterSwitchLink {
    pub a: LinkEnd,
    pub b: LinkEnd,
    pub confidence: LinkConfidence,
}

impl InterSwitchLink {
    /// Build a link with canonically ordered ends.
    pub fn new(x: LinkEnd, y: LinkEnd, confidence: LinkConfidence) -> Self {
        let (a, b) = if x <= y { (x, y) } else { (y, x) };
        Self { a, b, confidence }
    }

    pub fn touches(&self, switch_id: &DeviceId) -> bool {
        self.a.switch_id == *switch_id || self.b.switch_id == *switch_id
    }
}

// ── Leftovers ───────────────────────────────────────────────────────

/// Table entry that matched no node interface and no switch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct UnresolvedMac {
    pub switch_id: DeviceId,
    pub port: String,
    pub mac: MacAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan: Option<u16>,
}

/// Node interface whose MAC appeared on no collected table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct UnmatchedInterface {
    pub node_id: DeviceId,
    pub interface: String,
    pub mac: MacAddress,
}

// ── Graph ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TopologySummary {
    pub switches: usize,
    pub nodes: usize,
    pub edges: usize,
    pub ambiguous_edges: usize,
    pub inter_switch_links: usize,
    pub unresolved: usize,
    pub unmatched: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TopologyGraph {
    devices: BTreeMap<DeviceId, Device>,
    edges: BTreeSet<TopologyEdge>,
    inter_switch_links: BTreeSet<InterSwitchLink>,
    unresolved: BTreeSet<UnresolvedMac>,
    unmatched: BTreeSet<UnmatchedInterface>,
}

impl TopologyGraph {
    /// Assemble and validate a graph.
    ///
    /// Fails with [`CoreError::InvalidGraph`] if anything references a
    /// device that is absent or has the wrong role.
    pub fn new(
        devices: impl IntoIterator<Item = Device>,
        edges: BTreeSet<TopologyEdge>,
        inter_switch_links: BTreeSet<InterSwitchLink>,
        unresolved: BTreeSet<UnresolvedMac>,
        unmatched: BTreeSet<UnmatchedInterface>,
    ) -> Result<Self, CoreError> {
        let graph = Self {
            devices: devices.into_iter().map(|d| (d.id.clone(), d)).collect(),
            edges,
            inter_switch_links,
            unresolved,
            unmatched,
        };
        graph.validate()?;
        Ok(graph)
    }

    fn validate(&self) -> Result<(), CoreError> {
        for edge in &self.edges {
            self.expect_role(&edge.switch_id, DeviceRole::Switch, "edge")?;
            self.expect_role(&edge.node_id, DeviceRole::Node, "edge")?;
        }
        for link in &self.inter_switch_links {
            self.expect_role(&link.a.switch_id, DeviceRole::Switch, "inter-switch link")?;
            self.expect_role(&link.b.switch_id, DeviceRole::Switch, "inter-switch link")?;
            if link.a.switch_id == link.b.switch_id {
                return Err(CoreError::InvalidGraph {
                    reason: format!("inter-switch link loops back to {}", link.a.switch_id),
                });
            }
        }
        for entry in &self.unresolved {
            self.expect_role(&entry.switch_id, DeviceRole::Switch, "unresolved MAC")?;
        }
        for iface in &self.unmatched {
            self.expect_role(&iface.node_id, DeviceRole::Node, "unmatched interface")?;
        }
        Ok(())
    }

    fn expect_role(&self, id: &DeviceId, role: DeviceRole, what: &str) -> Result<(), CoreError> {
        match self.devices.get(id) {
            Some(device) if device.role == role => Ok(()),
            Some(device) => Err(CoreError::InvalidGraph {
                reason: format!("{what} expects {id} to be a {role}, found {}", device.role),
            }),
            None => Err(CoreError::InvalidGraph {
                reason: format!("{what} references unknown device {id}"),
            }),
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn device(&self, id: &DeviceId) -> Option<&Device> {
        self.devices.get(id)
    }

    pub fn edges(&self) -> impl Iterator<Item = &TopologyEdge> {
        self.edges.iter()
    }

    pub fn edges_for_node<'a>(
        &'a self,
        node_id: &'a DeviceId,
    ) -> impl Iterator<Item = &'a TopologyEdge> + 'a {
        self.edges.iter().filter(move |e| e.node_id == *node_id)
    }

    pub fn edges_for_switch<'a>(
        &'a self,
        switch_id: &'a DeviceId,
    ) -> impl Iterator<Item = &'a TopologyEdge> + 'a {
        self.edges.iter().filter(move |e| e.switch_id == *switch_id)
    }

    pub fn ambiguous_edges(&self) -> impl Iterator<Item = &TopologyEdge> {
        self.edges
            .iter()
            .filter(|e| e.confidence == EdgeConfidence::Ambiguous)
    }

    pub fn inter_switch_links(&self) -> impl Iterator<Item = &InterSwitchLink> {
        self.inter_switch_links.iter()
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &UnresolvedMac> {
        self.unresolved.iter()
    }

    pub fn unmatched(&self) -> impl Iterator<Item = &UnmatchedInterface> {
        self.unmatched.iter()
    }

    pub fn summary(&self) -> TopologySummary {
        let count_role =
            |role: DeviceRole| self.devices.values().filter(|d| d.role == role).count();
        TopologySummary {
            switches: count_role(DeviceRole::Switch),
            nodes: count_role(DeviceRole::Node),
            edges: self.edges.len(),
            ambiguous_edges: self.ambiguous_edges().count(),
            inter_switch_links: self.inter_switch_links.len(),
            unresolved: self.unresolved.len(),
            unmatched: self.unmatched.len(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::OsDialect;

    fn switch(id: &str) -> Device {
        Device {
            id: id.into(),
            role: DeviceRole::Switch,
            dialect: OsDialect::Cumulus,
            hostname: None,
        }
    }

    fn node(id: &str) -> Device {
        Device {
            id: id.into(),
            role: DeviceRole::Node,
            dialect: OsDialect::NodeLinux,
            hostname: Some(format!("host-{id}")),
        }
    }

    fn edge(switch_id: &str, node_id: &str) -> TopologyEdge {
        TopologyEdge {
            switch_id: switch_id.into(),
            switch_port: "swp1".into(),
            node_id: node_id.into(),
            node_interface: "eth0".into(),
            mac: MacAddress::from_octets([0x0c, 0x42, 0xa1, 0, 0, 1]),
            confidence: EdgeConfidence::Exact,
        }
    }

    #[test]
    fn link_ends_are_ordered() {
        let x = LinkEnd {
            switch_id: "sw-b".into(),
            port: Some("swp2".into()),
        };
        let y = LinkEnd {
            switch_id: "sw-a".into(),
            port: Some("swp1".into()),
        };
        let link = InterSwitchLink::new(x, y, LinkConfidence::Corroborated);
        assert_eq!(link.a.switch_id.as_str(), "sw-a");
        assert_eq!(link.b.switch_id.as_str(), "sw-b");
    }

    #[test]
    fn edge_with_swapped_roles_is_rejected() {
        let err = TopologyGraph::new(
            [switch("sw1"), node("n1")],
            BTreeSet::from([edge("n1", "sw1")]),
            BTreeSet::new(),
            BTreeSet::new(),
            BTreeSet::new(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidGraph { .. }));
    }

    #[test]
    fn edge_to_unknown_device_is_rejected() {
        let err = TopologyGraph::new(
            [switch("sw1")],
            BTreeSet::from([edge("sw1", "n9")]),
            BTreeSet::new(),
            BTreeSet::new(),
            BTreeSet::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("n9"));
    }

    #[test]
    fn summary_counts() {
        let graph = TopologyGraph::new(
            [switch("sw1"), node("n1"), node("n2")],
            BTreeSet::from([edge("sw1", "n1")]),
            BTreeSet::new(),
            BTreeSet::new(),
            BTreeSet::new(),
        )
        .unwrap();
        let summary = graph.summary();
        assert_eq!(summary.switches, 1);
        assert_eq!(summary.nodes, 2);
        assert_eq!(summary.edges, 1);
        assert_eq!(summary.ambiguous_edges, 0);
        assert_eq!(graph.edges_for_node(&"n1".into()).count(), 1);
        assert_eq!(graph.edges_for_switch(&"sw1".into()).count(), 1);
        assert_eq!(graph.edges_for_node(&"n2".into()).count(), 0);
    }
}
