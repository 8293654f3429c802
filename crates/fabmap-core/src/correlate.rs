// ── Topology correlation ──
//
// Joins switch forwarding tables against node interface MACs and switch
// control-plane MACs. Pure and deterministic: every intermediate map is
// ordered, so the same inventory in any order yields the same graph.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::collector::Inventory;
use crate::error::CoreError;
use crate::model::{
    DeviceId, EdgeConfidence, InterSwitchLink, InterfaceRecord, LinkConfidence, LinkEnd,
    MacAddress, TopologyEdge, TopologyGraph, UnmatchedInterface, UnresolvedMac,
};

/// Tunables for [`correlate_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationOptions {
    /// Treat a sub-interface that shares its parent's MAC on the same node
    /// as the parent itself.
    pub subinterface_equivalence: bool,
}

impl Default for CorrelationOptions {
    fn default() -> Self {
        Self {
            subinterface_equivalence: true,
        }
    }
}

/// Correlate with default options.
pub fn correlate(inventory: &Inventory) -> Result<TopologyGraph, CoreError> {
    correlate_with(inventory, &CorrelationOptions::default())
}

/// A node interface a table entry may point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Candidate<'a> {
    node_id: &'a DeviceId,
    interface: &'a str,
    mac: MacAddress,
    /// The MAC belongs to more than one interface.
    shared_mac: bool,
}

pub fn correlate_with(
    inventory: &Inventory,
    options: &CorrelationOptions,
) -> Result<TopologyGraph, CoreError> {
    let interfaces = effective_interfaces(&inventory.interfaces, options);

    let mut by_mac: BTreeMap<MacAddress, BTreeSet<(&DeviceId, &str)>> = BTreeMap::new();
    for iface in &interfaces {
        by_mac
            .entry(iface.mac)
            .or_default()
            .insert((&iface.node_id, iface.name.as_str()));
    }

    let mut owners: BTreeMap<MacAddress, BTreeSet<&DeviceId>> = BTreeMap::new();
    for cp in &inventory.control_plane_macs {
        owners.entry(cp.mac).or_default().insert(&cp.switch_id);
    }

    // (observer, owner) -> ports on the observer where owner's MACs were learned
    let mut observed: BTreeMap<(&DeviceId, &DeviceId), BTreeSet<&str>> = BTreeMap::new();
    let mut candidates: BTreeMap<(&DeviceId, &str), BTreeSet<Candidate<'_>>> = BTreeMap::new();
    let mut unresolved = BTreeSet::new();
    let mut learned: BTreeSet<MacAddress> = BTreeSet::new();

    for entry in &inventory.mac_tables {
        learned.insert(entry.mac);

        if let Some(owned_by) = owners.get(&entry.mac) {
            if owned_by.contains(&&entry.switch_id) {
                continue;
            }
            for owner in owned_by {
                observed
                    .entry((&entry.switch_id, *owner))
                    .or_default()
                    .insert(entry.port.as_str());
            }
            continue;
        }

        match by_mac.get(&entry.mac) {
            Some(targets) => {
                let slot = candidates
                    .entry((&entry.switch_id, entry.port.as_str()))
                    .or_default();
                for &(node_id, interface) in targets {
                    slot.insert(Candidate {
                        node_id,
                        interface,
                        mac: entry.mac,
                        shared_mac: targets.len() > 1,
                    });
                }
            }
            None => {
                unresolved.insert(UnresolvedMac {
                    switch_id: entry.switch_id.clone(),
                    port: entry.port.clone(),
                    mac: entry.mac,
                    vlan: entry.vlan,
                });
            }
        }
    }

    let edges = build_edges(&candidates);
    let links = build_links(&observed);

    let unmatched: BTreeSet<UnmatchedInterface> = interfaces
        .iter()
        .filter(|iface| !learned.contains(&iface.mac))
        .map(|iface| UnmatchedInterface {
            node_id: iface.node_id.clone(),
            interface: iface.name.clone(),
            mac: iface.mac,
        })
        .collect();

    debug!(
        edges = edges.len(),
        links = links.len(),
        unresolved = unresolved.len(),
        unmatched = unmatched.len(),
        "correlation complete"
    );

    TopologyGraph::new(
        inventory.devices.iter().cloned(),
        edges,
        links,
        unresolved,
        unmatched,
    )
}

/// Interfaces that take part in MAC matching.
///
/// With sub-interface equivalence, a sub-interface whose parent on the
/// same node carries the same MAC is folded into the parent.
fn effective_interfaces<'a>(
    records: &'a [InterfaceRecord],
    options: &CorrelationOptions,
) -> Vec<&'a InterfaceRecord> {
    if !options.subinterface_equivalence {
        return records.iter().collect();
    }
    let by_name: BTreeMap<(&DeviceId, &str), MacAddress> = records
        .iter()
        .map(|r| ((&r.node_id, r.name.as_str()), r.mac))
        .collect();

    records
        .iter()
        .filter(|r| {
            let Some(parent) = r.parent.as_deref() else {
                return true;
            };
            by_name.get(&(&r.node_id, parent)) != Some(&r.mac)
        })
        .collect()
}

fn build_edges(
    candidates: &BTreeMap<(&DeviceId, &str), BTreeSet<Candidate<'_>>>,
) -> BTreeSet<TopologyEdge> {
    let mut edges = BTreeSet::new();
    for ((switch_id, port), cands) in candidates {
        let nodes: BTreeSet<&DeviceId> = cands.iter().map(|c| c.node_id).collect();
        let port_ambiguous = nodes.len() > 1;

        for cand in cands {
            let confidence = if port_ambiguous || cand.shared_mac {
                EdgeConfidence::Ambiguous
            } else {
                EdgeConfidence::Exact
            };
            edges.insert(TopologyEdge {
                switch_id: (*switch_id).clone(),
                switch_port: (*port).to_owned(),
                node_id: cand.node_id.clone(),
                node_interface: cand.interface.to_owned(),
                mac: cand.mac,
                confidence,
            });
        }
    }
    edges
}

/// Links between switch pairs.
///
/// A pair that saw each other on exactly one port per side gives one
/// corroborated link. With several ports on either side the pairing is
/// unknown: every observed port gets an ambiguous link with the peer port
/// unset. A pair seen from one side keeps the far port unknown.
fn build_links(
    observed: &BTreeMap<(&DeviceId, &DeviceId), BTreeSet<&str>>,
) -> BTreeSet<InterSwitchLink> {
    let mut links = BTreeSet::new();
    for ((observer, owner), ports) in observed {
        match observed.get(&(*owner, *observer)) {
            Some(far_ports) => {
                if observer > owner {
                    continue;
                }
                if let (Some(near), Some(far)) = (single(ports), single(far_ports)) {
                    links.insert(InterSwitchLink::new(
                        end(observer, Some(near)),
                        end(owner, Some(far)),
                        LinkConfidence::Corroborated,
                    ));
                    continue;
                }
                debug!(
                    a = %observer,
                    b = %owner,
                    a_ports = ports.len(),
                    b_ports = far_ports.len(),
                    "switch pair seen on several ports, leaving ports unpaired"
                );
                for near in ports {
                    links.insert(InterSwitchLink::new(
                        end(observer, Some(*near)),
                        end(owner, None),
                        LinkConfidence::Ambiguous,
                    ));
                }
                for far in far_ports {
                    links.insert(InterSwitchLink::new(
                        end(owner, Some(*far)),
                        end(observer, None),
                        LinkConfidence::Ambiguous,
                    ));
                }
            }
            None => {
                for near in ports {
                    links.insert(InterSwitchLink::new(
                        end(observer, Some(*near)),
                        end(owner, None),
                        LinkConfidence::OneSided,
                    ));
                }
            }
        }
    }
    links
}

fn single<'a>(ports: &BTreeSet<&'a str>) -> Option<&'a str> {
    match ports.len() {
        1 => ports.first().copied(),
        _ => None,
    }
}

fn end(switch_id: &DeviceId, port: Option<&str>) -> LinkEnd {
    LinkEnd {
        switch_id: switch_id.clone(),
        port: port.map(str::to_owned),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{ControlPlaneMac, Device, DeviceRole, MacTableEntry, OsDialect};

    // ── Fixtures ─────────────────────────────────────────────────────

    fn mac(last: u8) -> MacAddress {
        MacAddress::from_octets([0x0c, 0x42, 0xa1, 0x00, 0x00, last])
    }

    fn switch_mac(last: u8) -> MacAddress {
        MacAddress::from_octets([0x48, 0xb0, 0x2d, 0x00, 0x00, last])
    }

    fn switch(id: &str) -> Device {
        Device {
            id: id.into(),
            role: DeviceRole::Switch,
            dialect: OsDialect::Cumulus,
            hostname: Some(id.to_owned()),
        }
    }

    fn node(id: &str) -> Device {
        Device {
            id: id.into(),
            role: DeviceRole::Node,
            dialect: OsDialect::NodeLinux,
            hostname: Some(id.to_owned()),
        }
    }

    fn entry(switch_id: &str, port: &str, mac: MacAddress) -> MacTableEntry {
        MacTableEntry {
            switch_id: switch_id.into(),
            port: port.into(),
            mac,
            domain: Some("br_default".into()),
            vlan: Some(1),
        }
    }

    fn iface(node_id: &str, name: &str, mac: MacAddress) -> InterfaceRecord {
        let (vlan, parent) = match name.split_once('.') {
            Some((parent, tag)) => (tag.parse().ok(), Some(parent.to_owned())),
            None => (None, None),
        };
        InterfaceRecord {
            node_id: node_id.into(),
            name: name.into(),
            mac,
            ip: None,
            prefix_len: None,
            vlan,
            parent,
        }
    }

    fn cp(switch_id: &str, mac: MacAddress) -> ControlPlaneMac {
        ControlPlaneMac {
            switch_id: switch_id.into(),
            mac,
        }
    }

    /// Two leaves A and B cross-linked on A:swp1 <-> B:swp2, two nodes.
    fn fabric() -> Inventory {
        Inventory {
            devices: vec![
                switch("A"),
                switch("B"),
                node("cnode-3-10"),
                node("cnode-3-11"),
            ],
            mac_tables: vec![
                entry("A", "swp49", mac(1)),
                entry("B", "swp50", mac(2)),
                entry("A", "swp1", switch_mac(0xb)),
                entry("B", "swp2", switch_mac(0xa)),
                entry("A", "swp7", mac(0x99)),
            ],
            control_plane_macs: vec![cp("A", switch_mac(0xa)), cp("B", switch_mac(0xb))],
            interfaces: vec![
                iface("cnode-3-10", "eth0", mac(1)),
                iface("cnode-3-11", "eth0", mac(2)),
                iface("cnode-3-11", "eth1", mac(3)),
            ],
            failures: Vec::new(),
        }
    }

    fn edge(switch_id: &str, port: &str, node_id: &str, iface: &str, m: MacAddress, c: EdgeConfidence) -> TopologyEdge {
        TopologyEdge {
            switch_id: switch_id.into(),
            switch_port: port.into(),
            node_id: node_id.into(),
            node_interface: iface.into(),
            mac: m,
            confidence: c,
        }
    }

    // ── Properties ───────────────────────────────────────────────────

    #[test]
    fn shared_mac_yields_exact_edge() {
        let graph = correlate(&fabric()).unwrap();
        let edges: Vec<_> = graph.edges().cloned().collect();
        assert_eq!(
            edges,
            vec![
                edge("A", "swp49", "cnode-3-10", "eth0", mac(1), EdgeConfidence::Exact),
                edge("B", "swp50", "cnode-3-11", "eth0", mac(2), EdgeConfidence::Exact),
            ]
        );
    }

    #[test]
    fn leaf_port_to_node_interface_scenario() {
        let graph = correlate(&fabric()).unwrap();
        let node_id: DeviceId = "cnode-3-10".into();
        let edges: Vec<_> = graph.edges_for_node(&node_id).collect();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].switch_id.as_str(), "A");
        assert_eq!(edges[0].switch_port, "swp49");
        assert_eq!(edges[0].node_interface, "eth0");
        assert_eq!(edges[0].confidence, EdgeConfidence::Exact);
    }

    #[test]
    fn unknown_mac_is_unresolved_not_an_edge() {
        let graph = correlate(&fabric()).unwrap();
        let unresolved: Vec<_> = graph.unresolved().collect();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].mac, mac(0x99));
        assert_eq!(unresolved[0].port, "swp7");
        assert!(graph.edges().all(|e| e.mac != mac(0x99)));
    }

    #[test]
    fn interface_on_no_table_is_unmatched() {
        let graph = correlate(&fabric()).unwrap();
        let unmatched: Vec<_> = graph.unmatched().collect();
        assert_eq!(unmatched.len(), 1);
        assert_eq!(unmatched[0].node_id.as_str(), "cnode-3-11");
        assert_eq!(unmatched[0].interface, "eth1");
    }

    #[test]
    fn cross_learned_control_plane_macs_give_one_corroborated_link() {
        let graph = correlate(&fabric()).unwrap();
        let links: Vec<_> = graph.inter_switch_links().cloned().collect();
        assert_eq!(
            links,
            vec![InterSwitchLink {
                a: LinkEnd {
                    switch_id: "A".into(),
                    port: Some("swp1".into()),
                },
                b: LinkEnd {
                    switch_id: "B".into(),
                    port: Some("swp2".into()),
                },
                confidence: LinkConfidence::Corroborated,
            }]
        );
    }

    #[test]
    fn one_sided_observation_keeps_far_port_unknown() {
        let mut inv = fabric();
        inv.mac_tables.retain(|e| !(e.switch_id.as_str() == "B" && e.port == "swp2"));
        let graph = correlate(&inv).unwrap();
        let links: Vec<_> = graph.inter_switch_links().collect();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].confidence, LinkConfidence::OneSided);
        assert_eq!(links[0].a.port.as_deref(), Some("swp1"));
        assert_eq!(links[0].b.port, None);
    }

    #[test]
    fn bonded_peer_link_is_not_paired_port_by_port() {
        let mut inv = fabric();
        inv.mac_tables.push(entry("A", "swp2", switch_mac(0xb)));
        inv.mac_tables.push(entry("B", "swp1", switch_mac(0xa)));
        let graph = correlate(&inv).unwrap();

        let links: Vec<_> = graph.inter_switch_links().collect();
        assert_eq!(links.len(), 4);
        for link in &links {
            assert_eq!(link.confidence, LinkConfidence::Ambiguous);
            assert!(
                link.a.port.is_none() ^ link.b.port.is_none(),
                "exactly one end should carry a port: {link:?}"
            );
        }
        let ports: BTreeSet<(&str, &str)> = links
            .iter()
            .flat_map(|l| [&l.a, &l.b])
            .filter_map(|e| e.port.as_deref().map(|p| (e.switch_id.as_str(), p)))
            .collect();
        assert_eq!(
            ports,
            BTreeSet::from([("A", "swp1"), ("A", "swp2"), ("B", "swp1"), ("B", "swp2")])
        );
    }

    #[test]
    fn uneven_peer_link_gives_one_link_per_observed_port() {
        let mut inv = fabric();
        inv.mac_tables.push(entry("A", "swp2", switch_mac(0xb)));
        inv.mac_tables.push(entry("A", "swp3", switch_mac(0xb)));
        let graph = correlate(&inv).unwrap();

        // Three ports on A, one on B: four links, not a 3 x 1 pairing.
        let links: Vec<_> = graph.inter_switch_links().collect();
        assert_eq!(links.len(), 4);
        assert!(links.iter().all(|l| l.confidence == LinkConfidence::Ambiguous));
        assert!(links.iter().all(|l| l.a.port.is_none() || l.b.port.is_none()));
    }

    #[test]
    fn own_control_plane_mac_is_ignored() {
        let mut inv = fabric();
        inv.mac_tables.push(entry("A", "swp3", switch_mac(0xa)));
        let graph = correlate(&inv).unwrap();
        assert_eq!(graph.unresolved().count(), 1);
        assert_eq!(graph.inter_switch_links().count(), 1);
    }

    #[test]
    fn permuted_inventory_gives_identical_graph() {
        let inv = fabric();
        let mut permuted = inv.clone();
        permuted.devices.reverse();
        permuted.mac_tables.reverse();
        permuted.mac_tables.rotate_left(2);
        permuted.control_plane_macs.reverse();
        permuted.interfaces.reverse();

        assert_eq!(correlate(&inv).unwrap(), correlate(&permuted).unwrap());
    }

    #[test]
    fn correlation_is_idempotent() {
        let inv = fabric();
        let first = correlate(&inv).unwrap();
        let second = correlate(&inv).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn mac_on_two_nodes_is_ambiguous() {
        let mut inv = fabric();
        inv.interfaces.push(iface("cnode-3-11", "eth5", mac(1)));
        let graph = correlate(&inv).unwrap();
        let switch_a: DeviceId = "A".into();
        let on_swp49: Vec<_> = graph
            .edges_for_switch(&switch_a)
            .filter(|e| e.switch_port == "swp49")
            .collect();
        assert_eq!(on_swp49.len(), 2);
        assert!(on_swp49.iter().all(|e| e.confidence == EdgeConfidence::Ambiguous));
    }

    #[test]
    fn port_with_two_nodes_is_ambiguous() {
        let mut inv = fabric();
        inv.mac_tables.push(entry("A", "swp49", mac(3)));
        let graph = correlate(&inv).unwrap();
        assert_eq!(graph.ambiguous_edges().count(), 2);
        assert!(graph
            .edges_for_switch(&"B".into())
            .all(|e| e.confidence == EdgeConfidence::Exact));
    }

    #[test]
    fn same_node_on_port_stays_exact() {
        let mut inv = fabric();
        inv.interfaces.push(iface("cnode-3-10", "eth1", mac(4)));
        inv.mac_tables.push(entry("A", "swp49", mac(4)));
        let graph = correlate(&inv).unwrap();
        assert_eq!(graph.ambiguous_edges().count(), 0);
        assert_eq!(graph.edges_for_node(&"cnode-3-10".into()).count(), 2);
    }

    #[test]
    fn subinterface_collapses_onto_parent_by_default() {
        let mut inv = fabric();
        inv.interfaces.push(iface("cnode-3-10", "eth0.100", mac(1)));

        let graph = correlate(&inv).unwrap();
        let node: DeviceId = "cnode-3-10".into();
        let edges: Vec<_> = graph.edges_for_node(&node).collect();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].node_interface, "eth0");
        assert_eq!(edges[0].confidence, EdgeConfidence::Exact);

        let strict = correlate_with(
            &inv,
            &CorrelationOptions {
                subinterface_equivalence: false,
            },
        )
        .unwrap();
        let edges: Vec<_> = strict.edges_for_node(&node).collect();
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().all(|e| e.confidence == EdgeConfidence::Ambiguous));
    }

    #[test]
    fn entry_for_unknown_switch_is_an_invalid_graph() {
        let mut inv = fabric();
        inv.mac_tables.push(entry("Z", "swp1", mac(0x42)));
        assert!(matches!(
            correlate(&inv),
            Err(CoreError::InvalidGraph { .. })
        ));
    }

    #[test]
    fn empty_inventory_gives_empty_graph() {
        let graph = correlate(&Inventory::default()).unwrap();
        assert_eq!(graph.summary(), crate::model::TopologySummary::default());
    }
}
