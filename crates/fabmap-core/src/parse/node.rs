// ── Node interface parsers ──
//
// `ip addr show dev <if>` blocks give the live MAC and address;
// `head -v` over the ifcfg files gives the declared VLAN layout.

use std::net::IpAddr;
use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use super::ParseError;
use crate::model::{DeviceId, InterfaceRecord, MacAddress};

static LINK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+:\s+(?P<name>[^:@\s]+)(?:@(?P<parent>[^:\s]+))?:\s+<").expect("valid link regex")
});
static FILE_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^==> (?P<path>.+) <==$").expect("valid head regex"));

// ── ip addr ─────────────────────────────────────────────────────────

#[derive(Default)]
struct Block<'a> {
    name: &'a str,
    parent: Option<&'a str>,
    mac: Option<&'a str>,
    ethernet: bool,
    inet: Option<&'a str>,
    inet6: Option<&'a str>,
}

/// Parse `ip addr show` output into interface records.
///
/// Links without an Ethernet address (loopback, InfiniBand, tunnels)
/// produce no record.
pub fn parse_ip_addr(device: &DeviceId, text: &str) -> Result<Vec<InterfaceRecord>, ParseError> {
    let mut blocks: Vec<Block<'_>> = Vec::new();

    for line in text.lines() {
        if let Some(caps) = LINK_HEADER.captures(line) {
            blocks.push(Block {
                name: caps.name("name").map_or("", |m| m.as_str()),
                parent: caps
                    .name("parent")
                    .map(|m| m.as_str())
                    .filter(|p| *p != "NONE"),
                ..Block::default()
            });
            continue;
        }
        let Some(block) = blocks.last_mut() else {
            continue;
        };
        let mut words = line.split_whitespace();
        match words.next() {
            Some(link) if link.starts_with("link/") => {
                block.ethernet = link == "link/ether";
                block.mac = words.next();
            }
            Some("inet") if block.inet.is_none() => block.inet = words.next(),
            Some("inet6") if block.inet6.is_none() => {
                let addr = words.next();
                let global = line.contains("scope global");
                if global {
                    block.inet6 = addr;
                }
            }
            _ => {}
        }
    }

    if blocks.is_empty() {
        return Err(ParseError::new(device, "no interface block found", text));
    }

    let mut records = Vec::new();
    for block in blocks {
        if !block.ethernet {
            trace!(device = %device, interface = block.name, "skipping non-Ethernet link");
            continue;
        }
        let raw_mac = block.mac.ok_or_else(|| {
            ParseError::new(device, format!("{}: link/ether without address", block.name), text)
        })?;
        let mac = MacAddress::parse(raw_mac)
            .map_err(|e| ParseError::new(device, format!("{}: {e}", block.name), text))?;

        let (ip, prefix_len) = match block.inet.or(block.inet6) {
            Some(cidr) => parse_cidr(cidr).ok_or_else(|| {
                ParseError::new(device, format!("{}: bad address '{cidr}'", block.name), text)
            })?,
            None => (None, None),
        };

        let (vlan, dotted_parent) = split_vlan_name(block.name);
        records.push(InterfaceRecord {
            node_id: device.clone(),
            name: block.name.to_owned(),
            mac,
            ip,
            prefix_len,
            vlan,
            parent: dotted_parent.or(block.parent).map(str::to_owned),
        });
    }
    Ok(records)
}

fn parse_cidr(cidr: &str) -> Option<(Option<IpAddr>, Option<u8>)> {
    let (addr, len) = match cidr.split_once('/') {
        Some((addr, len)) => (addr, Some(len.parse::<u8>().ok()?)),
        None => (cidr, None),
    };
    Some((Some(addr.parse().ok()?), len))
}

/// `eth0.100` -> (`Some(100)`, `Some("eth0")`).
fn split_vlan_name(name: &str) -> (Option<u16>, Option<&str>) {
    match name.rsplit_once('.') {
        Some((parent, tag)) if !parent.is_empty() => match tag.parse::<u16>() {
            Ok(vlan) => (Some(vlan), Some(parent)),
            Err(_) => (None, None),
        },
        _ => (None, None),
    }
}

// ── ifcfg files ─────────────────────────────────────────────────────

/// Declared settings for one interface configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IfcfgEntry {
    /// `DEVICE=`, or the file name suffix when absent.
    pub device: String,
    pub vlan_id: Option<u16>,
    pub physdev: Option<String>,
}

/// Parse `head -v` output over the ifcfg files.
pub fn parse_network_config(device: &DeviceId, text: &str) -> Result<Vec<IfcfgEntry>, ParseError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut sections: Vec<(String, Vec<(&str, String)>)> = Vec::new();
    for line in text.lines() {
        if let Some(caps) = FILE_HEADER.captures(line.trim_end()) {
            let path = caps.name("path").map_or("", |m| m.as_str());
            let stem = path.rsplit('/').next().unwrap_or(path);
            let suffix = stem.strip_prefix("ifcfg-").unwrap_or(stem);
            sections.push((suffix.to_owned(), Vec::new()));
            continue;
        }
        let Some((_, pairs)) = sections.last_mut() else {
            continue;
        };
        let line = line.trim();
        if line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            pairs.push((key.trim(), unquote(value.trim()).to_owned()));
        }
    }

    if sections.is_empty() {
        return Err(ParseError::new(device, "no ==> file <== headers found", text));
    }

    let mut entries = Vec::new();
    for (suffix, pairs) in sections {
        let name = lookup(&pairs, "DEVICE").unwrap_or(&suffix).to_owned();
        if name == "lo" {
            continue;
        }
        let is_vlan = lookup(&pairs, "VLAN").is_some_and(|v| v.eq_ignore_ascii_case("yes"));
        let (dotted_vlan, dotted_parent) = split_vlan_name(&name);

        let vlan_id = lookup(&pairs, "VLAN_ID")
            .and_then(|v| v.parse().ok())
            .or(if is_vlan { dotted_vlan } else { None });
        let physdev = lookup(&pairs, "PHYSDEV")
            .map(str::to_owned)
            .or_else(|| vlan_id.and(dotted_parent.map(str::to_owned)));
        entries.push(IfcfgEntry {
            device: name,
            vlan_id,
            physdev,
        });
    }
    Ok(entries)
}

/// Last non-empty value for `key`; later lines override earlier ones.
fn lookup<'p>(pairs: &'p [(&str, String)], key: &str) -> Option<&'p str> {
    pairs
        .iter()
        .rev()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
        .filter(|v| !v.is_empty())
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value)
}

/// Fill in VLAN tag and parent from declared configuration where the
/// live output did not provide them.
pub fn apply_network_config(records: &mut [InterfaceRecord], entries: &[IfcfgEntry]) {
    for record in records.iter_mut() {
        let Some(entry) = entries.iter().find(|e| e.device == record.name) else {
            continue;
        };
        if record.vlan.is_none() {
            record.vlan = entry.vlan_id;
        }
        if record.parent.is_none() {
            record.parent.clone_from(&entry.physdev);
        }
    }
}

/// VLAN tags of sub-interfaces configured on `parent` under the dotted
/// `<parent>.<tag>` name. Entries named any other way are skipped.
pub fn dotted_vlans_on<'a>(
    entries: &'a [IfcfgEntry],
    parent: &'a str,
) -> impl Iterator<Item = u16> + 'a {
    entries
        .iter()
        .filter(move |e| e.physdev.as_deref() == Some(parent))
        .filter_map(move |e| {
            let vlan = e.vlan_id?;
            (split_vlan_name(&e.device) == (Some(vlan), Some(parent))).then_some(vlan)
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const IP_ADDR: &str = "\
2: eth0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 9000 qdisc mq state UP group default qlen 1000
    link/ether 0c:42:a1:3a:10:00 brd ff:ff:ff:ff:ff:ff
    inet 10.20.3.10/24 brd 10.20.3.255 scope global eth0
       valid_lft forever preferred_lft forever
    inet6 fe80::e42:a1ff:fe3a:1000/64 scope link
       valid_lft forever preferred_lft forever
";

    const IP_ADDR_VLAN: &str = "\
7: eth0.100@eth0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 9000 qdisc noqueue state UP
    link/ether 0c:42:a1:3a:10:00 brd ff:ff:ff:ff:ff:ff
    inet 10.100.3.10/24 brd 10.100.3.255 scope global eth0.100
";

    const IP_ADDR_IB: &str = "\
4: ib0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 4092 qdisc mq state UP
    link/infiniband 80:00:02:08:fe:80:00:00:00:00:00:00:0c:42:a1:03:00:3a:10:00 brd 00:ff:ff:ff
    inet 192.168.50.10/24 scope global ib0
";

    fn node() -> DeviceId {
        "10.20.3.10".into()
    }

    #[test]
    fn ethernet_block() {
        let records = parse_ip_addr(&node(), IP_ADDR).unwrap();
        assert_eq!(records.len(), 1);
        let eth0 = &records[0];
        assert_eq!(eth0.name, "eth0");
        assert_eq!(eth0.mac.to_string(), "0c:42:a1:3a:10:00");
        assert_eq!(eth0.ip, Some("10.20.3.10".parse().unwrap()));
        assert_eq!(eth0.prefix_len, Some(24));
        assert_eq!(eth0.vlan, None);
        assert_eq!(eth0.parent, None);
    }

    #[test]
    fn vlan_subinterface_block() {
        let records = parse_ip_addr(&node(), IP_ADDR_VLAN).unwrap();
        assert_eq!(records[0].name, "eth0.100");
        assert_eq!(records[0].vlan, Some(100));
        assert_eq!(records[0].parent.as_deref(), Some("eth0"));
    }

    #[test]
    fn infiniband_produces_no_record() {
        assert!(parse_ip_addr(&node(), IP_ADDR_IB).unwrap().is_empty());
    }

    #[test]
    fn missing_block_is_an_error() {
        let err = parse_ip_addr(&node(), "Device \"eth7\" does not exist.").unwrap_err();
        assert!(err.reason.contains("no interface block"));
    }

    const IFCFG: &str = "\
==> /etc/sysconfig/network-scripts/ifcfg-eth0 <==
DEVICE=eth0
BOOTPROTO=none
HWADDR=0C:42:A1:3A:10:00
ONBOOT=yes

==> /etc/sysconfig/network-scripts/ifcfg-eth0.100 <==
DEVICE=eth0.100
VLAN=yes
ONBOOT=yes
IPADDR=10.100.3.10

==> /etc/sysconfig/network-scripts/ifcfg-vlan200 <==
# storage backend
DEVICE=\"vlan200\"
VLAN=yes
VLAN_ID=200
PHYSDEV=eth1

==> /etc/sysconfig/network-scripts/ifcfg-lo <==
DEVICE=lo
";

    #[test]
    fn network_config_sections() {
        let entries = parse_network_config(&node(), IFCFG).unwrap();
        assert_eq!(
            entries,
            vec![
                IfcfgEntry {
                    device: "eth0".into(),
                    vlan_id: None,
                    physdev: None,
                },
                IfcfgEntry {
                    device: "eth0.100".into(),
                    vlan_id: Some(100),
                    physdev: Some("eth0".into()),
                },
                IfcfgEntry {
                    device: "vlan200".into(),
                    vlan_id: Some(200),
                    physdev: Some("eth1".into()),
                },
            ]
        );
        assert_eq!(dotted_vlans_on(&entries, "eth0").collect::<Vec<_>>(), vec![100]);
        // `vlan200` rides on eth1 but is not named `eth1.200`.
        assert_eq!(dotted_vlans_on(&entries, "eth1").count(), 0);
    }

    #[test]
    fn network_config_without_headers_is_an_error() {
        assert!(parse_network_config(&node(), "DEVICE=eth0\n").is_err());
    }

    #[test]
    fn apply_enriches_missing_fields_only() {
        let mut records = vec![InterfaceRecord {
            node_id: node(),
            name: "vlan200".into(),
            mac: MacAddress::parse("0c:42:a1:3a:10:01").unwrap(),
            ip: None,
            prefix_len: None,
            vlan: None,
            parent: None,
        }];
        let entries = parse_network_config(&node(), IFCFG).unwrap();
        apply_network_config(&mut records, &entries);
        assert_eq!(records[0].vlan, Some(200));
        assert_eq!(records[0].parent.as_deref(), Some("eth1"));
    }
}
