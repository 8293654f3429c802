// ── Cumulus MAC table ──
//
// `nv show bridge domain <br> mac-table -o json` returns an object keyed
// by row index; older NCLU-era tooling returns an array. Both carry the
// same fields under slightly different names.

use serde::Deserialize;
use serde_json::Value;

use fabmap_remote::BridgeDomain;

use super::{ParseError, SwitchTable};
use crate::model::{ControlPlaneMac, DeviceId, MacAddress, MacTableEntry};

/// Entry types that mark an address as owned by the switch itself.
const LOCAL_ENTRY_TYPES: [&str; 3] = ["permanent", "local", "self"];

#[derive(Debug, Deserialize)]
struct RawEntry {
    mac: Option<String>,
    #[serde(alias = "ifname")]
    interface: Option<String>,
    #[serde(default)]
    vlan: Option<Value>,
    #[serde(rename = "entry-type", alias = "state")]
    entry_type: Option<String>,
}

/// Parse one bridge domain's MAC table.
pub fn parse_mac_table(
    device: &DeviceId,
    bridge: &BridgeDomain,
    json: &str,
) -> Result<SwitchTable, ParseError> {
    let root: Value = serde_json::from_str(json)
        .map_err(|e| ParseError::new(device, format!("invalid JSON: {e}"), json))?;

    let rows: Vec<(String, Value)> = match root {
        Value::Object(map) => map.into_iter().collect(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        _ => {
            return Err(ParseError::new(
                device,
                "expected a JSON object or array of MAC entries",
                json,
            ));
        }
    };

    let mut table = SwitchTable::default();
    for (key, value) in rows {
        let excerpt = value.to_string();
        let raw: RawEntry = serde_json::from_value(value)
            .map_err(|e| ParseError::new(device, format!("entry {key}: {e}"), &excerpt))?;

        let mac_text = raw
            .mac
            .ok_or_else(|| ParseError::new(device, format!("entry {key}: missing mac"), &excerpt))?;
        let mac = MacAddress::parse(&mac_text)
            .map_err(|e| ParseError::new(device, format!("entry {key}: {e}"), &excerpt))?;
        if mac.is_zero() {
            continue;
        }
        let interface = raw.interface.ok_or_else(|| {
            ParseError::new(device, format!("entry {key}: missing interface"), &excerpt)
        })?;

        let is_local = raw
            .entry_type
            .as_deref()
            .is_some_and(|t| LOCAL_ENTRY_TYPES.contains(&t.to_ascii_lowercase().as_str()));
        if is_local || interface == bridge.as_str() {
            table.control_plane.push(ControlPlaneMac {
                switch_id: device.clone(),
                mac,
            });
            continue;
        }

        table.entries.push(MacTableEntry {
            switch_id: device.clone(),
            port: interface,
            mac,
            domain: Some(bridge.to_string()),
            vlan: raw.vlan.as_ref().and_then(vlan_of),
        });
    }
    Ok(table)
}

/// VLAN as a number or a numeric string; anything else means untagged.
fn vlan_of(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|v| u16::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
