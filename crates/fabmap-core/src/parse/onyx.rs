// ── Onyx MAC table ──
//
// `show mac-address-table` prints a fixed-width table:
//
//   -----------------------------------------------------------
//   Vlan    Mac Address         Type         Port\Next Hop
//   -----------------------------------------------------------
//   1       0C:42:A1:D7:6E:5E   Dynamic      Eth1/1
//   1       E4:1D:2D:9E:27:48   Static       CPU
//
//   Number of unicast:    2
//
// Rows are sliced at the header's column offsets, so a value may contain
// spaces as long as it stays inside its column.

use std::sync::LazyLock;

use regex::Regex;

use super::{ParseError, SwitchTable};
use crate::model::{ControlPlaneMac, DeviceId, MacAddress, MacTableEntry};

static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*Vlan\s+Mac Address\s+Type\s+Port").expect("valid header regex")
});
static FOOTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*Number of unicast(?: entries)?\s*:\s*(\d+)").expect("valid footer regex")
});

/// Port name under which the switch lists its own addresses.
const CPU_PORT: &str = "CPU";

struct Columns {
    mac: usize,
    kind: usize,
    port: usize,
}

impl Columns {
    fn from_header(line: &str) -> Option<Self> {
        Some(Self {
            mac: line.find("Mac Address")?,
            kind: line.find("Type")?,
            port: line.find("Port")?,
        })
    }

    fn slice<'a>(row: &'a str, start: usize, end: Option<usize>) -> &'a str {
        let end = end.unwrap_or(row.len()).min(row.len());
        let start = start.min(end);
        row.get(start..end).unwrap_or("").trim()
    }

    fn split<'a>(&self, row: &'a str) -> [&'a str; 3] {
        [
            Self::slice(row, 0, Some(self.mac)),
            Self::slice(row, self.mac, Some(self.kind)),
            Self::slice(row, self.port, None),
        ]
    }
}

/// Parse a `show mac-address-table` transcript.
///
/// The echoed command line and the closing CLI prompt may be present.
pub fn parse_mac_table(device: &DeviceId, transcript: &str) -> Result<SwitchTable, ParseError> {
    let lines = strip_frame(transcript);

    let header_at = lines
        .iter()
        .position(|l| HEADER.is_match(l))
        .ok_or_else(|| ParseError::new(device, "MAC table header not found", transcript))?;
    let columns = lines
        .get(header_at)
        .and_then(|h| Columns::from_header(h))
        .ok_or_else(|| ParseError::new(device, "malformed MAC table header", transcript))?;

    let mut table = SwitchTable::default();
    let mut rows = 0usize;
    let mut footer_count = None;

    for line in lines.iter().skip(header_at + 1) {
        if let Some(caps) = FOOTER.captures(line) {
            footer_count = caps.get(1).and_then(|m| m.as_str().parse::<usize>().ok());
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.chars().all(|c| c == '-') {
            continue;
        }

        let [vlan, mac, port] = columns.split(line);
        let vlan: u16 = vlan
            .parse()
            .map_err(|_| ParseError::new(device, format!("bad VLAN '{vlan}'"), line))?;
        let mac = MacAddress::parse(mac)
            .map_err(|e| ParseError::new(device, e.to_string(), line))?;
        if port.is_empty() {
            return Err(ParseError::new(device, "row has no port", line));
        }
        rows += 1;

        if port.eq_ignore_ascii_case(CPU_PORT) {
            table.control_plane.push(ControlPlaneMac {
                switch_id: device.clone(),
                mac,
            });
        } else {
            table.entries.push(MacTableEntry {
                switch_id: device.clone(),
                port: port.to_owned(),
                mac,
                domain: None,
                vlan: Some(vlan),
            });
        }
    }

    if let Some(expected) = footer_count {
        if expected != rows {
            return Err(ParseError::new(
                device,
                format!("footer reports {expected} unicast entries but {rows} rows were read"),
                transcript,
            ));
        }
    }
    Ok(table)
}

/// Drop the echoed command (first line) and the trailing prompt line.
fn strip_frame(transcript: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = transcript.lines().collect();
    if lines
        .first()
        .is_some_and(|l| l.trim_end().ends_with("show mac-address-table"))
    {
        lines.remove(0);
    }
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    if lines
        .last()
        .is_some_and(|l| l.trim_end().ends_with(['>', '#']))
    {
        lines.pop();
    }
    lines
}
