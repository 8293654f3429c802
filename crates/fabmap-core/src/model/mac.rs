// ── MacAddress ──
//
// Every table entry, control-plane address and interface record is keyed
// on this type, so parsing is strict: six octets or nothing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Input that is not a 48-bit MAC address in any accepted notation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid MAC address '{raw}'")]
pub struct MacParseError {
    pub raw: String,
}

/// 48-bit MAC address.
///
/// Displayed and serialized as lower-case colon-separated hex
/// (`aa:bb:cc:dd:ee:ff`). Ordering is by octet value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub const ZERO: Self = Self([0; 6]);

    pub const fn from_octets(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// `00:00:00:00:00:00`, used by VXLAN head-end flood entries.
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Group bit set (multicast or broadcast).
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// Parse colon (`aa:bb:..`), dash (`AA-BB-..`), dotted
    /// (`aabb.ccdd.eeff`) or bare (`aabbccddeeff`) notation, any case.
    pub fn parse(raw: &str) -> Result<Self, MacParseError> {
        let err = || MacParseError {
            raw: raw.to_owned(),
        };
        let trimmed = raw.trim();

        let hex: String = if trimmed.contains([':', '-']) {
            let groups: Vec<&str> = trimmed.split([':', '-']).collect();
            if groups.len() != 6 || groups.iter().any(|g| g.is_empty() || g.len() > 2) {
                return Err(err());
            }
            groups.iter().map(|g| format!("{g:0>2}")).collect()
        } else if trimmed.contains('.') {
            let groups: Vec<&str> = trimmed.split('.').collect();
            if groups.len() != 3 || groups.iter().any(|g| g.len() != 4) {
                return Err(err());
            }
            groups.concat()
        } else {
            trimmed.to_owned()
        };

        if hex.len() != 12 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(err());
        }

        let mut octets = [0u8; 6];
        for (octet, pair) in octets.iter_mut().zip(hex.as_bytes().chunks_exact(2)) {
            let pair = std::str::from_utf8(pair).map_err(|_| err())?;
            *octet = u8::from_str_radix(pair, 16).map_err(|_| err())?;
        }
        Ok(Self(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddress {
    type Err = MacParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
