// ── Dialect parsers ──
//
// Pure functions from raw command output to normalized records. They
// never touch the network and never guess: output that does not fit
// the expected shape is a `ParseError` carrying the offending text.

pub mod cumulus;
pub mod node;
pub mod onyx;
pub mod probe;

use thiserror::Error;

use crate::model::{ControlPlaneMac, DeviceId, MacTableEntry};

/// Longest excerpt of raw output kept in a [`ParseError`].
const SNIPPET_LIMIT: usize = 200;

/// Output from a device could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{device_id}: {reason} (near: {snippet:?})")]
pub struct ParseError {
    pub device_id: DeviceId,
    pub reason: String,
    /// Truncated excerpt of the input.
    pub snippet: String,
}

impl ParseError {
    pub(crate) fn new(device_id: &DeviceId, reason: impl Into<String>, input: &str) -> Self {
        Self {
            device_id: device_id.clone(),
            reason: reason.into(),
            snippet: snippet(input),
        }
    }
}

fn snippet(input: &str) -> String {
    let trimmed = input.trim();
    match trimmed.char_indices().nth(SNIPPET_LIMIT) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_owned(),
    }
}

/// One switch's forwarding table, split by ownership.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwitchTable {
    /// Addresses learned on ports.
    pub entries: Vec<MacTableEntry>,
    /// Addresses the switch owns itself.
    pub control_plane: Vec<ControlPlaneMac>,
}

impl SwitchTable {
    pub fn extend(&mut self, other: Self) {
        self.entries.extend(other.entries);
        self.control_plane.extend(other.control_plane);
    }
}
