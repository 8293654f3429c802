// ── Capability probe & identity ──

use super::ParseError;
use crate::model::{DeviceId, SwitchDialect};

/// Dialect from `/etc/os-release`, if it describes Cumulus Linux.
pub fn dialect_from_os_release(text: &str) -> Option<SwitchDialect> {
    let is_cumulus = text.lines().any(|line| {
        let Some((key, value)) = line.split_once('=') else {
            return false;
        };
        let value = value.trim().trim_matches('"').to_ascii_lowercase();
        match key.trim() {
            "ID" => value == "cumulus-linux",
            "NAME" | "PRETTY_NAME" => value.contains("cumulus"),
            _ => false,
        }
    });
    is_cumulus.then_some(SwitchDialect::Cumulus)
}

/// Dialect from a `show version` transcript, if it describes Onyx / MLNX-OS.
pub fn dialect_from_version(text: &str) -> Option<SwitchDialect> {
    let lower = text.to_ascii_lowercase();
    let is_onyx = lower.lines().any(|line| {
        let line = line.trim_start();
        (line.starts_with("product name") || line.starts_with("product release") || line.starts_with("version summary"))
            && (line.contains("onyx") || line.contains("mlnx-os"))
    });
    is_onyx.then_some(SwitchDialect::Onyx)
}

/// Hostname from `hostname` output: one non-empty token.
pub fn parse_hostname(device: &DeviceId, text: &str) -> Result<String, ParseError> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    match (lines.next(), lines.next()) {
        (Some(name), None) if !name.contains(char::is_whitespace) => Ok(name.to_owned()),
        (None, _) => Err(ParseError::new(device, "empty hostname", text)),
        _ => Err(ParseError::new(device, "unexpected hostname output", text)),
    }
}
