// ── Runtime discovery configuration ──
//
// These types describe *what* to collect and *how hard* to try.
// They carry credential data and limits, but never touch disk.
// The CLI constructs a `DiscoveryConfig` and hands it in.

use std::collections::BTreeMap;
use std::time::Duration;

use fabmap_remote::{BridgeDomain, Credentials, ExecOptions, InterfaceName, Target};

use crate::correlate::CorrelationOptions;
use crate::error::CoreError;
use crate::model::{DeviceId, DeviceRole, DeviceSpec};

/// Switches sharing one set of credentials.
#[derive(Debug, Clone)]
pub struct SwitchGroup {
    pub credentials: Credentials,
    /// Bridge domains queried on exec-dialect switches.
    pub bridge_domains: Vec<BridgeDomain>,
    pub hosts: Vec<DeviceSpec>,
}

/// Nodes sharing one set of credentials.
#[derive(Debug, Clone)]
pub struct NodeGroup {
    pub credentials: Credentials,
    /// Interfaces queried on every node.
    pub interfaces: Vec<InterfaceName>,
    pub hosts: Vec<DeviceSpec>,
}

/// Concurrency and time limits for one collection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorLimits {
    /// Upper bound on simultaneously open device sessions.
    pub max_sessions: usize,
    /// Budget for all work against a single device.
    pub device_timeout: Duration,
    pub exec: ExecOptions,
}

impl Default for CollectorLimits {
    fn default() -> Self {
        Self {
            max_sessions: 8,
            device_timeout: Duration::from_secs(120),
            exec: ExecOptions::default(),
        }
    }
}

/// Everything a discovery run needs.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub switches: Option<SwitchGroup>,
    pub nodes: Option<NodeGroup>,
    pub limits: CollectorLimits,
    pub correlation: CorrelationOptions,
}

impl DiscoveryConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        let switch_count = self.switches.as_ref().map_or(0, |g| g.hosts.len());
        let node_count = self.nodes.as_ref().map_or(0, |g| g.hosts.len());
        if switch_count + node_count == 0 {
            return Err(CoreError::Config {
                message: "no switches or nodes configured".into(),
            });
        }
        if self.limits.max_sessions == 0 {
            return Err(CoreError::Config {
                message: "max_sessions must be at least 1".into(),
            });
        }
        if let Some(group) = &self.switches {
            check_roles(&group.hosts, DeviceRole::Switch)?;
        }
        if let Some(group) = &self.nodes {
            check_roles(&group.hosts, DeviceRole::Node)?;
        }
        self.check_unique_ids()
    }

    /// Every device id appears once across both groups; the inventory and
    /// graph are keyed by it.
    fn check_unique_ids(&self) -> Result<(), CoreError> {
        let switches = self.switches.iter().flat_map(|g| &g.hosts);
        let nodes = self.nodes.iter().flat_map(|g| &g.hosts);
        let mut seen: BTreeMap<&DeviceId, DeviceRole> = BTreeMap::new();
        for spec in switches.chain(nodes) {
            if let Some(first) = seen.insert(&spec.id, spec.role) {
                let message = if first == spec.role {
                    format!("{} is listed more than once as a {}", spec.id, spec.role)
                } else {
                    format!("{} is listed both as a {first} and as a {}", spec.id, spec.role)
                };
                return Err(CoreError::Config { message });
            }
        }
        Ok(())
    }
}

fn check_roles(hosts: &[DeviceSpec], role: DeviceRole) -> Result<(), CoreError> {
    match hosts.iter().find(|h| h.role != role) {
        Some(h) => Err(CoreError::Config {
            message: format!("{} listed as a {role} but declared as a {}", h.id, h.role),
        }),
        None => Ok(()),
    }
}

/// Session target for `spec` using its group's credentials.
pub(crate) fn target_for(spec: &DeviceSpec, credentials: &Credentials) -> Target {
    Target::new(spec.address.clone(), credentials.clone()).with_port(spec.port)
}
