// ── Inventory collection ──
//
// One task per device on a `JoinSet`. Each task takes a semaphore permit
// before opening any session and runs under the per-device deadline.
// Tasks share nothing mutable: each returns a `Harvest`, and the join
// loop is the only place results are merged.

use std::sync::Arc;
use std::time::Duration;

use fabmap_remote::{
    BridgeDomain, Credentials, Executor, InterfaceName, PromptProfile, RemoteCommand, Target,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{CollectorLimits, NodeGroup, SwitchGroup, target_for};
use crate::error::CoreError;
use crate::model::{
    CollectionStage, ControlPlaneMac, Device, DeviceFailure, DeviceRole, DeviceSpec,
    FailureKind, InterfaceRecord, MacTableEntry, OsDialect, SwitchDialect,
};
use crate::parse::{self, ParseError, SwitchTable};

/// Everything collected in one pass, before correlation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    pub devices: Vec<Device>,
    pub mac_tables: Vec<MacTableEntry>,
    pub control_plane_macs: Vec<ControlPlaneMac>,
    pub interfaces: Vec<InterfaceRecord>,
    pub failures: Vec<DeviceFailure>,
}

impl Inventory {
    fn absorb(&mut self, harvest: Harvest) {
        if let Some(device) = harvest.device {
            self.devices.push(device);
        }
        self.mac_tables.extend(harvest.table.entries);
        self.control_plane_macs.extend(harvest.table.control_plane);
        self.interfaces.extend(harvest.interfaces);
        self.failures.extend(harvest.failures);
    }

    /// Sort everything and drop duplicate table rows, keeping the lowest
    /// VLAN for each `(switch, port, mac)`.
    fn finish(mut self) -> Self {
        self.devices.sort();
        self.mac_tables.sort_by(|x, y| {
            (&x.switch_id, &x.port, x.mac, x.vlan, &x.domain)
                .cmp(&(&y.switch_id, &y.port, y.mac, y.vlan, &y.domain))
        });
        self.mac_tables
            .dedup_by(|b, a| a.switch_id == b.switch_id && a.port == b.port && a.mac == b.mac);
        self.control_plane_macs.sort();
        self.control_plane_macs.dedup();
        self.interfaces.sort();
        self.interfaces
            .dedup_by(|b, a| a.node_id == b.node_id && a.name == b.name);
        self.failures.sort();
        self
    }
}

/// Result of one device task.
#[derive(Debug)]
struct Harvest {
    /// `None` when the device was excluded.
    device: Option<Device>,
    table: SwitchTable,
    interfaces: Vec<InterfaceRecord>,
    failures: Vec<DeviceFailure>,
}

impl Harvest {
    fn new() -> Self {
        Self {
            device: None,
            table: SwitchTable::default(),
            interfaces: Vec::new(),
            failures: Vec::new(),
        }
    }

    fn excluded(failure: DeviceFailure) -> Self {
        Self {
            failures: vec![failure],
            ..Self::new()
        }
    }
}

// ── Collector ───────────────────────────────────────────────────────

/// Collects inventory from all configured devices concurrently.
#[derive(Debug, Clone)]
pub struct Collector {
    executor: Executor,
    limits: CollectorLimits,
}

impl Collector {
    pub fn new(executor: Executor, limits: CollectorLimits) -> Self {
        Self { executor, limits }
    }

    /// Run one collection pass.
    ///
    /// Per-device failures are recorded in the inventory. The only error
    /// is [`CoreError::Cancelled`], in which case every in-flight session
    /// is dropped and nothing collected so far is returned.
    pub async fn collect(
        &self,
        switches: Option<&SwitchGroup>,
        nodes: Option<&NodeGroup>,
        cancel: &CancellationToken,
    ) -> Result<Inventory, CoreError> {
        let permits = Arc::new(Semaphore::new(self.limits.max_sessions.max(1)));
        let deadline = self.limits.device_timeout;
        let mut tasks = JoinSet::new();

        if let Some(group) = switches {
            let ctx = Arc::new(SwitchContext {
                executor: self.executor.clone(),
                credentials: group.credentials.clone(),
                bridge_domains: group.bridge_domains.clone(),
            });
            for spec in &group.hosts {
                let ctx = Arc::clone(&ctx);
                let spec = spec.clone();
                tasks.spawn(bounded(Arc::clone(&permits), deadline, spec.clone(), async move {
                    collect_switch(&ctx, &spec).await
                }));
            }
        }

        if let Some(group) = nodes {
            let ctx = Arc::new(NodeContext {
                executor: self.executor.clone(),
                credentials: group.credentials.clone(),
                interfaces: group.interfaces.clone(),
            });
            for spec in &group.hosts {
                let ctx = Arc::clone(&ctx);
                let spec = spec.clone();
                tasks.spawn(bounded(Arc::clone(&permits), deadline, spec.clone(), async move {
                    collect_node(&ctx, &spec).await
                }));
            }
        }

        info!(devices = tasks.len(), max_sessions = self.limits.max_sessions, "collecting inventory");

        let mut inventory = Inventory::default();
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    warn!(pending = tasks.len(), "collection cancelled");
                    tasks.abort_all();
                    while tasks.join_next().await.is_some() {}
                    return Err(CoreError::Cancelled);
                }
                joined = tasks.join_next() => {
                    let Some(joined) = joined else { break };
                    match joined {
                        Ok(harvest) => inventory.absorb(harvest),
                        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                        Err(e) => warn!(error = %e, "collection task ended without a result"),
                    }
                }
            }
        }

        let inventory = inventory.finish();
        info!(
            devices = inventory.devices.len(),
            entries = inventory.mac_tables.len(),
            interfaces = inventory.interfaces.len(),
            failures = inventory.failures.len(),
            "inventory collected"
        );
        Ok(inventory)
    }
}

/// Run a device task once a session permit is free, under the device
/// deadline. The permit is held until the task finishes.
async fn bounded<F>(permits: Arc<Semaphore>, deadline: Duration, spec: DeviceSpec, work: F) -> Harvest
where
    F: Future<Output = Harvest>,
{
    let Ok(_permit) = permits.acquire_owned().await else {
        return Harvest::excluded(DeviceFailure {
            device_id: spec.id.clone(),
            role: spec.role,
            stage: CollectionStage::Deadline,
            kind: FailureKind::Unreachable,
            detail: "session limiter closed".into(),
        });
    };
    if let Ok(harvest) = tokio::time::timeout(deadline, work).await {
        harvest
    } else {
        warn!(device = %spec.id, timeout_secs = deadline.as_secs(), "device deadline expired");
        Harvest::excluded(DeviceFailure {
            device_id: spec.id.clone(),
            role: spec.role,
            stage: CollectionStage::Deadline,
            kind: FailureKind::Unreachable,
            detail: format!("no result within {}s", deadline.as_secs()),
        })
    }
}

// ── Failure helpers ─────────────────────────────────────────────────

fn remote_failure(
    spec: &DeviceSpec,
    stage: CollectionStage,
    err: &fabmap_remote::Error,
) -> DeviceFailure {
    warn!(device = %spec.id, %stage, error = %err, "collection step failed");
    DeviceFailure::from_remote(&spec.id, spec.role, stage, err)
}

fn parse_failure(spec: &DeviceSpec, stage: CollectionStage, err: &ParseError) -> DeviceFailure {
    warn!(device = %spec.id, %stage, error = %err, "unparseable output");
    DeviceFailure {
        device_id: spec.id.clone(),
        role: spec.role,
        stage,
        kind: FailureKind::ParseError,
        detail: err.to_string(),
    }
}

// ── Switches ────────────────────────────────────────────────────────

struct SwitchContext {
    executor: Executor,
    credentials: Credentials,
    bridge_domains: Vec<BridgeDomain>,
}

/// Outcome of dialect selection.
struct Probed {
    dialect: SwitchDialect,
    /// Hostname seen on the interactive prompt during probing.
    hostname: Option<String>,
    /// A probe session already reached the device.
    reached: bool,
}

async fn collect_switch(ctx: &SwitchContext, spec: &DeviceSpec) -> Harvest {
    let target = target_for(spec, &ctx.credentials);

    let probed = match spec.dialect {
        Some(dialect) => Probed {
            dialect,
            hostname: None,
            reached: false,
        },
        None => match probe_dialect(ctx, spec, &target).await {
            Ok(probed) => probed,
            Err(failure) => return Harvest::excluded(failure),
        },
    };
    debug!(device = %spec.id, dialect = %probed.dialect, "switch dialect selected");

    match probed.dialect {
        SwitchDialect::Cumulus => collect_cumulus(ctx, spec, &target).await,
        SwitchDialect::Onyx => collect_onyx(ctx, spec, &target, probed).await,
    }
}

/// Exec probe first; the interactive probe only if exec reached the
/// device but did not identify it.
async fn probe_dialect(
    ctx: &SwitchContext,
    spec: &DeviceSpec,
    target: &Target,
) -> Result<Probed, DeviceFailure> {
    match ctx.executor.execute(target, &RemoteCommand::OsRelease).await {
        Ok(output) => {
            if let Some(dialect) = parse::probe::dialect_from_os_release(&output.stdout) {
                return Ok(Probed {
                    dialect,
                    hostname: None,
                    reached: true,
                });
            }
        }
        Err(e) if e.is_session_fatal() => {
            return Err(remote_failure(spec, CollectionStage::Probe, &e));
        }
        Err(e) => debug!(device = %spec.id, error = %e, "exec probe inconclusive"),
    }

    let transcript = ctx
        .executor
        .execute_interactive(target, &RemoteCommand::ShowVersion, &PromptProfile::onyx())
        .await
        .map_err(|e| remote_failure(spec, CollectionStage::Probe, &e))?;

    match parse::probe::dialect_from_version(&transcript.raw) {
        Some(dialect) => Ok(Probed {
            dialect,
            hostname: transcript.hostname,
            reached: true,
        }),
        None => {
            warn!(device = %spec.id, "no supported dialect identified");
            Err(DeviceFailure {
                device_id: spec.id.clone(),
                role: spec.role,
                stage: CollectionStage::Probe,
                kind: FailureKind::Unreachable,
                detail: "capability probe did not identify a supported dialect".into(),
            })
        }
    }
}

async fn collect_cumulus(ctx: &SwitchContext, spec: &DeviceSpec, target: &Target) -> Harvest {
    let mut harvest = Harvest::new();

    let hostname = match ctx.executor.execute(target, &RemoteCommand::Hostname).await {
        Ok(output) => match parse::probe::parse_hostname(&spec.id, &output.stdout) {
            Ok(name) => Some(name),
            Err(e) => {
                harvest.failures.push(parse_failure(spec, CollectionStage::Identity, &e));
                None
            }
        },
        Err(e) => {
            let fatal = e.is_session_fatal();
            harvest.failures.push(remote_failure(spec, CollectionStage::Identity, &e));
            if fatal {
                return harvest;
            }
            None
        }
    };

    harvest.device = Some(Device {
        id: spec.id.clone(),
        role: DeviceRole::Switch,
        dialect: OsDialect::Cumulus,
        hostname,
    });

    for bridge in &ctx.bridge_domains {
        let command = RemoteCommand::BridgeMacTable {
            bridge: bridge.clone(),
        };
        match ctx.executor.execute(target, &command).await {
            Ok(output) => match parse::cumulus::parse_mac_table(&spec.id, bridge, &output.stdout) {
                Ok(table) => {
                    debug!(
                        device = %spec.id,
                        bridge = %bridge,
                        entries = table.entries.len(),
                        "bridge MAC table read"
                    );
                    harvest.table.extend(table);
                }
                Err(e) => harvest.failures.push(parse_failure(spec, CollectionStage::MacTable, &e)),
            },
            Err(e) => {
                let fatal = e.is_session_fatal();
                harvest.failures.push(remote_failure(spec, CollectionStage::MacTable, &e));
                if fatal {
                    break;
                }
            }
        }
    }
    harvest
}

async fn collect_onyx(
    ctx: &SwitchContext,
    spec: &DeviceSpec,
    target: &Target,
    probed: Probed,
) -> Harvest {
    let mut harvest = Harvest::new();

    let result = ctx
        .executor
        .execute_interactive(target, &RemoteCommand::MacAddressTable, &PromptProfile::onyx())
        .await;

    let hostname = match result {
        Ok(transcript) => {
            match parse::onyx::parse_mac_table(&spec.id, &transcript.raw) {
                Ok(table) => harvest.table = table,
                Err(e) => harvest.failures.push(parse_failure(spec, CollectionStage::MacTable, &e)),
            }
            transcript.hostname.or(probed.hostname)
        }
        Err(e) => {
            let fatal = e.is_session_fatal();
            harvest.failures.push(remote_failure(spec, CollectionStage::MacTable, &e));
            if fatal && !probed.reached {
                return harvest;
            }
            probed.hostname
        }
    };

    harvest.device = Some(Device {
        id: spec.id.clone(),
        role: DeviceRole::Switch,
        dialect: OsDialect::Onyx,
        hostname,
    });
    harvest
}

// ── Nodes ───────────────────────────────────────────────────────────

struct NodeContext {
    executor: Executor,
    credentials: Credentials,
    interfaces: Vec<InterfaceName>,
}

async fn collect_node(ctx: &NodeContext, spec: &DeviceSpec) -> Harvest {
    let target = target_for(spec, &ctx.credentials);

    let mut harvest = Harvest::new();

    let hostname = match ctx.executor.execute(&target, &RemoteCommand::Hostname).await {
        Ok(output) => match parse::probe::parse_hostname(&spec.id, &output.stdout) {
            Ok(name) => Some(name),
            Err(e) => {
                harvest.failures.push(parse_failure(spec, CollectionStage::Identity, &e));
                None
            }
        },
        Err(e) => {
            let fatal = e.is_session_fatal();
            harvest.failures.push(remote_failure(spec, CollectionStage::Identity, &e));
            if fatal {
                return harvest;
            }
            None
        }
    };

    harvest.device = Some(Device {
        id: spec.id.clone(),
        role: DeviceRole::Node,
        dialect: OsDialect::NodeLinux,
        hostname,
    });

    let ifcfg = match ctx.executor.execute(&target, &RemoteCommand::NetworkConfig).await {
        Ok(output) => parse::node::parse_network_config(&spec.id, &output.stdout)
            .unwrap_or_else(|e| {
                harvest
                    .failures
                    .push(parse_failure(spec, CollectionStage::NetworkConfig, &e));
                Vec::new()
            }),
        Err(e) => {
            harvest
                .failures
                .push(remote_failure(spec, CollectionStage::NetworkConfig, &e));
            Vec::new()
        }
    };

    for interface in interfaces_to_query(&ctx.interfaces, &ifcfg) {
        let command = RemoteCommand::InterfaceAddress {
            interface: interface.clone(),
        };
        match ctx.executor.execute(&target, &command).await {
            Ok(output) => match parse::node::parse_ip_addr(&spec.id, &output.stdout) {
                Ok(records) => harvest.interfaces.extend(records),
                Err(e) => harvest
                    .failures
                    .push(parse_failure(spec, CollectionStage::InterfaceAddress, &e)),
            },
            Err(e) => {
                let fatal = e.is_session_fatal();
                harvest
                    .failures
                    .push(remote_failure(spec, CollectionStage::InterfaceAddress, &e));
                if fatal {
                    break;
                }
            }
        }
    }

    parse::node::apply_network_config(&mut harvest.interfaces, &ifcfg);
    debug!(device = %spec.id, interfaces = harvest.interfaces.len(), "node collected");
    harvest
}

/// Declared interfaces, followed by VLAN sub-interfaces whose ifcfg
/// `DEVICE` is exactly `<declared>.<tag>`. The name queried is rebuilt from
/// the declared parent and the numeric tag, and is only used when it equals
/// a configured device name; other VLAN layouts (`vlan200`) are not queried.
fn interfaces_to_query(
    declared: &[InterfaceName],
    ifcfg: &[parse::node::IfcfgEntry],
) -> Vec<InterfaceName> {
    let mut names = declared.to_vec();
    for parent in declared {
        for vlan in parse::node::dotted_vlans_on(ifcfg, parent.as_str()) {
            match InterfaceName::new(format!("{parent}.{vlan}")) {
                Ok(name) if !names.contains(&name) => names.push(name),
                Ok(_) => {}
                Err(e) => debug!(parent = %parent, vlan, error = %e, "skipping sub-interface"),
            }
        }
    }
    names
}
