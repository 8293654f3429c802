// ── Domain model ──
//
// Canonical types shared by the parsers, the collector and the
// correlator.

pub mod device;
pub mod failure;
pub mod mac;
pub mod records;
pub mod topology;

pub use device::{Device, DeviceId, DeviceRole, DeviceSpec, OsDialect, SwitchDialect};
pub use failure::{CollectionStage, DeviceFailure, FailureKind};
pub use mac::{MacAddress, MacParseError};
pub use records::{ControlPlaneMac, InterfaceRecord, MacTableEntry};
pub use topology::{
    EdgeConfidence, InterSwitchLink, LinkConfidence, LinkEnd, TopologyEdge, TopologyGraph,
    TopologySummary, UnmatchedInterface, UnresolvedMac,
};
