//! Topology discovery between `fabmap-remote` and the CLI.
//!
//! This crate owns the domain model and everything between raw command
//! output and the finished graph:
//!
//! - **[`Discovery`]** — Facade for one run: collect, correlate, report.
//!
//! - **[`Collector`]** — Fans out one task per device under a session
//!   limit, runs the dialect-appropriate commands through the
//!   [`Executor`](fabmap_remote::Executor), and merges results into an
//!   [`Inventory`]. Per-device failures are recorded, never fatal.
//!
//! - **Parsers** ([`parse`]) — Pure functions for Cumulus JSON tables,
//!   Onyx fixed-width tables, `ip addr` blocks and ifcfg dumps.
//!
//! - **[`correlate()`]** — Joins forwarding tables with node interface
//!   MACs and switch control-plane MACs into a [`TopologyGraph`].
//!
//! - **Domain model** ([`model`]) — `MacAddress`, `Device`, table and
//!   interface records, edges, links and the graph itself.

pub mod collector;
pub mod config;
pub mod correlate;
pub mod discovery;
pub mod error;
pub mod model;
pub mod parse;

// ── Primary re-exports ──────────────────────────────────────────────
pub use collector::{Collector, Inventory};
pub use config::{CollectorLimits, DiscoveryConfig, NodeGroup, SwitchGroup};
pub use correlate::{CorrelationOptions, correlate, correlate_with};
pub use discovery::{Discovery, DiscoveryReport};
pub use error::CoreError;
pub use parse::ParseError;

// Re-export model types at the crate root for ergonomics.
pub use model::{
    CollectionStage, ControlPlaneMac, Device, DeviceFailure, DeviceId, DeviceRole, DeviceSpec,
    EdgeConfidence, FailureKind, InterSwitchLink, InterfaceRecord, LinkConfidence, LinkEnd,
    MacAddress, MacTableEntry, OsDialect, SwitchDialect, TopologyEdge, TopologyGraph,
    TopologySummary, UnmatchedInterface, UnresolvedMac,
};
