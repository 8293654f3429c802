// ── Discovery facade ──
//
// Collect, then correlate. The report is the single hand-off to whatever
// renders results.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fabmap_remote::{Executor, Transport};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::collector::Collector;
use crate::config::DiscoveryConfig;
use crate::correlate::correlate_with;
use crate::error::CoreError;
use crate::model::{DeviceFailure, TopologyGraph};

/// Outcome of one discovery run.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryReport {
    pub graph: TopologyGraph,
    /// Devices that were unreachable or returned unusable output.
    pub failures: Vec<DeviceFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// One-shot topology discovery over a fixed configuration.
#[derive(Debug)]
pub struct Discovery {
    config: DiscoveryConfig,
    collector: Collector,
}

impl Discovery {
    /// Discovery over SSH.
    pub fn new(config: DiscoveryConfig) -> Result<Self, CoreError> {
        let executor = Executor::ssh(config.limits.exec);
        Self::build(config, executor)
    }

    /// Discovery over a caller-supplied transport.
    pub fn with_transport(
        config: DiscoveryConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, CoreError> {
        let executor = Executor::new(transport, config.limits.exec);
        Self::build(config, executor)
    }

    fn build(config: DiscoveryConfig, executor: Executor) -> Result<Self, CoreError> {
        config.validate()?;
        let collector = Collector::new(executor, config.limits);
        Ok(Self { config, collector })
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Collect from every configured device and correlate the result.
    ///
    /// Returns [`CoreError::Cancelled`] if `cancel` fires before
    /// collection completes; no partial graph is produced.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<DiscoveryReport, CoreError> {
        let started_at = Utc::now();

        let inventory = self
            .collector
            .collect(
                self.config.switches.as_ref(),
                self.config.nodes.as_ref(),
                cancel,
            )
            .await?;

        let graph = correlate_with(&inventory, &self.config.correlation)?;
        let finished_at = Utc::now();

        let summary = graph.summary();
        info!(
            edges = summary.edges,
            links = summary.inter_switch_links,
            failures = inventory.failures.len(),
            elapsed_ms = (finished_at - started_at).num_milliseconds(),
            "discovery finished"
        );

        Ok(DiscoveryReport {
            graph,
            failures: inventory.failures,
            started_at,
            finished_at,
        })
    }
}
