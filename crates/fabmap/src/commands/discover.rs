//! `discover` handler.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use fabmap_core::Discovery;

use crate::cli::{DiscoverArgs, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

pub async fn handle(args: &DiscoverArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = config::load(global)?;
    config::apply_discover_overrides(&mut cfg, args);
    let discovery = Discovery::new(fabmap_config::to_discovery_config(&cfg)?)?;

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling discovery");
                cancel.cancel();
            }
        })
    };

    debug!(
        switches = cfg.switches.as_ref().map_or(0, |s| s.hosts.len()),
        nodes = cfg.nodes.as_ref().map_or(0, |n| n.hosts.len()),
        "starting discovery"
    );
    let result = discovery.run(&cancel).await;
    interrupt.abort();
    let report = result?;

    let color = output::should_color(&global.color);
    let rendered = output::render_report(&global.output, &report, color)?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
