//! CLI-specific configuration: `--config` resolution and flag overrides
//! on top of `fabmap_config::Config`.

use std::path::PathBuf;

use fabmap_config::{Config, HostEntry, NodeSection, SwitchSection};

use crate::cli::{DiscoverArgs, GlobalOpts};
use crate::error::CliError;

/// The file `--config` names, or the platform default.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(fabmap_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(fabmap_config::load_config(global.config.as_deref())?)
}

/// `--switch` / `--node` replace the configured host lists; credentials
/// and everything else still come from the file and environment.
pub fn apply_discover_overrides(cfg: &mut Config, args: &DiscoverArgs) {
    if !args.switches.is_empty() {
        let section = cfg.switches.get_or_insert_with(SwitchSection::default);
        section.hosts = args
            .switches
            .iter()
            .map(|s| HostEntry {
                dialect: s.dialect,
                ..HostEntry::new(s.address.clone())
            })
            .collect();
    }
    if !args.nodes.is_empty() {
        let section = cfg.nodes.get_or_insert_with(NodeSection::default);
        section.hosts = args.nodes.iter().cloned().map(HostEntry::new).collect();
    }
    if let Some(n) = args.max_sessions {
        cfg.defaults.max_sessions = usize::from(n);
    }
    if args.no_subinterface_equivalence {
        cfg.correlation.subinterface_equivalence = false;
    }
}

#[cfg(test)]
mod tests {
    use fabmap_core::SwitchDialect;

    use super::*;
    use crate::cli::SwitchArg;

    #[test]
    fn flags_replace_host_lists() {
        let mut cfg = Config {
            switches: Some(SwitchSection {
                hosts: vec![HostEntry::new("10.9.9.9")],
                ..SwitchSection::default()
            }),
            ..Config::default()
        };
        let args = DiscoverArgs {
            switches: vec![SwitchArg {
                address: "10.0.0.2".into(),
                dialect: Some(SwitchDialect::Onyx),
            }],
            nodes: vec!["10.20.3.10".into()],
            max_sessions: Some(3),
            no_subinterface_equivalence: true,
        };

        apply_discover_overrides(&mut cfg, &args);

        let switches = cfg.switches.as_ref().map(|s| s.hosts.clone()).unwrap_or_default();
        assert_eq!(switches.len(), 1);
        assert_eq!(switches[0].address, "10.0.0.2");
        assert_eq!(switches[0].dialect, Some(SwitchDialect::Onyx));
        assert_eq!(cfg.nodes.as_ref().map(|n| n.interfaces.len()), Some(2));
        assert_eq!(cfg.defaults.max_sessions, 3);
        assert!(!cfg.correlation.subinterface_equivalence);
    }
}
