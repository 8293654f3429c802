//! Clap derive structures for the `fabmap` CLI.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand, ValueEnum};

use fabmap_core::SwitchDialect;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// fabmap -- physical topology discovery for leaf/spine fabrics
#[derive(Debug, Parser)]
#[command(
    name = "fabmap",
    version,
    about = "Discover which switch port connects to which node interface",
    long_about = "Reads switch forwarding tables and node interface addresses over SSH\n\
        and correlates them into a port-level topology. Read-only: nothing\n\
        on any switch or node is changed.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config dir)
    #[arg(long, env = "FABMAP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "FABMAP_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty tables (default)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Collect from all configured devices and print the topology
    #[command(alias = "d")]
    Discover(DiscoverArgs),

    /// Inspect configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Discover ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DiscoverArgs {
    /// Switch to collect from; replaces the configured switch list.
    /// Repeatable. DIALECT is `cumulus` or `onyx`; omitted means probe.
    #[arg(long = "switch", value_name = "ADDR[=DIALECT]", value_parser = parse_switch)]
    pub switches: Vec<SwitchArg>,

    /// Node to collect from; replaces the configured node list. Repeatable.
    #[arg(long = "node", value_name = "ADDR")]
    pub nodes: Vec<String>,

    /// Maximum simultaneous SSH sessions
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    pub max_sessions: Option<u16>,

    /// Keep VLAN sub-interfaces separate from their parent interface
    #[arg(long)]
    pub no_subinterface_equivalence: bool,
}

/// A `--switch` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchArg {
    pub address: String,
    pub dialect: Option<SwitchDialect>,
}

fn parse_switch(raw: &str) -> Result<SwitchArg, String> {
    let (address, dialect) = match raw.split_once('=') {
        Some((address, dialect)) => {
            let dialect = SwitchDialect::from_str(dialect.trim()).map_err(|_| {
                format!("unknown dialect '{dialect}' (expected 'cumulus' or 'onyx')")
            })?;
            (address, Some(dialect))
        }
        None => (raw, None),
    };
    let address = address.trim();
    if address.is_empty() {
        return Err("switch address is empty".into());
    }
    Ok(SwitchArg {
        address: address.to_owned(),
        dialect,
    })
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Display the resolved configuration (passwords redacted)
    Show,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn switch_argument_forms() {
        assert_eq!(
            parse_switch("10.0.0.1").unwrap(),
            SwitchArg {
                address: "10.0.0.1".into(),
                dialect: None
            }
        );
        assert_eq!(
            parse_switch("10.0.0.2=Onyx").unwrap().dialect,
            Some(SwitchDialect::Onyx)
        );
        assert!(parse_switch("10.0.0.3=junos").is_err());
        assert!(parse_switch("=cumulus").is_err());
    }
}
