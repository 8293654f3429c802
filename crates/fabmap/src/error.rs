//! CLI error types with miette diagnostics.
//!
//! Maps `ConfigError` and `CoreError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use fabmap_config::ConfigError;
use fabmap_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    /// Raised by clap itself on argument errors.
    #[allow(dead_code)]
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const INVALID: i32 = 4;
    pub const CANCELLED: i32 = 130;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────

    #[error("Configuration file not found: {path}")]
    #[diagnostic(
        code(fabmap::no_config),
        help("Check the --config path, or omit it to use the default location.")
    )]
    NoConfig { path: String },

    #[error("No credentials configured for {section}")]
    #[diagnostic(
        code(fabmap::no_credentials),
        help(
            "Set password_env, password or key_file under [{section}],\n\
             or store a password in the system keyring (service 'fabmap', user '{role}/password')."
        )
    )]
    NoCredentials { section: String, role: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(fabmap::validation))]
    Validation { field: String, reason: String },

    #[error("{message}")]
    #[diagnostic(
        code(fabmap::config),
        help("Check the host lists under [switches] / [nodes] in the config file, or the --switch / --node flags.")
    )]
    InvalidConfig { message: String },

    #[error("Config loading failed: {message}")]
    #[diagnostic(code(fabmap::config_load))]
    ConfigLoad { message: String },

    // ── Discovery ────────────────────────────────────────────────────

    #[error("Discovery cancelled")]
    #[diagnostic(code(fabmap::cancelled), help("No partial topology is reported."))]
    Cancelled,

    #[error("Topology graph is inconsistent: {reason}")]
    #[diagnostic(
        code(fabmap::invalid_graph),
        help("This is a bug; please report it with -vv logs attached.")
    )]
    InvalidGraph { reason: String },

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(fabmap::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to render YAML: {0}")]
    #[diagnostic(code(fabmap::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoConfig { .. }
            | Self::NoCredentials { .. }
            | Self::Validation { .. }
            | Self::InvalidConfig { .. }
            | Self::ConfigLoad { .. } => exit_code::CONFIG,
            Self::Cancelled => exit_code::CANCELLED,
            Self::InvalidGraph { .. } => exit_code::INVALID,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Cancelled => Self::Cancelled,
            CoreError::Config { message } => Self::InvalidConfig { message },
            CoreError::InvalidGraph { reason } => Self::InvalidGraph { reason },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NotFound { path } => Self::NoConfig {
                path: path.display().to_string(),
            },
            ConfigError::NoCredentials { role } => Self::NoCredentials {
                section: match role.as_str() {
                    "switch" => "switches".into(),
                    "node" => "nodes".into(),
                    other => other.to_owned(),
                },
                role,
            },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::Discovery(core) => core.into(),
            other @ (ConfigError::Serialization(_) | ConfigError::Figment(_)) => Self::ConfigLoad {
                message: other.to_string(),
            },
        }
    }
}
