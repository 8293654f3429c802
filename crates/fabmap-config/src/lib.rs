//! Configuration for the fabmap CLI.
//!
//! TOML file + environment layering, per-role credential resolution
//! (env var → keyring → plaintext → key file), and translation into
//! `fabmap_core::DiscoveryConfig`. The CLI applies its flag overrides to
//! [`Config`] before calling [`to_discovery_config`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use fabmap_core::{
    CollectorLimits, CorrelationOptions, CoreError, DeviceRole, DeviceSpec, DiscoveryConfig,
    NodeGroup, SwitchDialect, SwitchGroup,
};
use fabmap_remote::{BridgeDomain, Credentials, DEFAULT_SSH_PORT, ExecOptions, InterfaceName};

/// Keyring service under which `<role>/password` entries are stored.
pub const KEYRING_SERVICE: &str = "fabmap";

const REDACTED: &str = "********";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for role '{role}'")]
    NoCredentials { role: String },

    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error(transparent)]
    Discovery(#[from] CoreError),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub switches: Option<SwitchSection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<NodeSection>,

    #[serde(default)]
    pub correlation: CorrelationOptions,
}

/// Limits, all timeouts in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    #[serde(default = "default_command_timeout")]
    pub command_timeout: u64,

    #[serde(default = "default_prompt_timeout")]
    pub prompt_timeout: u64,

    #[serde(default = "default_device_timeout")]
    pub device_timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            connect_timeout: default_connect_timeout(),
            command_timeout: default_command_timeout(),
            prompt_timeout: default_prompt_timeout(),
            device_timeout: default_device_timeout(),
        }
    }
}

fn default_max_sessions() -> usize {
    8
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_command_timeout() -> u64 {
    30
}
fn default_prompt_timeout() -> u64 {
    15
}
fn default_device_timeout() -> u64 {
    120
}

/// Login settings shared by both device sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Login {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Plaintext password (prefer keyring or env var).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Environment variable name containing the password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    /// Private key used when no password is available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_file: Option<PathBuf>,

    /// Environment variable name containing the key passphrase.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_passphrase_env: Option<String>,
}

/// One device entry under `hosts`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HostEntry {
    pub address: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Switch dialect; omitted means probe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialect: Option<SwitchDialect>,
}

impl HostEntry {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            port: None,
            dialect: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SwitchSection {
    #[serde(flatten)]
    pub login: Login,

    #[serde(default = "default_bridge_domains")]
    pub bridge_domains: Vec<String>,

    #[serde(default)]
    pub hosts: Vec<HostEntry>,
}

impl Default for SwitchSection {
    fn default() -> Self {
        Self {
            login: Login::default(),
            bridge_domains: default_bridge_domains(),
            hosts: Vec::new(),
        }
    }
}

fn default_bridge_domains() -> Vec<String> {
    vec!["br_default".into()]
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NodeSection {
    #[serde(flatten)]
    pub login: Login,

    #[serde(default = "default_interfaces")]
    pub interfaces: Vec<String>,

    #[serde(default)]
    pub hosts: Vec<HostEntry>,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            login: Login::default(),
            interfaces: default_interfaces(),
            hosts: Vec::new(),
        }
    }
}

fn default_interfaces() -> Vec<String> {
    vec!["eth0".into(), "eth1".into()]
}

impl Config {
    /// Copy with every plaintext password replaced.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if let Some(section) = copy.switches.as_mut() {
            redact(&mut section.login);
        }
        if let Some(section) = copy.nodes.as_mut() {
            redact(&mut section.login);
        }
        copy
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn redact(login: &mut Login) {
    if login.password.is_some() {
        login.password = Some(REDACTED.into());
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "fabmap", "fabmap").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("fabmap");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Defaults, then the TOML file at `path`, then `FABMAP_*` variables
/// (`__` separates nesting levels, e.g. `FABMAP_DEFAULTS__MAX_SESSIONS`).
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("FABMAP_").split("__"))
}

/// Load from an explicit file, which must exist, or from the platform
/// path, which may be absent.
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match explicit {
        Some(path) if !path.exists() => {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Some(path) => path.to_path_buf(),
        None => config_path(),
    };
    debug!(path = %path.display(), "loading config");
    Ok(figment(&path).extract()?)
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve credentials for one role: `password_env`, then the system
/// keyring, then a plaintext password, then `key_file`.
pub fn resolve_credentials(login: &Login, role: DeviceRole) -> Result<Credentials, ConfigError> {
    let username = login
        .username
        .clone()
        .ok_or_else(|| ConfigError::Validation {
            field: format!("{}.username", section_name(role)),
            reason: "missing".into(),
        })?;

    // 1. Named env var
    if let Some(ref env_name) = login.password_env {
        match std::env::var(env_name) {
            Ok(val) => return Ok(Credentials::password(username, SecretString::from(val))),
            Err(_) => debug!(%role, var = %env_name, "password env var not set"),
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{role}/password")) {
        if let Ok(secret) = entry.get_password() {
            return Ok(Credentials::password(username, SecretString::from(secret)));
        }
    }

    // 3. Plaintext in config
    if let Some(ref pw) = login.password {
        return Ok(Credentials::password(username, SecretString::from(pw.clone())));
    }

    // 4. Key file
    if let Some(ref path) = login.key_file {
        let passphrase = login
            .key_passphrase_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .map(SecretString::from);
        return Ok(Credentials::key_file(username, path.clone(), passphrase));
    }

    Err(ConfigError::NoCredentials {
        role: role.to_string(),
    })
}

fn section_name(role: DeviceRole) -> &'static str {
    match role {
        DeviceRole::Switch => "switches",
        DeviceRole::Node => "nodes",
    }
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a validated `DiscoveryConfig`. Credentials are resolved only for
/// sections that list at least one host.
pub fn to_discovery_config(config: &Config) -> Result<DiscoveryConfig, ConfigError> {
    let switches = match &config.switches {
        Some(section) if !section.hosts.is_empty() => Some(switch_group(section)?),
        _ => None,
    };
    let nodes = match &config.nodes {
        Some(section) if !section.hosts.is_empty() => Some(node_group(section)?),
        _ => None,
    };

    let discovery = DiscoveryConfig {
        switches,
        nodes,
        limits: limits(&config.defaults)?,
        correlation: config.correlation,
    };
    discovery.validate()?;
    Ok(discovery)
}

fn limits(defaults: &Defaults) -> Result<CollectorLimits, ConfigError> {
    let timeouts = [
        ("connect_timeout", defaults.connect_timeout),
        ("command_timeout", defaults.command_timeout),
        ("prompt_timeout", defaults.prompt_timeout),
        ("device_timeout", defaults.device_timeout),
    ];
    if let Some((name, _)) = timeouts.iter().find(|(_, secs)| *secs == 0) {
        return Err(ConfigError::Validation {
            field: format!("defaults.{name}"),
            reason: "must be at least 1 second".into(),
        });
    }
    Ok(CollectorLimits {
        max_sessions: defaults.max_sessions,
        device_timeout: Duration::from_secs(defaults.device_timeout),
        exec: ExecOptions {
            connect_timeout: Duration::from_secs(defaults.connect_timeout),
            command_timeout: Duration::from_secs(defaults.command_timeout),
            prompt_timeout: Duration::from_secs(defaults.prompt_timeout),
        },
    })
}

fn switch_group(section: &SwitchSection) -> Result<SwitchGroup, ConfigError> {
    let bridge_domains = section
        .bridge_domains
        .iter()
        .map(|raw| {
            BridgeDomain::new(raw).map_err(|e| ConfigError::Validation {
                field: "switches.bridge_domains".into(),
                reason: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let hosts = section
        .hosts
        .iter()
        .map(|h| {
            let spec = DeviceSpec::switch(h.address.clone())
                .with_port(h.port.unwrap_or(DEFAULT_SSH_PORT));
            match h.dialect {
                Some(dialect) => spec.with_dialect(dialect),
                None => spec,
            }
        })
        .collect();

    Ok(SwitchGroup {
        credentials: resolve_credentials(&section.login, DeviceRole::Switch)?,
        bridge_domains,
        hosts,
    })
}

fn node_group(section: &NodeSection) -> Result<NodeGroup, ConfigError> {
    let interfaces = section
        .interfaces
        .iter()
        .map(|raw| {
            InterfaceName::new(raw).map_err(|e| ConfigError::Validation {
                field: "nodes.interfaces".into(),
                reason: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let hosts = section
        .hosts
        .iter()
        .map(|h| {
            if h.dialect.is_some() {
                return Err(ConfigError::Validation {
                    field: "nodes.hosts".into(),
                    reason: format!("{} is a node; dialect applies to switches only", h.address),
                });
            }
            Ok(DeviceSpec::node(h.address.clone()).with_port(h.port.unwrap_or(DEFAULT_SSH_PORT)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(NodeGroup {
        credentials: resolve_credentials(&section.login, DeviceRole::Node)?,
        interfaces,
        hosts,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use figment::Jail;
    use fabmap_remote::AuthMethod;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    const SAMPLE: &str = r#"
[defaults]
max_sessions = 4

[switches]
username = "cumulus"
password = "sw-secret"
hosts = [
  { address = "10.0.0.1" },
  { address = "10.0.0.2", port = 2222, dialect = "onyx" },
]

[nodes]
username = "root"
password_env = "NODE_PW"
interfaces = ["eth0"]
hosts = [{ address = "10.20.3.10" }]
"#;

    fn load(jail: &mut Jail) -> figment::error::Result<Config> {
        jail.create_file("config.toml", SAMPLE)?;
        load_config(Some(Path::new("config.toml"))).map_err(|e| e.to_string().into())
    }

    #[test]
    fn file_values_layer_over_defaults() {
        Jail::expect_with(|jail| {
            let config = load(jail)?;
            assert_eq!(config.defaults.max_sessions, 4);
            assert_eq!(config.defaults.prompt_timeout, 15);
            let switches = config.switches.unwrap();
            assert_eq!(switches.bridge_domains, vec!["br_default"]);
            assert_eq!(switches.hosts[1].port, Some(2222));
            assert_eq!(switches.hosts[1].dialect, Some(SwitchDialect::Onyx));
            assert!(config.correlation.subinterface_equivalence);
            Ok(())
        });
    }

    #[test]
    fn env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.set_env("FABMAP_DEFAULTS__MAX_SESSIONS", "2");
            jail.set_env("FABMAP_CORRELATION__SUBINTERFACE_EQUIVALENCE", "false");
            let config = load(jail)?;
            assert_eq!(config.defaults.max_sessions, 2);
            assert!(!config.correlation.subinterface_equivalence);
            Ok(())
        });
    }

    #[test]
    fn translates_to_discovery_config() {
        Jail::expect_with(|jail| {
            jail.set_env("NODE_PW", "node-secret");
            let config = load(jail)?;
            let discovery = to_discovery_config(&config).unwrap();

            assert_eq!(discovery.limits.max_sessions, 4);
            assert_eq!(discovery.limits.exec.command_timeout, Duration::from_secs(30));

            let switches = discovery.switches.unwrap();
            let ids: Vec<&str> = switches.hosts.iter().map(|h| h.id.as_str()).collect();
            assert_eq!(ids, vec!["10.0.0.1", "10.0.0.2:2222"]);
            assert_eq!(switches.hosts[1].dialect, Some(SwitchDialect::Onyx));
            assert_eq!(switches.credentials.username, "cumulus");

            let nodes = discovery.nodes.unwrap();
            let pw = nodes.credentials.auth.password().unwrap();
            assert_eq!(pw.expose_secret(), "node-secret");
            Ok(())
        });
    }

    #[test]
    fn missing_password_falls_back_to_key_file() {
        let login = Login {
            username: Some("root".into()),
            key_file: Some("/home/ops/.ssh/id_ed25519".into()),
            ..Login::default()
        };
        let creds = resolve_credentials(&login, DeviceRole::Node).unwrap();
        assert!(matches!(creds.auth, AuthMethod::KeyFile { .. }));
    }

    #[test]
    fn no_credentials_is_an_error() {
        let login = Login {
            username: Some("root".into()),
            password_env: Some("FABMAP_TEST_UNSET_PASSWORD".into()),
            ..Login::default()
        };
        let err = resolve_credentials(&login, DeviceRole::Node).unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials { ref role } if role == "node"));
    }

    #[test]
    fn bad_bridge_domain_is_rejected() {
        let config = Config {
            switches: Some(SwitchSection {
                login: Login {
                    username: Some("cumulus".into()),
                    password: Some("pw".into()),
                    ..Login::default()
                },
                bridge_domains: vec!["br; reboot".into()],
                hosts: vec![HostEntry::new("10.0.0.1")],
            }),
            ..Config::default()
        };
        let err = to_discovery_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "switches.bridge_domains"));
    }

    #[test]
    fn empty_config_fails_validation() {
        let err = to_discovery_config(&Config::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Discovery(CoreError::Config { .. })));
    }

    #[test]
    fn redaction_hides_plaintext_passwords() {
        Jail::expect_with(|jail| {
            let config = load(jail)?;
            let shown = config.redacted().to_toml().unwrap();
            assert!(!shown.contains("sw-secret"));
            assert!(shown.contains(REDACTED));
            assert!(shown.contains("NODE_PW"));
            Ok(())
        });
    }

    #[test]
    fn explicit_missing_file_is_not_found() {
        let err = load_config(Some(Path::new("/nonexistent/fabmap.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }
}
