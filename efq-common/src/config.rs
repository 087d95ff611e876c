//! Configuration loading and resolution
//!
//! Bootstrap configuration comes from a TOML file. Each value resolves in
//! priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable TOML file is not fatal: services log a warning and
//! continue with defaults.

use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "EFQ_CONFIG";

/// Default TOML file name inside the platform config directory
pub const CONFIG_FILE_NAME: &str = "efq-mv.toml";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    /// Path to the SQLite record store
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// HTTP server port
    #[serde(default)]
    pub port: Option<u16>,

    /// Internal trusted-service credential
    #[serde(default)]
    pub service_key: Option<String>,

    /// Page size for record fetching
    #[serde(default)]
    pub batch_size: Option<usize>,

    /// Upper bound on the notification step
    #[serde(default)]
    pub notify_timeout_ms: Option<u64>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub notification: NotificationConfig,

    /// Replaces the built-in source credibility table when non-empty
    #[serde(default)]
    pub source_tiers: Vec<SourceTierRuleConfig>,

    /// Overrides (or adds) range bands per category
    #[serde(default)]
    pub ranges: BTreeMap<String, RangeCategoryConfig>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Alert email settings
#[derive(Debug, Clone, Deserialize, Default)]
pub struct NotificationConfig {
    /// Recipient of threshold alerts
    #[serde(default)]
    pub operator_email: Option<String>,

    /// Sender address (`Name <addr>` form accepted)
    #[serde(default)]
    pub from: Option<String>,

    /// Resend API key; `EFQ_RESEND_API_KEY` takes priority
    #[serde(default)]
    pub resend_api_key: Option<String>,
}

/// One `(pattern, tier)` row of the source credibility table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceTierRuleConfig {
    pub pattern: String,
    pub tier: u8,
}

/// Range bands for one category
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RangeCategoryConfig {
    pub bands: Vec<RangeBandConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RangeBandConfig {
    pub min: f64,
    pub max: f64,
    pub unit: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Load and parse a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
        Self::parse(&content)
    }

    /// Parse TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load the config file if one can be located, otherwise use defaults
    ///
    /// Never fails: a missing or broken file yields defaults. The returned
    /// [`ConfigSource`] says which file was used or why none was, so the
    /// caller can log it once tracing is initialized.
    pub fn load_or_default(cli_path: Option<&Path>) -> (Self, ConfigSource) {
        let Some(path) = resolve_config_path(cli_path) else {
            return (
                Self::default(),
                ConfigSource::Defaults {
                    reason: "No config file found".to_string(),
                },
            );
        };

        match Self::load(&path) {
            Ok(config) => (config, ConfigSource::File(path)),
            Err(e) => (
                Self::default(),
                ConfigSource::Defaults {
                    reason: e.to_string(),
                },
            ),
        }
    }
}

/// Origin of the active bootstrap configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// Compiled defaults, with the reason no file was used
    Defaults { reason: String },
}

impl ConfigSource {
    /// Log the configuration origin
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded configuration from {}", path.display()),
            ConfigSource::Defaults { reason } => warn!("{} - using compiled defaults", reason),
        }
    }
}

/// Locate the TOML config file
///
/// Priority: CLI argument → `EFQ_CONFIG` → user config dir → `/etc/efq`.
/// An explicit path (CLI or environment) is returned even if it does not
/// exist so the caller can report it.
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let user_config = dirs::config_dir().map(|d| d.join("efq").join(CONFIG_FILE_NAME));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/efq").join(CONFIG_FILE_NAME);
    if cfg!(unix) && system_config.exists() {
        return Some(system_config);
    }

    None
}

/// OS-dependent default location of the record store
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("efq").join("efq.db"))
        .unwrap_or_else(|| PathBuf::from("./efq_data/efq.db"))
}

/// Resolve a secret from environment then TOML
///
/// Blank values are ignored. Logs which source supplied the value, never the
/// value itself.
pub fn resolve_secret(name: &str, env_var: &str, toml_value: Option<&str>) -> Option<String> {
    let env_value = std::env::var(env_var).ok().filter(|v| is_valid_key(v));
    let toml_value = toml_value.filter(|v| is_valid_key(v));

    if env_value.is_some() && toml_value.is_some() {
        warn!(
            "{} found in both environment and TOML. Using environment (highest priority).",
            name
        );
    }

    if let Some(value) = env_value {
        info!("{} loaded from environment variable {}", name, env_var);
        return Some(value);
    }

    if let Some(value) = toml_value {
        info!("{} loaded from TOML config", name);
        return Some(value.to_string());
    }

    None
}

/// Validate a key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
