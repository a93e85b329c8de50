use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::env;

use crate::shared::datetime::TimeConfig;

/// Environment variable naming the config file (without extension).
pub const CONFIG_PATH_VAR: &str = "LENSDB_CONFIG";
/// Prefix of per-key overrides, e.g. `LENSDB__SERVER__HTTP_ADDR`.
const ENV_PREFIX: &str = "LENSDB";

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub storage: StorageConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub query: Option<QueryConfig>,
    pub time: Option<TimeConfig>,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one database file per tenant. In-memory when unset.
    pub data_dir: Option<String>,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Tenants provisioned at startup
    #[serde(default)]
    pub tenants: Vec<String>,
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub http_addr: String,
    /// Bearer token required on `/command`; open when unset.
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Daily rolling log files go here; stdout only when unset.
    pub log_dir: Option<String>,
    #[serde(default = "default_stdout_level")]
    pub stdout_level: String,
    #[serde(default = "default_file_level")]
    pub file_level: String,
}

fn default_stdout_level() -> String {
    "info".to_string()
}

fn default_file_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            stdout_level: default_stdout_level(),
            file_level: default_file_level(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct QueryConfig {
    pub default_page_size: Option<u32>,
    pub max_page_size: Option<u32>,
}

/// Reads `$LENSDB_CONFIG` (default `config`, any format the `config` crate
/// knows) and applies `LENSDB_*` environment overrides on top.
pub fn load_settings() -> Result<Settings, ConfigError> {
    let path = env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| "config".to_string());
    Config::builder()
        .add_source(File::with_name(&path))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?
        .try_deserialize()
}

/// Parses settings from TOML text, without environment overrides.
pub fn settings_from_toml(toml: &str) -> Result<Settings, ConfigError> {
    Config::builder()
        .add_source(File::from_str(toml, FileFormat::Toml))
        .build()?
        .try_deserialize()
}
