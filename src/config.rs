use crate::connector::ConnectorSettings;
use crate::credentials::{ConfigError, Credentials};
use crate::job::PollPolicy;
use crate::retry::RetryPolicy;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Model assets above this size are staged in object storage
pub const DEFAULT_INLINE_ASSET_LIMIT: u64 = 10 * 1024 * 1024;
pub const DEFAULT_TOKEN_REFRESH_MARGIN_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
pub struct Config {
    /// Flat key/value credential map, see `credentials::keys`
    pub credentials: HashMap<String, String>,
    pub retry: RetryPolicy,
    pub polling: PollPolicy,
    #[serde(default)]
    pub connector: ConnectorConfig,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectorConfig {
    #[serde(default = "default_inline_asset_limit")]
    pub inline_asset_limit: u64,
    #[serde(default = "default_token_refresh_margin_secs")]
    pub token_refresh_margin_secs: u64,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            inline_asset_limit: DEFAULT_INLINE_ASSET_LIMIT,
            token_refresh_margin_secs: DEFAULT_TOKEN_REFRESH_MARGIN_SECS,
        }
    }
}

fn default_inline_asset_limit() -> u64 {
    DEFAULT_INLINE_ASSET_LIMIT
}

fn default_token_refresh_margin_secs() -> u64 {
    DEFAULT_TOKEN_REFRESH_MARGIN_SECS
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// Log file path; rolled by size
    pub path: String,
    /// Maximum size of one log file, in megabytes
    pub size: u64,
    pub max_files: usize,
}

impl Config {
    /// Validated credential set from the `[credentials]` table
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        Credentials::from_map(&self.credentials)
    }

    pub fn connector_settings(&self) -> ConnectorSettings {
        ConnectorSettings {
            retry: self.retry,
            inline_asset_limit: self.connector.inline_asset_limit,
            token_refresh_margin: Duration::from_secs(self.connector.token_refresh_margin_secs),
        }
    }
}

pub fn load_config(path: &str) -> Result<Config> {
    let config_text = fs::read_to_string(Path::new(path))
        .with_context(|| format!("Failed to read configuration file {}", path))?;
    let config: Config = toml::from_str(&config_text)
        .with_context(|| format!("Failed to parse configuration file {}", path))?;
    Ok(config)
}
