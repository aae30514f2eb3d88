//! TOML configuration.
//!
//! ```toml
//! [source]
//! admin_url = "https://admin.da.live"
//! init_url = "https://da.live/#/{org}/{repo}{path}/.da/mediaindex"
//! token_env = "DA_ADMIN_TOKEN"
//! timeout_secs = 30
//! max_retries = 2
//!
//! [server]
//! bind = "127.0.0.1:7340"
//! ```
//!
//! Every key is optional. `init_url` may contain `{org}`, `{repo}` and
//! `{path}` placeholders.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_admin_url")]
    pub admin_url: String,
    #[serde(default = "default_init_url")]
    pub init_url: String,
    /// Environment variable holding a bearer token for the admin API.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            admin_url: default_admin_url(),
            init_url: default_init_url(),
            token_env: default_token_env(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_admin_url() -> String {
    "https://admin.da.live".to_string()
}
fn default_init_url() -> String {
    "https://da.live/#/{org}/{repo}{path}/.da/mediaindex".to_string()
}
fn default_token_env() -> String {
    "DA_ADMIN_TOKEN".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

impl SourceConfig {
    /// Read the admin API token from the configured environment variable.
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to defaults.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        Ok(Config::default())
    }
}

fn validate(config: &Config) -> Result<()> {
    let admin_url = &config.source.admin_url;
    if !(admin_url.starts_with("http://") || admin_url.starts_with("https://")) {
        anyhow::bail!("source.admin_url must be an http(s) url, got '{}'", admin_url);
    }

    if config.source.timeout_secs == 0 {
        anyhow::bail!("source.timeout_secs must be > 0");
    }

    if config.source.token_env.trim().is_empty() {
        anyhow::bail!("source.token_env must not be empty");
    }

    if config.server.bind.trim().is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    Ok(())
}
