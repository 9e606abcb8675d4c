//! TOML configuration for the `odin` CLI.
//!
//! Every section is optional. A missing file yields [`Config::minimal`], and
//! `ODIN_API_URL` overrides `[api] url` after the file is read.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_api_url")]
    pub url: String,
    /// Applies to request/response calls only. The chat stream has no
    /// client-side timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_api_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_dir")]
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
        }
    }
}

fn default_storage_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("odin-library")
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default = "default_session_minutes")]
    pub session_minutes: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_minutes: default_session_minutes(),
        }
    }
}

fn default_session_minutes() -> i64 {
    30
}

/// One year.
pub const MAX_SESSION_MINUTES: i64 = 60 * 24 * 365;

/// What "clear chat" does to a response that is still streaming.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClearPolicy {
    /// The stream keeps running and still appends its answer after the clear.
    #[default]
    KeepStream,
    /// The stream is closed and its answer is discarded.
    CancelStream,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ChatConfig {
    #[serde(default)]
    pub clear_policy: ClearPolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_min_query_len")]
    pub min_query_len: usize,
    #[serde(default)]
    pub context_range: Option<u32>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_query_len: default_min_query_len(),
            context_range: None,
        }
    }
}

fn default_min_query_len() -> usize {
    5
}

impl Config {
    /// Defaults for every section. Used when no config file exists.
    pub fn minimal() -> Self {
        Self {
            api: ApiConfig::default(),
            storage: StorageConfig::default(),
            auth: AuthConfig::default(),
            chat: ChatConfig::default(),
            search: SearchConfig::default(),
        }
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("ODIN_API_URL") {
            if !url.trim().is_empty() {
                self.api.url = url;
            }
        }
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        parse_config(&content)?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Config::minimal()
    };

    config.apply_env();
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let url = config.api.url.trim();
    if url.is_empty() {
        anyhow::bail!("api.url must not be empty");
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        anyhow::bail!("api.url must start with http:// or https://, got '{}'", url);
    }

    if config.api.timeout_secs == 0 {
        anyhow::bail!("api.timeout_secs must be > 0");
    }

    if config.auth.session_minutes <= 0 {
        anyhow::bail!("auth.session_minutes must be > 0");
    }
    if config.auth.session_minutes > MAX_SESSION_MINUTES {
        anyhow::bail!(
            "auth.session_minutes must be at most {} (one year), got {}",
            MAX_SESSION_MINUTES,
            config.auth.session_minutes
        );
    }

    if config.search.min_query_len == 0 {
        anyhow::bail!("search.min_query_len must be >= 1");
    }

    Ok(())
}
