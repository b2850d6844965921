//! Configuration management.
//!
//! Settings are layered: serde defaults, then a TOML file, then
//! `ISSUE_SCOUT_*` environment variables (nested keys use `__`, for example
//! `ISSUE_SCOUT_QUOTA__MODERATE_THRESHOLD=50`).
//!
//! # Configuration File Format
//!
//! ```toml
//! [api]
//! base_url = "https://api.github.com"
//! verify_certificates = true
//! timeout_secs = 30
//! connect_timeout_secs = 10
//!
//! [search]
//! page_size = 100
//!
//! [quota]
//! critical_threshold = 5
//! low_threshold = 20
//! moderate_threshold = 100
//! moderate_delay_ms = 2000
//! fallback_delay_ms = 1000
//! secondary_cooldown_secs = 60
//!
//! [logging]
//! level = "info"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::{ClientConfig, DEFAULT_BASE_URL};
use crate::models::MAX_PAGE_SIZE;
use crate::quota::QuotaPolicy;
use crate::utils::default_user_agent;

/// Environment variables checked, in order, for the default credential
pub const TOKEN_ENV_VARS: [&str; 2] = ["ISSUE_SCOUT_TOKEN", "GITHUB_TOKEN"];

const CONFIG_FILE_NAME: &str = "issue-scout.toml";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub search: SearchConfig,

    /// Throttling policy constants
    #[serde(default)]
    pub quota: QuotaConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote API connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer credential; never written out by [`Config::to_toml`]
    #[serde(default = "default_token", skip_serializing)]
    pub token: Option<String>,

    #[serde(default = "default_user_agent_string")]
    pub user_agent: String,

    #[serde(default = "default_true")]
    pub verify_certificates: bool,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: default_token(),
            user_agent: default_user_agent_string(),
            verify_certificates: true,
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_token() -> Option<String> {
    TOKEN_ENV_VARS
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.trim().is_empty())
}

fn default_user_agent_string() -> String {
    default_user_agent().to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

/// Search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Records requested per page (1 to 100)
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

/// Quota throttling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    #[serde(default = "default_critical_threshold")]
    pub critical_threshold: u64,

    #[serde(default = "default_low_threshold")]
    pub low_threshold: u64,

    #[serde(default = "default_moderate_threshold")]
    pub moderate_threshold: u64,

    #[serde(default = "default_reset_buffer_secs")]
    pub reset_buffer_secs: u64,

    #[serde(default = "default_low_ceiling_secs")]
    pub low_ceiling_secs: u64,

    #[serde(default = "default_moderate_delay_ms")]
    pub moderate_delay_ms: u64,

    #[serde(default = "default_fallback_delay_ms")]
    pub fallback_delay_ms: u64,

    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,

    /// Pause before the single retry after a secondary rate limit
    #[serde(default = "default_secondary_cooldown_secs")]
    pub secondary_cooldown_secs: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            critical_threshold: default_critical_threshold(),
            low_threshold: default_low_threshold(),
            moderate_threshold: default_moderate_threshold(),
            reset_buffer_secs: default_reset_buffer_secs(),
            low_ceiling_secs: default_low_ceiling_secs(),
            moderate_delay_ms: default_moderate_delay_ms(),
            fallback_delay_ms: default_fallback_delay_ms(),
            max_wait_secs: default_max_wait_secs(),
            secondary_cooldown_secs: default_secondary_cooldown_secs(),
        }
    }
}

impl QuotaConfig {
    /// Build the throttling policy these settings describe
    pub fn policy(&self) -> QuotaPolicy {
        QuotaPolicy {
            critical_threshold: self.critical_threshold,
            low_threshold: self.low_threshold,
            moderate_threshold: self.moderate_threshold,
            reset_buffer: Duration::from_secs(self.reset_buffer_secs),
            low_ceiling: Duration::from_secs(self.low_ceiling_secs),
            moderate_delay: Duration::from_millis(self.moderate_delay_ms),
            fallback_delay: Duration::from_millis(self.fallback_delay_ms),
            max_wait: Duration::from_secs(self.max_wait_secs),
        }
    }
}

fn default_critical_threshold() -> u64 {
    5
}

fn default_low_threshold() -> u64 {
    20
}

fn default_moderate_threshold() -> u64 {
    100
}

fn default_reset_buffer_secs() -> u64 {
    5
}

fn default_low_ceiling_secs() -> u64 {
    30
}

fn default_moderate_delay_ms() -> u64 {
    2000
}

fn default_fallback_delay_ms() -> u64 {
    1000
}

fn default_max_wait_secs() -> u64 {
    3600 // 1 hour
}

fn default_secondary_cooldown_secs() -> u64 {
    60
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
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

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Client settings for this configuration
    ///
    /// `token` overrides the configured credential. An absent credential is
    /// passed on as empty, which client construction rejects.
    pub fn client_config(&self, token: Option<&str>) -> ClientConfig {
        let token = token
            .map(str::to_string)
            .or_else(|| self.api.token.clone())
            .unwrap_or_default();

        ClientConfig::new(token)
            .base_url(self.api.base_url.clone())
            .user_agent(self.api.user_agent.clone())
            .verify_certificates(self.api.verify_certificates)
            .timeout(Duration::from_secs(self.api.timeout_secs))
            .connect_timeout(Duration::from_secs(self.api.connect_timeout_secs))
            .page_size(self.search.page_size)
            .secondary_cooldown(Duration::from_secs(self.quota.secondary_cooldown_secs))
            .quota_policy(self.quota.policy())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Write as TOML to `path`
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Load error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Serialize error: {0}")]
    Serialize(String),
}

/// Load configuration from a file, with environment overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(env_source())
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Configuration from defaults and environment variables only
pub fn get_config() -> Result<Config, ConfigError> {
    let settings = config::Config::builder().add_source(env_source()).build()?;
    Ok(settings.try_deserialize()?)
}

fn env_source() -> config::Environment {
    config::Environment::with_prefix("ISSUE_SCOUT")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

/// Find a configuration file in the working directory or the user config dir
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("issue-scout").join("config.toml"))
        .filter(|path| path.exists())
}
