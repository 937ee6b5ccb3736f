//! Configuration module for netfw
//!
//! Handles loading and merging configuration from multiple sources:
//! - Default values
//! - System configuration (/etc/netfw/netfw.toml)
//! - User configuration (~/.netfw/config.toml)
//! - Project configuration (./netfw.toml)
//! - Environment variables
//! - Command-line arguments (applied by the CLI)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::HttpRuleGroupApi;
use crate::resource::ManagerOptions;
use crate::retry::{Backoff, Jitter, RetryPolicy};

/// Endpoint scheme selecting the in-process service. Anything after it is a
/// file the emulated service is kept in between runs.
pub const MEMORY_ENDPOINT: &str = "memory://";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the firewall service lives
    pub provider: ProviderConfig,

    /// API client behaviour
    pub api: ApiConfig,

    /// State file settings
    pub state: StateConfig,

    /// Output settings
    pub output: OutputConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Provider settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub region: String,

    pub partition: String,

    /// Account used when building ARNs for the in-memory service
    pub account_id: Option<String>,

    /// Explicit endpoint URL, or `memory://`
    pub endpoint: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            partition: "aws".to_string(),
            account_id: None,
            endpoint: None,
        }
    }
}

/// API client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Per-request timeout
    pub timeout_secs: u64,

    /// How long to wait for a deleted rule group to disappear
    pub delete_timeout_secs: u64,

    /// Interval between describe calls while waiting
    pub poll_interval_ms: u64,

    pub retry: RetryConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            delete_timeout_secs: 600,
            poll_interval_ms: 5000,
            retry: RetryConfig::default(),
        }
    }
}

/// Retry settings for transient API errors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay_ms: 200,
            max_delay_ms: 20_000,
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(self.max_retries)
            .initial_delay(Duration::from_millis(self.initial_delay_ms))
            .max_delay(Duration::from_millis(self.max_delay_ms))
            .backoff(Backoff::Exponential {
                multiplier: self.multiplier,
            })
            .jitter(if self.jitter {
                Jitter::Full
            } else {
                Jitter::None
            })
            .build()
    }
}

/// State file settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("netfw.state.json"),
        }
    }
}

/// Output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Enable colored output
    pub color: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { color: true }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level used when no `-v` flag or `RUST_LOG` is given
    pub level: String,

    /// `text` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "text".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from all sources
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Config::default();

        for path in Self::get_config_paths(config_path) {
            if path.exists() {
                config = config.merge_from_file(&path)?;
            }
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Get the list of configuration file paths to check
    fn get_config_paths(explicit_path: Option<&PathBuf>) -> Vec<PathBuf> {
        if let Some(path) = explicit_path {
            return vec![path.clone()];
        }

        let mut paths = vec![PathBuf::from("/etc/netfw/netfw.toml")];

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".netfw/config.toml"));
        }

        paths.push(PathBuf::from("netfw.toml"));

        if let Ok(env_config) = std::env::var("NETFW_CONFIG") {
            paths.push(PathBuf::from(env_config));
        }

        paths
    }

    /// Parse a config file. Format is chosen by extension, TOML otherwise.
    fn parse_file(path: &Path) -> Result<serde_json::Value> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let value = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            _ => toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        };
        Ok(value)
    }

    /// Merge configuration from a file. Only keys present in the file
    /// override the current values.
    fn merge_from_file(&self, path: &Path) -> Result<Self> {
        let overrides = Self::parse_file(path)?;
        let mut merged = serde_json::to_value(self)?;
        merge_values(&mut merged, overrides);
        serde_json::from_value(merged)
            .with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides using `lookup` in place of the process environment.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // NETFW_REGION
        if let Some(region) = lookup("NETFW_REGION") {
            self.provider.region = region;
        }

        // NETFW_PARTITION
        if let Some(partition) = lookup("NETFW_PARTITION") {
            self.provider.partition = partition;
        }

        // NETFW_ACCOUNT_ID
        if let Some(account) = lookup("NETFW_ACCOUNT_ID") {
            self.provider.account_id = Some(account);
        }

        // NETFW_ENDPOINT
        if let Some(endpoint) = lookup("NETFW_ENDPOINT") {
            self.provider.endpoint = Some(endpoint);
        }

        // NETFW_STATE
        if let Some(path) = lookup("NETFW_STATE") {
            self.state.path = PathBuf::from(path);
        }

        // NETFW_TIMEOUT
        if let Some(timeout) = lookup("NETFW_TIMEOUT") {
            if let Ok(n) = timeout.parse() {
                self.api.timeout_secs = n;
            }
        }

        // NETFW_LOG_LEVEL
        if let Some(level) = lookup("NETFW_LOG_LEVEL") {
            self.logging.level = level;
        }

        // NO_COLOR
        if lookup("NO_COLOR").is_some() || lookup("NETFW_NO_COLOR").is_some() {
            self.output.color = false;
        }
    }

    /// Load from a specific file only, without env overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Config::default().merge_from_file(path.as_ref())
    }

    /// Endpoint URL to talk to, falling back to the region's public one.
    pub fn endpoint(&self) -> String {
        self.provider
            .endpoint
            .clone()
            .unwrap_or_else(|| HttpRuleGroupApi::regional_endpoint(&self.provider.region))
    }

    pub fn uses_memory_endpoint(&self) -> bool {
        self.provider
            .endpoint
            .as_deref()
            .is_some_and(|e| e.starts_with(MEMORY_ENDPOINT))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn manager_options(&self) -> ManagerOptions {
        ManagerOptions {
            delete_timeout: Duration::from_secs(self.api.delete_timeout_secs),
            poll_interval: Duration::from_millis(self.api.poll_interval_ms),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.api.retry.to_policy()
    }
}

fn merge_values(base: &mut serde_json::Value, overrides: serde_json::Value) {
    match (base, overrides) {
        (serde_json::Value::Object(base), serde_json::Value::Object(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overrides) => *base = overrides,
    }
}
