//! Configuration loading for pa-query
//!
//! Settings come from a YAML file mapping target names to connection
//! profiles, plus global `query` and `hostname_cache` sections:
//!
//! ```yaml
//! targets:
//!   edge-fw1:
//!     host: 192.0.2.10
//!     api_key: LUFRPT1...
//!     description: Primary edge firewall
//!     location: DC-1
//!   lab-fw:
//!     host: 192.0.2.99
//!     api_key: LUFRPT1...
//!     enabled: false
//! query:
//!   max_retries: 3
//!   retry_delay: 5
//!   max_workers: 5
//! hostname_cache:
//!   enabled: true
//!   ttl_hours: 6
//!   cache_file: config/hostname_cache.json
//! ```
//!
//! Every value except `host` and `api_key` has a default. Target configs are
//! immutable after load.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::constants::{
    DEFAULT_API_PORT, DEFAULT_CACHE_FILE, DEFAULT_CACHE_TTL_HOURS, DEFAULT_MAX_RETRIES,
    DEFAULT_MAX_WORKERS, DEFAULT_RETRY_DELAY_SECS, DEFAULT_TIMEOUT_SECS,
};
use crate::models::ApiKey;
use crate::utils::{ApplianceError, RetryConfig};

/// Connection profile for a single appliance. Immutable after load.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub api_key: ApiKey,
    #[serde(default = "default_true")]
    pub verify_ssl: bool,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_unknown")]
    pub description: String,
    #[serde(default = "default_unknown")]
    pub location: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Per-target override of `query.max_retries`
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// Per-target override of `query.retry_delay` (seconds)
    #[serde(default)]
    pub retry_delay: Option<u64>,
}

impl TargetConfig {
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// Global retry/parallelism settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    pub max_retries: u32,
    /// Fixed delay between retry attempts, in seconds
    pub retry_delay: u64,
    pub max_workers: usize,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY_SECS,
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

/// Hostname cache settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl_hours: i64,
    pub cache_file: PathBuf,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_hours: DEFAULT_CACHE_TTL_HOURS,
            cache_file: PathBuf::from(DEFAULT_CACHE_FILE),
        }
    }
}

/// Top-level application settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(alias = "firewalls")]
    pub targets: BTreeMap<String, TargetConfig>,
    #[serde(default)]
    pub query: QuerySettings,
    #[serde(default)]
    pub hostname_cache: CacheSettings,
}

impl Settings {
    /// Load settings from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ApplianceError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ApplianceError::Configuration(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&raw)
    }

    /// Parse settings from YAML text
    pub fn from_yaml(raw: &str) -> Result<Self, ApplianceError> {
        let settings: Settings = serde_yaml::from_str(raw)
            .map_err(|e| ApplianceError::Configuration(format!("Invalid configuration: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ApplianceError> {
        if self.targets.is_empty() {
            return Err(ApplianceError::Configuration(
                "No target configurations found".to_string(),
            ));
        }
        for (name, target) in &self.targets {
            if target.host.trim().is_empty() {
                return Err(ApplianceError::Configuration(format!(
                    "Target '{}': host must be specified",
                    name
                )));
            }
        }
        if self.query.max_workers == 0 {
            return Err(ApplianceError::Configuration(
                "query.max_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Get a specific target configuration by name
    pub fn get_target(&self, name: &str) -> Option<&TargetConfig> {
        self.targets.get(name)
    }

    /// All targets with `enabled: true`
    pub fn enabled_targets(&self) -> BTreeMap<&str, &TargetConfig> {
        self.targets
            .iter()
            .filter(|(_, t)| t.enabled)
            .map(|(name, t)| (name.as_str(), t))
            .collect()
    }

    /// All targets with `enabled: false`
    pub fn disabled_targets(&self) -> BTreeMap<&str, &TargetConfig> {
        self.targets
            .iter()
            .filter(|(_, t)| !t.enabled)
            .map(|(name, t)| (name.as_str(), t))
            .collect()
    }

    /// Effective retry policy for a target: per-target overrides win over the
    /// global `query` section.
    pub fn retry_config_for(&self, target: &TargetConfig) -> RetryConfig {
        RetryConfig::new(
            target.max_retries.unwrap_or(self.query.max_retries),
            Duration::from_secs(target.retry_delay.unwrap_or(self.query.retry_delay)),
        )
    }
}

fn default_port() -> u16 {
    DEFAULT_API_PORT
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_true() -> bool {
    true
}

fn default_unknown() -> String {
    "Unknown".to_string()
}
