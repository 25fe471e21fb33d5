//! Harbor configuration
//!
//! TOML configuration for the offline cache, split into sections that each
//! implement [`ConfigSection`].
//!
//! # Architecture
//!
//! - **Sections**: `app`, `remote`, `retry` and `sync`, each validating itself
//! - **Graceful degradation**: invalid files can fall back to defaults with warnings
//! - **Atomic writes**: files are written through a temp file, with a `.backup` copy
//! - **Overrides**: `HARBOR_<SECTION>_<FIELD>` environment variables win over the file
//!
//! # Example
//!
//! ```rust,no_run
//! use harbor_config::{Config, ConfigManager};
//!
//! let manager = ConfigManager::new().expect("Failed to initialize config");
//! let config = manager.load_or_default();
//!
//! println!("Remote: {}", config.remote.base_url);
//! ```

mod error;
mod manager;
mod persistence;
mod validation;

pub mod app_config;
mod remote_config;
mod retry_config;
mod sync_config;

pub use error::{ConfigError, ConfigResult, ValidationError};
pub use manager::ConfigManager;
pub use validation::{ConfigSection, Validator};

pub use app_config::{AppConfig, LogLevel};
pub use remote_config::RemoteConfig;
pub use retry_config::RetryConfig;
pub use sync_config::SyncSettings;

use serde::{Deserialize, Serialize};

/// Current config file format version
pub const CONFIG_VERSION: u32 = 1;

/// Every key accepted by [`Config::get`], [`Config::set`] and env overrides
pub const CONFIG_KEYS: &[&str] = &[
    "app.database_path",
    "app.log_level",
    "remote.base_url",
    "remote.resource_path",
    "remote.health_path",
    "remote.timeout_secs",
    "remote.connect_timeout_secs",
    "remote.probe_interval_secs",
    "remote.token",
    "retry.max_attempts",
    "retry.initial_delay_ms",
    "retry.multiplier",
    "retry.max_delay_ms",
    "retry.jitter",
    "sync.auto_sync_on_write",
    "sync.batch_creates",
];

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Config file format version
    pub version: u32,

    /// Application-level settings
    pub app: AppConfig,

    /// Remote service location and timeouts
    pub remote: RemoteConfig,

    /// Backoff for retryable remote failures
    pub retry: RetryConfig,

    /// Sync triggers and batching
    pub sync: SyncSettings,
}

impl Config {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the entire configuration
    ///
    /// Returns all validation errors found across all sections.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(mut e) = self.app.validate() {
            errors.append(&mut e);
        }
        if let Err(mut e) = self.remote.validate() {
            errors.append(&mut e);
        }
        if let Err(mut e) = self.retry.validate() {
            errors.append(&mut e);
        }
        if let Err(mut e) = self.sync.validate() {
            errors.append(&mut e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Merges this config with another, preferring values from `other`
    pub fn merge(&mut self, other: Config) {
        self.app.merge(other.app);
        self.remote.merge(other.remote);
        self.retry.merge(other.retry);
        self.sync.merge(other.sync);
    }

    /// Reads one value by dotted key, e.g. `retry.max_attempts`
    ///
    /// Returns `None` for unset optional values.
    pub fn get(&self, key: &str) -> ConfigResult<Option<String>> {
        let (section, field) = split_key(key)?;
        let table = self.to_table()?;

        Ok(table
            .get(section)
            .and_then(|s| s.get(field))
            .map(|value| match value {
                toml::Value::String(s) => s.clone(),
                other => other.to_string(),
            }))
    }

    /// Sets one value by dotted key, parsing `raw` for the key's type
    ///
    /// The result is not validated; saving does that.
    pub fn set(&mut self, key: &str, raw: &str) -> ConfigResult<()> {
        let (section, field) = split_key(key)?;
        let mut table = self.to_table()?;

        let invalid = |reason: String| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
            reason,
        };

        let section_table = table
            .entry(section)
            .or_insert_with(|| toml::Value::Table(toml::Table::new()))
            .as_table_mut()
            .ok_or_else(|| invalid(format!("'{}' is not a table", section)))?;

        let value = match section_table.get(field) {
            Some(toml::Value::Integer(_)) => raw
                .parse::<i64>()
                .map(toml::Value::Integer)
                .map_err(|e| invalid(e.to_string()))?,
            Some(toml::Value::Float(_)) => raw
                .parse::<f64>()
                .map(toml::Value::Float)
                .map_err(|e| invalid(e.to_string()))?,
            Some(toml::Value::Boolean(_)) => raw
                .parse::<bool>()
                .map(toml::Value::Boolean)
                .map_err(|e| invalid(e.to_string()))?,
            _ => toml::Value::String(raw.to_string()),
        };
        section_table.insert(field.to_string(), value);

        let text = toml::to_string(&table)?;
        *self = toml::from_str(&text).map_err(|e| invalid(e.message().to_string()))?;
        Ok(())
    }

    /// Applies `HARBOR_<SECTION>_<FIELD>` overrides found through `lookup`
    ///
    /// Unparseable values are skipped with a warning. Returns the keys that
    /// were overridden.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Vec<&'static str>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut applied = Vec::new();

        for key in CONFIG_KEYS {
            let variable = env_variable_for(key);
            let Some(raw) = lookup(&variable) else {
                continue;
            };

            match self.set(key, &raw) {
                Ok(()) => {
                    log::debug!("{} overridden by {}", key, variable);
                    applied.push(*key);
                }
                Err(e) => log::warn!("Ignoring {}: {}", variable, e),
            }
        }

        applied
    }

    fn to_table(&self) -> ConfigResult<toml::Table> {
        let text = toml::to_string(self)?;
        toml::from_str(&text).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            app: AppConfig::default(),
            remote: RemoteConfig::default(),
            retry: RetryConfig::default(),
            sync: SyncSettings::default(),
        }
    }
}

/// Environment variable that overrides `key`
pub fn env_variable_for(key: &str) -> String {
    format!("HARBOR_{}", key.replace('.', "_").to_uppercase())
}

fn split_key(key: &str) -> ConfigResult<(&str, &str)> {
    if !CONFIG_KEYS.contains(&key) {
        return Err(ConfigError::UnknownKey(key.to_string()));
    }
    key.split_once('.')
        .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))
}
