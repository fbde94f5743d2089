//! Configuration: one section per subsystem, TOML-backed, env-overridable.

pub mod cache_config;
pub mod defaults;
pub mod device_config;
pub mod observability_config;
pub mod storage_config;
pub mod sync_config;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

pub use cache_config::CacheConfig;
pub use device_config::DeviceConfig;
pub use observability_config::ObservabilityConfig;
pub use storage_config::StorageConfig;
pub use sync_config::SyncConfig;

/// Top-level configuration aggregating all sections.
///
/// Resolution order (highest priority first):
/// 1. Environment variables (`TETHER_*`)
/// 2. Config file passed to [`TetherConfig::load`]
/// 3. Compiled defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TetherConfig {
    pub sync: SyncConfig,
    pub cache: CacheConfig,
    pub storage: StorageConfig,
    pub device: DeviceConfig,
    pub observability: ObservabilityConfig,
}

impl TetherConfig {
    /// Load a config file, apply `TETHER_*` overrides, then validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        let mut config: TetherConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML string. Missing keys take defaults.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::ParseError {
            path: "<string>".to_string(),
            message: e.to_string(),
        })
    }

    /// Apply overrides from an environment lookup.
    ///
    /// Takes the lookup as a closure so callers (and tests) are not tied to
    /// the process environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("TETHER_API_BASE_URL") {
            self.sync.api_base_url = url;
        }
        if let Some(token) = lookup("TETHER_AUTH_TOKEN") {
            self.sync.auth_token = Some(token);
        }
        if let Some(user) = lookup("TETHER_USER_ID") {
            self.sync.user_id = Some(user);
        }
        if let Some(path) = lookup("TETHER_DB_PATH") {
            self.storage.db_path = path;
        }
        if let Some(level) = lookup("TETHER_LOG_LEVEL") {
            self.observability.log_level = level;
        }
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(field: &str, value: u64) -> Result<(), ConfigError> {
            if value == 0 {
                return Err(ConfigError::ValidationFailed {
                    field: field.to_string(),
                    message: "must be greater than 0".to_string(),
                });
            }
            Ok(())
        }

        positive("cache.max_cache_size", self.cache.max_cache_size as u64)?;
        positive("cache.cache_expiry_hours", self.cache.cache_expiry_hours)?;
        positive("sync.request_timeout_ms", self.sync.request_timeout_ms)?;
        positive("sync.auto_sync_interval_ms", self.sync.auto_sync_interval_ms)?;
        positive("sync.max_retries", u64::from(self.sync.max_retries))?;

        if self.sync.id_field.is_empty() {
            return Err(ConfigError::ValidationFailed {
                field: "sync.id_field".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.storage.key_prefix.is_empty() || self.storage.key_prefix.contains(':') {
            return Err(ConfigError::ValidationFailed {
                field: "storage.key_prefix".to_string(),
                message: "must be non-empty and must not contain ':'".to_string(),
            });
        }
        Ok(())
    }
}
