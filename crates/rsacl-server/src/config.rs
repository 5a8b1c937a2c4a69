//! Configuration management for rsacl.
//!
//! This module provides configuration loading with multiple sources:
//! 1. Default values (hardcoded)
//! 2. Configuration file (YAML)
//! 3. Environment variables (override)
//!
//! Environment variables take precedence over config file values,
//! which take precedence over defaults.
//!
//! # Example
//!
//! ```ignore
//! use rsacl_server::config::ServerConfig;
//!
//! // Load from file with env overrides
//! let config = ServerConfig::load("rsacl.yaml")?;
//!
//! // Or load from environment only
//! let config = ServerConfig::from_env()?;
//! ```

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::Level;

use rsacl_domain::cache::AclCacheConfig;
use rsacl_domain::provider::ProviderConfig;

use crate::observability::LoggingConfig;

/// Configuration of the ACL services.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ServerConfig {
    /// Provider settings
    #[serde(default)]
    pub provider: ProviderSettings,

    /// ACL cache settings
    #[serde(default)]
    pub cache: CacheSettings,

    /// Storage settings
    #[serde(default)]
    pub storage: StorageSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Provider settings.
///
/// - `RSACL_PROVIDER__MAX_DEPTH=10` - Limit parent chains to 10 levels
/// - `RSACL_PROVIDER__TIMEOUT_SECS=5` - Bound every provider operation
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ProviderSettings {
    /// Maximum length of a resolved parent chain
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Timeout of a single provider operation in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            timeout_secs: default_timeout(),
        }
    }
}

impl ProviderSettings {
    /// Provider configuration without cache; the cache is attached by
    /// [`crate::AclServices`].
    pub fn to_provider_config(&self) -> ProviderConfig {
        ProviderConfig::default()
            .with_max_depth(self.max_depth)
            .with_timeout(Duration::from_secs(self.timeout_secs))
    }
}

fn default_max_depth() -> u32 {
    25
}

fn default_timeout() -> u64 {
    30
}

/// ACL cache settings.
///
/// # Example YAML Configuration
///
/// ```yaml
/// cache:
///   enabled: true
///   max_capacity: 50000
///   ttl_secs: 60
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CacheSettings {
    /// Enable the ACL cache (disabled by default)
    #[serde(default)]
    pub enabled: bool,

    /// Maximum number of cached ACLs
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,

    /// Time to live of a cached ACL in seconds
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            max_capacity: default_max_capacity(),
            ttl_secs: default_ttl(),
        }
    }
}

impl CacheSettings {
    pub fn to_cache_config(&self) -> AclCacheConfig {
        AclCacheConfig::default()
            .with_enabled(self.enabled)
            .with_max_capacity(self.max_capacity)
            .with_ttl(Duration::from_secs(self.ttl_secs))
    }
}

fn default_max_capacity() -> u64 {
    10_000
}

fn default_ttl() -> u64 {
    300
}

/// Storage backend settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StorageSettings {
    /// Storage backend type: only "memory" is available
    #[serde(default = "default_storage_backend")]
    pub backend: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
        }
    }
}

fn default_storage_backend() -> String {
    "memory".to_string()
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON format (true for production, false for development)
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl LoggingSettings {
    pub fn to_logging_config(&self) -> LoggingConfig {
        let level = self.level.parse().unwrap_or(Level::INFO);
        let config = if self.json {
            LoggingConfig::json()
        } else {
            LoggingConfig::text()
        };
        config.with_level(level)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable overrides.
    ///
    /// Environment variables are prefixed with `RSACL_` and use `__` as
    /// separator, e.g. `RSACL_CACHE__ENABLED=true` overrides `cache.enabled`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigLoadError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let config = Config::builder()
            .add_source(Config::try_from(&ServerConfig::default())?)
            .add_source(File::from(path).format(FileFormat::Yaml))
            .add_source(
                Environment::with_prefix("RSACL")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let server_config: ServerConfig = config.try_deserialize()?;
        server_config.validate()?;

        Ok(server_config)
    }

    /// Load configuration from environment variables only.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let config = Config::builder()
            .add_source(Config::try_from(&ServerConfig::default())?)
            .add_source(
                Environment::with_prefix("RSACL")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let server_config: ServerConfig = config.try_deserialize()?;
        server_config.validate()?;

        Ok(server_config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.provider.max_depth == 0 {
            return Err(ConfigLoadError::Invalid {
                message: "provider.max_depth must be greater than 0".to_string(),
            });
        }

        if self.provider.timeout_secs == 0 {
            return Err(ConfigLoadError::Invalid {
                message: "provider.timeout_secs must be greater than 0".to_string(),
            });
        }

        if self.cache.enabled && self.cache.max_capacity == 0 {
            return Err(ConfigLoadError::Invalid {
                message: "cache.max_capacity must be greater than 0 when the cache is enabled"
                    .to_string(),
            });
        }

        let valid_backends = ["memory"];
        if !valid_backends.contains(&self.storage.backend.as_str()) {
            return Err(ConfigLoadError::Invalid {
                message: format!(
                    "storage.backend must be one of: {:?}, got: {}",
                    valid_backends, self.storage.backend
                ),
            });
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigLoadError::Invalid {
                message: format!(
                    "logging.level must be one of: {:?}, got: {}",
                    valid_levels, self.logging.level
                ),
            });
        }

        Ok(())
    }
}
