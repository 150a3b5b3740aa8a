//! Engine configuration
//!
//! YAML-backed settings for the registry connection, validation mode,
//! subject naming, resolution timeout and the startup probe.
//!
//! ```yaml
//! registry:
//!   url: "http://schema-registry:8081"
//!   request_timeout_ms: 10000
//!   auth:
//!     type: basic
//!     username: svc
//!     password: secret
//! validation_mode: relaxed
//! subject_strategy: record_name
//! resolution_timeout_ms: 15000
//! startup:
//!   max_attempts: 3
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::velostream::cache::{CacheManagerBuilder, SerializerCacheManager};
use crate::velostream::observability::TelemetrySink;
use crate::velostream::schema::{
    AuthConfig, HttpRegistryClient, RegistryClient, StartupConfig, SubjectNameStrategy,
    ValidationMode,
};

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {message}")]
    Invalid { message: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Schema registry connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub url: String,
    pub auth: AuthConfig,
    pub request_timeout_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8081".to_string(),
            auth: AuthConfig::None,
            request_timeout_ms: 10_000,
        }
    }
}

impl RegistryConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Top-level engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaEngineConfig {
    pub registry: RegistryConfig,
    pub validation_mode: ValidationMode,
    pub subject_strategy: SubjectNameStrategy,
    pub resolution_timeout_ms: u64,
    pub startup: StartupConfig,
}

impl Default for SchemaEngineConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig::default(),
            validation_mode: ValidationMode::Strict,
            subject_strategy: SubjectNameStrategy::TopicName,
            resolution_timeout_ms: crate::velostream::cache::DEFAULT_RESOLUTION_TIMEOUT.as_millis()
                as u64,
            startup: StartupConfig::default(),
        }
    }
}

impl SchemaEngineConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load, parse and validate a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Loaded schema engine config from {}", path.display());
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let url = self.registry.url.trim();
        if url.is_empty() {
            return Err(invalid("registry.url must not be empty"));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(invalid(format!(
                "registry.url must be an http(s) URL, got '{}'",
                url
            )));
        }
        if self.registry.request_timeout_ms == 0 {
            return Err(invalid("registry.request_timeout_ms must be greater than 0"));
        }
        if self.resolution_timeout_ms == 0 {
            return Err(invalid("resolution_timeout_ms must be greater than 0"));
        }
        match &self.registry.auth {
            AuthConfig::Basic { username, .. } if username.is_empty() => {
                return Err(invalid("registry.auth.username must not be empty"));
            }
            AuthConfig::Bearer { token } if token.is_empty() => {
                return Err(invalid("registry.auth.token must not be empty"));
            }
            _ => {}
        }
        self.startup.validate().map_err(invalid)
    }

    pub fn resolution_timeout(&self) -> Duration {
        Duration::from_millis(self.resolution_timeout_ms)
    }

    /// HTTP client for the configured registry
    pub fn registry_client(&self) -> HttpRegistryClient {
        HttpRegistryClient::new(self.registry.url.trim())
            .with_auth(self.registry.auth.clone())
            .with_timeout(self.registry.request_timeout())
    }

    /// Manager builder with this config's mode, strategy and timeout applied
    pub fn cache_manager_builder(&self, client: Arc<dyn RegistryClient>) -> CacheManagerBuilder {
        SerializerCacheManager::builder(client)
            .validation_mode(self.validation_mode)
            .subject_strategy(self.subject_strategy)
            .resolution_timeout(self.resolution_timeout())
    }

    /// Manager talking to the configured HTTP registry
    pub fn build_cache_manager(&self, sink: Arc<dyn TelemetrySink>) -> SerializerCacheManager {
        self.cache_manager_builder(Arc::new(self.registry_client()))
            .sink(sink)
            .build()
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        message: message.into(),
    }
}
