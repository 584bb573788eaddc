//! TOML configuration
//!
//! Every section and field has a default, so an empty file is valid.

use crate::builder::BuilderOptions;
use crate::discovery::DEFAULT_PREFIX;
use crate::error::{RedismapError, Result};
use crate::observability::LogConfig;
use crate::retry::RetryPolicy;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Coordination store section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EtcdConfig {
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,
    /// Root of the cluster namespace
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for EtcdConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            prefix: default_prefix(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl EtcdConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn default_endpoints() -> Vec<String> {
    vec!["http://127.0.0.1:2379".to_string()]
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_request_timeout_ms() -> u64 {
    1000
}

/// Cluster keys to report on
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClustersConfig {
    #[serde(default)]
    pub keys: Vec<String>,
}

/// Host probe section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Attempts per probe and per reverse lookup, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_probe_timeout_ms(),
            concurrency: default_concurrency(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl ProbeConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.backoff_ms))
    }

    pub fn builder_options(&self) -> BuilderOptions {
        BuilderOptions {
            probe_timeout: Duration::from_millis(self.timeout_ms),
            concurrency: self.concurrency,
        }
    }
}

fn default_probe_timeout_ms() -> u64 {
    2000
}

fn default_concurrency() -> usize {
    16
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    100
}

/// Logging section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
    /// text or json
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Extra log file, appended to; empty disables it
    #[serde(default)]
    pub file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: String::new(),
        }
    }
}

impl LoggingConfig {
    pub fn to_log_config(&self) -> Result<LogConfig> {
        let level = LogConfig::parse_level(&self.level)
            .ok_or_else(|| RedismapError::Config(format!("invalid log level '{}'", self.level)))?;
        let format = crate::observability::LogFormat::parse(&self.format).ok_or_else(|| {
            RedismapError::Config(format!("invalid log format '{}'", self.format))
        })?;
        let file_path = Some(self.file.trim())
            .filter(|f| !f.is_empty())
            .map(PathBuf::from);
        Ok(LogConfig {
            level,
            format,
            file_path,
        })
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub etcd: EtcdConfig,
    #[serde(default)]
    pub clusters: ClustersConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Parse and validate a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            RedismapError::Config(format!("failed to read '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// `$HOME/.redismap/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".redismap").join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.etcd.endpoints.iter().all(|e| e.trim().is_empty()) {
            return Err(RedismapError::Config(
                "etcd.endpoints must list at least one endpoint".to_string(),
            ));
        }
        if self.etcd.request_timeout_ms == 0 {
            return Err(RedismapError::Config(
                "etcd.request_timeout_ms must be positive".to_string(),
            ));
        }
        if self.probe.timeout_ms == 0 {
            return Err(RedismapError::Config(
                "probe.timeout_ms must be positive".to_string(),
            ));
        }
        if self.probe.concurrency == 0 {
            return Err(RedismapError::Config(
                "probe.concurrency must be at least 1".to_string(),
            ));
        }
        if self.probe.max_attempts == 0 {
            return Err(RedismapError::Config(
                "probe.max_attempts must be at least 1".to_string(),
            ));
        }
        self.logging.to_log_config().map(|_| ())
    }
}
