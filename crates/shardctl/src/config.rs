//! Configuration module for shardctl
//!
//! Supports YAML configuration files with module-based organization

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::dispatch::MemoryExecutorConfig;
use crate::health::HealthMonitorConfig;
use crate::router::QueryRouterConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Health monitor configuration
    #[serde(default)]
    pub health: HealthConfig,
    /// Query routing configuration
    #[serde(default)]
    pub query: QueryConfig,
    /// In-memory executor configuration
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from YAML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_yaml(&content)
    }

    /// Load configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the runtime cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.health.probe_interval_ms == 0 {
            return Err(ConfigError::Invalid("health.probe_interval_ms must be > 0".to_string()));
        }
        if self.health.probe_timeout_ms == 0 {
            return Err(ConfigError::Invalid("health.probe_timeout_ms must be > 0".to_string()));
        }
        if self.query.timeout_ms == 0 {
            return Err(ConfigError::Invalid("query.timeout_ms must be > 0".to_string()));
        }
        if self.server.save_interval_secs == 0 {
            return Err(ConfigError::Invalid("server.save_interval_secs must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP API listen address
    #[serde(default = "default_http_addr")]
    pub http_addr: String,
    /// Directory for the registry file (in-memory only when unset)
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Periodic save interval in seconds
    #[serde(default = "default_save_interval_secs")]
    pub save_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            data_dir: None,
            save_interval_secs: default_save_interval_secs(),
        }
    }
}

impl ServerConfig {
    /// Get save interval as Duration
    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(self.save_interval_secs)
    }
}

/// Health monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Probe round interval in milliseconds
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,
    /// Single probe timeout in milliseconds
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_interval_ms: default_probe_interval_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl HealthConfig {
    pub fn monitor_config(&self) -> HealthMonitorConfig {
        HealthMonitorConfig {
            probe_interval: Duration::from_millis(self.probe_interval_ms),
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
        }
    }
}

/// Query routing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Default deadline for a query in milliseconds
    #[serde(default = "default_query_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_query_timeout_ms(),
        }
    }
}

impl QueryConfig {
    pub fn router_config(&self) -> QueryRouterConfig {
        QueryRouterConfig {
            default_timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

/// In-memory executor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Simulated statement latency in milliseconds
    #[serde(default = "default_execute_latency_ms")]
    pub execute_latency_ms: u64,
    /// Simulated probe latency in milliseconds
    #[serde(default = "default_probe_latency_ms")]
    pub probe_latency_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            execute_latency_ms: default_execute_latency_ms(),
            probe_latency_ms: default_probe_latency_ms(),
        }
    }
}

impl ExecutorConfig {
    pub fn memory_config(&self) -> MemoryExecutorConfig {
        MemoryExecutorConfig {
            execute_latency: Duration::from_millis(self.execute_latency_ms),
            probe_latency: Duration::from_millis(self.probe_latency_ms),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default value functions

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_save_interval_secs() -> u64 {
    60
}

fn default_probe_interval_ms() -> u64 {
    5000
}

fn default_probe_timeout_ms() -> u64 {
    1000
}

fn default_query_timeout_ms() -> u64 {
    30_000
}

fn default_execute_latency_ms() -> u64 {
    50
}

fn default_probe_latency_ms() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
