//! Configuration types for clusterplace

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Cluster registry client configuration
    pub registry: RegistryConfig,
    /// Registry readiness watchdog configuration
    pub watchdog: WatchdogConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl DaemonConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, crate::ClusterPlaceError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::ClusterPlaceError::Config(format!("Failed to read config file: {}", e))
        })?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| crate::ClusterPlaceError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that parse but cannot be used
    pub fn validate(&self) -> Result<(), crate::ClusterPlaceError> {
        self.registry.validate()?;
        self.watchdog.validate()
    }
}

/// Cluster registry client configuration
///
/// Without `cluster_url` the client is configured from the kubeconfig
/// (optionally a specific `context`) or the in-cluster environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// API server URL, bypassing kubeconfig (e.g. a `kubectl proxy`)
    pub cluster_url: Option<String>,
    /// Kubeconfig context to use
    pub context: Option<String>,
    /// Namespace holding Cluster objects; all namespaces when unset
    pub namespace: Option<String>,
    /// Connect and read timeout in seconds
    pub timeout_secs: u64,
}

impl RegistryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), crate::ClusterPlaceError> {
        if self.timeout_secs == 0 {
            return Err(crate::ClusterPlaceError::Config(
                "registry.timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            cluster_url: None,
            context: None,
            namespace: None,
            timeout_secs: 5,
        }
    }
}

/// Registry readiness watchdog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Whether to watch for the registry at all
    pub enabled: bool,
    /// Readiness check interval in seconds, must be non-zero
    pub poll_interval_secs: u64,
}

impl WatchdogConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn validate(&self) -> Result<(), crate::ClusterPlaceError> {
        if self.poll_interval_secs == 0 {
            return Err(crate::ClusterPlaceError::Config(
                "watchdog.poll_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: 10,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive
    pub level: String,
    /// Log format (json or text)
    pub format: String,
    /// Log file path (if any)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            file: None,
        }
    }
}
