//! Configuration loading and management.
//!
//! Everything has a usable default so a bare `hackd` starts as a
//! single-host node with local storage. Cluster settings only matter when
//! peers are configured; the shared cookie comes from the environment.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable holding the cluster shared secret.
pub const COOKIE_ENV: &str = "HACKD_COOKIE";

/// Built-in cookie used when the environment does not provide one.
pub const DEFAULT_COOKIE: &str = "hackd-dev-cookie";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Node identity.
    #[serde(default)]
    pub node: NodeConfig,
    /// Cluster membership.
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// Snapshot storage.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Node identity settings.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Human-readable node name, reported by `cluster_info`.
    #[serde(default = "default_node_name")]
    pub name: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self { name: default_node_name() }
    }
}

/// Cluster membership settings. With no listen address and no peers the
/// node runs single-host and the chat election degenerates to "always
/// local".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterConfig {
    /// Address to accept peer links on, e.g. "127.0.0.1:7400".
    #[serde(default)]
    pub listen: Option<String>,
    /// Peer link addresses to connect to at startup.
    #[serde(default)]
    pub peers: Vec<String>,
}

/// Snapshot storage settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Base directory for registry snapshots.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: default_data_dir() }
    }
}

fn default_node_name() -> String {
    "hackd".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load a config file, falling back to defaults when it is absent.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    path = %path.as_ref().display(),
                    "config file not found, using defaults"
                );
                Ok(Config::default())
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// The cluster cookie: `HACKD_COOKIE` when set, built-in default otherwise.
pub fn cluster_cookie() -> String {
    std::env::var(COOKIE_ENV).unwrap_or_else(|_| DEFAULT_COOKIE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.node.name, "hackd");
        assert_eq!(config.storage.data_dir, PathBuf::from("data"));
        assert!(config.cluster.listen.is_none());
        assert!(config.cluster.peers.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [node]
            name = "node-a"

            [cluster]
            listen = "127.0.0.1:7400"
            peers = ["127.0.0.1:7401"]

            [storage]
            data_dir = "/tmp/hackd-a"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.node.name, "node-a");
        assert_eq!(config.cluster.listen.as_deref(), Some("127.0.0.1:7400"));
        assert_eq!(config.cluster.peers, vec!["127.0.0.1:7401".to_string()]);
        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/hackd-a"));
    }

    #[test]
    fn test_partial_sections_use_defaults() {
        let config: Config = toml::from_str("[node]\nname = \"solo\"\n").unwrap();
        assert_eq!(config.node.name, "solo");
        assert_eq!(config.storage.data_dir, PathBuf::from("data"));
    }
}
