// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Viewer configuration
//!
//! Precedence: built-in defaults < `config.yaml` < `RUNICORN_*` environment
//! variables < command-line flags (applied by the CLI after loading).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot determine home directory")]
    NoHomeDir,

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Top-level configuration, one section per subsystem.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub viewer: ViewerConfig,
    pub remote: RemoteConfig,
    pub assets: AssetsConfig,
    pub enhanced_logging: EnhancedLoggingConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage root. `None` means the platform default
    /// (`<data_dir>/runicorn`).
    pub user_root_dir: Option<PathBuf>,
    /// Hours without a heartbeat before a `running` run is marked
    /// `interrupted`.
    pub zombie_threshold_hours: u64,
    /// Days a soft-deleted run stays in the recycle bin.
    pub recycle_retention_days: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            user_root_dir: None,
            zombie_threshold_hours: 48,
            recycle_retention_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    /// Reconciliation tick interval in seconds.
    pub reconcile_interval_secs: u64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            log_level: "info".to_string(),
            reconcile_interval_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// SSH connect timeout in seconds.
    pub ssh_timeout: u64,
    /// SSH keepalive interval in seconds.
    pub keepalive: u64,
    /// Maximum pooled SSH connections.
    pub max_connections: usize,
    /// Inclusive port range probed for remote Viewer instances.
    pub auto_port_range: (u16, u16),
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            ssh_timeout: 30,
            keepalive: 30,
            max_connections: 8,
            auto_port_range: (20000, 40000),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Blob archive directory. `None` means `<storage_root>/archive`.
    pub archive_dir: Option<PathBuf>,
    pub max_snapshot_size_mb: u64,
    pub enable_deduplication: bool,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            archive_dir: None,
            max_snapshot_size_mb: 512,
            enable_deduplication: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancedLoggingConfig {
    pub capture_console: bool,
    /// `auto` | `keep` | `strip`: how tqdm-style carriage returns are
    /// handled by the SDK; recorded here because the CLI writes the shared
    /// config file.
    pub tqdm_mode: String,
}

impl Default for EnhancedLoggingConfig {
    fn default() -> Self {
        Self { capture_console: true, tqdm_mode: "auto".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub enable_rate_limit: bool,
    pub rate_limit_per_minute: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self { enable_rate_limit: true, rate_limit_per_minute: 600 }
    }
}

impl Config {
    /// Default config file location: `~/.config/runicorn/config.yaml`
    /// (platform equivalent).
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let base = dirs::config_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(base.join("runicorn").join("config.yaml"))
    }

    /// Load from the default location, then apply environment overrides.
    /// A missing file yields defaults, not an error.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_file(&Self::default_path()?)?;
        config.apply_env();
        Ok(config)
    }

    /// Load from an explicit file. A missing file yields defaults.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        serde_yaml::from_str(&text)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    /// Apply `RUNICORN_*` environment overrides in place.
    pub fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("RUNICORN_STORAGE") {
            if !dir.is_empty() {
                self.storage.user_root_dir = Some(PathBuf::from(dir));
            }
        }
        if let Ok(host) = std::env::var("RUNICORN_HOST") {
            if !host.is_empty() {
                self.viewer.host = host;
            }
        }
        if let Ok(port) = std::env::var("RUNICORN_PORT") {
            if let Ok(port) = port.parse() {
                self.viewer.port = port;
            }
        }
        if let Ok(level) = std::env::var("RUNICORN_LOG") {
            if !level.is_empty() {
                self.viewer.log_level = level;
            }
        }
    }

    /// Resolve the effective storage root.
    pub fn storage_root(&self) -> Result<PathBuf, ConfigError> {
        if let Some(dir) = &self.storage.user_root_dir {
            return Ok(dir.clone());
        }
        let base = dirs::data_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(base.join("runicorn"))
    }

    /// Resolve the blob archive directory for a given storage root.
    pub fn archive_dir(&self, storage_root: &Path) -> PathBuf {
        self.assets
            .archive_dir
            .clone()
            .unwrap_or_else(|| storage_root.join("archive"))
    }

    /// Runicorn-private known_hosts file: `~/.runicorn/known_hosts`.
    pub fn known_hosts_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".runicorn").join("known_hosts"))
    }

    /// Rate-limit policy file, next to the main config.
    pub fn rate_limit_path() -> Result<PathBuf, ConfigError> {
        let base = dirs::config_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(base.join("runicorn").join("rate_limit.json"))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
