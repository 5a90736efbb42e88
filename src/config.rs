//! Configuration management for vpnctl.
//!
//! Configuration is loaded from `~/.config/vpnctl/config.toml`. Every field
//! has a default, so a missing file is the same as an empty one.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::timeout::DEFAULT_TIMEOUT;

const APP_NAME: &str = "vpnctl";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// How to reach the daemon.
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Socket path. Falls back to the runtime directory when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket: Option<PathBuf>,
    /// Seconds to wait for the daemon before giving up.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Delay between connection attempts.
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket: None,
            timeout_secs: default_timeout_secs(),
            retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_retry_interval_ms() -> u64 {
    250
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    "vpnctl=warn".to_string()
}

impl Config {
    /// Get the config directory path.
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join(APP_NAME))
            .context("Could not determine config directory")
    }

    /// Get the config file path.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from the default location, using defaults if not found.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, using defaults if it doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.daemon.timeout_secs == 0 {
            bail!("daemon.timeout_secs must be at least 1");
        }
        Ok(())
    }

    /// Resolve the daemon socket path. `flag` comes from `--socket`.
    pub fn socket_path(&self, flag: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = flag.or(self.daemon.socket.as_deref()) {
            return Ok(path.to_path_buf());
        }
        // Prefer XDG_RUNTIME_DIR, fall back to ~/.local/run/vpnctl
        if let Some(runtime_dir) = std::env::var_os("XDG_RUNTIME_DIR") {
            Ok(PathBuf::from(runtime_dir).join(APP_NAME).join("daemon.sock"))
        } else {
            dirs::home_dir()
                .map(|p| p.join(".local/run").join(APP_NAME).join("daemon.sock"))
                .context("Could not determine home directory")
        }
    }

    /// Total time budget. `flag` comes from `--timeout`.
    pub fn timeout(&self, flag: Option<u64>) -> Duration {
        Duration::from_secs(flag.unwrap_or(self.daemon.timeout_secs))
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.daemon.retry_interval_ms)
    }
}
