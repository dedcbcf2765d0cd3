//! TOML configuration for the daemon.
//!
//! Read from `$LATCHER_CONFIG` if set, otherwise
//! `$XDG_CONFIG_HOME/latcher/config.toml` (falling back to
//! `~/.config/latcher/config.toml`). A missing file yields the defaults, so
//! the daemon works on first run. Example:
//!
//! ```toml
//! [daemon]
//! log_level = "info"
//! autostart = true
//!
//! [[devices]]
//! path = "/dev/input/event3"
//! ```
//!
//! The trigger binding is deliberately not part of the config: it is
//! captured at runtime and lives only for the process lifetime.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither `$LATCHER_CONFIG`, `$XDG_CONFIG_HOME`, nor `$HOME` is set.
    #[error("could not determine config file location")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DaemonConfig {
    #[serde(default)]
    pub daemon: DaemonSection,
    /// Devices to register at startup.
    #[serde(default)]
    pub devices: Vec<DeviceEntry>,
}

/// General daemon behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaemonSection {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    /// Overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Start reading registered devices immediately at launch.
    #[serde(default = "default_true")]
    pub autostart: bool,
}

impl Default for DaemonSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            autostart: default_true(),
        }
    }
}

/// One device to register at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceEntry {
    /// Host-specific device node path.
    pub path: PathBuf,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}

// ── Load ──────────────────────────────────────────────────────────────────────

impl DaemonConfig {
    /// The platform config file location.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        if let Some(path) = std::env::var_os("LATCHER_CONFIG") {
            return Ok(PathBuf::from(path));
        }
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
            .ok_or(ConfigError::NoPlatformConfigDir)?;
        Ok(base.join("latcher").join("config.toml"))
    }

    /// Loads the config at `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::parse(&text)
    }

    fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
