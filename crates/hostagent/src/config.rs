//! Configuration file support for hostagentd.
//!
//! Loads and validates the daemon configuration from TOML.
//! Default location: /etc/sonic/hostagentd.toml

use crate::host::HostTableConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/sonic/hostagentd.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Host table settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostTableSection {
    /// Widest ECMP group that will be programmed
    #[serde(default = "default_max_ecmp_width")]
    pub max_ecmp_width: usize,

    /// Emit audit records for hardware resource changes
    #[serde(default = "default_audit")]
    pub audit: bool,
}

/// Warm boot settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmBootSection {
    /// Reconcile against the saved hardware state instead of starting empty
    #[serde(default)]
    pub enabled: bool,

    /// Where the simulated ASIC state is saved on exit and read on warm boot
    #[serde(default = "default_hw_state_file")]
    pub hw_state_file: PathBuf,

    /// Remove discovered objects nothing claimed once reconciliation is done
    #[serde(default = "default_purge_orphans")]
    pub purge_orphans: bool,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Complete hostagentd configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostAgentConfig {
    #[serde(default)]
    pub host_table: HostTableSection,

    #[serde(default)]
    pub warm_boot: WarmBootSection,

    #[serde(default)]
    pub logging: LoggingSection,
}

fn default_max_ecmp_width() -> usize {
    HostTableConfig::default().max_ecmp_width
}

fn default_audit() -> bool {
    true
}

fn default_hw_state_file() -> PathBuf {
    PathBuf::from("/var/run/hostagentd/hw_state.json")
}

fn default_purge_orphans() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for HostTableSection {
    fn default() -> Self {
        Self {
            max_ecmp_width: default_max_ecmp_width(),
            audit: default_audit(),
        }
    }
}

impl Default for WarmBootSection {
    fn default() -> Self {
        Self {
            enabled: false,
            hw_state_file: default_hw_state_file(),
            purge_orphans: default_purge_orphans(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl HostAgentConfig {
    /// Load configuration from file, falling back to defaults if the file is missing
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("config file {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    /// Load from the default location or defaults
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_or_default(DEFAULT_CONFIG_PATH)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        fs::write(path.as_ref(), content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host_table.max_ecmp_width == 0 {
            return Err(ConfigError::Invalid(
                "max_ecmp_width must be > 0".to_string(),
            ));
        }

        const LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];
        if !LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "unknown log level '{}'",
                self.logging.level
            )));
        }

        if self.warm_boot.enabled && self.warm_boot.hw_state_file.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "warm_boot.hw_state_file must be set when warm boot is enabled".to_string(),
            ));
        }

        Ok(())
    }

    pub fn host_table_config(&self) -> HostTableConfig {
        HostTableConfig {
            max_ecmp_width: self.host_table.max_ecmp_width,
        }
    }
}
