//! Exporter configuration.
//!
//! Optional TOML file at the platform config directory (e.g.
//! `~/.config/imessage-export/config.toml`), merged under any CLI flags:
//!
//! ```toml
//! database_path = "/Users/me/Library/Messages/chat.db"
//! output_dir = "/Users/me/exports"
//! message_limit = 500000
//! update_limit = 10000
//!
//! [oracle]
//! enabled = true
//! timeout_secs = 5
//! lookup_limit = 100
//! ```

use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Contact-directory oracle settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OracleConfig {
    pub enabled: bool,
    pub timeout_secs: u64,
    /// Maximum directory lookups per run.
    pub lookup_limit: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 5,
            lookup_limit: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Message store location; `None` means the platform default.
    pub database_path: Option<PathBuf>,
    /// Where the snapshot and mappings files live; `None` means the
    /// current directory.
    pub output_dir: Option<PathBuf>,
    /// Row limit for full extractions.
    pub message_limit: u64,
    /// Row limit for incremental extractions.
    pub update_limit: u64,
    pub oracle: OracleConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            output_dir: None,
            message_limit: 500_000,
            update_limit: 10_000,
            oracle: OracleConfig::default(),
        }
    }
}

impl AppConfig {
    /// Platform config file location, when one can be determined.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "imessage-export")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Load the config file if one exists; a missing or broken file falls
    /// back to defaults (with a warning for the broken case).
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "ignoring broken config file");
                Self::default()
            }
        }
    }
}
