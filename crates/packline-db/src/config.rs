//! # Runtime Configuration
//!
//! Station settings that live outside the database: where the database is,
//! how the pool is sized, which scan profile to use and how deep undo goes.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     PACKLINE_DB_PATH=/srv/packline/line2.db                            │
//! │     PACKLINE_SCAN_PROFILE=cnc                                          │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/packline/packline.toml (Linux)                           │
//! │     ~/Library/Application Support/com.packline.packline/ (macOS)       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/srv/packline/line2.db"
//! max_connections = 5
//! busy_timeout_secs = 5
//!
//! [scan]
//! profile = "cnc"   # overrides scan.active_profile in the settings table
//!
//! [undo]
//! capacity = 50
//! ```
//!
//! Numbering templates and scan profiles are shared between stations and
//! therefore live in the `settings` table, not here.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::pool::DbConfig;
use packline_core::DEFAULT_UNDO_CAPACITY;

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to write config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Created on first start.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a writer waits on a locked database.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_secs: u64,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("com", "packline", "packline")
        .map(|dirs| dirs.data_dir().join("packline.db"))
        .unwrap_or_else(|| PathBuf::from("packline.db"))
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout() -> u64 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            busy_timeout_secs: default_busy_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Profile name; `None` defers to the `scan.active_profile` setting.
    #[serde(default)]
    pub profile: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UndoSettings {
    #[serde(default = "default_undo_capacity")]
    pub capacity: usize,
}

fn default_undo_capacity() -> usize {
    DEFAULT_UNDO_CAPACITY
}

impl Default for UndoSettings {
    fn default() -> Self {
        UndoSettings {
            capacity: default_undo_capacity(),
        }
    }
}

// =============================================================================
// Packline Config
// =============================================================================

/// Complete station configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PacklineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub scan: ScanSettings,

    #[serde(default)]
    pub undo: UndoSettings,
}

impl PacklineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (packline.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                config = Self::from_file(&path)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns defaults if loading fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    fn from_file(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Writes the configuration as pretty TOML.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ConfigError::Invalid("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Config saved");
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.undo.capacity == 0 {
            return Err(ConfigError::Invalid("undo.capacity must be greater than 0".into()));
        }
        if let Some(profile) = &self.scan.profile {
            if profile.trim().is_empty() {
                return Err(ConfigError::Invalid("scan.profile must not be blank".into()));
            }
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies `PACKLINE_*` overrides read through `lookup`. Unparseable
    /// numbers are logged and ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("PACKLINE_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(max) = lookup("PACKLINE_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring invalid PACKLINE_MAX_CONNECTIONS"),
            }
        }

        if let Some(profile) = lookup("PACKLINE_SCAN_PROFILE") {
            debug!(profile = %profile, "Overriding scan profile from environment");
            self.scan.profile = Some(profile);
        }

        if let Some(capacity) = lookup("PACKLINE_UNDO_CAPACITY") {
            match capacity.parse::<usize>() {
                Ok(n) => self.undo.capacity = n,
                Err(_) => warn!(value = %capacity, "Ignoring invalid PACKLINE_UNDO_CAPACITY"),
            }
        }
    }

    /// `packline.toml` in the platform config directory.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "packline", "packline")
            .map(|dirs| dirs.config_dir().join("packline.toml"))
    }

    /// Pool settings for [`Database::new`](crate::pool::Database::new).
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database.path.clone())
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_secs(self.database.busy_timeout_secs))
    }
}
