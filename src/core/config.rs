//! Optional `shiftdb.toml` configuration.
//!
//! Lookup order: an explicit path, then `shiftdb.toml` next to the store.
//! No file means defaults; a malformed file is a `ConfigError`.

use crate::core::backup::{self, BackupManager};
use crate::core::error::ShiftError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "shiftdb.toml";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub backup: BackupConfig,
    pub migration: MigrationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct BackupConfig {
    /// Backup directory; relative paths resolve against the store's directory.
    pub dir: Option<PathBuf>,
    /// File name prefix; defaults to the store's file stem.
    pub prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct MigrationConfig {
    /// Record the latest version without executing anything when the store
    /// already has the newest migration's tables and columns.
    pub fast_forward: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self { fast_forward: true }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `shiftdb=debug`.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self, ShiftError> {
        toml::from_str(content).map_err(|e| ShiftError::ConfigError(e.to_string()))
    }

    /// Backup manager for `db_path` honoring the `[backup]` section.
    pub fn backup_manager(&self, db_path: &Path) -> BackupManager {
        let store_dir = db_path.parent().unwrap_or_else(|| Path::new("."));
        let dir = match &self.backup.dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => store_dir.join(dir),
            None => backup::default_backup_dir(db_path),
        };
        let prefix = self
            .backup
            .prefix
            .clone()
            .unwrap_or_else(|| backup::default_prefix(db_path));
        BackupManager::new(db_path, &dir, &prefix)
    }
}

/// Load configuration for the store at `db_path`.
pub fn load_config(explicit: Option<&Path>, db_path: &Path) -> Result<Config, ShiftError> {
    if let Some(path) = explicit {
        let content = fs::read_to_string(path).map_err(|e| {
            ShiftError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        return Config::from_toml(&content);
    }

    if let Some(parent) = db_path.parent() {
        let config_path = parent.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            let content = fs::read_to_string(&config_path).map_err(ShiftError::IoError)?;
            return Config::from_toml(&content);
        }
    }

    // No config = defaults (not an error)
    Ok(Config::default())
}
