use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShiftError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Backup of {} failed: {source}", store.display())]
    BackupFailure {
        store: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Migration v{version} ({description}) failed: {source}")]
    MigrationExecutionFailure {
        version: i64,
        description: String,
        #[source]
        source: rusqlite::Error,
    },
    /// Both the forward migration and the rollback failed. The store is in an
    /// unknown state and needs manual recovery from `backup`.
    #[error(
        "Restore from {} failed after `{execution}`: {source}; manual recovery required",
        backup.display()
    )]
    RestoreFailure {
        backup: PathBuf,
        execution: Box<ShiftError>,
        #[source]
        source: io::Error,
    },
    #[error("Invalid migration catalog: {0}")]
    CatalogError(String),
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl ShiftError {
    /// True for failures that happened while a migration was executing,
    /// whether or not the rollback succeeded.
    pub fn is_execution_failure(&self) -> bool {
        match self {
            ShiftError::MigrationExecutionFailure { .. } => true,
            ShiftError::RestoreFailure { execution, .. } => execution.is_execution_failure(),
            _ => false,
        }
    }

    /// True when the store may be half-migrated and an operator must step in.
    pub fn requires_manual_recovery(&self) -> bool {
        matches!(self, ShiftError::RestoreFailure { .. })
    }
}
