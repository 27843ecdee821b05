//! Append-only record of applied schema versions, stored inside the store.

use crate::core::db;
use crate::core::error::ShiftError;
use crate::core::introspect;
use crate::core::schemas;
use rusqlite::{Connection, params};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionRecord {
    pub version: i64,
    pub applied_at: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct VersionLedger {
    db_path: PathBuf,
}

impl VersionLedger {
    pub fn new(db_path: &Path) -> Self {
        Self {
            db_path: db_path.to_path_buf(),
        }
    }

    /// Highest recorded version. Missing store, empty store and pre-versioning
    /// stores (application tables but no ledger) all report 0.
    pub fn current_version(&self) -> Result<i64, ShiftError> {
        if !db::store_exists(&self.db_path) {
            return Ok(0);
        }
        let conn = db::db_connect_read_only(&self.db_path)?;
        current_version_in(&conn)
    }

    /// Append one row in its own scoped connection.
    pub fn record(&self, version: i64, description: &str) -> Result<(), ShiftError> {
        let conn = db::db_connect(&self.db_path)?;
        record_in(&conn, version, description)
    }

    pub fn history(&self) -> Result<Vec<VersionRecord>, ShiftError> {
        if !db::store_exists(&self.db_path) {
            return Ok(Vec::new());
        }
        let conn = db::db_connect_read_only(&self.db_path)?;
        if !introspect::table_exists_in(&conn, schemas::LEDGER_TABLE)? {
            return Ok(Vec::new());
        }
        let mut stmt = conn.prepare(&format!(
            "SELECT version, COALESCE(applied_at, ''), COALESCE(description, '')
             FROM {} ORDER BY id ASC",
            schemas::LEDGER_TABLE
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(VersionRecord {
                    version: row.get(0)?,
                    applied_at: row.get(1)?,
                    description: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

pub fn current_version_in(conn: &Connection) -> Result<i64, ShiftError> {
    if !introspect::table_exists_in(conn, schemas::LEDGER_TABLE)? {
        return Ok(0);
    }
    let sql = format!("SELECT MAX(version) FROM {}", schemas::LEDGER_TABLE);
    let version: Option<i64> = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(version.unwrap_or(0))
}

/// Append one row on a caller-owned connection or transaction. Creates the
/// ledger table on first use.
pub fn record_in(conn: &Connection, version: i64, description: &str) -> Result<(), ShiftError> {
    conn.execute(&schemas::ledger_db_schema(), [])?;
    conn.execute(
        &format!(
            "INSERT INTO {} (version, description) VALUES (?1, ?2)",
            schemas::LEDGER_TABLE
        ),
        params![version, description],
    )?;
    tracing::info!(version, description, "recorded schema version");
    Ok(())
}
