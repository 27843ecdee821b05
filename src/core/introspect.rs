//! Read-only schema reflection over the live store.
//!
//! Every answer fails closed: when the store is missing, locked or corrupt the
//! introspector says "absent" instead of raising, and never creates the file.

use crate::core::db;
use crate::core::error::ShiftError;
use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct SchemaIntrospector {
    db_path: PathBuf,
}

impl SchemaIntrospector {
    pub fn new(db_path: &Path) -> Self {
        Self {
            db_path: db_path.to_path_buf(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn table_exists(&self, table: &str) -> bool {
        self.probe("table_exists", |conn| table_exists_in(conn, table))
            .unwrap_or(false)
    }

    pub fn column_exists(&self, table: &str, column: &str) -> bool {
        self.probe("column_exists", |conn| {
            Ok(columns_in(conn, table)?
                .iter()
                .any(|c| c.eq_ignore_ascii_case(column)))
        })
        .unwrap_or(false)
    }

    /// Column names of `table` in declaration order; empty when the table or
    /// the store is missing.
    pub fn columns(&self, table: &str) -> Vec<String> {
        self.probe("columns", |conn| columns_in(conn, table))
            .unwrap_or_default()
    }

    fn probe<F, R>(&self, op: &str, f: F) -> Option<R>
    where
        F: FnOnce(&Connection) -> Result<R, ShiftError>,
    {
        let result = db::db_connect_read_only(&self.db_path).and_then(|conn| f(&conn));
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::debug!(
                    op,
                    store = %self.db_path.display(),
                    error = %e,
                    "introspection failed, treating as absent"
                );
                None
            }
        }
    }
}

/// Same lookup as [`SchemaIntrospector::table_exists`] on a caller-owned
/// connection, so the answer reflects uncommitted work in that session.
pub fn table_exists_in(conn: &Connection, table: &str) -> Result<bool, ShiftError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
            [table],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn columns_in(conn: &Connection, table: &str) -> Result<Vec<String>, ShiftError> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let columns = stmt
        .query_map([table], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fixture() -> (tempfile::TempDir, PathBuf) {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("server.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE users (id INTEGER PRIMARY KEY, username TEXT);")
            .unwrap();
        (tmp, path)
    }

    #[test]
    fn detects_tables_and_columns() {
        let (_tmp, path) = fixture();
        let introspector = SchemaIntrospector::new(&path);
        assert!(introspector.table_exists("users"));
        assert!(!introspector.table_exists("operation_logs"));
        assert!(introspector.column_exists("users", "username"));
        assert!(!introspector.column_exists("users", "deleted_at"));
        assert_eq!(introspector.columns("users"), vec!["id", "username"]);
    }

    #[test]
    fn identifier_lookup_is_case_insensitive() {
        let (_tmp, path) = fixture();
        let introspector = SchemaIntrospector::new(&path);
        assert!(introspector.table_exists("USERS"));
        assert!(introspector.column_exists("Users", "UserName"));
    }

    #[test]
    fn missing_store_fails_closed_without_creating_it() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nope.db");
        let introspector = SchemaIntrospector::new(&path);
        assert!(!introspector.table_exists("users"));
        assert!(!introspector.column_exists("users", "id"));
        assert!(introspector.columns("users").is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn garbage_file_fails_closed() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("corrupt.db");
        std::fs::write(&path, b"definitely not a sqlite database file at all").unwrap();
        let introspector = SchemaIntrospector::new(&path);
        assert!(!introspector.table_exists("users"));
        assert!(!introspector.column_exists("users", "id"));
    }
}
