use crate::core::error;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;

/// Busy timeout applied to every store connection.
const BUSY_TIMEOUT_SECS: u64 = 5;

/// Open the store read-write, creating the file if needed.
///
/// The store stays in rollback-journal mode. A closed store is always a
/// single complete file, which is what the backup manager copies.
pub fn db_connect(db_path: &Path) -> Result<Connection, error::ShiftError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(BUSY_TIMEOUT_SECS))
        .map_err(error::ShiftError::RusqliteError)?;
    conn.execute("PRAGMA foreign_keys=ON;", [])
        .map_err(error::ShiftError::RusqliteError)?;
    Ok(conn)
}

/// Open an existing store read-only. Never creates the file.
pub fn db_connect_read_only(db_path: &Path) -> Result<Connection, error::ShiftError> {
    if !store_exists(db_path) {
        return Err(error::ShiftError::NotFound(format!(
            "store file {} does not exist",
            db_path.display()
        )));
    }
    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.busy_timeout(std::time::Duration::from_secs(BUSY_TIMEOUT_SECS))
        .map_err(error::ShiftError::RusqliteError)?;
    Ok(conn)
}

pub fn store_exists(db_path: &Path) -> bool {
    db_path.is_file()
}
