//! Store snapshots taken before a mutating run, and byte-for-byte restore.
//!
//! Backups live in a `backups` directory next to the store (configurable) as
//! `{prefix}_backup_{YYYYMMDD_HHMMSS}.db`. Files are never pruned.

use crate::core::db;
use crate::core::error::ShiftError;
use crate::core::time;
use chrono::{DateTime, Local};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

pub const BACKUP_DIR_NAME: &str = "backups";

/// Same-second snapshots get a numeric suffix; give up after this many.
const MAX_NAME_ATTEMPTS: u32 = 100;

const COPY_BUF_BYTES: usize = 64 * 1024;

const SIDECAR_SUFFIXES: [&str; 3] = ["-journal", "-wal", "-shm"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupArtifact {
    /// `None` when the store did not exist and nothing was copied.
    pub path: Option<PathBuf>,
    pub created_at: DateTime<Local>,
    pub sha256: Option<String>,
    pub size_bytes: u64,
}

impl BackupArtifact {
    pub fn empty() -> Self {
        Self {
            path: None,
            created_at: Local::now(),
            sha256: None,
            size_bytes: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_none()
    }

    /// Describe an existing backup file, e.g. one picked by an operator.
    pub fn from_file(path: &Path) -> Result<Self, ShiftError> {
        let mut src = File::open(path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                ShiftError::NotFound(format!("backup {}", path.display()))
            } else {
                ShiftError::IoError(e)
            }
        })?;
        let (size_bytes, sha256) = copy_hashing(&mut src, &mut io::sink())?;
        let created_at = fs::metadata(path)?
            .modified()
            .map(DateTime::<Local>::from)
            .unwrap_or_else(|_| Local::now());
        Ok(Self {
            path: Some(path.to_path_buf()),
            created_at,
            sha256: Some(sha256),
            size_bytes,
        })
    }
}

#[derive(Debug, Clone)]
pub struct BackupManager {
    db_path: PathBuf,
    backup_dir: PathBuf,
    prefix: String,
}

impl BackupManager {
    pub fn new(db_path: &Path, backup_dir: &Path, prefix: &str) -> Self {
        Self {
            db_path: db_path.to_path_buf(),
            backup_dir: backup_dir.to_path_buf(),
            prefix: prefix.to_string(),
        }
    }

    /// `backups/` next to the store, prefixed with the store's file stem.
    pub fn for_store(db_path: &Path) -> Self {
        Self::new(db_path, &default_backup_dir(db_path), &default_prefix(db_path))
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Copy the store into a new timestamped backup file. A missing store
    /// yields an empty artifact; any copy failure is a `BackupFailure`.
    pub fn snapshot(&self) -> Result<BackupArtifact, ShiftError> {
        if !db::store_exists(&self.db_path) {
            tracing::info!(store = %self.db_path.display(), "store does not exist, no backup needed");
            return Ok(BackupArtifact::empty());
        }

        match self.copy_out(Local::now()) {
            Ok(artifact) => {
                if let Some(path) = &artifact.path {
                    tracing::info!(
                        backup = %path.display(),
                        size_bytes = artifact.size_bytes,
                        "store backed up"
                    );
                }
                Ok(artifact)
            }
            Err(source) => {
                tracing::error!(store = %self.db_path.display(), error = %source, "store backup failed");
                Err(ShiftError::BackupFailure {
                    store: self.db_path.clone(),
                    source,
                })
            }
        }
    }

    /// Overwrite the live store with the artifact's bytes.
    ///
    /// The copy lands in a temporary sibling first and is renamed over the
    /// store once its digest matches, so a failed restore leaves the current
    /// file in place. Stale journal sidecars are removed before the rename.
    pub fn restore(&self, artifact: &BackupArtifact) -> io::Result<()> {
        let Some(backup) = &artifact.path else {
            tracing::warn!(store = %self.db_path.display(), "empty backup artifact, nothing to restore");
            return Ok(());
        };

        let staging = sibling(&self.db_path, ".restoring");
        let result = self.restore_via(backup, &staging, artifact.sha256.as_deref());
        if result.is_err() {
            let _ = fs::remove_file(&staging);
        }
        match &result {
            Ok(()) => tracing::info!(backup = %backup.display(), "store restored from backup"),
            Err(e) => tracing::error!(backup = %backup.display(), error = %e, "store restore failed"),
        }
        result
    }

    /// Return a store that did not exist before the run to that state by
    /// deleting it along with its sidecars.
    pub fn discard_store(&self) -> io::Result<()> {
        self.remove_sidecars()?;
        match fs::remove_file(&self.db_path) {
            Ok(()) => {
                tracing::info!(store = %self.db_path.display(), "removed store created by the failed run");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                tracing::error!(store = %self.db_path.display(), error = %e, "cannot remove partially created store");
                Err(e)
            }
        }
    }

    pub fn store_path(&self) -> &Path {
        &self.db_path
    }

    /// Backup files for this store, oldest first.
    pub fn list(&self) -> Result<Vec<PathBuf>, ShiftError> {
        if !self.backup_dir.is_dir() {
            return Ok(Vec::new());
        }
        let head = format!("{}_backup_", self.prefix);
        let mut backups = Vec::new();
        for entry in fs::read_dir(&self.backup_dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if path.is_file() && name.starts_with(&head) && name.ends_with(".db") {
                backups.push(path);
            }
        }
        backups.sort();
        Ok(backups)
    }

    fn copy_out(&self, created_at: DateTime<Local>) -> io::Result<BackupArtifact> {
        fs::create_dir_all(&self.backup_dir)?;
        let (path, mut out) = self.create_exclusive(&time::backup_stamp(&created_at))?;

        let copied = File::open(&self.db_path).and_then(|mut src| {
            let copied = copy_hashing(&mut src, &mut out)?;
            out.sync_all()?;
            Ok(copied)
        });
        match copied {
            Ok((size_bytes, sha256)) => Ok(BackupArtifact {
                path: Some(path),
                created_at,
                sha256: Some(sha256),
                size_bytes,
            }),
            Err(e) => {
                drop(out);
                let _ = fs::remove_file(&path);
                Err(e)
            }
        }
    }

    fn create_exclusive(&self, stamp: &str) -> io::Result<(PathBuf, File)> {
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = if attempt == 0 {
                format!("{}_backup_{}.db", self.prefix, stamp)
            } else {
                format!("{}_backup_{}_{}.db", self.prefix, stamp, attempt)
            };
            let path = self.backup_dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }
        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free backup name for stamp {}", stamp),
        ))
    }

    fn restore_via(&self, backup: &Path, staging: &Path, expected: Option<&str>) -> io::Result<()> {
        let mut src = File::open(backup)?;
        let mut out = File::create(staging)?;
        let (_, digest) = copy_hashing(&mut src, &mut out)?;
        out.sync_all()?;
        drop(out);

        if let Some(expected) = expected {
            if expected != digest {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "backup {} digest mismatch: expected {}, found {}",
                        backup.display(),
                        expected,
                        digest
                    ),
                ));
            }
        }

        self.remove_sidecars()?;
        fs::rename(staging, &self.db_path)
    }

    fn remove_sidecars(&self) -> io::Result<()> {
        for suffix in SIDECAR_SUFFIXES {
            let path = sibling(&self.db_path, suffix);
            match fs::remove_file(&path) {
                Ok(()) => tracing::debug!(path = %path.display(), "removed stale sidecar"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

pub fn default_backup_dir(db_path: &Path) -> PathBuf {
    db_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(BACKUP_DIR_NAME)
}

pub fn default_prefix(db_path: &Path) -> String {
    db_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "store".to_string())
}

/// `path` with `suffix` appended to its file name (`server.db-journal`).
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn copy_hashing<R: Read, W: Write>(src: &mut R, dst: &mut W) -> io::Result<(u64, String)> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; COPY_BUF_BYTES];
    let mut total = 0u64;
    loop {
        let n = src.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        dst.write_all(&buf[..n])?;
        total += n as u64;
    }
    dst.flush()?;
    Ok((total, format!("{:x}", hasher.finalize())))
}
