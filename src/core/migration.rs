//! Startup entry point: validate, then migrate.
//!
//! Callers invoke [`check_and_migrate`] once, before serving traffic. Schema
//! gaps are logged as warnings and never block the run; the boolean result
//! lets the caller decide between aborting startup and running degraded.

use crate::core::config::{self, Config};
use crate::core::error;
use crate::core::runner::{MigrationRunner, RunReport};
use crate::core::schemas;
use crate::core::validate::{SchemaValidator, ValidationReport};
use std::path::Path;

/// Check the application store at `db_path` and bring it up to date, using
/// `shiftdb.toml` next to the store when present.
pub fn check_and_migrate(db_path: &Path) -> bool {
    match config::load_config(None, db_path) {
        Ok(config) => check_and_migrate_with(db_path, &config),
        Err(e) => {
            tracing::error!(store = %db_path.display(), error = %e, "cannot load migration config");
            false
        }
    }
}

pub fn check_and_migrate_with(db_path: &Path, config: &Config) -> bool {
    warn_on_gaps(db_path, &validate_store(db_path));

    match migrate_store(db_path, config) {
        Ok(report) => {
            tracing::info!(
                run_id = %report.run_id,
                from = report.from_version,
                to = report.to_version,
                "store schema is current"
            );
            true
        }
        Err(e) => {
            tracing::error!(
                store = %db_path.display(),
                error = %e,
                manual_recovery = e.requires_manual_recovery(),
                "schema migration failed"
            );
            false
        }
    }
}

/// Run the application catalog against the store.
pub fn migrate_store(db_path: &Path, config: &Config) -> Result<RunReport, error::ShiftError> {
    let catalog = schemas::application_catalog()?;
    MigrationRunner::from_config(db_path, catalog, config).run()
}

pub fn validate_store(db_path: &Path) -> ValidationReport {
    SchemaValidator::new(db_path, schemas::application_required_schema()).validate()
}

pub(crate) fn warn_on_gaps(db_path: &Path, report: &ValidationReport) {
    if report.is_valid {
        return;
    }
    tracing::warn!(store = %db_path.display(), "store schema does not match the application:");
    for gap in &report.missing {
        tracing::warn!("  - {}", gap);
    }
    if db_path.exists() {
        tracing::info!(
            "migrating now; to retry by hand run: shiftdb migrate --db {}",
            db_path.display()
        );
    }
}
