//! Migration state machine.
//!
//! A run moves a store from `Unversioned` or `Behind` to `Current`, or
//! surfaces a failure. Each version is applied in its own transaction
//! together with its ledger row, so a crash between versions resumes at the
//! last recorded version. Any failure once mutation has begun triggers one
//! restore attempt from the snapshot taken at the start of the run.

use crate::core::backup::{BackupArtifact, BackupManager};
use crate::core::catalog::{MigrationCatalog, MigrationDefinition};
use crate::core::config::Config;
use crate::core::db;
use crate::core::error::ShiftError;
use crate::core::introspect::SchemaIntrospector;
use crate::core::ledger::{self, VersionLedger};
use crate::core::operation::SchemaTarget;
use crate::core::time;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// No recorded version: store absent, empty, or pre-versioning.
    Unversioned,
    Behind,
    Current,
}

impl RunState {
    pub fn classify(current: i64, latest: i64) -> Self {
        if current >= latest {
            RunState::Current
        } else if current == 0 {
            RunState::Unversioned
        } else {
            RunState::Behind
        }
    }
}

/// What to do with an unversioned store whose schema was created by some
/// other path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FastForwardPolicy {
    /// If every table and column the catalog creates already exists,
    /// record the latest version without executing any statement.
    #[default]
    DetectPreExistingSchema,
    /// Always replay the catalog; pruning keeps it idempotent.
    Disabled,
}

impl FastForwardPolicy {
    pub fn from_config(config: &Config) -> Self {
        if config.migration.fast_forward {
            FastForwardPolicy::DetectPreExistingSchema
        } else {
            FastForwardPolicy::Disabled
        }
    }

    pub fn applies(
        &self,
        current: i64,
        latest: i64,
        markers: &[SchemaTarget],
        introspector: &SchemaIntrospector,
    ) -> bool {
        match self {
            FastForwardPolicy::Disabled => false,
            FastForwardPolicy::DetectPreExistingSchema => {
                current == 0
                    && latest > 0
                    && db::store_exists(introspector.db_path())
                    && !markers.is_empty()
                    && markers.iter().all(|m| m.is_present(introspector))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
    UpToDate,
    FastForwarded,
    Migrated { applied: Vec<i64>, skipped: Vec<i64> },
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub from_version: i64,
    pub to_version: i64,
    pub outcome: RunOutcome,
    pub backup: Option<BackupArtifact>,
}

impl RunReport {
    /// True when at least one DDL statement ran.
    pub fn executed_statements(&self) -> bool {
        matches!(&self.outcome, RunOutcome::Migrated { applied, .. } if !applied.is_empty())
    }
}

/// One runner per store: construct at startup, run once, discard.
#[derive(Debug)]
pub struct MigrationRunner {
    db_path: PathBuf,
    catalog: MigrationCatalog,
    ledger: VersionLedger,
    introspector: SchemaIntrospector,
    backup: BackupManager,
    policy: FastForwardPolicy,
}

impl MigrationRunner {
    pub fn new(
        db_path: &Path,
        catalog: MigrationCatalog,
        backup: BackupManager,
        policy: FastForwardPolicy,
    ) -> Self {
        Self {
            db_path: db_path.to_path_buf(),
            catalog,
            ledger: VersionLedger::new(db_path),
            introspector: SchemaIntrospector::new(db_path),
            backup,
            policy,
        }
    }

    /// Default backup location and fast-forward detection enabled.
    pub fn for_store(db_path: &Path, catalog: MigrationCatalog) -> Self {
        Self::new(
            db_path,
            catalog,
            BackupManager::for_store(db_path),
            FastForwardPolicy::default(),
        )
    }

    pub fn from_config(db_path: &Path, catalog: MigrationCatalog, config: &Config) -> Self {
        Self::new(
            db_path,
            catalog,
            config.backup_manager(db_path),
            FastForwardPolicy::from_config(config),
        )
    }

    pub fn catalog(&self) -> &MigrationCatalog {
        &self.catalog
    }

    pub fn ledger(&self) -> &VersionLedger {
        &self.ledger
    }

    pub fn state(&self) -> Result<RunState, ShiftError> {
        Ok(RunState::classify(
            self.ledger.current_version()?,
            self.catalog.latest_version(),
        ))
    }

    /// Versions a run would consider, pruned against the current store.
    pub fn pending(&self) -> Result<Vec<MigrationDefinition>, ShiftError> {
        let current = self.ledger.current_version()?;
        Ok(self.catalog.pending(current, &self.introspector))
    }

    pub fn run(&self) -> Result<RunReport, ShiftError> {
        let run_id = time::new_event_id();
        let span = tracing::info_span!("migration_run", run_id = %run_id, store = %self.db_path.display());
        let _entered = span.enter();

        let current = self.ledger.current_version()?;
        let latest = self.catalog.latest_version();
        let report = |to_version, outcome, backup| RunReport {
            run_id: run_id.clone(),
            from_version: current,
            to_version,
            outcome,
            backup,
        };

        let markers = self.catalog.markers();
        if self
            .policy
            .applies(current, latest, &markers, &self.introspector)
        {
            tracing::info!(
                latest,
                markers = markers.len(),
                "store already has the newest schema, recording version without executing"
            );
            self.ledger.record(
                latest,
                &format!("Fast-forward to version {}: schema already present", latest),
            )?;
            return Ok(report(latest, RunOutcome::FastForwarded, None));
        }

        if current >= latest {
            if current > latest {
                tracing::warn!(current, latest, "store is ahead of the migration catalog");
            } else {
                tracing::info!(current, "store is up to date");
            }
            return Ok(report(current, RunOutcome::UpToDate, None));
        }

        tracing::info!(from = current, to = latest, "starting migration");
        let pending = self.catalog.pending(current, &self.introspector);
        let artifact = self.backup.snapshot()?;

        let mut applied = Vec::new();
        let mut skipped = Vec::new();
        for definition in &pending {
            if let Err(err) = self.apply(definition) {
                return Err(rollback(&self.backup, &artifact, err));
            }
            if definition.is_noop() {
                skipped.push(definition.version);
            } else {
                applied.push(definition.version);
            }
        }

        if applied.is_empty() {
            tracing::info!(to = latest, "schema already current, only ledger rows recorded");
        } else {
            tracing::info!(to = latest, applied = applied.len(), "migration complete");
        }
        Ok(report(
            latest,
            RunOutcome::Migrated { applied, skipped },
            (!artifact.is_empty()).then_some(artifact),
        ))
    }

    fn apply(&self, definition: &MigrationDefinition) -> Result<(), ShiftError> {
        if definition.is_noop() {
            tracing::info!(
                version = definition.version,
                description = %definition.description,
                "nothing to execute, target state already present"
            );
        } else {
            tracing::info!(
                version = definition.version,
                description = %definition.description,
                statements = definition.statements.len(),
                "applying migration"
            );
        }

        self.execute(definition).map_err(|e| match e {
            ShiftError::RusqliteError(source) => {
                tracing::error!(
                    version = definition.version,
                    description = %definition.description,
                    error = %source,
                    "migration failed"
                );
                ShiftError::MigrationExecutionFailure {
                    version: definition.version,
                    description: definition.description.clone(),
                    source,
                }
            }
            other => other,
        })
    }

    /// Statements and ledger row commit together or not at all.
    fn execute(&self, definition: &MigrationDefinition) -> Result<(), ShiftError> {
        let mut conn = db::db_connect(&self.db_path)?;
        let tx = conn.transaction()?;
        for op in &definition.statements {
            let sql = op.to_sql();
            tracing::debug!(version = definition.version, sql = %sql, "executing");
            tx.execute(&sql, [])?;
        }
        ledger::record_in(&tx, definition.version, &definition.description)?;
        tx.commit()?;
        Ok(())
    }
}

/// Single restore attempt after a failed run. Returns the error to surface:
/// the original one, or a `RestoreFailure` wrapping it.
fn rollback(backup: &BackupManager, artifact: &BackupArtifact, err: ShiftError) -> ShiftError {
    let Some(path) = &artifact.path else {
        tracing::warn!(
            error = %err,
            "migration failed on a store created by this run, removing it"
        );
        return match backup.discard_store() {
            Ok(()) => err,
            Err(source) => ShiftError::RestoreFailure {
                backup: backup.store_path().to_path_buf(),
                execution: Box::new(err),
                source,
            },
        };
    };

    tracing::warn!(backup = %path.display(), error = %err, "migration failed, restoring backup");
    match backup.restore(artifact) {
        Ok(()) => err,
        Err(source) => {
            tracing::error!(
                backup = %path.display(),
                error = %source,
                "restore failed, store state unknown; manual recovery required"
            );
            ShiftError::RestoreFailure {
                backup: path.clone(),
                execution: Box::new(err),
                source,
            }
        }
    }
}
