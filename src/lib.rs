//! shiftdb: versioned schema evolution for a single SQLite store.
//!
//! The application calls [`core::migration::check_and_migrate`] once at
//! startup. It validates the store against the expected schema (advisory),
//! then runs the migration state machine:
//!
//! - **Ledger**: applied versions live in `migration_versions` inside the
//!   store; current version = highest recorded version.
//! - **Catalog**: typed, versioned operations pruned against the live schema,
//!   so replaying a migration whose effect already holds executes nothing.
//! - **Backup**: a timestamped copy under `backups/` is taken before the first
//!   mutation; any execution failure restores it byte for byte.
//! - **Fast-forward**: an unversioned store that already has the newest
//!   schema gets its ledger set to the latest version without running DDL.
//!
//! # Examples
//!
//! ```bash
//! shiftdb status --db data/server.db
//! shiftdb migrate --db data/server.db
//! shiftdb validate --db data/server.db --format json
//! shiftdb backup restore --db data/server.db
//! ```
//!
//! # Crate Structure
//!
//! - [`core`]: introspection, catalog, ledger, backup, runner, validation
//! - `cli`: command-line surface

mod cli;
pub mod core;

use cli::{BackupCommand, Cli, Command, StoreArgs};
use crate::core::{
    backup::BackupArtifact,
    config::{self, Config},
    error, ledger, logging, migration, output, schemas,
    runner::MigrationRunner,
    time,
};

use clap::Parser;
use colored::Colorize;

pub fn run() -> Result<(), error::ShiftError> {
    let cli = Cli::parse();
    let store = cli.command.store();
    let config = config::load_config(cli.config.as_deref(), &store.db)?;
    logging::init_logging(&config.logging);

    match &cli.command {
        Command::Migrate(args) => run_migrate(args, &config),
        Command::Status(args) => run_status(args, &config),
        Command::Validate(args) => run_validate(args),
        Command::History(args) => run_history(args),
        Command::Backup(backup_cli) => match &backup_cli.command {
            BackupCommand::Create(args) => run_backup_create(args, &config),
            BackupCommand::List(args) => run_backup_list(args, &config),
            BackupCommand::Restore { store, artifact } => {
                run_backup_restore(store, artifact.as_deref(), &config)
            }
        },
    }
}

fn emit_json(cmd: &str, status: &str, body: serde_json::Value) -> Result<(), error::ShiftError> {
    let envelope = time::command_envelope(cmd, status, body);
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

fn run_migrate(args: &StoreArgs, config: &Config) -> Result<(), error::ShiftError> {
    let runner =
        MigrationRunner::from_config(&args.db, schemas::application_catalog()?, config);
    let current = runner.ledger().current_version()?;
    let latest = runner.catalog().latest_version();
    if !args.json() {
        println!(
            "{} {}: v{} → latest v{}",
            "▸".bright_cyan(),
            args.db.display(),
            current,
            latest
        );
    }

    migration::warn_on_gaps(&args.db, &migration::validate_store(&args.db));

    match runner.run() {
        Ok(report) => {
            if args.json() {
                emit_json("migrate", "ok", serde_json::to_value(&report)?)
            } else {
                print!("{}", output::render_run_report(&report));
                Ok(())
            }
        }
        Err(e) => {
            if args.json() {
                emit_json(
                    "migrate",
                    "error",
                    serde_json::json!({
                        "error": e.to_string(),
                        "manual_recovery": e.requires_manual_recovery(),
                    }),
                )?;
            } else {
                eprintln!("{} {}", "✗".bright_red(), output::compact_line(&e.to_string(), 400));
            }
            Err(e)
        }
    }
}

fn run_status(args: &StoreArgs, config: &Config) -> Result<(), error::ShiftError> {
    let runner =
        MigrationRunner::from_config(&args.db, schemas::application_catalog()?, config);
    let current = runner.ledger().current_version()?;
    let latest = runner.catalog().latest_version();
    let state = runner.state()?;
    let pending = runner.pending()?;

    if args.json() {
        emit_json(
            "status",
            "ok",
            serde_json::json!({
                "current_version": current,
                "latest_version": latest,
                "state": state,
                "pending": pending,
            }),
        )
    } else {
        print!("{}", output::render_status(current, latest, state, &pending));
        Ok(())
    }
}

fn run_validate(args: &StoreArgs) -> Result<(), error::ShiftError> {
    let report = migration::validate_store(&args.db);
    if args.json() {
        let status = if report.is_valid { "ok" } else { "gaps" };
        emit_json("validate", status, serde_json::to_value(&report)?)
    } else {
        print!("{}", output::render_validation(&report));
        Ok(())
    }
}

fn run_history(args: &StoreArgs) -> Result<(), error::ShiftError> {
    let records = ledger::VersionLedger::new(&args.db).history()?;
    if args.json() {
        emit_json("history", "ok", serde_json::json!({ "records": records }))
    } else {
        print!("{}", output::render_history(&records));
        Ok(())
    }
}

fn run_backup_create(args: &StoreArgs, config: &Config) -> Result<(), error::ShiftError> {
    let artifact = config.backup_manager(&args.db).snapshot()?;
    if args.json() {
        return emit_json("backup.create", "ok", serde_json::to_value(&artifact)?);
    }
    match &artifact.path {
        Some(path) => println!("{} backup written to {}", "✓".bright_green(), path.display()),
        None => println!("store {} does not exist, nothing to back up", args.db.display()),
    }
    Ok(())
}

fn run_backup_list(args: &StoreArgs, config: &Config) -> Result<(), error::ShiftError> {
    let backups = config.backup_manager(&args.db).list()?;
    if args.json() {
        emit_json("backup.list", "ok", serde_json::json!({ "backups": backups }))
    } else {
        print!("{}", output::render_backups(&backups));
        Ok(())
    }
}

fn run_backup_restore(
    args: &StoreArgs,
    artifact: Option<&std::path::Path>,
    config: &Config,
) -> Result<(), error::ShiftError> {
    let manager = config.backup_manager(&args.db);
    let path = match artifact {
        Some(path) => path.to_path_buf(),
        None => manager.list()?.pop().ok_or_else(|| {
            error::ShiftError::NotFound(format!("no backups in {}", manager.backup_dir().display()))
        })?,
    };
    let artifact = BackupArtifact::from_file(&path)?;
    manager.restore(&artifact)?;

    if args.json() {
        emit_json("backup.restore", "ok", serde_json::to_value(&artifact)?)
    } else {
        println!(
            "{} {} restored from {}",
            "✓".bright_green(),
            args.db.display(),
            path.display()
        );
        Ok(())
    }
}
