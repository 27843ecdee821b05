//! CLI struct definitions for the shiftdb command-line interface.
//!
//! All clap-derived types live here. Dispatch logic lives in `lib.rs`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "shiftdb",
    version = env!("CARGO_PKG_VERSION"),
    about = "Versioned schema evolution for a single SQLite store, with automatic backup and rollback."
)]
pub(crate) struct Cli {
    /// Configuration file (defaults to shiftdb.toml next to the store).
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(clap::Args, Debug)]
pub(crate) struct StoreArgs {
    /// Path to the store file.
    #[clap(long)]
    pub db: PathBuf,
    /// Output format: 'text' or 'json'.
    #[clap(long, default_value = "text")]
    pub format: String,
}

impl StoreArgs {
    pub fn json(&self) -> bool {
        self.format == "json"
    }
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Validate, back up and apply pending migrations
    Migrate(StoreArgs),
    /// Show current and latest version and what would run
    Status(StoreArgs),
    /// Check the store against the application schema (read-only)
    Validate(StoreArgs),
    /// List recorded versions from the ledger
    History(StoreArgs),
    /// Manual snapshot management and recovery
    Backup(BackupCli),
}

#[derive(clap::Args, Debug)]
pub(crate) struct BackupCli {
    #[clap(subcommand)]
    pub command: BackupCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum BackupCommand {
    /// Take a snapshot of the store now
    Create(StoreArgs),
    /// List snapshots, oldest first
    List(StoreArgs),
    /// Overwrite the store with a snapshot
    Restore {
        #[clap(flatten)]
        store: StoreArgs,
        /// Backup file to restore (defaults to the newest one)
        #[clap(long)]
        artifact: Option<PathBuf>,
    },
}

impl Command {
    pub fn store(&self) -> &StoreArgs {
        match self {
            Command::Migrate(s)
            | Command::Status(s)
            | Command::Validate(s)
            | Command::History(s) => s,
            Command::Backup(b) => match &b.command {
                BackupCommand::Create(s) | BackupCommand::List(s) => s,
                BackupCommand::Restore { store, .. } => store,
            },
        }
    }
}
