//! Schema definitions owned by the application store.
//!
//! The primary store (`server.db`) carries:
//! 1. `migration_versions`: the append-only version ledger.
//! 2. `users` and `operation_logs`: the application tables the migration
//!    catalog evolves and the validator checks.

use crate::core::catalog::{MigrationCatalog, MigrationSpec};
use crate::core::error::ShiftError;
use crate::core::operation::{ColumnDef, ColumnType, DefaultValue, SchemaOp};
use crate::core::validate::RequiredSchema;

// --- Ledger ---
pub const LEDGER_TABLE: &str = "migration_versions";

pub fn ledger_db_schema() -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {LEDGER_TABLE} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            version INTEGER NOT NULL,
            applied_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            description TEXT
        )"
    )
}

// --- Application tables ---
pub const USERS_TABLE: &str = "users";
pub const OPERATION_LOGS_TABLE: &str = "operation_logs";

fn users_baseline() -> Vec<ColumnDef> {
    vec![
        ColumnDef::id("id"),
        ColumnDef::new("username", ColumnType::Text).not_null().unique(),
        ColumnDef::new("user_id", ColumnType::Text).not_null().unique(),
        ColumnDef::new("phone_number", ColumnType::Text).unique(),
        ColumnDef::new("avatar", ColumnType::Text),
        ColumnDef::new("password_hash", ColumnType::Text).not_null(),
        ColumnDef::new("role", ColumnType::Text)
            .not_null()
            .default(DefaultValue::Text("user".to_string())),
        ColumnDef::new("created_at", ColumnType::DateTime).default(DefaultValue::CurrentTimestamp),
        ColumnDef::new("last_login", ColumnType::DateTime),
    ]
}

fn operation_logs_baseline() -> Vec<ColumnDef> {
    vec![
        ColumnDef::id("id"),
        ColumnDef::new("user_id", ColumnType::Integer).not_null(),
        ColumnDef::new("operation", ColumnType::Text).not_null(),
        ColumnDef::new("details", ColumnType::Text),
        ColumnDef::new("ip_address", ColumnType::Text),
        ColumnDef::new("timestamp", ColumnType::DateTime).default(DefaultValue::CurrentTimestamp),
    ]
}

/// Migrations for the application store, oldest first.
pub fn application_catalog() -> Result<MigrationCatalog, ShiftError> {
    MigrationCatalog::new(vec![
        MigrationSpec::new(
            1,
            "Add login failure tracking fields to users",
            vec![
                SchemaOp::create_table(USERS_TABLE, users_baseline()),
                SchemaOp::create_table(OPERATION_LOGS_TABLE, operation_logs_baseline()),
                SchemaOp::add_column(
                    USERS_TABLE,
                    ColumnDef::new("login_failed_count", ColumnType::Integer)
                        .not_null()
                        .default(DefaultValue::Integer(0)),
                ),
                SchemaOp::add_column(
                    USERS_TABLE,
                    ColumnDef::new("last_failed_login", ColumnType::DateTime),
                ),
                SchemaOp::add_column(
                    USERS_TABLE,
                    ColumnDef::new("login_locked_until", ColumnType::DateTime),
                ),
            ],
        ),
        MigrationSpec::new(
            2,
            "Add soft delete fields to users",
            vec![
                SchemaOp::add_column(
                    USERS_TABLE,
                    ColumnDef::new("is_deleted", ColumnType::Integer)
                        .not_null()
                        .default(DefaultValue::Integer(0)),
                ),
                SchemaOp::add_column(USERS_TABLE, ColumnDef::new("deleted_at", ColumnType::DateTime)),
            ],
        ),
    ])
}

/// Tables and columns the running application expects.
pub fn application_required_schema() -> RequiredSchema {
    RequiredSchema::new()
        .table(
            USERS_TABLE,
            &[
                "id",
                "username",
                "user_id",
                "phone_number",
                "avatar",
                "password_hash",
                "role",
                "created_at",
                "last_login",
                "login_failed_count",
                "last_failed_login",
                "login_locked_until",
                "is_deleted",
                "deleted_at",
            ],
        )
        .table(
            OPERATION_LOGS_TABLE,
            &["id", "user_id", "operation", "details", "ip_address", "timestamp"],
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn application_catalog_is_well_formed() {
        let catalog = application_catalog().unwrap();
        assert_eq!(catalog.latest_version(), 2);
        let markers: Vec<String> = catalog.markers().iter().map(|m| m.to_string()).collect();
        for column in [
            "login_failed_count",
            "last_failed_login",
            "login_locked_until",
            "is_deleted",
            "deleted_at",
        ] {
            let name = format!("users.{column}");
            assert!(markers.contains(&name), "{name} missing from {markers:?}");
        }
        assert!(markers.contains(&OPERATION_LOGS_TABLE.to_string()));
    }

    #[test]
    fn catalog_covers_every_required_column() {
        let catalog = application_catalog().unwrap();
        let targets: Vec<String> = catalog
            .specs()
            .iter()
            .flat_map(|s| s.targets())
            .map(|t| t.to_string())
            .collect();
        for (table, columns) in application_required_schema().tables() {
            for column in columns {
                let name = format!("{}.{}", table, column);
                assert!(targets.contains(&name), "catalog never creates {name}");
            }
        }
    }
}
