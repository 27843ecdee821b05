use rusqlite::{Connection, params};
use shiftdb::core::config::{CONFIG_FILE_NAME, Config};
use shiftdb::core::ledger::VersionLedger;
use shiftdb::core::migration;
use shiftdb::core::runner::RunOutcome;
use shiftdb::core::schemas;
use shiftdb::core::validate::{RequiredSchema, SchemaValidator};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

/// `users` as the application created it before any migration existed.
const LEGACY_USERS: &str = "
    CREATE TABLE users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username VARCHAR NOT NULL UNIQUE,
        user_id VARCHAR NOT NULL UNIQUE,
        phone_number VARCHAR UNIQUE,
        avatar VARCHAR,
        password_hash VARCHAR NOT NULL,
        role VARCHAR NOT NULL,
        created_at DATETIME,
        last_login DATETIME
    );
    CREATE TABLE operation_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        operation VARCHAR NOT NULL,
        details TEXT,
        ip_address VARCHAR,
        timestamp DATETIME
    );
";

/// The current model, created directly by the ORM with no ledger.
const CURRENT_USERS: &str = "
    CREATE TABLE users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username VARCHAR NOT NULL UNIQUE,
        user_id VARCHAR NOT NULL UNIQUE,
        phone_number VARCHAR UNIQUE,
        avatar VARCHAR,
        password_hash VARCHAR NOT NULL,
        role VARCHAR NOT NULL,
        created_at DATETIME,
        last_login DATETIME,
        login_failed_count INTEGER NOT NULL DEFAULT 0,
        last_failed_login DATETIME,
        login_locked_until DATETIME,
        is_deleted INTEGER NOT NULL DEFAULT 0,
        deleted_at DATETIME
    );
    CREATE TABLE operation_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        operation VARCHAR NOT NULL,
        details TEXT,
        ip_address VARCHAR,
        timestamp DATETIME
    );
";

fn create_store(path: &Path, ddl: &str) {
    let conn = Connection::open(path).expect("open store");
    conn.execute_batch(ddl).expect("create schema");
}

fn ledger_versions(path: &Path) -> Vec<i64> {
    VersionLedger::new(path)
        .history()
        .expect("history")
        .iter()
        .map(|r| r.version)
        .collect()
}

#[test]
fn bootstrap_creates_application_schema_from_nothing() {
    let tmp = tempdir().expect("tempdir");
    let db_path = tmp.path().join("server.db");

    assert!(migration::check_and_migrate(&db_path));

    assert!(migration::validate_store(&db_path).is_valid);
    assert_eq!(ledger_versions(&db_path), vec![1, 2]);
    assert!(
        !tmp.path().join("backups").exists(),
        "nothing to back up for a new store"
    );

    assert!(migration::check_and_migrate(&db_path));
    assert_eq!(ledger_versions(&db_path), vec![1, 2]);
}

#[test]
fn legacy_store_is_migrated_and_keeps_its_rows() {
    let tmp = tempdir().expect("tempdir");
    let db_path = tmp.path().join("server.db");
    create_store(&db_path, LEGACY_USERS);
    Connection::open(&db_path)
        .expect("open")
        .execute(
            "INSERT INTO users (username, user_id, password_hash, role) VALUES (?1, ?2, ?3, ?4)",
            params!["admin", "admin", "hash", "superadmin"],
        )
        .expect("seed user");

    let before = migration::validate_store(&db_path);
    assert_eq!(before.missing.len(), 5, "{:?}", before.missing);

    let report = migration::migrate_store(&db_path, &Config::default()).expect("migrate");
    assert_eq!(
        report.outcome,
        RunOutcome::Migrated {
            applied: vec![1, 2],
            skipped: vec![]
        }
    );
    assert!(report.backup.is_some());

    let conn = Connection::open(&db_path).expect("open verify");
    let (name, failed, deleted): (String, i64, i64) = conn
        .query_row(
            "SELECT username, login_failed_count, is_deleted FROM users",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .expect("read user");
    assert_eq!(name, "admin");
    assert_eq!(failed, 0);
    assert_eq!(deleted, 0);
    assert!(migration::validate_store(&db_path).is_valid);
}

#[test]
fn orm_created_store_is_fast_forwarded() {
    let tmp = tempdir().expect("tempdir");
    let db_path = tmp.path().join("server.db");
    create_store(&db_path, CURRENT_USERS);

    let report = migration::migrate_store(&db_path, &Config::default()).expect("migrate");
    assert_eq!(report.outcome, RunOutcome::FastForwarded);
    assert_eq!(ledger_versions(&db_path), vec![2]);
    assert!(!tmp.path().join("backups").exists());
}

#[test]
fn soft_delete_columns_alone_still_get_login_tracking() {
    let tmp = tempdir().expect("tempdir");
    let db_path = tmp.path().join("server.db");
    create_store(
        &db_path,
        "CREATE TABLE users (id INTEGER PRIMARY KEY, username VARCHAR, is_deleted INTEGER, deleted_at DATETIME);
         CREATE TABLE operation_logs (id INTEGER PRIMARY KEY);",
    );

    let report = migration::migrate_store(&db_path, &Config::default()).expect("first run");
    assert_eq!(
        report.outcome,
        RunOutcome::Migrated {
            applied: vec![1],
            skipped: vec![2]
        }
    );
    let report = migration::migrate_store(&db_path, &Config::default()).expect("second run");
    assert_eq!(report.outcome, RunOutcome::UpToDate);
    assert_eq!(ledger_versions(&db_path), vec![1, 2]);

    let gaps = migration::validate_store(&db_path).missing;
    for column in ["login_failed_count", "last_failed_login", "login_locked_until"] {
        assert!(
            !gaps.iter().any(|g| g.ends_with(column)),
            "{column} still missing: {gaps:?}"
        );
    }
}

#[test]
fn config_next_to_store_can_disable_fast_forward() {
    let tmp = tempdir().expect("tempdir");
    let db_path = tmp.path().join("server.db");
    create_store(&db_path, CURRENT_USERS);
    fs::write(
        tmp.path().join(CONFIG_FILE_NAME),
        "[migration]\nfast_forward = false\n\n[backup]\ndir = \"snapshots\"\nprefix = \"app\"\n",
    )
    .expect("write config");

    assert!(migration::check_and_migrate(&db_path));
    assert_eq!(ledger_versions(&db_path), vec![1, 2]);

    let snapshots: Vec<String> = fs::read_dir(tmp.path().join("snapshots"))
        .expect("snapshot dir")
        .map(|e| e.expect("entry").file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(snapshots.len(), 1);
    assert!(snapshots[0].starts_with("app_backup_"), "{:?}", snapshots);
}

#[test]
fn corrupt_store_reports_failure_and_is_untouched() {
    let tmp = tempdir().expect("tempdir");
    let db_path = tmp.path().join("server.db");
    let garbage = b"this is not an SQLite database, it only pretends to be one".to_vec();
    fs::write(&db_path, &garbage).expect("write garbage");

    assert!(!migration::check_and_migrate(&db_path));
    assert_eq!(fs::read(&db_path).expect("read"), garbage);
}

#[test]
fn malformed_config_reports_failure() {
    let tmp = tempdir().expect("tempdir");
    let db_path = tmp.path().join("server.db");
    fs::write(tmp.path().join(CONFIG_FILE_NAME), "[migration\nfast_forward = ").expect("write");
    assert!(!migration::check_and_migrate(&db_path));
    assert!(!db_path.exists());
}

#[test]
fn validator_names_the_single_missing_column() {
    let tmp = tempdir().expect("tempdir");
    let db_path = tmp.path().join("server.db");
    create_store(&db_path, &CURRENT_USERS.replace(",\n        deleted_at DATETIME", ""));

    let report = migration::validate_store(&db_path);
    assert!(!report.is_valid);
    assert_eq!(report.missing.len(), 1, "{:?}", report.missing);
    assert!(report.missing[0].contains("users"));
    assert!(report.missing[0].contains("deleted_at"));
}

#[test]
fn validator_accepts_conformant_store() {
    let tmp = tempdir().expect("tempdir");
    let db_path = tmp.path().join("server.db");
    create_store(&db_path, CURRENT_USERS);

    let report = SchemaValidator::new(&db_path, schemas::application_required_schema()).validate();
    assert!(report.is_valid);
    assert!(report.missing.is_empty());

    let custom = RequiredSchema::new().table("users", &["id", "nickname"]);
    let report = SchemaValidator::new(&db_path, custom).validate();
    assert_eq!(report.missing, vec!["table users is missing column nickname"]);
}
