//! Advisory schema validation.
//!
//! Compares the live store against the tables and columns the application
//! expects. Gaps are reported, never raised, and nothing is mutated, so the
//! validator can run before a migration (to warn) and after it (to confirm).

use crate::core::db;
use crate::core::introspect::SchemaIntrospector;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Ordered list of required tables, each with its required columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredSchema {
    tables: Vec<(String, Vec<String>)>,
}

impl RequiredSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, name: &str, columns: &[&str]) -> Self {
        self.tables.push((
            name.to_string(),
            columns.iter().map(|c| c.to_string()).collect(),
        ));
        self
    }

    pub fn tables(&self) -> &[(String, Vec<String>)] {
        &self.tables
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub missing: Vec<String>,
}

impl ValidationReport {
    fn from_gaps(missing: Vec<String>) -> Self {
        Self {
            is_valid: missing.is_empty(),
            missing,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchemaValidator {
    db_path: PathBuf,
    required: RequiredSchema,
}

impl SchemaValidator {
    pub fn new(db_path: &Path, required: RequiredSchema) -> Self {
        Self {
            db_path: db_path.to_path_buf(),
            required,
        }
    }

    pub fn validate(&self) -> ValidationReport {
        if !db::store_exists(&self.db_path) {
            return ValidationReport::from_gaps(vec![format!(
                "store file {} does not exist",
                self.db_path.display()
            )]);
        }

        let introspector = SchemaIntrospector::new(&self.db_path);
        let mut missing = Vec::new();
        for (table, columns) in self.required.tables() {
            if !introspector.table_exists(table) {
                missing.push(format!("table {} does not exist", table));
                continue;
            }
            let present = introspector.columns(table);
            for column in columns {
                if !present.iter().any(|c| c.eq_ignore_ascii_case(column)) {
                    missing.push(format!("table {} is missing column {}", table, column));
                }
            }
        }
        ValidationReport::from_gaps(missing)
    }
}
