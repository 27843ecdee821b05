//! Ordered, versioned migration catalog.
//!
//! The catalog holds code-owned [`MigrationSpec`] templates. Resolving a spec
//! against the live store yields a [`MigrationDefinition`] whose statement list
//! only contains operations whose effect is still missing, so replaying the
//! catalog against a partially migrated or externally modified store is safe.

use crate::core::error::ShiftError;
use crate::core::introspect::SchemaIntrospector;
use crate::core::operation::{SchemaOp, SchemaTarget};
use serde::Serialize;

/// Migration template as written in code.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationSpec {
    pub version: i64,
    pub description: String,
    pub operations: Vec<SchemaOp>,
}

impl MigrationSpec {
    pub fn new(version: i64, description: &str, operations: Vec<SchemaOp>) -> Self {
        Self {
            version,
            description: description.to_string(),
            operations,
        }
    }

    /// Tables and columns this migration brings into existence.
    pub fn targets(&self) -> Vec<SchemaTarget> {
        let mut targets: Vec<SchemaTarget> = Vec::new();
        for target in self.operations.iter().flat_map(SchemaOp::targets) {
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
        targets
    }

    /// Prune against the store: keep only the operations still needed.
    pub fn resolve(&self, introspector: &SchemaIntrospector) -> MigrationDefinition {
        let statements = self
            .operations
            .iter()
            .filter(|op| !op.is_satisfied(introspector))
            .cloned()
            .collect();
        MigrationDefinition {
            version: self.version,
            description: self.description.clone(),
            statements,
        }
    }
}

/// A migration resolved against the current store. May legitimately carry
/// zero statements when its target state already holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationDefinition {
    pub version: i64,
    pub description: String,
    pub statements: Vec<SchemaOp>,
}

impl MigrationDefinition {
    pub fn is_noop(&self) -> bool {
        self.statements.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MigrationCatalog {
    specs: Vec<MigrationSpec>,
}

impl MigrationCatalog {
    /// Build a catalog, rejecting non-positive or non-increasing versions and
    /// operations SQLite cannot execute.
    pub fn new(specs: Vec<MigrationSpec>) -> Result<Self, ShiftError> {
        let mut previous = 0i64;
        for spec in &specs {
            if spec.version <= 0 {
                return Err(ShiftError::CatalogError(format!(
                    "migration version must be positive, got {}",
                    spec.version
                )));
            }
            if spec.version <= previous {
                return Err(ShiftError::CatalogError(format!(
                    "migration v{} follows v{}; versions must be strictly increasing",
                    spec.version, previous
                )));
            }
            for op in &spec.operations {
                op.validate()?;
            }
            previous = spec.version;
        }
        Ok(Self { specs })
    }

    pub fn specs(&self) -> &[MigrationSpec] {
        &self.specs
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn latest_version(&self) -> i64 {
        self.specs.iter().map(|s| s.version).max().unwrap_or(0)
    }

    /// Every migration above `current`, ascending, pruned against the store.
    pub fn pending(
        &self,
        current: i64,
        introspector: &SchemaIntrospector,
    ) -> Vec<MigrationDefinition> {
        self.specs
            .iter()
            .filter(|s| s.version > current)
            .map(|s| s.resolve(introspector))
            .collect()
    }

    /// Marker set for pre-existing schema detection: every table and column
    /// any migration creates, in catalog order, without duplicates. A store
    /// holding all of them is at the latest shape.
    pub fn markers(&self) -> Vec<SchemaTarget> {
        let mut markers: Vec<SchemaTarget> = Vec::new();
        for target in self.specs.iter().flat_map(MigrationSpec::targets) {
            if !markers.contains(&target) {
                markers.push(target);
            }
        }
        markers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::operation::{ColumnDef, ColumnType};
    use rusqlite::Connection;
    use tempfile::tempdir;

    fn add(table: &str, column: &str) -> SchemaOp {
        SchemaOp::add_column(table, ColumnDef::new(column, ColumnType::Text))
    }

    fn sample() -> MigrationCatalog {
        MigrationCatalog::new(vec![
            MigrationSpec::new(1, "add a and b", vec![add("items", "a"), add("items", "b")]),
            MigrationSpec::new(2, "add c and d", vec![add("items", "c"), add("items", "d")]),
        ])
        .unwrap()
    }

    #[test]
    fn latest_version_of_empty_catalog_is_zero() {
        let catalog = MigrationCatalog::new(vec![]).unwrap();
        assert_eq!(catalog.latest_version(), 0);
        assert!(catalog.markers().is_empty());
    }

    #[test]
    fn rejects_duplicate_versions() {
        let err = MigrationCatalog::new(vec![
            MigrationSpec::new(1, "one", vec![]),
            MigrationSpec::new(1, "again", vec![]),
        ])
        .unwrap_err();
        assert!(matches!(err, ShiftError::CatalogError(_)));
    }

    #[test]
    fn rejects_decreasing_and_zero_versions() {
        assert!(
            MigrationCatalog::new(vec![
                MigrationSpec::new(2, "two", vec![]),
                MigrationSpec::new(1, "one", vec![]),
            ])
            .is_err()
        );
        assert!(MigrationCatalog::new(vec![MigrationSpec::new(0, "zero", vec![])]).is_err());
    }

    #[test]
    fn markers_cover_every_migration() {
        let markers: Vec<String> = sample().markers().iter().map(|m| m.to_string()).collect();
        assert_eq!(markers, vec!["items.a", "items.b", "items.c", "items.d"]);
    }

    #[test]
    fn markers_are_deduplicated_across_migrations() {
        let catalog = MigrationCatalog::new(vec![
            MigrationSpec::new(
                1,
                "audit table",
                vec![SchemaOp::create_table(
                    "audit",
                    vec![ColumnDef::id("id"), ColumnDef::new("event", ColumnType::Text)],
                )],
            ),
            MigrationSpec::new(2, "audit event again", vec![add("audit", "event"), add("audit", "actor")]),
        ])
        .unwrap();
        let markers: Vec<String> = catalog.markers().iter().map(|m| m.to_string()).collect();
        assert_eq!(markers, vec!["audit", "audit.id", "audit.event", "audit.actor"]);
    }

    #[test]
    fn pending_prunes_columns_already_present() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("store.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE items (id INTEGER PRIMARY KEY, a TEXT, c TEXT);")
            .unwrap();
        drop(conn);

        let introspector = SchemaIntrospector::new(&path);
        let pending = sample().pending(0, &introspector);
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].statements, vec![add("items", "b")]);
        assert_eq!(pending[1].statements, vec![add("items", "d")]);

        let pending = sample().pending(1, &introspector);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].version, 2);
    }

    #[test]
    fn fully_satisfied_definition_is_noop() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("store.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE items (id INTEGER PRIMARY KEY, a TEXT, b TEXT);")
            .unwrap();
        drop(conn);

        let pending = sample().pending(0, &SchemaIntrospector::new(&path));
        assert!(pending[0].is_noop());
        assert!(!pending[1].is_noop());
    }
}
