//! Typed schema operations.
//!
//! Migrations are built from a closed set of operations instead of raw DDL
//! strings. Each operation knows how to render itself for SQLite, which
//! tables/columns it brings into existence, and whether the introspector
//! already sees that state.

use crate::core::error::ShiftError;
use crate::core::introspect::SchemaIntrospector;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

pub fn validate_identifier(name: &str) -> Result<(), ShiftError> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(ShiftError::InvalidIdentifier(name.to_string()))
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Text,
    Real,
    Blob,
    DateTime,
}

impl ColumnType {
    pub fn sql(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Text => "TEXT",
            ColumnType::Real => "REAL",
            ColumnType::Blob => "BLOB",
            ColumnType::DateTime => "DATETIME",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultValue {
    Integer(i64),
    Text(String),
    CurrentTimestamp,
}

impl DefaultValue {
    fn sql(&self) -> String {
        match self {
            DefaultValue::Integer(v) => v.to_string(),
            DefaultValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
            DefaultValue::CurrentTimestamp => "CURRENT_TIMESTAMP".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
    pub not_null: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub default: Option<DefaultValue>,
}

impl ColumnDef {
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            not_null: false,
            primary_key: false,
            unique: false,
            default: None,
        }
    }

    /// `INTEGER PRIMARY KEY AUTOINCREMENT` surrogate key.
    pub fn id(name: &str) -> Self {
        Self {
            primary_key: true,
            ..Self::new(name, ColumnType::Integer)
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default(mut self, value: DefaultValue) -> Self {
        self.default = Some(value);
        self
    }

    fn sql(&self) -> String {
        let mut out = format!("{} {}", quote_ident(&self.name), self.column_type.sql());
        if self.primary_key {
            out.push_str(" PRIMARY KEY");
            if self.column_type == ColumnType::Integer {
                out.push_str(" AUTOINCREMENT");
            }
        }
        if self.not_null {
            out.push_str(" NOT NULL");
        }
        if self.unique {
            out.push_str(" UNIQUE");
        }
        if let Some(default) = &self.default {
            out.push_str(" DEFAULT ");
            out.push_str(&default.sql());
        }
        out
    }
}

/// A table or column whose existence can be probed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaTarget {
    Table { table: String },
    Column { table: String, column: String },
}

impl SchemaTarget {
    pub fn is_present(&self, introspector: &SchemaIntrospector) -> bool {
        match self {
            SchemaTarget::Table { table } => introspector.table_exists(table),
            SchemaTarget::Column { table, column } => introspector.column_exists(table, column),
        }
    }
}

impl fmt::Display for SchemaTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaTarget::Table { table } => write!(f, "{}", table),
            SchemaTarget::Column { table, column } => write!(f, "{}.{}", table, column),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SchemaOp {
    AddColumn { table: String, column: ColumnDef },
    CreateTable { table: String, columns: Vec<ColumnDef> },
}

impl SchemaOp {
    pub fn add_column(table: &str, column: ColumnDef) -> Self {
        SchemaOp::AddColumn {
            table: table.to_string(),
            column,
        }
    }

    pub fn create_table(table: &str, columns: Vec<ColumnDef>) -> Self {
        SchemaOp::CreateTable {
            table: table.to_string(),
            columns,
        }
    }

    pub fn table(&self) -> &str {
        match self {
            SchemaOp::AddColumn { table, .. } | SchemaOp::CreateTable { table, .. } => table,
        }
    }

    pub fn to_sql(&self) -> String {
        match self {
            SchemaOp::AddColumn { table, column } => {
                format!("ALTER TABLE {} ADD COLUMN {}", quote_ident(table), column.sql())
            }
            SchemaOp::CreateTable { table, columns } => {
                let cols = columns
                    .iter()
                    .map(ColumnDef::sql)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("CREATE TABLE IF NOT EXISTS {} ({})", quote_ident(table), cols)
            }
        }
    }

    /// Everything this operation brings into existence.
    pub fn targets(&self) -> Vec<SchemaTarget> {
        match self {
            SchemaOp::AddColumn { table, column } => vec![SchemaTarget::Column {
                table: table.clone(),
                column: column.name.clone(),
            }],
            SchemaOp::CreateTable { table, columns } => {
                let mut targets = vec![SchemaTarget::Table {
                    table: table.clone(),
                }];
                targets.extend(columns.iter().map(|c| SchemaTarget::Column {
                    table: table.clone(),
                    column: c.name.clone(),
                }));
                targets
            }
        }
    }

    /// Whether the store already holds this operation's primary effect: the
    /// column for `AddColumn`, the table for `CreateTable`.
    pub fn is_satisfied(&self, introspector: &SchemaIntrospector) -> bool {
        match self {
            SchemaOp::AddColumn { table, column } => introspector.column_exists(table, &column.name),
            SchemaOp::CreateTable { table, .. } => introspector.table_exists(table),
        }
    }

    /// Structural checks SQLite would otherwise only report at execution time.
    pub fn validate(&self) -> Result<(), ShiftError> {
        validate_identifier(self.table())?;
        match self {
            SchemaOp::AddColumn { table, column } => {
                validate_identifier(&column.name)?;
                if column.primary_key || column.unique {
                    return Err(ShiftError::CatalogError(format!(
                        "cannot add PRIMARY KEY or UNIQUE column {}.{}",
                        table, column.name
                    )));
                }
                if column.not_null && column.default.is_none() {
                    return Err(ShiftError::CatalogError(format!(
                        "NOT NULL column {}.{} needs a default",
                        table, column.name
                    )));
                }
                if column.default == Some(DefaultValue::CurrentTimestamp) {
                    return Err(ShiftError::CatalogError(format!(
                        "column {}.{} cannot be added with a non-constant default",
                        table, column.name
                    )));
                }
            }
            SchemaOp::CreateTable { table, columns } => {
                if columns.is_empty() {
                    return Err(ShiftError::CatalogError(format!(
                        "table {} has no columns",
                        table
                    )));
                }
                for (i, column) in columns.iter().enumerate() {
                    validate_identifier(&column.name)?;
                    if columns[..i]
                        .iter()
                        .any(|c| c.name.eq_ignore_ascii_case(&column.name))
                    {
                        return Err(ShiftError::CatalogError(format!(
                            "table {} declares column {} twice",
                            table, column.name
                        )));
                    }
                }
                if columns.iter().filter(|c| c.primary_key).count() > 1 {
                    return Err(ShiftError::CatalogError(format!(
                        "table {} declares more than one primary key",
                        table
                    )));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for SchemaOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaOp::AddColumn { table, column } => {
                write!(f, "add column {}.{}", table, column.name)
            }
            SchemaOp::CreateTable { table, .. } => write!(f, "create table {}", table),
        }
    }
}
