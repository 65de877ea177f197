//! Core data model shared by the DSL parser, the reflector, and the diff
//! engine.
//!
//! These types are plain value objects: nothing here touches the network or
//! the filesystem. `ParsedSchema` is produced per declaration load and
//! discarded per target; `TableShape` is produced on demand per table per
//! target and discarded immediately after diffing; `Statement`s are
//! accumulated per target and released after application or rendering.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

/// Whether a declared column is nullable.
///
/// `Unspecified` is distinct from `Null`: SERIAL columns override both the
/// `required`/absent modifier to `Unspecified`, which skips the nullability
/// diff step entirely rather than forcing `NULL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nullability {
    NotNull,
    Null,
    Unspecified,
}

/// Whether a declared column participates in a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Primary,
    UniqueSingle,
    None,
}

/// One column in a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    pub name: String,
    /// Upper-case, catalog-ready form, e.g. `VARCHAR(64)`, `NUMERIC(16,8)`,
    /// `SERIAL`.
    pub field_type: String,
    pub nullable: Nullability,
    pub key: KeyKind,
    /// The raw default expression exactly as written in the declaration,
    /// before `defaults::normalize_for_emission` is applied.
    pub default_raw: Option<String>,
    /// Free-form trailing fragment, upper-cased (e.g. `COLLATE "C"`).
    pub extra: String,
}

/// The parsed shape of one table declaration.
#[derive(Debug, Clone, Default)]
pub struct ParsedSchema {
    /// Column name -> definition, insertion order preserved for CREATE
    /// TABLE column ordering.
    pub fields: indexmap::IndexMap<String, FieldDefinition>,
    /// Columns carrying a bare `index` modifier, in encounter order.
    pub individual_indexes: Vec<String>,
    /// Composite index group name -> columns, in encounter order.
    pub composite_indexes: indexmap::IndexMap<String, Vec<String>>,
    /// Composite unique-index group name -> columns, in encounter order.
    pub composite_unique_indexes: indexmap::IndexMap<String, Vec<String>>,
}

impl ParsedSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// The single column with `key = Primary`, if any. The DSL parser
    /// guarantees there is at most one.
    pub fn primary_key_column(&self) -> Option<&str> {
        self.fields
            .values()
            .find(|f| f.key == KeyKind::Primary)
            .map(|f| f.name.as_str())
    }

    /// Columns with `key = UniqueSingle`, in insertion order.
    pub fn unique_single_columns(&self) -> Vec<&str> {
        self.fields
            .values()
            .filter(|f| f.key == KeyKind::UniqueSingle)
            .map(|f| f.name.as_str())
            .collect()
    }
}

/// One reflected column, exactly as the catalog reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnShape {
    pub name: String,
    /// Lower-case wire form, e.g. `character varying`, `integer`.
    pub data_type: String,
    pub is_nullable: bool,
    pub char_max_length: Option<i64>,
    pub default_expr: Option<String>,
    pub numeric_precision: Option<i64>,
    pub numeric_scale: Option<i64>,
}

/// The reflected shape of one live table.
#[derive(Debug, Clone, Default)]
pub struct TableShape {
    pub columns: HashMap<String, ColumnShape>,
    pub index_names: BTreeSet<String>,
    pub unique_constraint_names: BTreeSet<String>,
}

/// The kind of schema-changing statement a `Statement` represents.
///
/// A closed tagged variant rather than a string tag: the source language
/// this was distilled from dispatches on a string discriminant, but Rust
/// gives us an exhaustive match for free, so the emitter's constructors and
/// the orchestrator's per-target consumer both get compile-time coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatementKind {
    CreateDb,
    CreateTable,
    DropTable,
    AddColumn,
    DropColumn,
    AlterColumn,
    AddIndex,
    DropIndex,
    AddUnique,
    DropUnique,
    Raw,
}

/// An immutable, fully-rendered schema-changing statement.
///
/// Statements are value objects: once emitted, the engine never mutates
/// them. `table` is empty for database-level statements (`CREATE DATABASE`).
#[derive(Debug, Clone, Serialize)]
pub struct Statement {
    pub table: String,
    pub kind: StatementKind,
    pub sql: String,
    pub description: String,
}

impl Statement {
    pub fn new(
        table: impl Into<String>,
        kind: StatementKind,
        sql: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            kind,
            sql: sql.into(),
            description: description.into(),
        }
    }

    /// Whether this statement may run inside a transaction block. Only
    /// `CREATE INDEX CONCURRENTLY` forbids it (§4.D/§5 transaction
    /// discipline); the orchestrator uses this to decide how to apply.
    pub fn is_transaction_compatible(&self) -> bool {
        !matches!(
            self.kind,
            StatementKind::AddIndex | StatementKind::AddUnique
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_key_column_lookup() {
        let mut schema = ParsedSchema::new();
        schema.fields.insert(
            "id".to_string(),
            FieldDefinition {
                name: "id".to_string(),
                field_type: "SERIAL".to_string(),
                nullable: Nullability::Unspecified,
                key: KeyKind::Primary,
                default_raw: None,
                extra: String::new(),
            },
        );
        schema.fields.insert(
            "name".to_string(),
            FieldDefinition {
                name: "name".to_string(),
                field_type: "VARCHAR(64)".to_string(),
                nullable: Nullability::Null,
                key: KeyKind::None,
                default_raw: None,
                extra: String::new(),
            },
        );

        assert_eq!(schema.primary_key_column(), Some("id"));
    }

    #[test]
    fn test_add_index_is_not_transaction_compatible() {
        let stmt = Statement::new(
            "users",
            StatementKind::AddIndex,
            "CREATE INDEX CONCURRENTLY \"users_email_idx\" ON \"users\" (\"email\")",
            "add index",
        );
        assert!(!stmt.is_transaction_compatible());
    }

    #[test]
    fn test_add_column_is_transaction_compatible() {
        let stmt = Statement::new(
            "users",
            StatementKind::AddColumn,
            "ALTER TABLE \"users\" ADD COLUMN \"bio\" TEXT NULL",
            "add column",
        );
        assert!(stmt.is_transaction_compatible());
    }
}
