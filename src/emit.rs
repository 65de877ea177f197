//! SQL emitter (§4.D)
//!
//! Pure functions producing `Statement` values. All identifiers are
//! double-quoted, matching the teacher's `PostgresDdlGenerator`
//! (`ddl/postgres.rs`) identifier quoting; unlike the teacher, this crate
//! targets a single wire dialect, so the emitter is a set of free functions
//! rather than a `DdlGenerator` trait with per-database implementations.

use crate::defaults;
use crate::model::{FieldDefinition, KeyKind, Nullability, ParsedSchema, Statement, StatementKind};
use crate::types;

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Render one column definition for use inside CREATE TABLE / ADD COLUMN.
fn column_definition_sql(field: &FieldDefinition) -> String {
    let mut parts = vec![quote_ident(&field.name), field.field_type.clone()];

    match field.nullable {
        Nullability::NotNull => parts.push("NOT NULL".to_string()),
        Nullability::Null => parts.push("NULL".to_string()),
        Nullability::Unspecified => {}
    }

    let is_serial = types::is_serial_head(first_word(&field.field_type));
    if !is_serial {
        if let Some(expr) = defaults::normalize_for_emission(field.default_raw.as_deref(), &field.field_type)
        {
            parts.push(format!("DEFAULT {expr}"));
        }
    }

    if !field.extra.is_empty() {
        parts.push(field.extra.clone());
    }

    if field.key == KeyKind::Primary {
        parts.push("PRIMARY KEY".to_string());
    }

    parts.join(" ")
}

fn first_word(s: &str) -> &str {
    s.split(|c: char| c == '(' || c.is_whitespace()).next().unwrap_or(s)
}

/// `T_<col>_unique` / `T_<group>_unique_idx` / `T_<col>_idx` / `T_<group>_idx`
/// / `T_pkey` — the expected-name scheme shared by the emitter and the diff
/// engine's orphan-index policy.
pub mod names {
    pub fn unique_constraint(table: &str, column: &str) -> String {
        format!("{table}_{column}_unique")
    }

    pub fn single_index(table: &str, column: &str) -> String {
        format!("{table}_{column}_idx")
    }

    pub fn composite_index(table: &str, group: &str) -> String {
        format!("{table}_{group}_idx")
    }

    pub fn composite_unique_index(table: &str, group: &str) -> String {
        format!("{table}_{group}_unique_idx")
    }

    pub fn primary_key(table: &str) -> String {
        format!("{table}_pkey")
    }
}

/// `CREATE TABLE "T" (…)` plus one `ADD CONSTRAINT … UNIQUE` statement per
/// single-column unique field.
pub fn create_table(table: &str, schema: &ParsedSchema) -> Vec<Statement> {
    let mut statements = Vec::new();

    let columns_sql: Vec<String> = schema
        .fields
        .values()
        .map(column_definition_sql)
        .collect();

    let sql = format!(
        "CREATE TABLE {} ({})",
        quote_ident(table),
        columns_sql.join(", ")
    );
    statements.push(Statement::new(
        table,
        StatementKind::CreateTable,
        sql,
        format!("create table {table}"),
    ));

    for column in schema.unique_single_columns() {
        statements.push(add_unique_single(table, column));
    }

    statements
}

pub fn add_unique_single(table: &str, column: &str) -> Statement {
    let constraint = names::unique_constraint(table, column);
    let sql = format!(
        "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({})",
        quote_ident(table),
        quote_ident(&constraint),
        quote_ident(column)
    );
    Statement::new(
        table,
        StatementKind::AddUnique,
        sql,
        format!("add unique constraint {constraint}"),
    )
}

pub fn add_index_single(table: &str, column: &str) -> Statement {
    let name = names::single_index(table, column);
    let sql = format!(
        "CREATE INDEX CONCURRENTLY {} ON {} ({})",
        quote_ident(&name),
        quote_ident(table),
        quote_ident(column)
    );
    Statement::new(table, StatementKind::AddIndex, sql, format!("add index {name}"))
}

pub fn add_index_composite(table: &str, group: &str, columns: &[String]) -> Statement {
    let name = names::composite_index(table, group);
    let cols = columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
    let sql = format!(
        "CREATE INDEX CONCURRENTLY {} ON {} ({})",
        quote_ident(&name),
        quote_ident(table),
        cols
    );
    Statement::new(table, StatementKind::AddIndex, sql, format!("add composite index {name}"))
}

pub fn add_unique_index_composite(table: &str, group: &str, columns: &[String]) -> Statement {
    let name = names::composite_unique_index(table, group);
    let cols = columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
    let sql = format!(
        "CREATE UNIQUE INDEX CONCURRENTLY {} ON {} ({})",
        quote_ident(&name),
        quote_ident(table),
        cols
    );
    Statement::new(
        table,
        StatementKind::AddUnique,
        sql,
        format!("add composite unique index {name}"),
    )
}

pub fn drop_table(table: &str) -> Statement {
    let sql = format!("DROP TABLE IF EXISTS {} CASCADE", quote_ident(table));
    Statement::new(table, StatementKind::DropTable, sql, format!("drop table {table}"))
}

pub fn create_database(name: &str) -> Statement {
    let sql = format!("CREATE DATABASE {} ENCODING 'UTF8'", quote_ident(name));
    Statement::new("", StatementKind::CreateDb, sql, format!("create database {name}"))
}

pub fn add_column(table: &str, field: &FieldDefinition) -> Statement {
    let sql = format!(
        "ALTER TABLE {} ADD COLUMN {}",
        quote_ident(table),
        column_definition_sql(field)
    );
    Statement::new(
        table,
        StatementKind::AddColumn,
        sql,
        format!("add column {}", field.name),
    )
}

pub fn drop_column(table: &str, column: &str) -> Statement {
    let sql = format!(
        "ALTER TABLE {} DROP COLUMN {}",
        quote_ident(table),
        quote_ident(column)
    );
    Statement::new(table, StatementKind::DropColumn, sql, format!("drop column {column}"))
}

pub fn alter_column_type(table: &str, column: &str, new_type: &str) -> Statement {
    let sql = format!(
        "ALTER TABLE {} ALTER COLUMN {} TYPE {}",
        quote_ident(table),
        quote_ident(column),
        new_type
    );
    Statement::new(
        table,
        StatementKind::AlterColumn,
        sql,
        format!("alter column {column} type"),
    )
}

pub fn set_default(table: &str, column: &str, expr: &str) -> Statement {
    let sql = format!(
        "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {}",
        quote_ident(table),
        quote_ident(column),
        expr
    );
    Statement::new(
        table,
        StatementKind::AlterColumn,
        sql,
        format!("set default on {column}"),
    )
}

pub fn drop_default(table: &str, column: &str) -> Statement {
    let sql = format!(
        "ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT",
        quote_ident(table),
        quote_ident(column)
    );
    Statement::new(
        table,
        StatementKind::AlterColumn,
        sql,
        format!("drop default on {column}"),
    )
}

pub fn set_not_null(table: &str, column: &str) -> Statement {
    let sql = format!(
        "ALTER TABLE {} ALTER COLUMN {} SET NOT NULL",
        quote_ident(table),
        quote_ident(column)
    );
    Statement::new(
        table,
        StatementKind::AlterColumn,
        sql,
        format!("set not null on {column}"),
    )
}

pub fn drop_not_null(table: &str, column: &str) -> Statement {
    let sql = format!(
        "ALTER TABLE {} ALTER COLUMN {} DROP NOT NULL",
        quote_ident(table),
        quote_ident(column)
    );
    Statement::new(
        table,
        StatementKind::AlterColumn,
        sql,
        format!("drop not null on {column}"),
    )
}

pub fn drop_constraint(table: &str, name: &str) -> Statement {
    let sql = format!(
        "ALTER TABLE {} DROP CONSTRAINT {}",
        quote_ident(table),
        quote_ident(name)
    );
    Statement::new(table, StatementKind::DropUnique, sql, format!("drop constraint {name}"))
}

pub fn drop_index(name: &str) -> Statement {
    let sql = format!("DROP INDEX IF EXISTS {}", quote_ident(name));
    Statement::new("", StatementKind::DropIndex, sql, format!("drop index {name}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParsedSchema;

    fn field(name: &str, ty: &str, nullable: Nullability, key: KeyKind) -> FieldDefinition {
        FieldDefinition {
            name: name.to_string(),
            field_type: ty.to_string(),
            nullable,
            key,
            default_raw: None,
            extra: String::new(),
        }
    }

    #[test]
    fn test_create_simple_table() {
        let mut schema = ParsedSchema::new();
        schema.fields.insert(
            "user_id".to_string(),
            field("user_id", "SERIAL", Nullability::Unspecified, KeyKind::Primary),
        );
        schema.fields.insert(
            "user_name".to_string(),
            field("user_name", "VARCHAR(64)", Nullability::NotNull, KeyKind::None),
        );
        schema.fields.insert(
            "user_email".to_string(),
            field("user_email", "VARCHAR(128)", Nullability::Null, KeyKind::UniqueSingle),
        );

        let statements = create_table("users", &schema);
        assert_eq!(statements.len(), 2);

        let create = &statements[0];
        assert!(create.sql.contains("CREATE TABLE \"users\""));
        assert!(create.sql.contains("\"user_id\" SERIAL"));
        assert!(create.sql.contains("PRIMARY KEY"));
        assert!(create.sql.contains("\"user_name\" VARCHAR(64) NOT NULL"));
        assert!(create.sql.contains("\"user_email\" VARCHAR(128) NULL"));
        assert!(!create.sql.contains("user_id\" SERIAL NOT NULL"));

        let unique = &statements[1];
        assert!(unique.sql.contains("ADD CONSTRAINT \"users_user_email_unique\" UNIQUE (\"user_email\")"));
    }

    #[test]
    fn test_serial_never_emits_default() {
        let mut f = field("id", "SERIAL", Nullability::Unspecified, KeyKind::Primary);
        f.default_raw = Some("1".to_string());
        assert!(!column_definition_sql(&f).contains("DEFAULT"));
    }

    #[test]
    fn test_add_column_scenario_from_spec() {
        let f = field("user_bio", "TEXT", Nullability::Null, KeyKind::None);
        let stmt = add_column("users", &f);
        assert_eq!(stmt.sql, "ALTER TABLE \"users\" ADD COLUMN \"user_bio\" TEXT NULL");
    }

    #[test]
    fn test_drop_table_sql() {
        let stmt = drop_table("sessions");
        assert_eq!(stmt.sql, "DROP TABLE IF EXISTS \"sessions\" CASCADE");
    }

    #[test]
    fn test_add_index_uses_concurrently() {
        let stmt = add_index_single("users", "email");
        assert_eq!(
            stmt.sql,
            "CREATE INDEX CONCURRENTLY \"users_email_idx\" ON \"users\" (\"email\")"
        );
    }

    #[test]
    fn test_create_database() {
        let stmt = create_database("app_db");
        assert_eq!(stmt.sql, "CREATE DATABASE \"app_db\" ENCODING 'UTF8'");
    }
}
