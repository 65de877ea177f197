//! Diff engine (§4.F) — the core of the crate.
//!
//! `diff(table, schema, shape)` is a pure function: no network, no
//! filesystem, same inputs produce the identical statement list
//! byte-for-byte (§8). The nine-step order below is fixed; callers never
//! reorder the result.

use std::collections::BTreeSet;

use crate::defaults::{self, DefaultComparison};
use crate::emit::{self, names};
use crate::model::{KeyKind, Nullability, ParsedSchema, Statement, TableShape};
use crate::types;

/// The set of index/unique-constraint names a `ParsedSchema` implies for
/// `table`, per §4.F's expected-name computation.
pub struct ExpectedNames {
    pub index_names: BTreeSet<String>,
    pub unique_constraint_names: BTreeSet<String>,
    pub primary_key_index: Option<String>,
}

pub fn expected_names(table: &str, schema: &ParsedSchema) -> ExpectedNames {
    let mut index_names = BTreeSet::new();
    let mut unique_constraint_names = BTreeSet::new();

    for column in &schema.individual_indexes {
        index_names.insert(names::single_index(table, column));
    }
    for group in schema.composite_indexes.keys() {
        index_names.insert(names::composite_index(table, group));
    }
    for group in schema.composite_unique_indexes.keys() {
        index_names.insert(names::composite_unique_index(table, group));
    }
    for column in schema.unique_single_columns() {
        index_names.insert(names::unique_constraint(table, column));
        unique_constraint_names.insert(names::unique_constraint(table, column));
    }

    let primary_key_index = schema.primary_key_column().map(|_| names::primary_key(table));

    ExpectedNames {
        index_names,
        unique_constraint_names,
        primary_key_index,
    }
}

/// Compare `schema` against the live `shape` for `table`, producing the
/// fixed nine-step statement list.
pub fn diff(table: &str, schema: &ParsedSchema, shape: &TableShape) -> Vec<Statement> {
    let mut statements = Vec::new();
    let expected = expected_names(table, schema);

    // 1. DROP_COLUMN for reflected columns absent from the schema.
    let mut dropped_columns: Vec<&String> = shape
        .columns
        .keys()
        .filter(|name| !schema.fields.contains_key(*name))
        .collect();
    dropped_columns.sort();
    for column in dropped_columns {
        statements.push(emit::drop_column(table, column));
    }

    // 2. DROP_UNIQUE for unexpected unique constraints.
    let mut dropped_unique: Vec<&String> = shape
        .unique_constraint_names
        .iter()
        .filter(|name| !expected.unique_constraint_names.contains(*name))
        .collect();
    dropped_unique.sort();
    for name in dropped_unique {
        statements.push(emit::drop_constraint(table, name));
    }

    // 3. DROP_INDEX for unexpected indexes, excluding the primary key index.
    let pkey_name = expected
        .primary_key_index
        .clone()
        .unwrap_or_else(|| names::primary_key(table));
    let mut dropped_indexes: Vec<&String> = shape
        .index_names
        .iter()
        .filter(|name| *name != &pkey_name && !expected.index_names.contains(*name))
        .collect();
    dropped_indexes.sort();
    for name in dropped_indexes {
        statements.push(emit::drop_index(name));
    }

    // 4. ADD_COLUMN for schema columns missing from the reflection.
    for (name, field) in &schema.fields {
        if !shape.columns.contains_key(name) {
            statements.push(emit::add_column(table, field));
        }
    }

    // 5. ALTER_COLUMN (TYPE) for retained columns whose resolved type
    // disagrees with the reflected dataType.
    for (name, field) in &schema.fields {
        let Some(reflected) = shape.columns.get(name) else {
            continue;
        };
        if type_mismatch(field, reflected) {
            statements.push(emit::alter_column_type(table, name, &field.field_type));
        }
    }

    // 6. ALTER_COLUMN (SET/DROP DEFAULT).
    for (name, field) in &schema.fields {
        let Some(reflected) = shape.columns.get(name) else {
            continue;
        };
        let is_serial = types::is_serial_head(first_word(&field.field_type));
        if is_serial {
            continue;
        }
        let default_is_sequence_on_primary = field.key == KeyKind::Primary
            && reflected
                .default_expr
                .as_deref()
                .map(|d| d.contains("nextval("))
                .unwrap_or(false);
        if default_is_sequence_on_primary {
            continue;
        }

        match defaults::compare(
            field.default_raw.as_deref(),
            &field.field_type,
            reflected.default_expr.as_deref(),
        ) {
            DefaultComparison::Same => {}
            DefaultComparison::MustDrop => statements.push(emit::drop_default(table, name)),
            DefaultComparison::MustSet(expr) => {
                statements.push(emit::set_default(table, name, &expr))
            }
        }
    }

    // 7. ALTER_COLUMN (SET/DROP NOT NULL).
    for (name, field) in &schema.fields {
        if field.nullable == Nullability::Unspecified {
            continue;
        }
        let Some(reflected) = shape.columns.get(name) else {
            continue;
        };
        let wants_not_null = field.nullable == Nullability::NotNull;
        if wants_not_null && reflected.is_nullable {
            statements.push(emit::set_not_null(table, name));
        } else if !wants_not_null && !reflected.is_nullable {
            statements.push(emit::drop_not_null(table, name));
        }
    }

    // 8. ADD_INDEX for missing individual/composite/composite-unique indexes.
    for column in &schema.individual_indexes {
        let name = names::single_index(table, column);
        if !shape.index_names.contains(&name) {
            statements.push(emit::add_index_single(table, column));
        }
    }
    for (group, columns) in &schema.composite_indexes {
        let name = names::composite_index(table, group);
        if !shape.index_names.contains(&name) {
            statements.push(emit::add_index_composite(table, group, columns));
        }
    }
    for (group, columns) in &schema.composite_unique_indexes {
        let name = names::composite_unique_index(table, group);
        if !shape.index_names.contains(&name) {
            statements.push(emit::add_unique_index_composite(table, group, columns));
        }
    }

    // 9. ADD_UNIQUE for missing single-column unique constraints.
    for column in schema.unique_single_columns() {
        let name = names::unique_constraint(table, column);
        if !shape.unique_constraint_names.contains(&name) {
            statements.push(emit::add_unique_single(table, column));
        }
    }

    statements
}

fn first_word(s: &str) -> &str {
    s.split(|c: char| c == '(' || c.is_whitespace()).next().unwrap_or(s)
}

/// Whether the declared type disagrees with the reflected `data_type`,
/// accounting for numeric precision/scale and character length.
fn type_mismatch(field: &crate::model::FieldDefinition, reflected: &crate::model::ColumnShape) -> bool {
    let (head, params) = split_head_params(&field.field_type);
    let wire = types::wire_form(&head);

    if wire != reflected.data_type.to_lowercase() {
        return true;
    }

    match params {
        Some((precision, Some(scale))) => {
            reflected.numeric_precision != Some(precision) || reflected.numeric_scale != Some(scale)
        }
        Some((length, None)) => reflected.char_max_length != Some(length),
        None => false,
    }
}

/// Split `"NUMERIC(16,8)"` into `("NUMERIC", Some((16, Some(8))))`, or
/// `"VARCHAR(64)"` into `("VARCHAR", Some((64, None)))`, or `"TEXT"` into
/// `("TEXT", None)`.
fn split_head_params(field_type: &str) -> (String, Option<(i64, Option<i64>)>) {
    let Some(start) = field_type.find('(') else {
        return (field_type.to_string(), None);
    };
    let Some(end) = field_type.rfind(')') else {
        return (field_type.to_string(), None);
    };
    if end <= start {
        return (field_type.to_string(), None);
    }

    let head = field_type[..start].to_string();
    let inner = &field_type[start + 1..end];
    let mut parts = inner.splitn(2, ',');
    let first = parts.next().and_then(|s| s.trim().parse::<i64>().ok());
    let second = parts.next().and_then(|s| s.trim().parse::<i64>().ok());

    match first {
        Some(p) => (head, Some((p, second))),
        None => (head, None),
    }
}
