//! Seed reconciler (§4.H) — the largest component.
//!
//! Reconciles declared row sets against live table contents: prefix
//! rewrite, match-column discovery, an analyze pass that classifies each
//! row, and an apply pass that reconciles via upsert-or-check. Declared
//! values come from trusted configuration files, not network input, so
//! (unlike `reflect`/`executor`, which always bind parameters) this module
//! renders literals directly into SQL text the way `emit` renders DDL,
//! keeping one rendering style for every statement the engine ever
//! produces.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::defaults::escape_single_quotes;
use crate::error::Result;
use crate::executor::ExecutorPort;
use crate::files::{apply_prefix, SeedFile};

static NUMERIC_STRING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+(\.\d+)?$").unwrap());
static DATE_LIKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}").unwrap());
static DATE_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(Z|[+-]\d{2}(:?\d{2})?)$").unwrap());

/// One declared table's rows, as loaded from a seed file.
#[derive(Debug, Clone)]
pub struct DeclaredTable {
    pub table_name: String,
    pub rows: Vec<BTreeMap<String, Value>>,
    pub source_file: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowClassification {
    Insert,
    Update,
    Unchanged,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ReconcileCounts {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Canonicalize a declared-or-reflected value for comparison (§4.H value
/// normalizer). `null` equals `null`; numeric strings coerce to numbers;
/// a declared string that parses as JSON is treated as its parsed form;
/// date-shaped strings are reduced to a local wall-clock form; everything
/// else compares as a string.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Bool(b) => Value::Bool(*b),
        Value::Number(n) => Value::Number(
            n.as_f64()
                .and_then(serde_json::Number::from_f64)
                .unwrap_or_else(|| n.clone()),
        ),
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        Value::Object(map) => {
            let canon: serde_json::Map<String, Value> =
                map.iter().map(|(k, v)| (k.clone(), canonicalize(v))).collect();
            Value::Object(canon)
        }
        Value::String(s) => canonicalize_string(s),
    }
}

fn canonicalize_string(s: &str) -> Value {
    let trimmed = s.trim();

    if (trimmed.starts_with('{') || trimmed.starts_with('[')) && serde_json::from_str::<Value>(trimmed).is_ok()
    {
        let parsed: Value = serde_json::from_str(trimmed).unwrap();
        return canonicalize(&parsed);
    }

    if NUMERIC_STRING.is_match(trimmed) {
        if let Ok(n) = trimmed.parse::<f64>() {
            if let Some(number) = serde_json::Number::from_f64(n) {
                return Value::Number(number);
            }
        }
    }

    if DATE_LIKE.is_match(trimmed) {
        let without_suffix = DATE_SUFFIX.replace(trimmed, "");
        let reduced = without_suffix.replacen('T', " ", 1);
        return Value::String(reduced);
    }

    Value::String(trimmed.to_string())
}

/// Two values are equal iff their canonical forms are equal (§4.H).
pub fn values_equal(declared: &Value, reflected: &Value) -> bool {
    canonicalize(declared) == canonicalize(reflected)
}

/// Convert a parsed seed file into the per-table row sets `reconcile_table`
/// consumes, translating `serde_yaml::Value` rows (the file format) into
/// `serde_json::Value` rows (the normalizer's working type).
pub fn declared_tables_from_seed_file(file: &SeedFile) -> Vec<DeclaredTable> {
    file.tables
        .iter()
        .map(|(table_name, rows)| DeclaredTable {
            table_name: table_name.clone(),
            rows: rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|(k, v)| (k.clone(), yaml_to_json(v)))
                        .collect::<BTreeMap<_, _>>()
                })
                .collect(),
            source_file: file.path.display().to_string(),
        })
        .collect()
}

fn yaml_to_json(value: &serde_yaml::Value) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Discover the match-column set for `row`, per §4.H step 2: primary-key
/// columns if every one is present in the row; otherwise the first unique
/// index (in catalog/name order) whose columns are all present.
pub fn discover_match_columns(
    primary_key_columns: &[String],
    unique_index_defs: &BTreeMap<String, Vec<String>>,
    row: &BTreeMap<String, Value>,
) -> Vec<String> {
    if !primary_key_columns.is_empty() && primary_key_columns.iter().all(|c| row.contains_key(c)) {
        return primary_key_columns.to_vec();
    }

    for columns in unique_index_defs.values() {
        if !columns.is_empty() && columns.iter().all(|c| row.contains_key(c)) {
            return columns.clone();
        }
    }

    Vec::new()
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Render a declared value as a SQL literal. Declared values originate
/// from configuration files, not network input.
pub fn render_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{}'", escape_single_quotes(s)),
        Value::Array(_) | Value::Object(_) => {
            format!("'{}'::jsonb", escape_single_quotes(&value.to_string()))
        }
    }
}

/// Build the `SELECT` used by the analyze pass: every declared column,
/// filtered by the match columns.
pub fn build_select_by_match(table: &str, row: &BTreeMap<String, Value>, match_columns: &[String]) -> String {
    let columns = row.keys().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
    let predicate = match_columns
        .iter()
        .map(|c| format!("{} = {}", quote_ident(c), render_literal(&row[c])))
        .collect::<Vec<_>>()
        .join(" AND ");

    format!("SELECT {columns} FROM {} WHERE {predicate}", quote_ident(table))
}

/// Build the `SELECT` used by the insert-only check-then-insert path:
/// matches every declared column exactly.
pub fn build_select_by_all(table: &str, row: &BTreeMap<String, Value>) -> String {
    let predicate = row
        .iter()
        .map(|(c, v)| format!("{} = {}", quote_ident(c), render_literal(v)))
        .collect::<Vec<_>>()
        .join(" AND ");

    format!("SELECT 1 FROM {} WHERE {predicate}", quote_ident(table))
}

/// Build the upsert statement for the apply pass (§4.H step 4). When there
/// are no non-match columns, falls back to `ON CONFLICT DO NOTHING`.
pub fn build_upsert(table: &str, row: &BTreeMap<String, Value>, match_columns: &[String]) -> String {
    let columns: Vec<&String> = row.keys().collect();
    let column_list = columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
    let value_list = columns
        .iter()
        .map(|c| render_literal(&row[*c]))
        .collect::<Vec<_>>()
        .join(", ");
    let conflict_cols = match_columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");

    let non_match: Vec<&&String> = columns.iter().filter(|c| !match_columns.contains(*c)).collect();

    if non_match.is_empty() {
        return format!(
            "INSERT INTO {} ({column_list}) VALUES ({value_list}) ON CONFLICT ({conflict_cols}) DO NOTHING",
            quote_ident(table)
        );
    }

    let set_clause = non_match
        .iter()
        .map(|c| format!("{} = EXCLUDED.{}", quote_ident(c), quote_ident(c)))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO {} ({column_list}) VALUES ({value_list}) ON CONFLICT ({conflict_cols}) DO UPDATE SET {set_clause} RETURNING (xmax = 0) AS is_insert",
        quote_ident(table)
    )
}

/// Reconcile one declared table's rows against the live table. `row_reader`
/// fetches the existing row (if any) matching a given SELECT; `applier`
/// executes an apply statement (insert-only check, or upsert).
pub async fn reconcile_table(
    executor: &dyn ExecutorPort,
    cluster_prefix: Option<&str>,
    primary_key_columns: &[String],
    unique_index_defs: &BTreeMap<String, Vec<String>>,
    declared: &DeclaredTable,
) -> Result<ReconcileCounts> {
    let table_name = apply_prefix(cluster_prefix, &declared.table_name);
    let mut counts = ReconcileCounts::default();

    for row in &declared.rows {
        let match_columns = discover_match_columns(primary_key_columns, unique_index_defs, row);

        let classification = match analyze_row(executor, &table_name, row, &match_columns).await {
            Ok(c) => c,
            Err(e) => {
                warn!(table = %table_name, error = %e, "skipping row, analysis failed");
                counts.skipped += 1;
                continue;
            }
        };

        match classification {
            RowClassification::Unchanged => {
                counts.unchanged += 1;
                continue;
            }
            RowClassification::Insert | RowClassification::Update => {
                let sql = if match_columns.is_empty() {
                    build_select_by_all(&table_name, row)
                } else {
                    build_upsert(&table_name, row, &match_columns)
                };

                match apply_row(executor, &table_name, row, &match_columns, &sql).await {
                    Ok(()) => {
                        if classification == RowClassification::Insert {
                            counts.inserted += 1;
                        } else {
                            counts.updated += 1;
                        }
                    }
                    Err(e) => {
                        warn!(table = %table_name, error = %e, "row apply failed");
                        counts.failed += 1;
                    }
                }
            }
        }
    }

    Ok(counts)
}

async fn analyze_row(
    executor: &dyn ExecutorPort,
    table: &str,
    row: &BTreeMap<String, Value>,
    match_columns: &[String],
) -> Result<RowClassification> {
    if match_columns.is_empty() {
        return Ok(RowClassification::Insert);
    }

    let sql = build_select_by_match(table, row, match_columns);
    let existing = executor.query_opt(&sql, &[]).await?;

    let Some(existing) = existing else {
        return Ok(RowClassification::Insert);
    };

    let reflected = row_to_value_map(&existing);
    let differs = row
        .iter()
        .filter(|(c, _)| !match_columns.contains(c))
        .any(|(c, declared_value)| {
            let reflected_value = reflected.get(c).cloned().unwrap_or(Value::Null);
            !values_equal(declared_value, &reflected_value)
        });

    Ok(if differs {
        RowClassification::Update
    } else {
        RowClassification::Unchanged
    })
}

async fn apply_row(
    executor: &dyn ExecutorPort,
    table: &str,
    row: &BTreeMap<String, Value>,
    match_columns: &[String],
    sql: &str,
) -> Result<()> {
    if match_columns.is_empty() {
        let existing = executor.query_opt(sql, &[]).await?;
        if existing.is_none() {
            let columns: Vec<&String> = row.keys().collect();
            let column_list = columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
            let value_list = columns
                .iter()
                .map(|c| render_literal(&row[*c]))
                .collect::<Vec<_>>()
                .join(", ");
            let insert_sql = format!("INSERT INTO {} ({column_list}) VALUES ({value_list})", quote_ident(table));
            executor.execute(&insert_sql, &[]).await?;
        }
        return Ok(());
    }

    executor.query(sql, &[]).await?;
    Ok(())
}

/// Convert a `Row` into a column-name -> JSON value map, so reflected
/// values can be canonicalized the same way declared values are.
/// Grounded on the teacher's `PostgresDriver::row_to_json_vec`
/// (`drivers/postgres.rs`), generalized from positional values to a
/// name-keyed map since the value normalizer compares by column name.
fn row_to_value_map(row: &tokio_postgres::Row) -> BTreeMap<String, Value> {
    let mut values = BTreeMap::new();

    for (i, column) in row.columns().iter().enumerate() {
        let name = column.name().to_string();
        let type_name = column.type_().name();

        let value = match type_name {
            "bool" => row
                .try_get::<_, Option<bool>>(i)
                .ok()
                .flatten()
                .map(Value::Bool)
                .unwrap_or(Value::Null),
            "int2" | "int4" => row
                .try_get::<_, Option<i32>>(i)
                .ok()
                .flatten()
                .map(|v| Value::Number(v.into()))
                .unwrap_or(Value::Null),
            "int8" => row
                .try_get::<_, Option<i64>>(i)
                .ok()
                .flatten()
                .map(|v| Value::Number(v.into()))
                .unwrap_or(Value::Null),
            "float4" | "float8" | "numeric" => row
                .try_get::<_, Option<f64>>(i)
                .ok()
                .flatten()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .or_else(|| {
                    row.try_get::<_, Option<String>>(i)
                        .ok()
                        .flatten()
                        .map(Value::String)
                })
                .unwrap_or(Value::Null),
            "json" | "jsonb" => row
                .try_get::<_, Option<Value>>(i)
                .ok()
                .flatten()
                .unwrap_or(Value::Null),
            "timestamp" => row
                .try_get::<_, Option<chrono::NaiveDateTime>>(i)
                .ok()
                .flatten()
                .map(|v| Value::String(v.format("%Y-%m-%d %H:%M:%S").to_string()))
                .unwrap_or(Value::Null),
            "timestamptz" => row
                .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(i)
                .ok()
                .flatten()
                .map(|v| Value::String(v.format("%Y-%m-%d %H:%M:%S").to_string()))
                .unwrap_or(Value::Null),
            "date" => row
                .try_get::<_, Option<chrono::NaiveDate>>(i)
                .ok()
                .flatten()
                .map(|v| Value::String(v.format("%Y-%m-%d").to_string()))
                .unwrap_or(Value::Null),
            "time" | "timetz" => row
                .try_get::<_, Option<chrono::NaiveTime>>(i)
                .ok()
                .flatten()
                .map(|v| Value::String(v.format("%H:%M:%S").to_string()))
                .unwrap_or(Value::Null),
            _ => row
                .try_get::<_, Option<String>>(i)
                .ok()
                .flatten()
                .map(Value::String)
                .unwrap_or(Value::Null),
        };

        values.insert(name, value);
    }

    values
}
