//! Live reflector (§4.E)
//!
//! Reads `information_schema`/`pg_catalog` through an `ExecutorPort`,
//! producing the comparable shapes the diff engine consumes. Grounded on
//! the teacher's `PostgresDriver::get_table_schema` (`drivers/postgres.rs`),
//! generalized to also report numeric precision/scale and unique-index
//! column lists, and split into one function per concern rather than one
//! `get_table_schema` doing everything, since the diff engine needs to call
//! these independently (index names without columns, e.g.).

use std::collections::{BTreeSet, HashMap};

use crate::executor::ExecutorPort;
use crate::model::{ColumnShape, TableShape};

/// All base-table names in the `public` schema.
pub async fn list_tables(executor: &dyn ExecutorPort) -> crate::error::Result<Vec<String>> {
    let rows = executor
        .query(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = 'public' AND table_type = 'BASE TABLE' \
             ORDER BY table_name",
            &[],
        )
        .await?;

    Ok(rows.iter().map(|r| r.get::<_, String>(0)).collect())
}

/// Reflected column shapes for one table, keyed by column name.
pub async fn columns_of(
    executor: &dyn ExecutorPort,
    table: &str,
) -> crate::error::Result<HashMap<String, ColumnShape>> {
    let rows = executor
        .query(
            "SELECT column_name, data_type, is_nullable, character_maximum_length, \
             column_default, numeric_precision, numeric_scale \
             FROM information_schema.columns \
             WHERE table_schema = 'public' AND table_name = $1 \
             ORDER BY ordinal_position",
            &[&table],
        )
        .await
        .map_err(|e| crate::error::EngineError::Reflection {
            table: table.to_string(),
            message: e.to_string(),
        })?;

    let mut columns = HashMap::new();
    for row in &rows {
        let name: String = row.get(0);
        let data_type: String = row.get(1);
        let is_nullable_yn: String = row.get(2);
        let char_max_length: Option<i32> = row.get(3);
        let default_expr: Option<String> = row.get(4);
        let numeric_precision: Option<i32> = row.get(5);
        let numeric_scale: Option<i32> = row.get(6);

        columns.insert(
            name.clone(),
            ColumnShape {
                name,
                data_type,
                is_nullable: is_nullable_yn == "YES",
                char_max_length: char_max_length.map(i64::from),
                default_expr,
                numeric_precision: numeric_precision.map(i64::from),
                numeric_scale: numeric_scale.map(i64::from),
            },
        );
    }

    Ok(columns)
}

/// All index names on `table` (both unique and non-unique), from
/// `pg_catalog` rather than `information_schema` since Postgres exposes no
/// standard view for index existence.
pub async fn index_names_of(
    executor: &dyn ExecutorPort,
    table: &str,
) -> crate::error::Result<BTreeSet<String>> {
    let rows = executor
        .query(
            "SELECT i.relname FROM pg_index ix \
             JOIN pg_class i ON i.oid = ix.indexrelid \
             JOIN pg_class t ON t.oid = ix.indrelid \
             JOIN pg_namespace n ON n.oid = t.relnamespace \
             WHERE n.nspname = 'public' AND t.relname = $1",
            &[&table],
        )
        .await
        .map_err(|e| crate::error::EngineError::Reflection {
            table: table.to_string(),
            message: e.to_string(),
        })?;

    Ok(rows.iter().map(|r| r.get::<_, String>(0)).collect())
}

/// Names of unique constraints (distinct from unique indexes backing them
/// — every unique constraint has a backing index of the same name, but not
/// every unique index backs a constraint).
pub async fn unique_constraint_names_of(
    executor: &dyn ExecutorPort,
    table: &str,
) -> crate::error::Result<BTreeSet<String>> {
    let rows = executor
        .query(
            "SELECT constraint_name FROM information_schema.table_constraints \
             WHERE table_schema = 'public' AND table_name = $1 AND constraint_type = 'UNIQUE'",
            &[&table],
        )
        .await
        .map_err(|e| crate::error::EngineError::Reflection {
            table: table.to_string(),
            message: e.to_string(),
        })?;

    Ok(rows.iter().map(|r| r.get::<_, String>(0)).collect())
}

/// The ordered column list of the table's primary key, if any.
pub async fn primary_key_columns_of(
    executor: &dyn ExecutorPort,
    table: &str,
) -> crate::error::Result<Vec<String>> {
    let rows = executor
        .query(
            "SELECT ku.column_name FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage ku \
               ON tc.constraint_name = ku.constraint_name AND tc.table_schema = ku.table_schema \
             WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_schema = 'public' \
               AND tc.table_name = $1 \
             ORDER BY ku.ordinal_position",
            &[&table],
        )
        .await
        .map_err(|e| crate::error::EngineError::Reflection {
            table: table.to_string(),
            message: e.to_string(),
        })?;

    Ok(rows.iter().map(|r| r.get::<_, String>(0)).collect())
}

/// Maps unique index name to its ordered column list, used by the diff
/// engine to recognize a composite unique index that already matches a
/// declared composite-unique group under a different, caller-given name.
pub async fn unique_index_defs_of(
    executor: &dyn ExecutorPort,
    table: &str,
) -> crate::error::Result<HashMap<String, Vec<String>>> {
    let rows = executor
        .query(
            "SELECT i.relname, array_agg(a.attname ORDER BY array_position(ix.indkey, a.attnum)) \
             FROM pg_index ix \
             JOIN pg_class i ON i.oid = ix.indexrelid \
             JOIN pg_class t ON t.oid = ix.indrelid \
             JOIN pg_namespace n ON n.oid = t.relnamespace \
             CROSS JOIN LATERAL unnest(ix.indkey) WITH ORDINALITY AS u(attnum, ord) \
             JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = u.attnum \
             WHERE n.nspname = 'public' AND t.relname = $1 AND ix.indisunique \
             GROUP BY i.relname",
            &[&table],
        )
        .await
        .map_err(|e| crate::error::EngineError::Reflection {
            table: table.to_string(),
            message: e.to_string(),
        })?;

    Ok(rows
        .iter()
        .map(|r| (r.get::<_, String>(0), r.get::<_, Vec<String>>(1)))
        .collect())
}

/// Full reflected shape of one table, composed of the individual reads
/// above. Not used by the diff engine directly (it calls the narrower
/// functions so it can skip reads it doesn't need), but convenient for the
/// `status`/`query` CLI commands.
pub async fn table_shape_of(
    executor: &dyn ExecutorPort,
    table: &str,
) -> crate::error::Result<TableShape> {
    let columns = columns_of(executor, table).await?;
    let index_names = index_names_of(executor, table).await?;
    let unique_constraint_names = unique_constraint_names_of(executor, table).await?;

    Ok(TableShape {
        columns,
        index_names,
        unique_constraint_names,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio_postgres::Row;

    /// A stub executor that records calls and returns canned errors; real
    /// row-shaped responses require a live connection (`tokio_postgres::Row`
    /// has no public constructor), so the positive-path queries above are
    /// exercised against a real database in integration testing, not here.
    struct RecordingExecutor {
        calls: Mutex<Vec<String>>,
    }

    impl RecordingExecutor {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ExecutorPort for RecordingExecutor {
        async fn query(
            &self,
            sql: &str,
            _params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
        ) -> crate::error::Result<Vec<Row>> {
            self.calls.lock().unwrap().push(sql.to_string());
            Err(crate::error::EngineError::Connectivity("stub has no rows".to_string()))
        }

        async fn query_opt(
            &self,
            _sql: &str,
            _params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
        ) -> crate::error::Result<Option<Row>> {
            Ok(None)
        }

        async fn execute(
            &self,
            _sql: &str,
            _params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
        ) -> crate::error::Result<u64> {
            Ok(0)
        }

        async fn batch_execute(&self, _sql: &str) -> crate::error::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_columns_of_wraps_query_error_as_reflection() {
        let executor = RecordingExecutor::new();
        let err = columns_of(&executor, "users").await.unwrap_err();
        assert!(matches!(err, crate::error::EngineError::Reflection { table, .. } if table == "users"));
    }

    #[tokio::test]
    async fn test_list_tables_issues_information_schema_query() {
        let executor = RecordingExecutor::new();
        let _ = list_tables(&executor).await;
        let calls = executor.calls.lock().unwrap();
        assert!(calls[0].contains("information_schema.tables"));
        assert!(calls[0].contains("BASE TABLE"));
    }
}
