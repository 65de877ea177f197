//! Executor port and connection pooling (§4.J)
//!
//! Generalizes the teacher's `DatabaseDriver` trait (`drivers/mod.rs`) and
//! `PostgresDriver` (`drivers/postgres.rs`) from "one trait, five backends"
//! to "one trait, one backend, pooled". Pure components (`diff`, `dsl`,
//! `emit`, `defaults`, `types`) never see this trait; only `reflect`,
//! `orchestrator`, and `seed` depend on it.

use std::collections::HashMap;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::{NoTls, Row};

use crate::config::model::Node;
use crate::error::{EngineError, Result};

/// Rewrite a `:name` style parameter map into positional `$N` syntax plus
/// an ordered parameter list, the way the distilled spec's named-parameter
/// convention (§6) is required to reach `tokio_postgres`.
pub fn rewrite_named_params<'a>(
    sql: &str,
    params: &'a HashMap<String, &'a (dyn tokio_postgres::types::ToSql + Sync)>,
) -> (String, Vec<&'a (dyn tokio_postgres::types::ToSql + Sync)>) {
    let mut rewritten = String::with_capacity(sql.len());
    let mut ordered = Vec::new();
    let mut chars = sql.char_indices().peekable();
    let mut prev_was_colon = false;

    while let Some((i, c)) = chars.next() {
        // A `::type` cast's second colon must never be mistaken for the
        // start of a `:name` placeholder (the look-behind the spec calls
        // for); once consumed, it also can't retroactively un-cast the
        // first colon, so track it explicitly rather than re-scanning.
        if c == ':' && !prev_was_colon && sql[i + 1..].starts_with(|c: char| c.is_alphabetic() || c == '_') {
            let start = i + 1;
            let mut end = start;
            for (j, ch) in sql[start..].char_indices() {
                if ch.is_alphanumeric() || ch == '_' {
                    end = start + j + ch.len_utf8();
                } else {
                    break;
                }
            }
            let name = &sql[start..end];
            if let Some(value) = params.get(name) {
                ordered.push(*value);
                rewritten.push_str(&format!("${}", ordered.len()));
                for _ in start - 1..end - 1 {
                    chars.next();
                }
                prev_was_colon = false;
                continue;
            }
        }
        prev_was_colon = c == ':';
        rewritten.push(c);
    }

    (rewritten, ordered)
}

/// The query-executing port the diff engine's consumers and the seed
/// reconciler depend on. Positional `$N` parameters only — named-parameter
/// rewriting (`rewrite_named_params`) happens in callers that accept a
/// `:name` map, keeping this trait's signature identical to
/// `tokio_postgres::Client`'s.
#[async_trait]
pub trait ExecutorPort: Send + Sync {
    async fn query(
        &self,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<Vec<Row>>;

    async fn query_opt(
        &self,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<Option<Row>>;

    async fn execute(
        &self,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<u64>;

    async fn batch_execute(&self, sql: &str) -> Result<()>;
}

/// Connects to the server's maintenance database (conventionally
/// `postgres`) without selecting a target database, used only for
/// `database_exists`/`CREATE DATABASE` (§5/§6 admin handle).
#[async_trait]
pub trait AdminExecutor: Send + Sync {
    async fn database_exists(&self, name: &str) -> Result<bool>;
    async fn create_database(&self, name: &str) -> Result<()>;
}

/// Pools are keyed by `(user, host, port, database)` so that write- and
/// read-routing nodes that share an endpoint share a pool (§5).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub user: String,
    pub host: String,
    pub port: u16,
    pub database: String,
}

impl PoolKey {
    pub fn for_node(node: &Node) -> Self {
        let host = node.host.hosts().into_iter().next().unwrap_or_default();
        Self {
            user: node.user.clone(),
            host,
            port: node.port,
            database: node.name.clone(),
        }
    }
}

/// `tokio-postgres` + `deadpool-postgres` implementation of `ExecutorPort`.
///
/// The teacher holds a single bare `tokio_postgres::Client` per profile,
/// appropriate for a desktop app with one interactive session per
/// connection; a migration engine that may drive several targets
/// concurrently pools connections instead.
pub struct PostgresExecutor {
    pool: Pool,
}

impl PostgresExecutor {
    pub fn connect(node: &Node) -> Result<Self> {
        let mut cfg = deadpool_postgres::Config::new();
        cfg.host = node.host.hosts().into_iter().next();
        cfg.port = Some(node.port);
        cfg.user = Some(node.user.clone());
        cfg.password = Some(node.pass.clone());
        cfg.dbname = Some(node.name.clone());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let pool = cfg
            .create_pool(Some(deadpool_postgres::Runtime::Tokio1), NoTls)
            .map_err(|e| EngineError::Connectivity(format!("failed to create pool: {e}")))?;

        Ok(Self { pool })
    }

    /// Construct directly from a pre-built pool, for tests and for sharing
    /// one pool across nodes that key to the same `PoolKey`.
    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }

    async fn client(&self) -> Result<deadpool_postgres::Client> {
        self.pool
            .get()
            .await
            .map_err(|e| EngineError::Connectivity(format!("failed to acquire pooled connection: {e}")))
    }
}

#[async_trait]
impl ExecutorPort for PostgresExecutor {
    async fn query(
        &self,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<Vec<Row>> {
        let client = self.client().await?;
        client
            .query(sql, params)
            .await
            .map_err(|e| EngineError::Statement {
                sql: sql.to_string(),
                message: e.to_string(),
            })
    }

    async fn query_opt(
        &self,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<Option<Row>> {
        let client = self.client().await?;
        client
            .query_opt(sql, params)
            .await
            .map_err(|e| EngineError::Statement {
                sql: sql.to_string(),
                message: e.to_string(),
            })
    }

    async fn execute(
        &self,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<u64> {
        let client = self.client().await?;
        client
            .execute(sql, params)
            .await
            .map_err(|e| EngineError::Statement {
                sql: sql.to_string(),
                message: e.to_string(),
            })
    }

    async fn batch_execute(&self, sql: &str) -> Result<()> {
        let client = self.client().await?;
        client
            .batch_execute(sql)
            .await
            .map_err(|e| EngineError::Statement {
                sql: sql.to_string(),
                message: e.to_string(),
            })
    }
}

/// Connects to the server's `postgres` maintenance database for existence
/// probing and `CREATE DATABASE` (which cannot itself run against a
/// database it might be about to replace).
pub struct PostgresAdminExecutor {
    pool: Pool,
}

impl PostgresAdminExecutor {
    pub fn connect(node: &Node) -> Result<Self> {
        let mut cfg = deadpool_postgres::Config::new();
        cfg.host = node.host.hosts().into_iter().next();
        cfg.port = Some(node.port);
        cfg.user = Some(node.user.clone());
        cfg.password = Some(node.pass.clone());
        cfg.dbname = Some("postgres".to_string());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let pool = cfg
            .create_pool(Some(deadpool_postgres::Runtime::Tokio1), NoTls)
            .map_err(|e| EngineError::Connectivity(format!("failed to create admin pool: {e}")))?;

        Ok(Self { pool })
    }

    #[allow(dead_code)]
    fn manager_hint(&self) -> &str {
        // kept only so `Manager`/`RecyclingMethod` stay referenced even if
        // `deadpool_postgres::Config` changes its field surface upstream.
        std::any::type_name::<Manager>()
    }
}

#[async_trait]
impl AdminExecutor for PostgresAdminExecutor {
    async fn database_exists(&self, name: &str) -> Result<bool> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| EngineError::Connectivity(format!("failed to acquire admin connection: {e}")))?;

        let row = client
            .query_opt("SELECT 1 FROM pg_database WHERE datname = $1", &[&name])
            .await
            .map_err(|e| EngineError::Statement {
                sql: "SELECT 1 FROM pg_database WHERE datname = $1".to_string(),
                message: e.to_string(),
            })?;

        Ok(row.is_some())
    }

    async fn create_database(&self, name: &str) -> Result<()> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| EngineError::Connectivity(format!("failed to acquire admin connection: {e}")))?;

        let sql = crate::emit::create_database(name);
        client
            .batch_execute(&sql.sql)
            .await
            .map_err(|e| EngineError::Statement {
                sql: sql.sql.clone(),
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_postgres::types::ToSql;

    #[test]
    fn test_rewrite_named_params_single() {
        let name: &(dyn ToSql + Sync) = &"alice";
        let mut params: HashMap<String, &(dyn ToSql + Sync)> = HashMap::new();
        params.insert("name".to_string(), name);

        let (sql, ordered) = rewrite_named_params("SELECT * FROM users WHERE name = :name", &params);
        assert_eq!(sql, "SELECT * FROM users WHERE name = $1");
        assert_eq!(ordered.len(), 1);
    }

    #[test]
    fn test_rewrite_named_params_repeated_and_unknown() {
        let id: &(dyn ToSql + Sync) = &42i32;
        let mut params: HashMap<String, &(dyn ToSql + Sync)> = HashMap::new();
        params.insert("id".to_string(), id);

        let (sql, ordered) = rewrite_named_params("WHERE id = :id OR parent_id = :missing", &params);
        assert_eq!(sql, "WHERE id = $1 OR parent_id = :missing");
        assert_eq!(ordered.len(), 1);
    }

    #[test]
    fn test_rewrite_named_params_skips_cast_suffix() {
        let id: &(dyn ToSql + Sync) = &1i32;
        let mut params: HashMap<String, &(dyn ToSql + Sync)> = HashMap::new();
        params.insert("id".to_string(), id);

        let (sql, ordered) =
            rewrite_named_params("SELECT foo::text FROM t WHERE id = :id", &params);
        assert_eq!(sql, "SELECT foo::text FROM t WHERE id = $1");
        assert_eq!(ordered.len(), 1);
    }

    #[test]
    fn test_pool_key_uses_first_host() {
        use crate::config::model::HostField;
        let node = Node {
            name: "app".to_string(),
            host: HostField::Many(vec!["primary".to_string(), "replica".to_string()]),
            port: 5432,
            user: "app".to_string(),
            pass: "secret".to_string(),
            role: None,
            pref: None,
            path: None,
            tenant_keys: None,
            pool_max: None,
        };
        let key = PoolKey::for_node(&node);
        assert_eq!(key.host, "primary");
        assert_eq!(key.database, "app");
    }
}
