//! Migration orchestrator (§4.G)
//!
//! Drives the type dictionary, DSL parser, emitter, reflector, and diff
//! engine across one target cluster node. Grounded on the teacher's
//! command-dispatch shape (`drivers::DatabaseDriver` consumers in
//! `src/commands`, since deleted — see DESIGN.md) generalized from "one
//! Tauri command per user action" to "one orchestrator method per CLI
//! subcommand".

use std::path::Path;

use tracing::{info, warn};

use crate::config::model::Node;
use crate::diff;
use crate::dsl;
use crate::emit;
use crate::error::Result;
use crate::executor::{AdminExecutor, ExecutorPort};
use crate::files;
use crate::model::Statement;
use crate::reflect;
use indexmap::IndexMap;

/// Per-target options controlling a migration run (mirrors the CLI's `up`
/// flags that affect statement generation, not display).
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub create_database: bool,
    pub drop_orphans: bool,
    pub dry_run: bool,
}

/// Outcome of one `DROP_TABLE`/statement application.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StatementOutcome {
    pub statement: Statement,
    pub error: Option<String>,
}

/// The per-target result the orchestrator reports back to the CLI layer.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct TargetResult {
    pub executed: usize,
    pub failed: Vec<StatementOutcome>,
    pub rendered: Vec<Statement>,
    pub orphans_reported: Vec<String>,
}

impl TargetResult {
    pub fn total(&self) -> usize {
        self.executed + self.failed.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Run one migration pass for `node`, reading declaration files from
/// `declaration_dirs` (§4.G steps 1-5).
pub async fn migrate(
    node: &Node,
    executor: &dyn ExecutorPort,
    admin: Option<&dyn AdminExecutor>,
    declaration_dirs: &[impl AsRef<Path>],
    aliases: &IndexMap<String, crate::config::model::CustomFieldAlias>,
    options: &RunOptions,
) -> Result<TargetResult> {
    let mut result = TargetResult::default();

    // 1. Optional database creation.
    if options.create_database {
        if let Some(admin) = admin {
            if !admin.database_exists(&node.name).await? {
                let statement = emit::create_database(&node.name);
                if options.dry_run {
                    result.rendered.push(statement);
                } else {
                    admin.create_database(&node.name).await?;
                    result.executed += 1;
                    info!(database = %node.name, "created database");
                }
            }
        }
    }

    // 2. List existing tables. Treat reflection failure as "no tables".
    let existing_tables = reflect::list_tables(executor).await.unwrap_or_else(|e| {
        warn!(error = %e, "failed to list tables, proceeding with create-only semantics");
        Vec::new()
    });

    let mut declared_table_names: Vec<String> = Vec::new();
    let mut statements: Vec<Statement> = Vec::new();

    // 3. Enumerate declaration files in lexicographic order.
    for dir in declaration_dirs {
        let dir = dir.as_ref();
        let paths = match files::list_yaml_files(dir) {
            Ok(paths) => paths,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "skipping unreadable declaration directory");
                continue;
            }
        };

        for path in paths {
            let declaration = match files::load_declaration_file(&path) {
                Ok(d) => d,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping malformed declaration file");
                    continue;
                }
            };

            for (table_name, raw_fields) in &declaration.tables {
                if files::is_ignored(raw_fields) {
                    continue;
                }

                let table_name = files::apply_prefix(node.pref.as_deref(), table_name);
                declared_table_names.push(table_name.clone());

                let schema = match dsl::parse_fields(&table_name, raw_fields, aliases) {
                    Ok(s) => s,
                    Err(e) => {
                        warn!(table = %table_name, error = %e, "skipping table with unparseable declaration");
                        continue;
                    }
                };

                if existing_tables.iter().any(|t| t == &table_name) {
                    let shape = match reflect::table_shape_of(executor, &table_name).await {
                        Ok(s) => s,
                        Err(e) => {
                            warn!(table = %table_name, error = %e, "skipping table with unreflectable shape");
                            continue;
                        }
                    };
                    statements.extend(diff::diff(&table_name, &schema, &shape));
                } else {
                    statements.extend(emit::create_table(&table_name, &schema));
                }
            }
        }
    }

    // 4. Orphan tables: reflected but not declared anywhere.
    let mut orphans: Vec<&String> = existing_tables
        .iter()
        .filter(|t| !declared_table_names.contains(t))
        .collect();
    orphans.sort();

    for orphan in &orphans {
        if options.drop_orphans {
            statements.push(emit::drop_table(orphan));
        } else {
            warn!(table = %orphan, "orphan table not declared; pass --drop-orphans to remove it");
            result.orphans_reported.push((*orphan).clone());
        }
    }

    // 5. Render or apply. `result.rendered` may already carry a pending
    // CREATE_DB from step 1, so extend rather than overwrite.
    if options.dry_run {
        result.rendered.extend(statements);
        return Ok(result);
    }

    for statement in statements {
        match apply_one(executor, &statement).await {
            Ok(()) => result.executed += 1,
            Err(e) => result.failed.push(StatementOutcome {
                statement,
                error: Some(e.to_string()),
            }),
        }
    }

    Ok(result)
}

/// Apply one statement. Never wrapped in a transaction (`CREATE INDEX
/// CONCURRENTLY` forbids it); each statement is its own commit point.
async fn apply_one(executor: &dyn ExecutorPort, statement: &Statement) -> Result<()> {
    executor.batch_execute(&statement.sql).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_result_total_and_has_failures() {
        let mut result = TargetResult::default();
        result.executed = 3;
        assert_eq!(result.total(), 3);
        assert!(!result.has_failures());

        result.failed.push(StatementOutcome {
            statement: Statement::new("t", crate::model::StatementKind::Raw, "SELECT 1", "probe"),
            error: Some("boom".to_string()),
        });
        assert_eq!(result.total(), 4);
        assert!(result.has_failures());
    }
}
