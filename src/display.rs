//! Result rendering and interactive confirmation (§4.L, ambient).
//!
//! The teacher is a GUI app and renders everything through Tauri's IPC
//! layer, so it has no terminal-table or prompt code of its own. Grounded
//! on the pack's `take0a-dbt-fusion`/`clockworklabs-SpacetimeDB` manifests,
//! the two crates a CLI in this corpus reaches for: `comfy-table` for
//! tabular output, `dialoguer` for interactive confirmation.

use comfy_table::{ContentArrangement, Table};
use tokio_postgres::Row;

use crate::config::model::DisplayMode;
use crate::orchestrator::TargetResult;
use crate::seed::ReconcileCounts;

/// Confirmation before an apply pass. `--yes` (or `--mute`) bypasses the
/// prompt; interactive runs ask on a terminal. Kept as a trait so the
/// orchestrator's "analyze, then apply" split (§9) can interleave a prompt
/// between phases without depending on a terminal.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Always answers yes, used for `--yes` and non-interactive runs.
pub struct AutoConfirm;

impl Confirm for AutoConfirm {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

/// Prompts on the controlling terminal via `dialoguer`.
pub struct InteractiveConfirm;

impl Confirm for InteractiveConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or(false)
    }
}

/// Render a raw `query` result as a table: column names as the header,
/// every value stringified via its text representation.
pub fn render_query_rows(rows: &[Row]) -> String {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    let Some(first) = rows.first() else {
        return "(no rows)".to_string();
    };

    let headers: Vec<String> = first.columns().iter().map(|c| c.name().to_string()).collect();
    table.set_header(headers);

    for row in rows {
        let cells: Vec<String> = (0..row.columns().len())
            .map(|i| {
                row.try_get::<_, Option<String>>(i)
                    .ok()
                    .flatten()
                    .unwrap_or_else(|| "<null>".to_string())
            })
            .collect();
        table.add_row(cells);
    }

    table.to_string()
}

/// Render a migration/diff run's result, honoring the configured display
/// mode (table for humans, JSON for scripting).
pub fn render_target_result(result: &TargetResult, mode: DisplayMode) -> String {
    match mode {
        DisplayMode::Json => serde_json::to_string_pretty(result).unwrap_or_default(),
        DisplayMode::Table => {
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["table", "kind", "sql", "status"]);

            for statement in &result.rendered {
                table.add_row(vec![
                    statement.table.clone(),
                    format!("{:?}", statement.kind),
                    statement.sql.clone(),
                    "pending".to_string(),
                ]);
            }

            for outcome in &result.failed {
                table.add_row(vec![
                    outcome.statement.table.clone(),
                    format!("{:?}", outcome.statement.kind),
                    outcome.statement.sql.clone(),
                    format!("failed: {}", outcome.error.clone().unwrap_or_default()),
                ]);
            }

            let mut out = table.to_string();
            if !result.orphans_reported.is_empty() {
                out.push_str(&format!(
                    "\norphan tables not declared: {}",
                    result.orphans_reported.join(", ")
                ));
            }
            out
        }
    }
}

/// Render seed-reconciliation counts for one table.
pub fn render_reconcile_counts(table: &str, counts: &ReconcileCounts, mode: DisplayMode) -> String {
    match mode {
        DisplayMode::Json => serde_json::json!({ "table": table, "counts": counts })
            .to_string(),
        DisplayMode::Table => format!(
            "{table}: inserted={} updated={} unchanged={} skipped={} failed={}",
            counts.inserted, counts.updated, counts.unchanged, counts.skipped, counts.failed
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Statement, StatementKind};

    #[test]
    fn test_auto_confirm_always_true() {
        assert!(AutoConfirm.confirm("apply?"));
    }

    #[test]
    fn test_render_target_result_table_lists_rendered_statements() {
        let mut result = TargetResult::default();
        result.rendered.push(Statement::new(
            "users",
            StatementKind::AddColumn,
            "ALTER TABLE \"users\" ADD COLUMN \"bio\" TEXT NULL",
            "add column",
        ));

        let rendered = render_target_result(&result, DisplayMode::Table);
        assert!(rendered.contains("users"));
        assert!(rendered.contains("ADD COLUMN"));
    }

    #[test]
    fn test_render_target_result_json_round_trips() {
        let result = TargetResult::default();
        let rendered = render_target_result(&result, DisplayMode::Json);
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["executed"], 0);
    }

    #[test]
    fn test_render_reconcile_counts_table_format() {
        let counts = ReconcileCounts {
            inserted: 2,
            updated: 1,
            unchanged: 5,
            skipped: 0,
            failed: 0,
        };
        let rendered = render_reconcile_counts("users", &counts, DisplayMode::Table);
        assert_eq!(rendered, "users: inserted=2 updated=1 unchanged=5 skipped=0 failed=0");
    }
}
