//! Clap CLI definitions for the `sforge` command (§6).
//!
//! Mirrors the teacher's Tauri command surface ("one handler per user
//! action") as a `clap` derive tree instead, the way `fwindolf-beads-rs`
//! structures its `bd` binary (`crates/bd/src/cli.rs`): a flattened global
//! args struct plus one `Args` struct per subcommand.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// sforge -- declarative schema-management and migration engine for
/// PostgreSQL.
#[derive(Parser, Debug)]
#[command(name = "sforge", about = "Declarative schema migrations for PostgreSQL", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Output mode for commands that render results (mirrors `Config.displayMode`,
/// overridable per-invocation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum DisplayArg {
    Table,
    Json,
}

/// Flags shared by `up` and `diff`: which cluster/node to target.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Cluster id from the configuration's `clusters` map. Defaults to
    /// every configured cluster when omitted.
    #[arg(long)]
    pub name: Option<String>,

    /// Tenant key, when the target node declares `tenantKeys`.
    #[arg(long)]
    pub tenant: Option<String>,

    /// Path to the configuration file (YAML).
    #[arg(long, env = "SFORGE_CONFIG", default_value = "sforge.yml")]
    pub config: PathBuf,
}

/// Arguments for `sforge up`.
#[derive(Args, Debug)]
pub struct UpArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Skip the interactive confirmation prompt before applying statements.
    #[arg(long)]
    pub yes: bool,

    /// Create the target database first if it doesn't exist.
    #[arg(long)]
    pub create: bool,

    /// Suppress per-statement progress output.
    #[arg(long)]
    pub mute: bool,

    /// Render statements without applying them.
    #[arg(long)]
    pub dry: bool,

    /// Drop tables present in the database but absent from every
    /// declaration file.
    #[arg(long = "drop-orphans")]
    pub drop_orphans: bool,

    /// Override the configured display mode for this invocation.
    #[arg(long)]
    pub display: Option<DisplayArg>,
}

/// Arguments for `sforge diff` (render, never apply).
#[derive(Args, Debug)]
pub struct DiffArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Report orphan tables that would be dropped, as if `--drop-orphans`
    /// had been passed to `up`.
    #[arg(long = "drop-orphans")]
    pub drop_orphans: bool,

    /// Override the configured display mode for this invocation.
    #[arg(long)]
    pub display: Option<DisplayArg>,
}

/// Arguments for `sforge status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Override the configured display mode for this invocation.
    #[arg(long)]
    pub display: Option<DisplayArg>,
}

/// Arguments for `sforge query`.
#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Raw SQL to execute against the target node.
    pub sql: String,

    #[command(flatten)]
    pub target: TargetArgs,

    /// Override the configured display mode for this invocation.
    #[arg(long)]
    pub display: Option<DisplayArg>,
}

/// Arguments for `sforge seed`.
#[derive(Args, Debug)]
pub struct SeedArgs {
    /// Seed file to reconcile. Defaults to every file under the
    /// configured `seedPath`.
    pub file: Option<PathBuf>,

    /// Skip the interactive confirmation prompt before applying changes.
    #[arg(long)]
    pub yes: bool,

    /// Restrict reconciliation to one table.
    #[arg(long)]
    pub table: Option<String>,

    #[command(flatten)]
    pub target: TargetArgs,
}

/// Arguments for `sforge seed-dump` (historical alias: `seed:dump`).
#[derive(Args, Debug)]
pub struct SeedDumpArgs {
    /// Dump only this table.
    #[arg(long)]
    pub table: Option<String>,

    /// Exclude this table (repeatable).
    #[arg(long, num_args = 1..)]
    pub exclude: Vec<String>,

    /// Dump every table, including ones the caller would otherwise skip
    /// as auto-generated (id sequences, audit columns).
    #[arg(long)]
    pub all: bool,

    /// Cap the number of rows dumped per table.
    #[arg(long)]
    pub limit: Option<u64>,

    /// Skip columns populated automatically (serial ids, `createdAt`).
    #[arg(long = "skip-auto")]
    pub skip_auto: bool,

    #[command(flatten)]
    pub target: TargetArgs,
}

/// Arguments for `sforge init`.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to write the sample configuration and declaration files
    /// into.
    #[arg(long, default_value = ".")]
    pub path: PathBuf,

    /// Overwrite files that already exist.
    #[arg(long)]
    pub force: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reflect, diff, and apply every declared table against its target.
    Up(UpArgs),

    /// Render the statements `up` would apply, without applying them.
    Diff(DiffArgs),

    /// Report per-table up-to-date/pending status.
    Status(StatusArgs),

    /// Execute a raw SQL statement and print the result table.
    Query(QueryArgs),

    /// Reconcile declared seed rows against a target's live data.
    Seed(SeedArgs),

    /// Dump a target's existing rows in seed-file format.
    #[command(name = "seed-dump", alias = "seed:dump")]
    SeedDump(SeedDumpArgs),

    /// Write a sample configuration and declaration file to get started.
    Init(InitArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_up_with_flags() {
        let cli = Cli::try_parse_from(["sforge", "up", "--yes", "--create", "--drop-orphans"]);
        assert!(cli.is_ok());
        match cli.unwrap().command {
            Commands::Up(args) => {
                assert!(args.yes);
                assert!(args.create);
                assert!(args.drop_orphans);
                assert!(!args.dry);
            }
            _ => panic!("expected Up"),
        }
    }

    #[test]
    fn cli_parses_seed_dump_historical_alias() {
        let cli = Cli::try_parse_from(["sforge", "seed:dump", "--limit", "10"]);
        assert!(cli.is_ok());
        match cli.unwrap().command {
            Commands::SeedDump(args) => assert_eq!(args.limit, Some(10)),
            _ => panic!("expected SeedDump"),
        }
    }

    #[test]
    fn cli_parses_query_positional_sql() {
        let cli = Cli::try_parse_from(["sforge", "query", "SELECT 1"]);
        assert!(cli.is_ok());
        match cli.unwrap().command {
            Commands::Query(args) => assert_eq!(args.sql, "SELECT 1"),
            _ => panic!("expected Query"),
        }
    }

    #[test]
    fn cli_defaults_config_path() {
        let cli = Cli::try_parse_from(["sforge", "status"]).unwrap();
        match cli.command {
            Commands::Status(args) => assert_eq!(args.target.config, PathBuf::from("sforge.yml")),
            _ => panic!("expected Status"),
        }
    }

    #[test]
    fn cli_parses_init_with_custom_path() {
        let cli = Cli::try_parse_from(["sforge", "init", "--path", "./demos", "--force"]);
        assert!(cli.is_ok());
        match cli.unwrap().command {
            Commands::Init(args) => {
                assert_eq!(args.path, PathBuf::from("./demos"));
                assert!(args.force);
            }
            _ => panic!("expected Init"),
        }
    }
}
