//! `sforge` binary entry point.
//!
//! Wires configuration loading, the executor/admin-executor pair, and the
//! orchestrator/seed modules to the CLI surface (§6). Exit code is non-zero
//! iff any statement failed or a fatal configuration error occurred.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use indexmap::IndexMap;

use schema_forge::cli::{Cli, Commands, DisplayArg, TargetArgs};
use schema_forge::config::model::{ClusterEntry, Config, DisplayMode};
use schema_forge::config::loader::ConfigLoader;
use schema_forge::display::{self, AutoConfirm, Confirm, InteractiveConfirm};
use schema_forge::error::{EngineError, Result};
use schema_forge::executor::{AdminExecutor, ExecutorPort, PostgresAdminExecutor, PostgresExecutor};
use schema_forge::files;
use schema_forge::logging::{self, Verbosity};
use schema_forge::orchestrator::{self, RunOptions, TargetResult};
use schema_forge::reflect;
use schema_forge::seed;

fn main() -> ExitCode {
    logging::init(Verbosity::Normal);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(Cli::parse())) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Up(args) => {
            let display_mode = resolve_display(args.display, &args.target).await?;
            let confirmer: Box<dyn Confirm> = if args.yes || args.mute {
                Box::new(AutoConfirm)
            } else {
                Box::new(InteractiveConfirm)
            };

            let options = RunOptions {
                create_database: args.create,
                drop_orphans: args.drop_orphans,
                dry_run: args.dry,
            };

            if !args.dry && !confirmer.confirm("apply pending schema changes?") {
                return Err(EngineError::UserCancel("up aborted by user".to_string()));
            }

            let outcomes = run_targets(&args.target, &options).await?;
            let mut any_failed = false;
            for (cluster, outcome) in &outcomes {
                match outcome {
                    Ok(result) => {
                        if !args.mute {
                            println!("[{cluster}]");
                            println!("{}", display::render_target_result(result, display_mode));
                        }
                        any_failed = any_failed || result.has_failures();
                    }
                    Err(e) => {
                        eprintln!("[{cluster}] {e}");
                        any_failed = true;
                    }
                }
            }
            Ok(if any_failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
        }

        Commands::Diff(args) => {
            let display_mode = resolve_display(args.display, &args.target).await?;
            let options = RunOptions {
                create_database: false,
                drop_orphans: args.drop_orphans,
                dry_run: true,
            };
            let outcomes = run_targets(&args.target, &options).await?;
            for (cluster, outcome) in &outcomes {
                match outcome {
                    Ok(result) => {
                        println!("[{cluster}]");
                        println!("{}", display::render_target_result(result, display_mode));
                    }
                    Err(e) => eprintln!("[{cluster}] {e}"),
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Status(args) => {
            let display_mode = resolve_display(args.display, &args.target).await?;
            let options = RunOptions {
                create_database: false,
                drop_orphans: false,
                dry_run: true,
            };
            let outcomes = run_targets(&args.target, &options).await?;
            for (cluster, outcome) in &outcomes {
                match outcome {
                    Ok(result) if result.rendered.is_empty() => println!("[{cluster}] up to date"),
                    Ok(result) => {
                        println!("[{cluster}]");
                        println!("{}", display::render_target_result(result, display_mode));
                    }
                    Err(e) => eprintln!("[{cluster}] {e}"),
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Query(args) => {
            let config = ConfigLoader::new(&args.target.config).load()?;
            let node = resolve_node(&config, args.target.name.as_deref())?;
            let executor = PostgresExecutor::connect(node)?;
            let rows = executor.query(&args.sql, &[]).await?;
            println!("{}", display::render_query_rows(&rows));
            Ok(ExitCode::SUCCESS)
        }

        Commands::Seed(args) => {
            let config = ConfigLoader::new(&args.target.config).load()?;
            let (cluster_name, entry) = resolve_cluster_entry(&config, args.target.name.as_deref())?;
            let node = entry.primary_node();
            let executor = PostgresExecutor::connect(node)?;

            let confirmer: Box<dyn Confirm> = if args.yes {
                Box::new(AutoConfirm)
            } else {
                Box::new(InteractiveConfirm)
            };
            if !confirmer.confirm(&format!("reconcile seed data for cluster '{cluster_name}'?")) {
                return Err(EngineError::UserCancel("seed aborted by user".to_string()));
            }

            let seed_files = match &args.file {
                Some(path) => vec![path.clone()],
                None => {
                    let dir = config
                        .seed_path
                        .clone()
                        .ok_or_else(|| EngineError::Configuration("no seedPath configured and no file given".to_string()))?;
                    files::list_yaml_files(std::path::Path::new(&dir))?
                }
            };

            let mut had_failures = false;
            for path in seed_files {
                let seed_file = files::load_seed_file(&path)?;
                for declared in seed::declared_tables_from_seed_file(&seed_file) {
                    if let Some(only) = &args.table {
                        if &declared.table_name != only {
                            continue;
                        }
                    }

                    let table_name = files::apply_prefix(node.pref.as_deref(), &declared.table_name);
                    let pk = reflect::primary_key_columns_of(&executor, &table_name).await.unwrap_or_default();
                    let uniques: BTreeMap<String, Vec<String>> = reflect::unique_index_defs_of(&executor, &table_name)
                        .await
                        .unwrap_or_default()
                        .into_iter()
                        .collect();

                    let counts = seed::reconcile_table(&executor, node.pref.as_deref(), &pk, &uniques, &declared).await?;
                    had_failures = had_failures || counts.failed > 0;
                    println!(
                        "{}",
                        display::render_reconcile_counts(&declared.table_name, &counts, config.display_mode)
                    );
                }
            }

            Ok(if had_failures { ExitCode::FAILURE } else { ExitCode::SUCCESS })
        }

        Commands::SeedDump(args) => {
            let config = ConfigLoader::new(&args.target.config).load()?;
            let node = resolve_node(&config, args.target.name.as_deref())?;
            let executor = PostgresExecutor::connect(node)?;

            let tables = match &args.table {
                Some(t) => vec![t.clone()],
                None => reflect::list_tables(&executor).await?,
            };

            for table in tables {
                if args.exclude.contains(&table) {
                    continue;
                }
                let limit_clause = args.limit.map(|n| format!(" LIMIT {n}")).unwrap_or_default();
                let sql = format!("SELECT * FROM \"{table}\"{limit_clause}");
                let rows = executor.query(&sql, &[]).await?;
                println!("{}:", table);
                println!("{}", display::render_query_rows(&rows));
            }

            Ok(ExitCode::SUCCESS)
        }

        Commands::Init(args) => {
            write_sample_files(&args.path, args.force)?;
            println!("wrote sample configuration to {}", args.path.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Run a migration pass against every target named by `target.name`, or
/// every configured cluster when it is omitted (§4.G: "for each target in
/// the filtered target set"). Each target's connection and reflection are
/// independent, so §5's "free to process multiple targets in parallel, so
/// long as each target's statement list is applied in order" is honored by
/// driving the per-target futures concurrently with `futures::future::join_all`
/// while keeping each target's own statement list strictly sequential.
async fn run_targets(
    target: &TargetArgs,
    options: &RunOptions,
) -> Result<Vec<(String, Result<TargetResult>)>> {
    let config = ConfigLoader::new(&target.config).load()?;
    let targets = resolve_cluster_entries(&config, target.name.as_deref())?;

    let futures_for_targets = targets.into_iter().map(|(cluster_name, entry)| {
        let node = entry.primary_node().clone();
        let aliases = config.custom_fields.clone();
        let options = options.clone();
        async move {
            let outcome = run_one_target(&node, &aliases, &options).await;
            (cluster_name, outcome)
        }
    });

    Ok(futures::future::join_all(futures_for_targets).await)
}

async fn run_one_target(
    node: &schema_forge::config::model::Node,
    aliases: &IndexMap<String, schema_forge::config::model::CustomFieldAlias>,
    options: &RunOptions,
) -> Result<TargetResult> {
    let executor = PostgresExecutor::connect(node)?;
    let admin: Option<Box<dyn AdminExecutor>> = if options.create_database {
        Some(Box::new(PostgresAdminExecutor::connect(node)?))
    } else {
        None
    };

    let declaration_dirs: Vec<PathBuf> = node
        .path
        .as_ref()
        .map(|p| p.paths().into_iter().map(PathBuf::from).collect())
        .unwrap_or_else(|| vec![PathBuf::from("declarations")]);

    orchestrator::migrate(node, &executor, admin.as_deref(), &declaration_dirs, aliases, options).await
}

/// Every cluster entry `name` selects, or every configured cluster when
/// `name` is `None`, in configuration order.
fn resolve_cluster_entries<'a>(
    config: &'a Config,
    name: Option<&str>,
) -> Result<Vec<(String, &'a ClusterEntry)>> {
    match name {
        Some(name) => {
            let (k, v) = config
                .clusters
                .get_key_value(name)
                .ok_or_else(|| EngineError::Configuration(format!("no cluster named '{name}' in configuration")))?;
            Ok(vec![(k.clone(), v)])
        }
        None => {
            if config.clusters.is_empty() {
                return Err(EngineError::Configuration(
                    "configuration declares no clusters".to_string(),
                ));
            }
            Ok(config.clusters.iter().map(|(k, v)| (k.clone(), v)).collect())
        }
    }
}

async fn resolve_display(arg: Option<DisplayArg>, target: &TargetArgs) -> Result<DisplayMode> {
    if let Some(arg) = arg {
        return Ok(match arg {
            DisplayArg::Table => DisplayMode::Table,
            DisplayArg::Json => DisplayMode::Json,
        });
    }
    let config = ConfigLoader::new(&target.config).load()?;
    Ok(config.display_mode)
}

fn resolve_cluster_entry<'a>(config: &'a Config, name: Option<&str>) -> Result<(String, &'a ClusterEntry)> {
    match name {
        Some(name) => config
            .clusters
            .get_key_value(name)
            .map(|(k, v)| (k.clone(), v))
            .ok_or_else(|| EngineError::Configuration(format!("no cluster named '{name}' in configuration"))),
        None => config
            .clusters
            .iter()
            .next()
            .map(|(k, v)| (k.clone(), v))
            .ok_or_else(|| EngineError::Configuration("configuration declares no clusters".to_string())),
    }
}

fn resolve_node<'a>(config: &'a Config, name: Option<&str>) -> Result<&'a schema_forge::config::model::Node> {
    let (_, entry) = resolve_cluster_entry(config, name)?;
    Ok(entry.primary_node())
}

fn write_sample_files(path: &std::path::Path, force: bool) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| EngineError::Configuration(format!("cannot create {}: {e}", path.display())))?;
    std::fs::create_dir_all(path.join("declarations"))
        .map_err(|e| EngineError::Configuration(format!("cannot create declarations dir: {e}")))?;

    let config_path = path.join("sforge.yml");
    if config_path.exists() && !force {
        return Err(EngineError::Configuration(format!(
            "{} already exists; pass --force to overwrite",
            config_path.display()
        )));
    }

    std::fs::write(
        &config_path,
        "clusters:\n  main:\n    name: app\n    host: localhost\n    port: 5432\n    user: app\n    pass: \"<ENV.SFORGE_DB_PASS>\"\n    path: declarations\ncustomFields:\n  id:\n    type: serial\n    key: PRIMARY\nseedPath: seeds\nseedSuffix: .seed.yml\ndisplayMode: table\n",
    )
    .map_err(|e| EngineError::Configuration(format!("cannot write {}: {e}", config_path.display())))?;

    let declaration_path = path.join("declarations").join("users.yml");
    std::fs::write(
        &declaration_path,
        "users:\n  user_id: id\n  user_name: \"str required\"\n  user_email: \"email unique index\"\n",
    )
    .map_err(|e| EngineError::Configuration(format!("cannot write {}: {e}", declaration_path.display())))?;

    Ok(())
}
