//! pgshift command-line tool
//!
//! Creates migration script pairs and reconciles them with a PostgreSQL
//! database. Prints one line per applied or reverted migration on stdout and
//! logs to stderr.

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use colored::Colorize;
use pgshift::config::DEFAULT_FILE;
use pgshift::migration::{
    create_migration, DirectorySource, Migration, MigrationResult, MigrationStatus, Migrator,
    Priority, ScriptRef,
};
use pgshift::{connect, MayPostgresExecutor, MigratorConfig, RunContext};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing::Dispatch;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pgshift")]
#[command(about = "Reconcile SQL migration scripts with a PostgreSQL database")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = DEFAULT_FILE, value_name = "FILE")]
    config: PathBuf,

    /// Database connection URL (falls back to DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,

    /// Directory holding <name>.up.sql / <name>.down.sql pairs
    #[arg(long, value_name = "DIR")]
    migrations_dir: Option<PathBuf>,

    /// Schema of the history table
    #[arg(long)]
    history_schema: Option<String>,

    /// Name of the history table
    #[arg(long)]
    history_table: Option<String>,

    /// Which side wins when files and history disagree: db or fs
    #[arg(long)]
    priority: Option<Priority>,

    /// Seconds to wait for the history lock (0 waits forever)
    #[arg(long, value_name = "SECS")]
    lock_timeout: Option<u64>,

    /// Abort the run after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// With --priority db, fail when history has migrations that no file declares
    #[arg(long)]
    strict_history: bool,

    /// Print results as JSON lines
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Create an empty up/down script pair
    Create {
        /// Migration label (letters, digits and "_")
        label: String,
    },

    /// Apply and revert migrations until history matches the files
    Migrate,

    /// Revert the most recently applied migration
    Down,

    /// Show what migrate would do, without doing it
    Status,
}

fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let dispatch = log_dispatch(&cli);

    if let Err(e) = run(&cli, dispatch) {
        eprintln!("{} {}", "error:".red().bold(), e);
        process::exit(1);
    }
}

/// Subscriber for this process's runs; never installed globally
fn log_dispatch(cli: &Cli) -> Dispatch {
    let level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    Dispatch::new(subscriber)
}

fn run(cli: &Cli, dispatch: Dispatch) -> anyhow::Result<()> {
    let loaded = MigratorConfig::load_from(&cli.config)
        .map_err(|e| anyhow!("cannot load {}: {e}", cli.config.display()))?;
    let config = apply_overrides(cli, loaded, std::env::var("DATABASE_URL").ok());

    let mut ctx = RunContext::new().with_dispatch(dispatch);
    if let Some(secs) = cli.timeout {
        ctx = ctx.with_timeout(Duration::from_secs(secs));
    }

    match &cli.command {
        Commands::Create { label } => handle_create(&config, &ctx, label, cli.json),
        Commands::Migrate => {
            let (migrator, executor) = open(&config)?;
            let source = DirectorySource::new(&config.migrations_dir);
            let results = migrator.migrate(&executor, &source, &ctx)?;
            print_results(&results, cli.json);
            Ok(())
        }
        Commands::Down => {
            let (migrator, executor) = open(&config)?;
            let result = migrator.down(&executor, &ctx)?;
            print_results(&[result], cli.json);
            Ok(())
        }
        Commands::Status => {
            let (migrator, executor) = open(&config)?;
            let source = DirectorySource::new(&config.migrations_dir);
            let planned = migrator.plan(&executor, &source, &ctx)?;
            print_plan(&planned, cli.json);
            Ok(())
        }
    }
}

/// Layer command-line options over file/environment settings
fn apply_overrides(cli: &Cli, mut config: MigratorConfig, fallback_url: Option<String>) -> MigratorConfig {
    if let Some(url) = &cli.database_url {
        config.database_url = Some(url.clone());
    }
    if let Some(dir) = &cli.migrations_dir {
        config.migrations_dir = dir.clone();
    }
    if let Some(schema) = &cli.history_schema {
        config.history_schema = schema.clone();
    }
    if let Some(table) = &cli.history_table {
        config.history_table = table.clone();
    }
    if let Some(priority) = cli.priority {
        config.priority = priority;
    }
    if let Some(secs) = cli.lock_timeout {
        config.lock_timeout_seconds = secs;
    }
    if cli.strict_history {
        config.strict_history = true;
    }
    if config.database_url.is_none() {
        config.database_url = fallback_url;
    }
    config
}

fn open(config: &MigratorConfig) -> anyhow::Result<(Migrator, MayPostgresExecutor)> {
    let migrator = Migrator::new(config.clone().into_options()?);

    let url = config.database_url.as_deref().ok_or_else(|| {
        anyhow!(
            "database URL not provided; use --database-url, database_url in {DEFAULT_FILE}, PGSHIFT_DATABASE_URL or DATABASE_URL"
        )
    })?;
    let client = connect(url).map_err(|e| anyhow!("cannot connect to database: {e}"))?;

    Ok((migrator, MayPostgresExecutor::new(client)))
}

fn handle_create(config: &MigratorConfig, ctx: &RunContext, label: &str, json: bool) -> anyhow::Result<()> {
    let migration = ctx.in_scope(|| create_migration(&config.migrations_dir, label))?;
    for line in format_created(&migration, json) {
        println!("{line}");
    }
    Ok(())
}

/// One line per script file of a freshly created migration
fn format_created(migration: &Migration, json: bool) -> Vec<String> {
    [&migration.up, &migration.down]
        .into_iter()
        .filter_map(|script| match script {
            ScriptRef::File(path) if json => Some(
                serde_json::json!({ "migrationName": migration.name, "path": path }).to_string(),
            ),
            ScriptRef::File(path) => Some(format!("{} {}", "created".green(), path.display())),
            _ => None,
        })
        .collect()
}

fn format_result(result: &MigrationResult, json: bool) -> String {
    if json {
        return serde_json::to_string(result).unwrap_or_else(|_| result.to_string());
    }
    match result.status {
        MigrationStatus::Applied => format!("{} {}", "applied".green(), result.name),
        MigrationStatus::Reverted => format!("{} {}", "reverted".yellow(), result.name),
    }
}

fn print_results(results: &[MigrationResult], json: bool) {
    for result in results {
        println!("{}", format_result(result, json));
    }
}

fn format_plan(planned: &[MigrationResult], json: bool) -> Vec<String> {
    if json {
        return planned.iter().map(|result| format_result(result, true)).collect();
    }
    if planned.is_empty() {
        return vec!["up to date".green().to_string()];
    }
    planned
        .iter()
        .map(|result| {
            let verb = match result.status {
                MigrationStatus::Applied => "would apply".cyan(),
                MigrationStatus::Reverted => "would revert".yellow(),
            };
            format!("{verb} {}", result.name)
        })
        .collect()
}

fn print_plan(planned: &[MigrationResult], json: bool) {
    for line in format_plan(planned, json) {
        println!("{line}");
    }
}
