use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use waterworks::config::ServerConfig;
use waterworks::schema::{
    DEFAULT_BATCH_SIZE, Outcome, ReconciliationReport, Reconciler, RunStatus, SchemaDescriptor,
    Warning,
};
use waterworks::server::{AppState, create_router};
use waterworks::store::{SqliteStore, business_schema};

#[derive(Parser)]
#[command(name = "waterworks")]
#[command(about = "Water-delivery business backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the schema, then start the server
    Serve {
        /// Host to bind to
        #[arg(long, env = "HOST", default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, env = "PORT", default_value = "10000")]
        port: u16,

        #[command(flatten)]
        database: DatabaseArgs,
    },

    /// Reconcile the schema and exit
    Migrate {
        #[command(flatten)]
        database: DatabaseArgs,

        /// Schema descriptor to apply instead of the built-in business schema
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the operations a reconciliation would apply, without applying them
    Plan {
        #[command(flatten)]
        database: DatabaseArgs,

        /// Schema descriptor to plan against instead of the built-in business schema
        #[arg(long)]
        schema: Option<PathBuf>,
    },
}

#[derive(Args)]
struct DatabaseArgs {
    /// Data directory for the database
    #[arg(long, env = "WATERWORKS_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Seconds to wait on a database lock held by another connection
    #[arg(long, default_value = "5")]
    busy_timeout: u64,

    /// Rows updated per transaction when backfilling a column
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,
}

impl DatabaseArgs {
    fn into_config(self, host: String, port: u16) -> ServerConfig {
        ServerConfig {
            host,
            port,
            data_dir: self.data_dir,
            busy_timeout: Duration::from_secs(self.busy_timeout),
            backfill_batch_size: self.batch_size,
        }
    }

    fn open(self) -> anyhow::Result<(SqliteStore, ServerConfig)> {
        let defaults = ServerConfig::default();
        let config = self.into_config(defaults.host, defaults.port);
        fs::create_dir_all(&config.data_dir).with_context(|| {
            format!("Failed to create data directory {}", config.data_dir.display())
        })?;
        let store = SqliteStore::new(config.db_path(), config.busy_timeout)?;
        Ok((store, config))
    }
}

fn load_descriptor(path: Option<&Path>) -> anyhow::Result<SchemaDescriptor> {
    match path {
        None => Ok(business_schema()),
        Some(path) => SchemaDescriptor::from_toml_file(path)
            .with_context(|| format!("Failed to load schema file {}", path.display())),
    }
}

fn describe_warning(warning: &Warning) -> String {
    match warning {
        Warning::PartialConstraint {
            table,
            column,
            null_rows,
        } => format!("{table}.{column} left nullable: {null_rows} rows are null"),
        Warning::TypeDrift {
            table,
            column,
            live_type,
            declared_type,
        } => format!("{table}.{column} is {live_type}, declared {declared_type}"),
    }
}

fn print_report(report: &ReconciliationReport) {
    println!("Run {} ({:?})", report.run_id, report.status);
    if report.entries.is_empty() {
        println!("  Schema is up to date");
    }
    for entry in &report.entries {
        match &entry.outcome {
            Outcome::Applied => println!("  applied  {}", entry.operation),
            Outcome::Skipped { reason } => println!("  skipped  {} ({reason})", entry.operation),
            Outcome::Failed { kind, error } => {
                println!("  FAILED   {} [{kind:?}] {error}", entry.operation)
            }
        }
    }
    for warning in &report.warnings {
        println!("  warning  {}", describe_warning(warning));
    }
}

/// Refuses to continue when core tables failed or the run was cut short.
fn check_gate(report: &ReconciliationReport, descriptor: &SchemaDescriptor) -> anyhow::Result<()> {
    let fatal = report.fatal_entries(descriptor);
    if !fatal.is_empty() {
        let failed: Vec<String> = fatal.iter().map(|e| e.operation.to_string()).collect();
        bail!(
            "Schema reconciliation failed on core tables: {}",
            failed.join("; ")
        );
    }
    if report.status == RunStatus::Interrupted {
        bail!("Schema reconciliation was interrupted");
    }
    Ok(())
}

fn run_migrate(
    database: DatabaseArgs,
    schema: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let descriptor = load_descriptor(schema.as_deref())?;
    let (store, config) = database.open()?;

    let reconciler = Reconciler::new().with_batch_size(config.backfill_batch_size);
    let report = store.reconcile(&reconciler, &descriptor)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    check_gate(&report, &descriptor)
}

fn run_plan(database: DatabaseArgs, schema: Option<PathBuf>) -> anyhow::Result<()> {
    let descriptor = load_descriptor(schema.as_deref())?;
    let (store, _) = database.open()?;

    let plan = store.plan(&Reconciler::new(), &descriptor)?;

    if plan.is_empty() {
        println!("Schema is up to date");
    }
    for operation in &plan.operations {
        println!("{operation}");
    }
    for warning in &plan.warnings {
        println!("warning: {}", describe_warning(warning));
    }

    Ok(())
}

async fn run_serve(config: ServerConfig) -> anyhow::Result<()> {
    fs::create_dir_all(&config.data_dir).with_context(|| {
        format!("Failed to create data directory {}", config.data_dir.display())
    })?;

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown requested");
                shutdown.cancel();
            }
        }
    });

    let store = Arc::new(SqliteStore::new(config.db_path(), config.busy_timeout)?);
    let descriptor = business_schema();

    // Nothing listens until the schema is in place.
    let report = tokio::task::spawn_blocking({
        let store = Arc::clone(&store);
        let descriptor = descriptor.clone();
        let reconciler = Reconciler::new()
            .with_batch_size(config.backfill_batch_size)
            .with_cancellation(shutdown.clone());
        move || store.reconcile(&reconciler, &descriptor)
    })
    .await??;

    for warning in &report.warnings {
        warn!("Schema warning: {}", describe_warning(warning));
    }
    check_gate(&report, &descriptor)?;

    if !report.is_clean() {
        warn!(
            failed = report.failed().count(),
            warnings = report.warnings.len(),
            "Starting with an incompletely reconciled schema"
        );
    }
    info!(
        run_id = %report.run_id,
        status = ?report.status,
        applied = report.applied().count(),
        "Schema ready"
    );

    let state = Arc::new(AppState::new(store, &report));
    let app = create_router(state);
    let addr = config.socket_addr()?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("waterworks=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            host,
            port,
            database,
        } => run_serve(database.into_config(host, port)).await?,
        Commands::Migrate {
            database,
            schema,
            json,
        } => run_migrate(database, schema, json)?,
        Commands::Plan { database, schema } => run_plan(database, schema)?,
    }

    Ok(())
}
