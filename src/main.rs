//! sqlcmd - An Interactive Table Management Client
//!
//! This is the entry point for the sqlcmd binary. It reads the configuration,
//! sets up logging, picks the backend and runs one session on stdin/stdout.

use anyhow::{anyhow, Context};
use clap::Parser;
use sqlcmd::backend::{Backend, MemoryBackend};
use sqlcmd::commands::Dispatcher;
use sqlcmd::config::{BackendKind, Config};
use sqlcmd::manager::DatabaseManager;
use sqlcmd::session::Session;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    init_logging(&config)?;
    info!(version = sqlcmd::VERSION, backend = ?config.backend, "Starting sqlcmd");

    match config.backend {
        BackendKind::Memory => run(memory_backend(&config), &config).await,
        BackendKind::Postgres => run_postgres(&config).await,
    }
}

/// Logs go to stderr so they never mix with command output.
fn init_logging(config: &Config) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .with_context(|| format!("invalid log filter '{}'", config.log_level))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {}", e))
}

fn memory_backend(config: &Config) -> MemoryBackend {
    let backend = MemoryBackend::new().with_user(&config.seed_user, &config.seed_password);
    for database in &config.seed_databases {
        backend.add_database(database);
    }
    info!(databases = ?config.seed_databases, user = %config.seed_user, "Memory backend ready");
    backend
}

#[cfg(feature = "postgres")]
async fn run_postgres(config: &Config) -> anyhow::Result<()> {
    info!(server = %config.server_address(), "Using PostgreSQL backend");
    run(sqlcmd::backend::PostgresBackend::new(), config).await
}

#[cfg(not(feature = "postgres"))]
async fn run_postgres(_config: &Config) -> anyhow::Result<()> {
    anyhow::bail!("this build has no PostgreSQL support; rebuild with `--features postgres`")
}

async fn run<B: Backend>(backend: B, config: &Config) -> anyhow::Result<()> {
    let manager = DatabaseManager::with_address(backend, config.host.as_str(), config.port);
    let dispatcher = Dispatcher::new(manager);
    let mut session = Session::new(tokio::io::stdin(), tokio::io::stdout(), dispatcher);

    let stats = session.run().await.context("session failed")?;
    info!(
        lines = stats.lines_processed,
        bytes_read = stats.bytes_read,
        bytes_written = stats.bytes_written,
        "sqlcmd finished"
    );
    Ok(())
}
