//! Client Configuration
//!
//! Every option can be given as a flag or through an environment variable;
//! flags win.

use clap::{Parser, ValueEnum};

/// Which backend the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// Process-local backend, state lives until the client exits
    Memory,
    /// A PostgreSQL server (needs the `postgres` feature)
    Postgres,
}

/// Command-line configuration for the `sqlcmd` binary.
#[derive(Debug, Clone, Parser)]
#[command(name = "sqlcmd", version, about = "Line-oriented client for table management commands")]
pub struct Config {
    /// Backend to connect to
    #[arg(long, value_enum, env = "SQLCMD_BACKEND", default_value_t = BackendKind::Memory)]
    pub backend: BackendKind,

    /// Database server host
    #[arg(long, env = "SQLCMD_HOST", default_value = crate::DEFAULT_HOST)]
    pub host: String,

    /// Database server port
    #[arg(short, long, env = "SQLCMD_PORT", default_value_t = crate::DEFAULT_PORT)]
    pub port: u16,

    /// Database created in the memory backend at startup (repeatable)
    #[arg(long = "seed-database", value_name = "NAME", default_values_t = [String::from("sqlcmd")])]
    pub seed_databases: Vec<String>,

    /// Login role created in the memory backend at startup
    #[arg(long, value_name = "USER", default_value = "postgres")]
    pub seed_user: String,

    /// Password of the memory backend login role
    #[arg(long, value_name = "PASSWORD", default_value = "postgres")]
    pub seed_password: String,

    /// Log filter used when RUST_LOG is not set (e.g. "info", "sqlcmd=debug")
    #[arg(long, env = "SQLCMD_LOG", default_value = "warn")]
    pub log_level: String,
}

impl Config {
    /// Address of the database server as `host:port`.
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
