//! # sqlcmd - An Interactive Table Management Client
//!
//! sqlcmd reads one command per line, such as `create|orders|id,item|int,text`
//! or `drop|orders`, runs it against a relational backend and prints a
//! one-line status followed by a prompt for the next command.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                               sqlcmd                                    │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │  Session    │───>│ Dispatcher  │───>│  Command    │                  │
//! │  │ (line I/O)  │    │ first match │    │  handlers   │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               │                         │
//! │                                               ▼                         │
//! │                     ┌──────────────────────────────────────────────┐    │
//! │                     │              DatabaseManager                 │    │
//! │                     │  state machine + backend error translation   │    │
//! │                     └──────────────────────┬───────────────────────┘    │
//! │                                            │                            │
//! │                                            ▼                            │
//! │                     ┌──────────────────────────────────────────────┐    │
//! │                     │  Backend: MemoryBackend | PostgresBackend    │    │
//! │                     └──────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use sqlcmd::backend::MemoryBackend;
//! use sqlcmd::commands::Dispatcher;
//! use sqlcmd::manager::DatabaseManager;
//!
//! # tokio_test::block_on(async {
//! let backend = MemoryBackend::new()
//!     .with_user("postgres", "postgres")
//!     .with_database("shop");
//! let mut dispatcher = Dispatcher::new(DatabaseManager::new(backend));
//!
//! dispatcher.dispatch("connect|shop|postgres|postgres").await;
//! let response = dispatcher.dispatch("create|orders|id,item|int,text").await;
//! assert_eq!(
//!     response.lines(),
//!     ["Table orders was created. Enter next command or help:"]
//! );
//! # });
//! ```
//!
//! ## Supported Commands
//!
//! - `connect|database|user|password`
//! - `tables`
//! - `create|table|col1,col2|type1,type2`
//! - `drop|table`
//! - `clear|table`
//! - `find|table`
//! - `columns|table`
//! - `help`
//! - `exit`
//!
//! ## Module Overview
//!
//! - [`backend`]: backend contract, in-memory backend, PostgreSQL backend
//! - [`manager`]: database manager and error taxonomy
//! - [`commands`]: command handlers and dispatcher
//! - [`session`]: line-oriented input/output loop
//! - [`config`]: command-line configuration

pub mod backend;
pub mod commands;
pub mod config;
pub mod manager;
pub mod session;

// Re-export commonly used types for convenience
pub use backend::{Backend, BackendError, ConnectOptions, Connection, MemoryBackend, RowSet};
pub use commands::{Command, Dispatcher, Response};
pub use config::{BackendKind, Config};
pub use manager::{DatabaseManager, DbError, ErrorKind};
pub use session::{Session, SessionError, SessionStats};

/// The default database server host
pub const DEFAULT_HOST: &str = "localhost";

/// The default database server port (PostgreSQL)
pub const DEFAULT_PORT: u16 = 5432;

/// Version of sqlcmd
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
