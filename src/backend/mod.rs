//! Backend Gateway Module
//!
//! This module defines the contract between the database manager and the
//! relational backend it talks to. The manager never builds its own
//! transport; it only needs something that can open a connection, run a
//! single statement and close the connection again.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ DatabaseManager │  (manager module)
//! └────────┬────────┘
//!          │ open / execute / close
//!          ▼
//! ┌─────────────────┐      ┌──────────────────────────┐
//! │ Backend trait   │─────>│ MemoryBackend            │  always available
//! │ Connection trait│      │ PostgresBackend (sqlx)   │  feature "postgres"
//! └─────────────────┘      └──────────────────────────┘
//! ```
//!
//! ## Resource Model
//!
//! Every statement returns an owned [`RowSet`]. Backend-side handles for a
//! statement live only for the duration of [`Connection::execute`] and are
//! released when it returns, on the success path and on the error path.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod statement;

pub use memory::{BackendStats, MemoryBackend, MemoryConnection};
#[cfg(feature = "postgres")]
pub use postgres::{PostgresBackend, PostgresConnection};

use std::fmt;
use thiserror::Error;

/// SQLSTATE codes produced by the backends and matched by the error translator.
pub mod sqlstate {
    pub const INVALID_PASSWORD: &str = "28P01";
    pub const INVALID_CATALOG_NAME: &str = "3D000";
    pub const DUPLICATE_TABLE: &str = "42P07";
    pub const DUPLICATE_COLUMN: &str = "42701";
    pub const UNDEFINED_OBJECT: &str = "42704";
    pub const UNDEFINED_TABLE: &str = "42P01";
    pub const SYNTAX_ERROR: &str = "42601";
    pub const CONNECTION_FAILURE: &str = "08006";
}

/// A backend-native failure: the raw message text plus the SQLSTATE code
/// when the backend reported one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendError {
    message: String,
    code: Option<String>,
}

impl BackendError {
    /// Creates an error with message text only.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Creates an error carrying a SQLSTATE code.
    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(code.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

/// Everything needed to open one backend connection.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl ConnectOptions {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
            user: user.into(),
            password: password.into(),
        }
    }

    /// Connection URL without the password, suitable for logs.
    pub fn display_url(&self) -> String {
        format!(
            "postgresql://{}@{}:{}/{}",
            self.user, self.host, self.port, self.database
        )
    }
}

// The password never reaches a log line through Debug.
impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The result of one statement: column names in metadata order and rows in
/// backend order. A `None` cell is SQL NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RowSet {
    /// A result with no columns and no rows (DDL, DELETE).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A factory for backend connections.
#[allow(async_fn_in_trait)]
pub trait Backend {
    type Connection: Connection;

    /// Opens a new connection. Fails with the backend's own error text.
    async fn open(&self, options: &ConnectOptions) -> Result<Self::Connection, BackendError>;
}

/// One live backend connection, exclusively owned by its user.
#[allow(async_fn_in_trait)]
pub trait Connection {
    /// Runs a single statement to completion.
    async fn execute(&mut self, sql: &str) -> Result<RowSet, BackendError>;

    /// Closes the connection. On failure the caller keeps the handle and may
    /// call `close` again. A backend whose failed close already released the
    /// session reports that retry as success, and any later statement fails.
    async fn close(&mut self) -> Result<(), BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display_is_verbatim() {
        let err = BackendError::with_code(sqlstate::UNDEFINED_TABLE, "relation \"t\" does not exist");
        assert_eq!(err.to_string(), "relation \"t\" does not exist");
        assert_eq!(err.code(), Some("42P01"));

        let err = BackendError::new("connection reset");
        assert_eq!(err.code(), None);
    }

    #[test]
    fn test_connect_options_hide_password() {
        let options = ConnectOptions::new("localhost", 5432, "shop", "admin", "secret");
        let debug = format!("{:?}", options);
        assert!(!debug.contains("secret"));
        assert_eq!(options.display_url(), "postgresql://admin@localhost:5432/shop");
    }
}
