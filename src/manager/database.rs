//! Database Manager
//!
//! A stateful wrapper around at most one backend connection. It turns the
//! client's semantic operations into backend statements and hands every
//! backend failure to [`translate`] before returning it.
//!
//! ## State Machine
//!
//! ```text
//!                 connect (ok)
//!   ┌──────────────┐ ────────────> ┌──────────────┐
//!   │ Disconnected │               │  Connected   │ ──┐ connect: close old,
//!   └──────────────┘ <──────────── └──────────────┘ <─┘ then open new
//!                  disconnect (ok)
//! ```
//!
//! Every operation except [`connect`](DatabaseManager::connect),
//! [`is_connected`](DatabaseManager::is_connected) and
//! [`disconnect`](DatabaseManager::disconnect) fails with
//! [`DbError::NotConnected`] while disconnected, without touching the backend.
//! A failed close never changes the state.

use crate::backend::{Backend, ConnectOptions, Connection, RowSet};
use crate::manager::errors::{translate, CloseStage, DbError, Operation};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Lists user tables; system schemas are excluded.
pub const LIST_TABLES_SQL: &str = "SELECT table_name FROM information_schema.tables \
     WHERE table_schema NOT IN ('information_schema', 'pg_catalog') \
     AND table_schema IN ('public')";

/// Text shown for SQL NULL cells.
pub const NULL_TEXT: &str = "NULL";

/// Everything a `SELECT *` returned: the raw column list (duplicates kept)
/// and the rows with NULLs rendered as [`NULL_TEXT`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl From<RowSet> for TableData {
    fn from(set: RowSet) -> Self {
        let rows = set
            .rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| cell.unwrap_or_else(|| NULL_TEXT.to_string()))
                    .collect()
            })
            .collect();

        Self {
            columns: set.columns,
            rows,
        }
    }
}

/// The live connection plus the name of the database it points at.
struct Session<C> {
    connection: C,
    database: String,
}

/// Owns the backend and the (optional) live connection.
///
/// # Example
///
/// ```
/// use sqlcmd::backend::MemoryBackend;
/// use sqlcmd::manager::DatabaseManager;
///
/// # tokio_test::block_on(async {
/// let backend = MemoryBackend::new()
///     .with_user("postgres", "postgres")
///     .with_database("shop");
/// let mut manager = DatabaseManager::new(backend);
///
/// manager.connect("shop", "postgres", "postgres").await.unwrap();
/// manager
///     .create_table("orders", &["id".to_string()], &["int".to_string()])
///     .await
///     .unwrap();
/// assert_eq!(manager.list_tables().await.unwrap(), vec!["orders"]);
/// # });
/// ```
pub struct DatabaseManager<B: Backend> {
    backend: B,
    host: String,
    port: u16,
    session: Option<Session<B::Connection>>,
}

impl<B: Backend> DatabaseManager<B> {
    /// Creates a disconnected manager targeting `localhost:5432`.
    pub fn new(backend: B) -> Self {
        Self::with_address(backend, crate::DEFAULT_HOST, crate::DEFAULT_PORT)
    }

    /// Creates a disconnected manager targeting the given server address.
    pub fn with_address(backend: B, host: impl Into<String>, port: u16) -> Self {
        Self {
            backend,
            host: host.into(),
            port,
            session: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Name of the connected database, if any.
    pub fn database(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.database.as_str())
    }

    /// Connects to `database`, closing any existing connection first.
    ///
    /// If the old connection cannot be closed it is kept and the call fails
    /// with [`DbError::ConnectionCloseFailed`]; no new connection is opened.
    pub async fn connect(
        &mut self,
        database: &str,
        user: &str,
        password: &str,
    ) -> Result<(), DbError> {
        self.close_session(CloseStage::Reconnect).await?;

        let options = ConnectOptions::new(self.host.as_str(), self.port, database, user, password);
        let connection = self
            .backend
            .open(&options)
            .await
            .map_err(|e| translate(Operation::Connect { database }, e))?;

        info!(url = %options.display_url(), "Connected");
        self.session = Some(Session {
            connection,
            database: database.to_string(),
        });
        Ok(())
    }

    /// Table names in the order the backend reports them.
    pub async fn list_tables(&mut self) -> Result<Vec<String>, DbError> {
        let set = self
            .run(LIST_TABLES_SQL, Operation::ListTables)
            .await?;

        Ok(set
            .rows
            .into_iter()
            .filter_map(|row| row.into_iter().next().flatten())
            .collect())
    }

    /// Creates `name` with the given columns. The lists are checked before
    /// anything else, so a length mismatch never reaches the backend.
    pub async fn create_table(
        &mut self,
        name: &str,
        column_names: &[String],
        column_types: &[String],
    ) -> Result<(), DbError> {
        if column_names.len() != column_types.len() {
            return Err(DbError::SchemaMismatch {
                names: column_names.len(),
                types: column_types.len(),
            });
        }

        let sql = create_table_sql(name, column_names, column_types);
        self.run(&sql, Operation::CreateTable { table: name })
            .await?;
        Ok(())
    }

    /// Drops `name`. Failures other than a missing table surface as
    /// [`DbError::Backend`], the same as every other operation.
    pub async fn drop_table(&mut self, name: &str) -> Result<(), DbError> {
        let sql = format!("DROP TABLE {}", name);
        match self.run(&sql, Operation::DropTable { table: name }).await {
            Ok(_) => Ok(()),
            Err(DbError::Backend(e)) => {
                warn!(table = %name, error = %e, "Drop failed");
                Err(DbError::Backend(e))
            }
            Err(e) => Err(e),
        }
    }

    /// Deletes every row of `name` (a `DELETE`, not a `TRUNCATE`).
    pub async fn clear_table(&mut self, name: &str) -> Result<(), DbError> {
        let sql = format!("DELETE FROM {}", name);
        self.run(&sql, Operation::ClearTable { table: name })
            .await?;
        Ok(())
    }

    /// Runs `SELECT * FROM name` once and returns columns and rows together.
    pub async fn fetch_table(&mut self, name: &str) -> Result<TableData, DbError> {
        let sql = format!("SELECT * FROM {}", name);
        let set = self.run(&sql, Operation::SelectAll { table: name }).await?;
        Ok(TableData::from(set))
    }

    /// Every cell of `name`, flattened in row-major order.
    pub async fn fetch_rows(&mut self, name: &str) -> Result<Vec<String>, DbError> {
        let data = self.fetch_table(name).await?;
        Ok(data.rows.into_iter().flatten().collect())
    }

    /// Column names of `name` in metadata order; a repeated name is kept at
    /// its first position only.
    pub async fn fetch_column_names(&mut self, name: &str) -> Result<Vec<String>, DbError> {
        let data = self.fetch_table(name).await?;
        let mut seen = HashSet::new();
        Ok(data
            .columns
            .into_iter()
            .filter(|c| seen.insert(c.clone()))
            .collect())
    }

    /// Closes the connection if there is one. A failed close keeps the
    /// manager connected and reports [`DbError::ConnectionCloseFailed`].
    pub async fn disconnect(&mut self) -> Result<(), DbError> {
        self.close_session(CloseStage::Disconnect).await
    }

    async fn close_session(&mut self, stage: CloseStage) -> Result<(), DbError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };

        if let Err(source) = session.connection.close().await {
            warn!(database = %session.database, error = %source, "Failed to close connection");
            return Err(DbError::ConnectionCloseFailed { stage, source });
        }

        info!(database = %session.database, "Disconnected");
        self.session = None;
        Ok(())
    }

    /// Executes one statement on the live connection and translates failures.
    async fn run(&mut self, sql: &str, operation: Operation<'_>) -> Result<RowSet, DbError> {
        let session = self.session.as_mut().ok_or(DbError::NotConnected)?;

        debug!(database = %session.database, sql, "Executing");
        session
            .connection
            .execute(sql)
            .await
            .map_err(|e| translate(operation, e))
    }
}

/// Builds `CREATE TABLE name (col1 type1, col2 type2, ...)`; zero columns
/// give `CREATE TABLE name ()`.
pub fn create_table_sql(name: &str, column_names: &[String], column_types: &[String]) -> String {
    let columns = column_names
        .iter()
        .zip(column_types)
        .map(|(column, data_type)| format!("{} {}", column, data_type))
        .collect::<Vec<_>>()
        .join(", ");

    format!("CREATE TABLE {} ({})", name, columns)
}
