//! In-Memory Relational Backend
//!
//! A process-local stand-in for a PostgreSQL server. It keeps a small
//! catalog per database and answers the fixed statement templates the
//! database manager issues, failing with the same message text and SQLSTATE
//! codes a PostgreSQL server would produce.
//!
//! ## Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    MemoryBackend (Arc)                   │
//! │  ┌──────────────────────────┐  ┌──────────────────────┐  │
//! │  │ RwLock<ClusterState>     │  │ BackendStats         │  │
//! │  │  users: name -> password │  │  (atomic counters)   │  │
//! │  │  databases: name ->      │  └──────────────────────┘  │
//! │  │    Catalog (ordered)     │  ┌──────────────────────┐  │
//! │  └──────────────────────────┘  │ Mutex<Faults>        │  │
//! │                                └──────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//!            ▲                          ▲
//!            │ clone of the Arc         │
//!   MemoryConnection              test / seed helpers
//! ```
//!
//! Clones of a `MemoryBackend` share the same cluster, so a test can keep
//! one handle to seed rows and inspect the catalog while a manager owns a
//! connection opened from another.

use crate::backend::statement::{ColumnDef, Statement};
use crate::backend::{sqlstate, Backend, BackendError, ConnectOptions, Connection, RowSet};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, trace};

/// Type names accepted in column definitions (modifiers such as `(20)` are
/// stripped before the lookup).
const KNOWN_TYPES: &[&str] = &[
    "smallint",
    "int",
    "int2",
    "int4",
    "int8",
    "integer",
    "bigint",
    "serial",
    "bigserial",
    "real",
    "float4",
    "float8",
    "double precision",
    "numeric",
    "decimal",
    "boolean",
    "bool",
    "text",
    "varchar",
    "character varying",
    "char",
    "character",
    "date",
    "time",
    "timestamp",
    "timestamptz",
    "uuid",
    "json",
    "jsonb",
    "bytea",
];

/// One stored relation. Views are read-only and may repeat column names.
#[derive(Debug, Clone)]
struct Relation {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
    is_view: bool,
}

/// Relations of one database, in creation order.
#[derive(Debug, Default)]
struct Catalog {
    relations: Vec<Relation>,
}

impl Catalog {
    fn position(&self, name: &str) -> Option<usize> {
        self.relations.iter().position(|r| r.name == name)
    }

    fn get(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.name == name)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Relation> {
        self.relations.iter_mut().find(|r| r.name == name)
    }
}

#[derive(Debug, Default)]
struct ClusterState {
    users: HashMap<String, String>,
    databases: HashMap<String, Catalog>,
}

/// Errors queued to be returned by the next matching call.
#[derive(Debug, Default)]
struct Faults {
    next_statement: Option<BackendError>,
    next_close: Option<BackendError>,
}

/// Counters describing connection and statement traffic.
#[derive(Debug, Default)]
pub struct BackendStats {
    /// Total connections successfully opened
    pub connections_opened: AtomicU64,
    /// Connections currently open
    pub live_connections: AtomicU64,
    /// Statements received, including ones that failed
    pub statements_executed: AtomicU64,
}

impl BackendStats {
    pub fn connections_opened(&self) -> u64 {
        self.connections_opened.load(Ordering::Relaxed)
    }

    pub fn live_connections(&self) -> u64 {
        self.live_connections.load(Ordering::Relaxed)
    }

    pub fn statements_executed(&self) -> u64 {
        self.statements_executed.load(Ordering::Relaxed)
    }

    fn connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
        self.live_connections.fetch_add(1, Ordering::Relaxed);
    }

    fn connection_closed(&self) {
        self.live_connections.fetch_sub(1, Ordering::Relaxed);
    }

    fn statement_executed(&self) {
        self.statements_executed.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: RwLock<ClusterState>,
    stats: BackendStats,
    faults: Mutex<Faults>,
}

impl Shared {
    fn read_state(&self) -> RwLockReadGuard<'_, ClusterState> {
        self.state.read().unwrap()
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, ClusterState> {
        self.state.write().unwrap()
    }
}

/// An in-memory backend shared by every clone.
///
/// # Example
///
/// ```
/// use sqlcmd::backend::MemoryBackend;
///
/// let backend = MemoryBackend::new()
///     .with_user("postgres", "postgres")
///     .with_database("shop");
///
/// assert!(backend.table_names("shop").unwrap().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    shared: Arc<Shared>,
}

impl MemoryBackend {
    /// Creates a backend with no users and no databases.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, user: &str, password: &str) -> Self {
        self.add_user(user, password);
        self
    }

    pub fn with_database(self, name: &str) -> Self {
        self.add_database(name);
        self
    }

    /// Registers a login role, replacing its password if it exists.
    pub fn add_user(&self, user: &str, password: &str) {
        self.shared
            .write_state()
            .users
            .insert(user.to_string(), password.to_string());
    }

    /// Creates an empty database; existing databases are left untouched.
    pub fn add_database(&self, name: &str) {
        self.shared
            .write_state()
            .databases
            .entry(name.to_string())
            .or_default();
    }

    /// Names of all relations in `database`, in creation order.
    pub fn table_names(&self, database: &str) -> Result<Vec<String>, BackendError> {
        let state = self.shared.read_state();
        let catalog = state
            .databases
            .get(database)
            .ok_or_else(|| database_missing(database))?;
        Ok(catalog.relations.iter().map(|r| r.name.clone()).collect())
    }

    /// Appends one row to a table.
    pub fn insert_row(
        &self,
        database: &str,
        table: &str,
        row: Vec<Option<String>>,
    ) -> Result<(), BackendError> {
        let mut state = self.shared.write_state();
        let catalog = state
            .databases
            .get_mut(database)
            .ok_or_else(|| database_missing(database))?;
        let relation = catalog
            .get_mut(table)
            .ok_or_else(|| relation_missing(table))?;

        if relation.is_view {
            return Err(BackendError::with_code(
                "55000",
                format!("cannot insert into view \"{}\"", table),
            ));
        }
        if row.len() != relation.columns.len() {
            return Err(BackendError::with_code(
                sqlstate::SYNTAX_ERROR,
                "INSERT has more expressions than target columns",
            ));
        }

        relation.rows.push(row);
        Ok(())
    }

    /// Defines a read-only view with an arbitrary column list. Unlike a
    /// table, a view may expose the same column name twice (for example
    /// through an alias).
    pub fn define_view(
        &self,
        database: &str,
        name: &str,
        columns: Vec<String>,
        rows: Vec<Vec<Option<String>>>,
    ) -> Result<(), BackendError> {
        let mut state = self.shared.write_state();
        let catalog = state
            .databases
            .get_mut(database)
            .ok_or_else(|| database_missing(database))?;

        if catalog.position(name).is_some() {
            return Err(relation_exists(name));
        }

        catalog.relations.push(Relation {
            name: name.to_string(),
            columns,
            rows,
            is_view: true,
        });
        Ok(())
    }

    /// Makes the next statement on any connection fail with `error`.
    pub fn fail_next_statement(&self, error: BackendError) {
        self.shared.faults.lock().unwrap().next_statement = Some(error);
    }

    /// Makes the next close on any connection fail with `error`.
    pub fn fail_next_close(&self, error: BackendError) {
        self.shared.faults.lock().unwrap().next_close = Some(error);
    }

    pub fn stats(&self) -> &BackendStats {
        &self.shared.stats
    }
}

impl Backend for MemoryBackend {
    type Connection = MemoryConnection;

    async fn open(&self, options: &ConnectOptions) -> Result<MemoryConnection, BackendError> {
        {
            let state = self.shared.read_state();

            let authenticated = state
                .users
                .get(&options.user)
                .map(|password| *password == options.password)
                .unwrap_or(false);
            if !authenticated {
                return Err(BackendError::with_code(
                    sqlstate::INVALID_PASSWORD,
                    format!(
                        "password authentication failed for user \"{}\"",
                        options.user
                    ),
                ));
            }

            if !state.databases.contains_key(&options.database) {
                return Err(database_missing(&options.database));
            }
        }

        self.shared.stats.connection_opened();
        debug!(database = %options.database, user = %options.user, "Memory connection opened");

        Ok(MemoryConnection {
            shared: Arc::clone(&self.shared),
            database: options.database.clone(),
            open: true,
        })
    }
}

/// A connection to one database of a [`MemoryBackend`].
///
/// Dropping an open connection releases it, the same as closing it.
#[derive(Debug)]
pub struct MemoryConnection {
    shared: Arc<Shared>,
    database: String,
    open: bool,
}

impl MemoryConnection {
    pub fn is_open(&self) -> bool {
        self.open
    }

    fn apply(&self, statement: Statement) -> Result<RowSet, BackendError> {
        let mut state = self.shared.write_state();
        let catalog = state
            .databases
            .get_mut(&self.database)
            .ok_or_else(|| database_missing(&self.database))?;

        match statement {
            Statement::ListTables => {
                let rows = catalog
                    .relations
                    .iter()
                    .map(|r| vec![Some(r.name.clone())])
                    .collect();
                Ok(RowSet::new(vec!["table_name".to_string()], rows))
            }
            Statement::CreateTable { name, columns } => {
                if catalog.position(&name).is_some() {
                    return Err(relation_exists(&name));
                }
                validate_columns(&columns)?;

                catalog.relations.push(Relation {
                    name,
                    columns: columns.into_iter().map(|c| c.name).collect(),
                    rows: Vec::new(),
                    is_view: false,
                });
                Ok(RowSet::empty())
            }
            Statement::DropTable { name } => {
                let index = catalog.position(&name).ok_or_else(|| {
                    BackendError::with_code(
                        sqlstate::UNDEFINED_TABLE,
                        format!("table \"{}\" does not exist", name),
                    )
                })?;
                if catalog.relations[index].is_view {
                    return Err(BackendError::with_code(
                        "42809",
                        format!("\"{}\" is not a table", name),
                    ));
                }

                catalog.relations.remove(index);
                Ok(RowSet::empty())
            }
            Statement::DeleteFrom { name } => {
                let relation = catalog
                    .get_mut(&name)
                    .ok_or_else(|| relation_missing(&name))?;
                if relation.is_view {
                    return Err(BackendError::with_code(
                        "55000",
                        format!("cannot delete from view \"{}\"", name),
                    ));
                }

                let deleted = relation.rows.len();
                relation.rows.clear();
                trace!(table = %name, deleted, "Rows deleted");
                Ok(RowSet::empty())
            }
            Statement::SelectAll { name } => {
                let relation = catalog.get(&name).ok_or_else(|| relation_missing(&name))?;
                Ok(RowSet::new(relation.columns.clone(), relation.rows.clone()))
            }
        }
    }
}

impl Connection for MemoryConnection {
    async fn execute(&mut self, sql: &str) -> Result<RowSet, BackendError> {
        if !self.open {
            return Err(BackendError::with_code(
                "08003",
                "This connection has been closed.",
            ));
        }

        self.shared.stats.statement_executed();
        trace!(database = %self.database, sql, "Executing statement");

        if let Some(error) = self.shared.faults.lock().unwrap().next_statement.take() {
            return Err(error);
        }

        let statement = Statement::parse(sql)?;
        self.apply(statement)
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        if !self.open {
            return Ok(());
        }

        if let Some(error) = self.shared.faults.lock().unwrap().next_close.take() {
            return Err(error);
        }

        self.open = false;
        self.shared.stats.connection_closed();
        debug!(database = %self.database, "Memory connection closed");
        Ok(())
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        if self.open {
            self.open = false;
            self.shared.stats.connection_closed();
        }
    }
}

fn validate_columns(columns: &[ColumnDef]) -> Result<(), BackendError> {
    for (i, column) in columns.iter().enumerate() {
        if columns[..i].iter().any(|c| c.name == column.name) {
            return Err(BackendError::with_code(
                sqlstate::DUPLICATE_COLUMN,
                format!("column \"{}\" specified more than once", column.name),
            ));
        }

        let base = column
            .data_type
            .split('(')
            .next()
            .unwrap_or_default()
            .trim();
        if !KNOWN_TYPES.contains(&base) {
            return Err(BackendError::with_code(
                sqlstate::UNDEFINED_OBJECT,
                format!("type \"{}\" does not exist", base),
            ));
        }
    }
    Ok(())
}

fn database_missing(name: &str) -> BackendError {
    BackendError::with_code(
        sqlstate::INVALID_CATALOG_NAME,
        format!("database \"{}\" does not exist", name),
    )
}

fn relation_missing(name: &str) -> BackendError {
    BackendError::with_code(
        sqlstate::UNDEFINED_TABLE,
        format!("relation \"{}\" does not exist", name),
    )
}

fn relation_exists(name: &str) -> BackendError {
    BackendError::with_code(
        sqlstate::DUPLICATE_TABLE,
        format!("relation \"{}\" already exists", name),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_backend() -> MemoryBackend {
        MemoryBackend::new()
            .with_user("postgres", "secret")
            .with_database("shop")
    }

    fn options(database: &str, user: &str, password: &str) -> ConnectOptions {
        ConnectOptions::new("localhost", 5432, database, user, password)
    }

    #[tokio::test]
    async fn test_open_checks_credentials_and_database() {
        let backend = create_backend();

        let err = backend
            .open(&options("shop", "postgres", "wrong"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(sqlstate::INVALID_PASSWORD));
        assert_eq!(
            err.message(),
            "password authentication failed for user \"postgres\""
        );

        let err = backend
            .open(&options("missing", "postgres", "secret"))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "database \"missing\" does not exist");

        assert_eq!(backend.stats().connections_opened(), 0);
    }

    #[tokio::test]
    async fn test_create_select_and_drop() {
        let backend = create_backend();
        let mut conn = backend
            .open(&options("shop", "postgres", "secret"))
            .await
            .unwrap();

        conn.execute("CREATE TABLE orders (id int, item text)")
            .await
            .unwrap();
        backend
            .insert_row("shop", "orders", vec![Some("1".into()), None])
            .unwrap();

        let rows = conn.execute("SELECT * FROM orders").await.unwrap();
        assert_eq!(rows.columns, vec!["id", "item"]);
        assert_eq!(rows.rows, vec![vec![Some("1".to_string()), None]]);

        conn.execute("DROP TABLE orders").await.unwrap();
        assert!(backend.table_names("shop").unwrap().is_empty());

        let err = conn.execute("DROP TABLE orders").await.unwrap_err();
        assert_eq!(err.message(), "table \"orders\" does not exist");
    }

    #[tokio::test]
    async fn test_create_errors_mirror_postgres() {
        let backend = create_backend();
        let mut conn = backend
            .open(&options("shop", "postgres", "secret"))
            .await
            .unwrap();

        conn.execute("CREATE TABLE t (a int)").await.unwrap();

        let err = conn.execute("CREATE TABLE t (a int)").await.unwrap_err();
        assert_eq!(err.code(), Some(sqlstate::DUPLICATE_TABLE));

        let err = conn.execute("CREATE TABLE u (a integr)").await.unwrap_err();
        assert_eq!(err.message(), "type \"integr\" does not exist");

        let err = conn.execute("CREATE TABLE u (a int, a text)").await.unwrap_err();
        assert_eq!(err.code(), Some(sqlstate::DUPLICATE_COLUMN));

        conn.execute("CREATE TABLE u (name varchar(20))").await.unwrap();
        assert_eq!(backend.table_names("shop").unwrap(), vec!["t", "u"]);
    }

    #[tokio::test]
    async fn test_delete_clears_rows() {
        let backend = create_backend();
        let mut conn = backend
            .open(&options("shop", "postgres", "secret"))
            .await
            .unwrap();

        conn.execute("CREATE TABLE t (a int)").await.unwrap();
        backend.insert_row("shop", "t", vec![Some("1".into())]).unwrap();
        backend.insert_row("shop", "t", vec![Some("2".into())]).unwrap();

        conn.execute("DELETE FROM t").await.unwrap();
        assert!(conn.execute("SELECT * FROM t").await.unwrap().is_empty());

        let err = conn.execute("DELETE FROM nope").await.unwrap_err();
        assert_eq!(err.message(), "relation \"nope\" does not exist");
    }

    #[tokio::test]
    async fn test_views_are_read_only() {
        let backend = create_backend();
        backend
            .define_view("shop", "v", vec!["id".into(), "id".into()], vec![])
            .unwrap();
        let mut conn = backend
            .open(&options("shop", "postgres", "secret"))
            .await
            .unwrap();

        let rows = conn.execute("SELECT * FROM v").await.unwrap();
        assert_eq!(rows.columns, vec!["id", "id"]);

        let err = conn.execute("DROP TABLE v").await.unwrap_err();
        assert_eq!(err.message(), "\"v\" is not a table");
    }

    #[tokio::test]
    async fn test_close_and_drop_release_connection() {
        let backend = create_backend();

        let mut conn = backend
            .open(&options("shop", "postgres", "secret"))
            .await
            .unwrap();
        assert_eq!(backend.stats().live_connections(), 1);

        backend.fail_next_close(BackendError::new("I/O error"));
        assert!(conn.close().await.is_err());
        assert!(conn.is_open());
        assert_eq!(backend.stats().live_connections(), 1);

        conn.close().await.unwrap();
        assert_eq!(backend.stats().live_connections(), 0);
        assert!(conn.execute("SELECT * FROM t").await.is_err());

        {
            let _dropped = backend
                .open(&options("shop", "postgres", "secret"))
                .await
                .unwrap();
            assert_eq!(backend.stats().live_connections(), 1);
        }
        assert_eq!(backend.stats().live_connections(), 0);
        assert_eq!(backend.stats().connections_opened(), 2);
    }

    #[test]
    fn test_fault_injection_applies_once() {
        let backend = create_backend();
        backend.fail_next_statement(BackendError::new("boom"));

        tokio_test::block_on(async {
            let mut conn = backend
                .open(&options("shop", "postgres", "secret"))
                .await
                .unwrap();

            let err = conn.execute("SELECT * FROM anything").await.unwrap_err();
            assert_eq!(err.message(), "boom");

            let err = conn.execute("SELECT * FROM anything").await.unwrap_err();
            assert_eq!(err.message(), "relation \"anything\" does not exist");
        });
    }
}
