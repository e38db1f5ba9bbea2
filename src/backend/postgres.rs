//! PostgreSQL Backend
//!
//! A real gateway built on sqlx. Statements go through the simple query
//! protocol so every cell arrives in text form, which is exactly what the
//! client displays. Column metadata comes from preparing the statement,
//! so it is available even when a table has no rows. The statement cache is
//! off: a table dropped and recreated under the same name must report its
//! new columns for the same `SELECT *` text.

use crate::backend::{sqlstate, Backend, BackendError, ConnectOptions, Connection, RowSet};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::{Column, ConnectOptions as _, Connection as _, Executor, Row, Statement};
use tracing::debug;

impl From<sqlx::Error> for BackendError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => match db.code() {
                Some(code) => BackendError::with_code(code.into_owned(), db.message()),
                None => BackendError::new(db.message()),
            },
            _ => BackendError::new(err.to_string()),
        }
    }
}

/// Opens connections to a PostgreSQL server.
#[derive(Debug, Clone, Default)]
pub struct PostgresBackend;

impl PostgresBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for PostgresBackend {
    type Connection = PostgresConnection;

    async fn open(&self, options: &ConnectOptions) -> Result<PostgresConnection, BackendError> {
        let pg_options = PgConnectOptions::new()
            .host(&options.host)
            .port(options.port)
            .database(&options.database)
            .username(&options.user)
            .password(&options.password)
            .statement_cache_capacity(0);

        let conn = pg_options.connect().await?;
        debug!(url = %options.display_url(), "PostgreSQL connection opened");

        Ok(PostgresConnection { inner: Some(conn) })
    }
}

/// One PostgreSQL session.
///
/// sqlx consumes the connection when closing it. A failed close still drops
/// the socket, so this handle is left without a session: a retried close
/// succeeds and later statements fail with a connection error.
pub struct PostgresConnection {
    inner: Option<PgConnection>,
}

impl PostgresConnection {
    fn session(&mut self) -> Result<&mut PgConnection, BackendError> {
        self.inner.as_mut().ok_or_else(|| {
            BackendError::with_code(sqlstate::CONNECTION_FAILURE, "connection is closed")
        })
    }
}

impl Connection for PostgresConnection {
    async fn execute(&mut self, sql: &str) -> Result<RowSet, BackendError> {
        let conn = self.session()?;

        let columns: Vec<String> = {
            let prepared = (&mut *conn).prepare(sql).await?;
            prepared
                .columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect()
        };

        let rows: Vec<PgRow> = sqlx::raw_sql(sql).fetch_all(&mut *conn).await?;
        let rows = rows
            .iter()
            .map(|row| {
                (0..row.len())
                    .map(|i| row.try_get_unchecked::<Option<String>, _>(i))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RowSet::new(columns, rows))
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        match self.inner.take() {
            Some(conn) => conn.close().await.map_err(BackendError::from),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    //! These tests need a PostgreSQL server with password authentication.
    //! Set `SQLCMD_TEST_PG` to `host` or `host:port` to run them; the role
    //! and database default to `postgres` and can be changed with
    //! `SQLCMD_TEST_PG_USER`, `SQLCMD_TEST_PG_PASSWORD` and
    //! `SQLCMD_TEST_PG_DATABASE`.

    use super::*;
    use crate::manager::{DatabaseManager, DbError};

    struct Server {
        options: ConnectOptions,
    }

    impl Server {
        fn from_env() -> Option<Self> {
            let address = std::env::var("SQLCMD_TEST_PG").ok()?;
            let (host, port) = match address.rsplit_once(':') {
                Some((host, port)) => (host.to_string(), port.parse().ok()?),
                None => (address, crate::DEFAULT_PORT),
            };
            let var = |name: &str| std::env::var(name).unwrap_or_else(|_| "postgres".to_string());

            Some(Self {
                options: ConnectOptions::new(
                    host,
                    port,
                    var("SQLCMD_TEST_PG_DATABASE"),
                    var("SQLCMD_TEST_PG_USER"),
                    var("SQLCMD_TEST_PG_PASSWORD"),
                ),
            })
        }

        fn manager(&self) -> DatabaseManager<PostgresBackend> {
            DatabaseManager::with_address(
                PostgresBackend::new(),
                self.options.host.as_str(),
                self.options.port,
            )
        }

        async fn connected(&self) -> DatabaseManager<PostgresBackend> {
            let mut manager = self.manager();
            manager
                .connect(
                    &self.options.database,
                    &self.options.user,
                    &self.options.password,
                )
                .await
                .unwrap();
            manager
        }

        /// Runs setup statements on a side connection.
        async fn run(&self, statements: &[&str]) {
            let mut conn = PostgresBackend::new().open(&self.options).await.unwrap();
            for sql in statements {
                conn.execute(sql).await.unwrap();
            }
            conn.close().await.unwrap();
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_connect_failures() {
        let Some(server) = Server::from_env() else {
            return;
        };
        let mut manager = server.manager();

        let err = manager
            .connect(&server.options.database, &server.options.user, "sqlcmd-wrong-password")
            .await
            .unwrap_err();
        assert_eq!(err, DbError::InvalidCredentials);

        let err = manager
            .connect(
                "sqlcmd_missing_database",
                &server.options.user,
                &server.options.password,
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DbError::DatabaseNotFound("sqlcmd_missing_database".to_string())
        );
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn test_server_errors_translate() {
        let Some(server) = Server::from_env() else {
            return;
        };
        server
            .run(&["DROP TABLE IF EXISTS sqlcmd_pg_errors", "DROP TABLE IF EXISTS sqlcmd_pg_ghost"])
            .await;
        let mut manager = server.connected().await;

        assert_eq!(
            manager.drop_table("sqlcmd_pg_ghost").await,
            Err(DbError::TableNotFound("sqlcmd_pg_ghost".to_string()))
        );
        assert_eq!(
            manager.clear_table("sqlcmd_pg_ghost").await,
            Err(DbError::TableNotFound("sqlcmd_pg_ghost".to_string()))
        );
        assert_eq!(
            manager.fetch_rows("sqlcmd_pg_ghost").await,
            Err(DbError::TableNotFound("sqlcmd_pg_ghost".to_string()))
        );
        assert_eq!(
            manager.fetch_column_names("bad-name").await,
            Err(DbError::InvalidIdentifier)
        );

        assert_eq!(
            manager
                .create_table("sqlcmd_pg_errors", &strings(&["id"]), &strings(&["integr"]))
                .await,
            Err(DbError::InvalidColumnType)
        );
        assert_eq!(
            manager
                .create_table("sqlcmd_pg_errors", &strings(&["1a"]), &strings(&["int"]))
                .await,
            Err(DbError::InvalidColumnName)
        );

        manager
            .create_table("sqlcmd_pg_errors", &strings(&["id"]), &strings(&["int"]))
            .await
            .unwrap();
        assert_eq!(
            manager
                .create_table("sqlcmd_pg_errors", &strings(&["id"]), &strings(&["int"]))
                .await,
            Err(DbError::TableAlreadyExists("sqlcmd_pg_errors".to_string()))
        );

        manager.drop_table("sqlcmd_pg_errors").await.unwrap();
        manager.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_rows_is_row_major() {
        let Some(server) = Server::from_env() else {
            return;
        };
        server
            .run(&[
                "DROP TABLE IF EXISTS sqlcmd_pg_rows",
                "CREATE TABLE sqlcmd_pg_rows (id int, name text)",
                "INSERT INTO sqlcmd_pg_rows VALUES (1, 'Ann'), (2, NULL)",
            ])
            .await;
        let mut manager = server.connected().await;

        assert_eq!(
            manager.fetch_rows("sqlcmd_pg_rows").await.unwrap(),
            strings(&["1", "Ann", "2", "NULL"])
        );
        assert_eq!(
            manager.fetch_column_names("sqlcmd_pg_rows").await.unwrap(),
            strings(&["id", "name"])
        );

        manager.clear_table("sqlcmd_pg_rows").await.unwrap();
        assert!(manager.fetch_rows("sqlcmd_pg_rows").await.unwrap().is_empty());

        manager.drop_table("sqlcmd_pg_rows").await.unwrap();
        manager.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_recreated_table_reports_new_columns() {
        let Some(server) = Server::from_env() else {
            return;
        };
        server.run(&["DROP TABLE IF EXISTS sqlcmd_pg_recreate"]).await;
        let mut manager = server.connected().await;

        manager
            .create_table("sqlcmd_pg_recreate", &strings(&["a"]), &strings(&["int"]))
            .await
            .unwrap();
        assert_eq!(
            manager.fetch_column_names("sqlcmd_pg_recreate").await.unwrap(),
            strings(&["a"])
        );

        manager.drop_table("sqlcmd_pg_recreate").await.unwrap();
        manager
            .create_table(
                "sqlcmd_pg_recreate",
                &strings(&["b", "c"]),
                &strings(&["text", "int"]),
            )
            .await
            .unwrap();
        assert_eq!(
            manager.fetch_column_names("sqlcmd_pg_recreate").await.unwrap(),
            strings(&["b", "c"])
        );

        manager.drop_table("sqlcmd_pg_recreate").await.unwrap();
        manager.disconnect().await.unwrap();
    }
}
