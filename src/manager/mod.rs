//! Database Manager Module
//!
//! The semantic layer between command handlers and the backend.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ Command handler │  (commands module)
//! └────────┬────────┘
//!          │ connect / list_tables / create_table / drop_table /
//!          │ clear_table / fetch_rows / fetch_column_names / disconnect
//!          ▼
//! ┌─────────────────┐      ┌─────────────────┐
//! │ DatabaseManager │─────>│  translate()    │  BackendError -> DbError
//! └────────┬────────┘      └─────────────────┘
//!          │ one statement per operation
//!          ▼
//! ┌─────────────────┐
//! │ Backend         │  (backend module)
//! └─────────────────┘
//! ```
//!
//! - `database`: the [`DatabaseManager`] state machine and its operations
//! - `errors`: the [`DbError`] taxonomy and the backend error translator

pub mod database;
pub mod errors;

pub use database::{create_table_sql, DatabaseManager, TableData, LIST_TABLES_SQL, NULL_TEXT};
pub use errors::{translate, CloseStage, DbError, ErrorKind, Operation};
