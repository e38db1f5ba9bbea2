//! Error Taxonomy and Backend Error Translation
//!
//! Backends report failures as free-form text (plus, usually, a SQLSTATE
//! code). This module is the only place that looks at that text: it maps
//! each failure onto a small, stable set of user-facing errors.
//!
//! ## Translation Rules
//!
//! Every operation has its own ordered rule list. A rule matches when the
//! backend's SQLSTATE equals the rule's code, or when all of the rule's
//! needles appear in the message (case-insensitively). The first matching
//! rule wins; a failure no rule claims passes through verbatim as
//! [`DbError::Backend`].
//!
//! ```text
//! BackendError ──> translate(op, err) ──> rules for op ──> DbError
//!                                              │
//!                                              └── no match ──> DbError::Backend
//! ```
//!
//! Code matching keeps classification working when the server sends
//! localized message text.

use crate::backend::{sqlstate, BackendError};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Which close failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseStage {
    /// Closing the previous connection before opening a new one
    Reconnect,
    /// An explicit disconnect
    Disconnect,
}

impl fmt::Display for CloseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseStage::Reconnect => write!(
                f,
                "Previous connection could not be closed. Try again or restart the client."
            ),
            CloseStage::Disconnect => write!(f, "Connection could not be closed."),
        }
    }
}

/// User-facing errors of the database manager. The `Display` text is what
/// the client prints.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DbError {
    #[error("You are not connected to database.")]
    NotConnected,

    #[error("Username or password are incorrect.")]
    InvalidCredentials,

    #[error("Database {0} does not exist.")]
    DatabaseNotFound(String),

    #[error("Table with name {0} already exists. You can not create the table with the same name.")]
    TableAlreadyExists(String),

    #[error("Table {0} does not exist.")]
    TableNotFound(String),

    #[error("You used wrong type for one or more columns.")]
    InvalidColumnType,

    #[error("You used wrong name for one or more columns.")]
    InvalidColumnName,

    #[error("Syntax error in table name.")]
    InvalidIdentifier,

    #[error("Can not create new table with different number of column names ({names}) and column types ({types}).")]
    SchemaMismatch { names: usize, types: usize },

    #[error("{stage}")]
    ConnectionCloseFailed {
        stage: CloseStage,
        #[source]
        source: BackendError,
    },

    /// Anything the rule tables do not recognize, shown as the backend said it.
    #[error("{0}")]
    Backend(#[from] BackendError),
}

/// The kind of a [`DbError`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotConnected,
    InvalidCredentials,
    DatabaseNotFound,
    TableAlreadyExists,
    TableNotFound,
    InvalidColumnType,
    InvalidColumnName,
    InvalidIdentifier,
    SchemaMismatch,
    ConnectionCloseFailed,
    BackendError,
}

impl DbError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::NotConnected => ErrorKind::NotConnected,
            DbError::InvalidCredentials => ErrorKind::InvalidCredentials,
            DbError::DatabaseNotFound(_) => ErrorKind::DatabaseNotFound,
            DbError::TableAlreadyExists(_) => ErrorKind::TableAlreadyExists,
            DbError::TableNotFound(_) => ErrorKind::TableNotFound,
            DbError::InvalidColumnType => ErrorKind::InvalidColumnType,
            DbError::InvalidColumnName => ErrorKind::InvalidColumnName,
            DbError::InvalidIdentifier => ErrorKind::InvalidIdentifier,
            DbError::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
            DbError::ConnectionCloseFailed { .. } => ErrorKind::ConnectionCloseFailed,
            DbError::Backend(_) => ErrorKind::BackendError,
        }
    }
}

/// The manager operation a backend failure came from, with the names
/// needed to build the user-facing message.
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    Connect { database: &'a str },
    ListTables,
    CreateTable { table: &'a str },
    DropTable { table: &'a str },
    ClearTable { table: &'a str },
    SelectAll { table: &'a str },
}

/// One entry of a rule table.
struct Rule {
    code: &'static str,
    needles: &'static [&'static str],
    kind: ErrorKind,
}

impl Rule {
    const fn new(code: &'static str, needles: &'static [&'static str], kind: ErrorKind) -> Self {
        Self {
            code,
            needles,
            kind,
        }
    }

    fn matches(&self, error: &BackendError) -> bool {
        if error.code() == Some(self.code) {
            return true;
        }

        let message = error.message().to_lowercase();
        !self.needles.is_empty() && self.needles.iter().all(|n| message.contains(n))
    }
}

const CONNECT_RULES: &[Rule] = &[
    Rule::new(
        sqlstate::INVALID_PASSWORD,
        &["password authentication failed"],
        ErrorKind::InvalidCredentials,
    ),
    Rule::new(
        sqlstate::INVALID_CATALOG_NAME,
        &["database \"", "does not exist"],
        ErrorKind::DatabaseNotFound,
    ),
];

const CREATE_RULES: &[Rule] = &[
    Rule::new(
        sqlstate::DUPLICATE_TABLE,
        &["already exists"],
        ErrorKind::TableAlreadyExists,
    ),
    Rule::new(
        sqlstate::UNDEFINED_OBJECT,
        &["type \"", "does not exist"],
        ErrorKind::InvalidColumnType,
    ),
    Rule::new(
        sqlstate::SYNTAX_ERROR,
        &["syntax error"],
        ErrorKind::InvalidColumnName,
    ),
];

const DROP_RULES: &[Rule] = &[Rule::new(
    sqlstate::UNDEFINED_TABLE,
    &["table \"", "does not exist"],
    ErrorKind::TableNotFound,
)];

const CLEAR_RULES: &[Rule] = &[Rule::new(
    sqlstate::UNDEFINED_TABLE,
    &["relation \"", "does not exist"],
    ErrorKind::TableNotFound,
)];

const SELECT_RULES: &[Rule] = &[
    Rule::new(
        sqlstate::UNDEFINED_TABLE,
        &["relation \"", "does not exist"],
        ErrorKind::TableNotFound,
    ),
    Rule::new(
        sqlstate::SYNTAX_ERROR,
        &["syntax error"],
        ErrorKind::InvalidIdentifier,
    ),
];

impl Operation<'_> {
    fn rules(&self) -> &'static [Rule] {
        match self {
            Operation::Connect { .. } => CONNECT_RULES,
            Operation::ListTables => &[],
            Operation::CreateTable { .. } => CREATE_RULES,
            Operation::DropTable { .. } => DROP_RULES,
            Operation::ClearTable { .. } => CLEAR_RULES,
            Operation::SelectAll { .. } => SELECT_RULES,
        }
    }

    fn table(&self) -> &str {
        match self {
            Operation::CreateTable { table }
            | Operation::DropTable { table }
            | Operation::ClearTable { table }
            | Operation::SelectAll { table } => *table,
            Operation::Connect { database } => *database,
            Operation::ListTables => "",
        }
    }
}

/// Maps a backend failure of `operation` onto the error taxonomy.
pub fn translate(operation: Operation<'_>, error: BackendError) -> DbError {
    let kind = operation
        .rules()
        .iter()
        .find(|rule| rule.matches(&error))
        .map(|rule| rule.kind);

    debug!(
        ?operation,
        code = error.code().unwrap_or("-"),
        native = %error,
        ?kind,
        "Translating backend error"
    );

    let name = operation.table().to_string();
    match kind {
        Some(ErrorKind::InvalidCredentials) => DbError::InvalidCredentials,
        Some(ErrorKind::DatabaseNotFound) => DbError::DatabaseNotFound(name),
        Some(ErrorKind::TableAlreadyExists) => DbError::TableAlreadyExists(name),
        Some(ErrorKind::TableNotFound) => DbError::TableNotFound(name),
        Some(ErrorKind::InvalidColumnType) => DbError::InvalidColumnType,
        Some(ErrorKind::InvalidColumnName) => DbError::InvalidColumnName,
        Some(ErrorKind::InvalidIdentifier) => DbError::InvalidIdentifier,
        _ => DbError::Backend(error),
    }
}
