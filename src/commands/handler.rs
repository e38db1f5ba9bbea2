//! Command Handlers
//!
//! Every supported operation is one variant of [`Command`]. A variant knows
//! its keyword and arity, recognizes its own input lines, pulls its
//! parameters out of the line, calls the database manager and formats the
//! reply.
//!
//! ## Supported Commands
//!
//! - `connect|database|user|password` - Connect to a database
//! - `tables` - List tables
//! - `create|table|col1,col2|type1,type2` - Create a table
//! - `drop|table` - Drop a table
//! - `clear|table` - Delete every row of a table
//! - `find|table` - Show the contents of a table
//! - `columns|table` - Show the column names of a table
//! - `help` - List commands
//! - `exit` - Close the connection and quit
//!
//! ## Line Format
//!
//! ```text
//! create | orders | id,item | int,text
//!   │        │        │         │
//!   │        │        │         └── field 3: column types (',' separated)
//!   │        │        └──────────── field 2: column names (',' separated)
//!   │        └───────────────────── field 1: table name
//!   └────────────────────────────── field 0: keyword
//! ```
//!
//! A line whose field count differs from the command's arity is answered
//! with [`INCORRECT_FORMAT`] and never reaches the database manager.

use crate::backend::Backend;
use crate::commands::table::TableFormatter;
use crate::commands::{
    FIELD_SEPARATOR, GOODBYE, INCORRECT_FORMAT, LIST_SEPARATOR, PROMPT,
};
use crate::manager::{DatabaseManager, DbError};
use std::fmt;
use tracing::debug;

/// The reply to one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    lines: Vec<String>,
    exit: bool,
}

impl Response {
    /// A reply consisting of exactly one line.
    pub fn line(text: impl Into<String>) -> Self {
        Self {
            lines: vec![text.into()],
            exit: false,
        }
    }

    /// A one-line confirmation: `status` followed by the prompt.
    pub fn done(status: impl fmt::Display) -> Self {
        Self::line(format!("{} {}", status, PROMPT))
    }

    /// The given lines followed by a separate prompt line.
    pub fn with_prompt(mut lines: Vec<String>) -> Self {
        lines.push(PROMPT.to_string());
        Self { lines, exit: false }
    }

    /// The error's message followed by the prompt line.
    pub fn error(err: &DbError) -> Self {
        Self::with_prompt(vec![err.to_string()])
    }

    /// A final reply after which the session ends.
    pub fn exit(text: impl Into<String>) -> Self {
        Self {
            lines: vec![text.into()],
            exit: true,
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_exit(&self) -> bool {
        self.exit
    }

    /// The reply as output text, every line terminated by `\n`.
    pub fn render(&self) -> String {
        let mut output = String::new();
        for line in &self.lines {
            output.push_str(line);
            output.push('\n');
        }
        output
    }
}

/// The closed set of command handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Connect,
    Tables,
    Create,
    Drop,
    Clear,
    Find,
    Columns,
    Help,
    Exit,
}

impl Command {
    /// Every command, in dispatch order.
    pub const ALL: [Command; 9] = [
        Command::Connect,
        Command::Tables,
        Command::Create,
        Command::Drop,
        Command::Clear,
        Command::Find,
        Command::Columns,
        Command::Help,
        Command::Exit,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            Command::Connect => "connect",
            Command::Tables => "tables",
            Command::Create => "create",
            Command::Drop => "drop",
            Command::Clear => "clear",
            Command::Find => "find",
            Command::Columns => "columns",
            Command::Help => "help",
            Command::Exit => "exit",
        }
    }

    /// Exact number of fields (keyword included) the command takes.
    pub fn arity(self) -> usize {
        match self {
            Command::Connect | Command::Create => 4,
            Command::Drop | Command::Clear | Command::Find | Command::Columns => 2,
            Command::Tables | Command::Help | Command::Exit => 1,
        }
    }

    pub fn usage(self) -> &'static str {
        match self {
            Command::Connect => "connect|database|username|password",
            Command::Tables => "tables",
            Command::Create => "create|table|column1,column2|type1,type2",
            Command::Drop => "drop|table",
            Command::Clear => "clear|table",
            Command::Find => "find|table",
            Command::Columns => "columns|table",
            Command::Help => "help",
            Command::Exit => "exit",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Command::Connect => "connect to a database",
            Command::Tables => "list the tables of the current database",
            Command::Create => "create a table with the given columns",
            Command::Drop => "delete a table",
            Command::Clear => "delete every row of a table",
            Command::Find => "show the contents of a table",
            Command::Columns => "show the column names of a table",
            Command::Help => "show this list",
            Command::Exit => "close the connection and quit",
        }
    }

    /// True when the line's first field is this command's keyword.
    pub fn recognize(self, line: &str) -> bool {
        keyword_of(line) == self.keyword()
    }

    /// Runs the command for `line`. The line must already be recognized.
    pub async fn execute<B: Backend>(
        self,
        line: &str,
        manager: &mut DatabaseManager<B>,
    ) -> Response {
        let Some(fields) = split_fields(line, self.arity()) else {
            debug!(command = self.keyword(), line, "Wrong number of fields");
            return Response::line(INCORRECT_FORMAT);
        };

        debug!(command = self.keyword(), "Executing command");
        match self {
            Command::Connect => {
                let password = raw_field(line, 3).unwrap_or(fields[3]);
                connect(manager, fields[1], fields[2], password).await
            }
            Command::Tables => tables(manager).await,
            Command::Create => create(manager, fields[1], fields[2], fields[3]).await,
            Command::Drop => drop_table(manager, fields[1]).await,
            Command::Clear => clear(manager, fields[1]).await,
            Command::Find => find(manager, fields[1]).await,
            Command::Columns => columns(manager, fields[1]).await,
            Command::Help => help(),
            Command::Exit => exit(manager).await,
        }
    }
}

/// Splits a line into trimmed fields, or `None` when the count is not `arity`.
pub fn split_fields(line: &str, arity: usize) -> Option<Vec<&str>> {
    let fields: Vec<&str> = line.trim().split(FIELD_SEPARATOR).map(str::trim).collect();
    (fields.len() == arity).then_some(fields)
}

/// The field at `index` exactly as typed. Passwords may carry surrounding
/// spaces, so `connect` reads its last field this way.
pub fn raw_field(line: &str, index: usize) -> Option<&str> {
    line.split(FIELD_SEPARATOR).nth(index)
}

/// Splits a list field; an empty field is an empty list.
pub fn split_list(field: &str) -> Vec<String> {
    if field.is_empty() {
        return Vec::new();
    }
    field
        .split(LIST_SEPARATOR)
        .map(|item| item.trim().to_string())
        .collect()
}

fn keyword_of(line: &str) -> &str {
    line.trim()
        .split(FIELD_SEPARATOR)
        .next()
        .unwrap_or_default()
        .trim()
}

async fn connect<B: Backend>(
    manager: &mut DatabaseManager<B>,
    database: &str,
    user: &str,
    password: &str,
) -> Response {
    match manager.connect(database, user, password).await {
        Ok(()) => Response::done(format!("Connected to database {}.", database)),
        Err(e) => Response::error(&e),
    }
}

async fn tables<B: Backend>(manager: &mut DatabaseManager<B>) -> Response {
    match manager.list_tables().await {
        Ok(names) if names.is_empty() => Response::with_prompt(vec![
            "There are no tables in the database.".to_string(),
        ]),
        Ok(names) => Response::with_prompt(vec![format!("Tables: {}", names.join(", "))]),
        Err(e) => Response::error(&e),
    }
}

async fn create<B: Backend>(
    manager: &mut DatabaseManager<B>,
    table: &str,
    names: &str,
    types: &str,
) -> Response {
    let names = split_list(names);
    let types = split_list(types);

    match manager.create_table(table, &names, &types).await {
        Ok(()) => Response::done(format!("Table {} was created.", table)),
        Err(e) => Response::error(&e),
    }
}

async fn drop_table<B: Backend>(manager: &mut DatabaseManager<B>, table: &str) -> Response {
    match manager.drop_table(table).await {
        Ok(()) => Response::done(format!("Table {} was dropped.", table)),
        Err(e) => Response::error(&e),
    }
}

async fn clear<B: Backend>(manager: &mut DatabaseManager<B>, table: &str) -> Response {
    match manager.clear_table(table).await {
        Ok(()) => Response::done(format!("Table {} was cleared.", table)),
        Err(e) => Response::error(&e),
    }
}

async fn find<B: Backend>(manager: &mut DatabaseManager<B>, table: &str) -> Response {
    let data = match manager.fetch_table(table).await {
        Ok(data) => data,
        Err(e) => return Response::error(&e),
    };

    let formatter = TableFormatter::new(data.columns, data.rows);
    let count = formatter.row_count();
    let mut lines: Vec<String> = formatter.render().lines().map(str::to_string).collect();
    lines.push(match count {
        1 => "1 row in set".to_string(),
        n => format!("{} rows in set", n),
    });

    Response::with_prompt(lines)
}

async fn columns<B: Backend>(manager: &mut DatabaseManager<B>, table: &str) -> Response {
    match manager.fetch_column_names(table).await {
        Ok(names) if names.is_empty() => {
            Response::with_prompt(vec![format!("Table {} has no columns.", table)])
        }
        Ok(names) => Response::with_prompt(vec![format!(
            "Columns of table {}: {}",
            table,
            names.join(", ")
        )]),
        Err(e) => Response::error(&e),
    }
}

fn help() -> Response {
    let mut lines = vec!["Existing commands:".to_string()];
    lines.extend(
        Command::ALL
            .iter()
            .map(|c| format!("  {:<42} {}", c.usage(), c.description())),
    );
    Response::with_prompt(lines)
}

async fn exit<B: Backend>(manager: &mut DatabaseManager<B>) -> Response {
    match manager.disconnect().await {
        Ok(()) => Response::exit(GOODBYE),
        Err(e) => Response::error(&e),
    }
}
