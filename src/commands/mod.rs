//! Command Module
//!
//! Turns raw input lines into database manager calls and formats the replies.
//!
//! ## Architecture
//!
//! ```text
//! Input line ("drop|orders")
//!       │
//!       ▼
//! ┌─────────────────┐
//! │   Dispatcher    │  first command whose keyword matches field 0
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │    Command      │  arity check -> manager call -> Response
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ DatabaseManager │  (manager module)
//! └─────────────────┘
//! ```
//!
//! Every reply ends in the prompt text, on success and on failure.

pub mod dispatcher;
pub mod handler;
pub mod table;

pub use dispatcher::Dispatcher;
pub use handler::{split_fields, split_list, Command, Response};
pub use table::TableFormatter;

/// Separates the fields of an input line.
pub const FIELD_SEPARATOR: char = '|';

/// Separates the items of a list field (column names, column types).
pub const LIST_SEPARATOR: char = ',';

pub const PROMPT: &str = "Enter next command or help:";

pub const GREETING: &str = "Hello, user! Please enter a command or help:";

pub const UNKNOWN_COMMAND: &str = "Unknown command. Enter next command or help:";

pub const INCORRECT_FORMAT: &str = "Incorrect command format. Enter next command or help:";

pub const GOODBYE: &str = "Connection closed. Goodbye!";
