//! Statement Parser for the In-Memory Backend
//!
//! The memory backend only has to understand the handful of fixed statement
//! templates the database manager issues:
//!
//! - `CREATE TABLE <name> (<col> <type>, ...)`
//! - `DROP TABLE <name>`
//! - `DELETE FROM <name>`
//! - `SELECT * FROM <name>`
//! - `SELECT table_name FROM information_schema.tables ...`
//!
//! Anything else is rejected with a PostgreSQL-style syntax error so the
//! error translator sees the same text it would see from a real server.
//!
//! Unquoted identifiers are folded to lower case, quoted identifiers keep
//! their case, and an optional `public.` schema qualifier is accepted.

use crate::backend::{sqlstate, BackendError};

const LIST_TABLES_PREFIX: &str = "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES";

/// Words that cannot be used as bare identifiers.
const RESERVED_WORDS: &[&str] = &[
    "all", "and", "by", "check", "create", "default", "delete", "drop", "from", "group", "not",
    "null", "or", "order", "primary", "select", "table", "user", "where",
];

/// A column definition from a `CREATE TABLE` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    /// Lower-cased type text, including any modifier such as `(20)`.
    pub data_type: String,
}

/// One parsed statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    ListTables,
    CreateTable { name: String, columns: Vec<ColumnDef> },
    DropTable { name: String },
    DeleteFrom { name: String },
    SelectAll { name: String },
}

impl Statement {
    /// Parses one statement. A single trailing `;` is allowed.
    pub fn parse(sql: &str) -> Result<Self, BackendError> {
        let sql = sql.trim();
        let sql = sql.strip_suffix(';').unwrap_or(sql).trim();

        if sql.is_empty() {
            return Err(syntax_error_at_end());
        }

        let normalized = sql.split_whitespace().collect::<Vec<_>>().join(" ");
        if normalized.to_ascii_uppercase().starts_with(LIST_TABLES_PREFIX) {
            return Ok(Statement::ListTables);
        }

        if let Some(rest) = strip_keywords(sql, &["CREATE", "TABLE"]) {
            return parse_create(rest);
        }
        if let Some(rest) = strip_keywords(sql, &["DROP", "TABLE"]) {
            return Ok(Statement::DropTable {
                name: parse_single_name(rest)?,
            });
        }
        if let Some(rest) = strip_keywords(sql, &["DELETE", "FROM"]) {
            return Ok(Statement::DeleteFrom {
                name: parse_single_name(rest)?,
            });
        }
        if let Some(rest) = strip_keywords(sql, &["SELECT", "*", "FROM"]) {
            return Ok(Statement::SelectAll {
                name: parse_single_name(rest)?,
            });
        }

        let first = sql.split_whitespace().next().unwrap_or(sql);
        Err(syntax_error_near(first))
    }
}

/// Matches the leading words case-insensitively and returns the remainder.
fn strip_keywords<'a>(mut input: &'a str, keywords: &[&str]) -> Option<&'a str> {
    for keyword in keywords {
        input = input.trim_start();
        let end = input.find(char::is_whitespace).unwrap_or(input.len());
        if !input[..end].eq_ignore_ascii_case(keyword) {
            return None;
        }
        input = &input[end..];
    }
    Some(input.trim())
}

fn parse_single_name(rest: &str) -> Result<String, BackendError> {
    let mut tokens = rest.split_whitespace();
    let name = tokens.next().ok_or_else(syntax_error_at_end)?;
    if let Some(extra) = tokens.next() {
        return Err(syntax_error_near(extra));
    }
    parse_identifier(name)
}

fn parse_create(rest: &str) -> Result<Statement, BackendError> {
    let open = rest.find('(').ok_or_else(|| {
        if rest.is_empty() {
            syntax_error_at_end()
        } else {
            syntax_error_at_end_of(rest)
        }
    })?;

    let name = rest[..open].trim();
    if name.is_empty() {
        return Err(syntax_error_near("("));
    }
    let name = parse_identifier(name)?;

    let body = rest[open + 1..].trim_end();
    let body = body.strip_suffix(')').ok_or_else(syntax_error_at_end)?;

    let columns = if body.trim().is_empty() {
        Vec::new()
    } else {
        let parts = split_top_level(body);
        let last = parts.len() - 1;
        parts
            .into_iter()
            .enumerate()
            .map(|(i, part)| {
                let delimiter = if i == last { ")" } else { "," };
                parse_column(part, delimiter)
            })
            .collect::<Result<Vec<_>, _>>()?
    };

    Ok(Statement::CreateTable { name, columns })
}

fn parse_column(part: &str, delimiter: &str) -> Result<ColumnDef, BackendError> {
    let part = part.trim();
    let mut tokens = part.split_whitespace();

    let name = tokens.next().ok_or_else(|| syntax_error_near(delimiter))?;
    let data_type = tokens.collect::<Vec<_>>().join(" ");
    if data_type.is_empty() {
        return Err(syntax_error_near(delimiter));
    }

    Ok(ColumnDef {
        name: parse_identifier(name)?,
        data_type: data_type.to_ascii_lowercase(),
    })
}

/// Splits on commas that are not nested inside parentheses, so
/// `numeric(10,2)` stays one column definition.
fn split_top_level(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in body.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
}

/// Validates one identifier and returns its catalog form.
pub fn parse_identifier(token: &str) -> Result<String, BackendError> {
    let token = token.trim();
    let bare = match token.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("public.") => &token[7..],
        _ => token,
    };

    if let Some(quoted) = bare.strip_prefix('"') {
        return match quoted.strip_suffix('"') {
            Some(inner) if !inner.is_empty() && !inner.contains('"') => Ok(inner.to_string()),
            _ => Err(syntax_error_near(bare)),
        };
    }

    let mut chars = bare.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');

    if !valid_start || !valid_rest {
        return Err(syntax_error_near(bare));
    }

    let folded = bare.to_ascii_lowercase();
    if RESERVED_WORDS.contains(&folded.as_str()) {
        return Err(syntax_error_near(bare));
    }

    Ok(folded)
}

fn syntax_error_near(token: &str) -> BackendError {
    BackendError::with_code(
        sqlstate::SYNTAX_ERROR,
        format!("syntax error at or near \"{}\"", token),
    )
}

fn syntax_error_at_end() -> BackendError {
    BackendError::with_code(sqlstate::SYNTAX_ERROR, "syntax error at end of input")
}

fn syntax_error_at_end_of(rest: &str) -> BackendError {
    match rest.split_whitespace().nth(1) {
        Some(extra) => syntax_error_near(extra),
        None => syntax_error_at_end(),
    }
}
