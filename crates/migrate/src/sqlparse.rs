//! Migration Script Parsing - Splits annotated SQL scripts into statements
//!
//! Scripts are divided into sections by directive comments:
//!
//! ```sql
//! -- +migrate Up
//! CREATE TABLE people (id int);
//!
//! -- +migrate Down notransaction
//! DROP TABLE people;
//! ```
//!
//! `-- +migrate StatementBegin` / `-- +migrate StatementEnd` wrap statements
//! that contain semicolons of their own, such as function bodies.

use crate::error::{MigrateError, MigrateResult};

const COMMAND_PREFIX: &str = "-- +migrate ";
const DIRECTIVE_PREFIX: &str = "-- +";
const NO_TRANSACTION: &str = "notransaction";

const NO_TERMINATOR: &str = "the last statement must be ended by a semicolon or '-- +migrate StatementEnd' marker";

/// Statements extracted from one migration script
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMigration {
    pub up_statements: Vec<String>,
    pub down_statements: Vec<String>,
    pub disable_transaction_up: bool,
    pub disable_transaction_down: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Up,
    Down,
}

/// Statement splitter for `-- +migrate` annotated scripts
#[derive(Debug, Clone, Default)]
pub struct SqlParser {
    line_separator: Option<String>,
}

impl SqlParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat a line consisting only of `separator` (e.g. `GO`) as a statement terminator
    pub fn with_line_separator<S: Into<String>>(mut self, separator: S) -> Self {
        let separator = separator.into();
        self.line_separator = if separator.is_empty() { None } else { Some(separator) };
        self
    }

    /// Parse a script. `name` is only used for error messages.
    pub fn parse(&self, name: &str, content: &str) -> MigrateResult<ParsedMigration> {
        let mut parsed = ParsedMigration::default();
        let mut buf = String::new();
        let mut section = Section::None;
        let mut in_block = false;
        let mut block_ended = false;

        for line in content.lines() {
            if line.starts_with("-- ") && !line.starts_with(DIRECTIVE_PREFIX) {
                continue;
            }

            if line.starts_with(COMMAND_PREFIX) {
                let mut fields = line[COMMAND_PREFIX.len()..].split_whitespace();
                let command = fields
                    .next()
                    .ok_or_else(|| MigrateError::parse(name, "incomplete migration command"))?;
                let no_transaction = fields.any(|option| option == NO_TRANSACTION);

                match command {
                    "Up" | "Down" => {
                        if !buf.trim().is_empty() {
                            return Err(MigrateError::parse(name, NO_TERMINATOR));
                        }
                        if command == "Up" {
                            section = Section::Up;
                            parsed.disable_transaction_up |= no_transaction;
                        } else {
                            section = Section::Down;
                            parsed.disable_transaction_down |= no_transaction;
                        }
                    }
                    "StatementBegin" => {
                        if section != Section::None {
                            in_block = true;
                        }
                    }
                    "StatementEnd" => {
                        if section != Section::None {
                            block_ended = in_block;
                            in_block = false;
                        }
                    }
                    _ => {}
                }
            }

            if section == Section::None {
                continue;
            }

            let is_separator = !in_block && self.line_separator.as_deref() == Some(line);

            if !is_separator && !line.starts_with(DIRECTIVE_PREFIX) {
                buf.push_str(line);
                buf.push('\n');
            }

            if (!in_block && (ends_with_semicolon(line) || is_separator)) || block_ended {
                block_ended = false;
                let statement = std::mem::take(&mut buf);
                match section {
                    Section::Up => parsed.up_statements.push(statement),
                    Section::Down => parsed.down_statements.push(statement),
                    Section::None => {}
                }
            }
        }

        if in_block {
            return Err(MigrateError::parse(
                name,
                "saw '-- +migrate StatementBegin' with no matching '-- +migrate StatementEnd'",
            ));
        }

        if section == Section::None {
            return Err(MigrateError::parse(
                name,
                "no Up/Down annotations found, so no statements were executed",
            ));
        }

        // A section may end with nothing but comments, e.g. "-- nothing to undo".
        let rest = buf.trim();
        if !rest.is_empty() && !rest.starts_with(DIRECTIVE_PREFIX) {
            return Err(MigrateError::parse(name, NO_TERMINATOR));
        }

        Ok(parsed)
    }
}

/// Parse a script with the default options
pub fn parse_migration(name: &str, content: &str) -> MigrateResult<ParsedMigration> {
    SqlParser::new().parse(name, content)
}

/// Whether the last word before any trailing `--` comment ends with `;`
fn ends_with_semicolon(line: &str) -> bool {
    line.split_whitespace()
        .take_while(|word| !word.starts_with("--"))
        .last()
        .map_or(false, |word| word.ends_with(';'))
}
