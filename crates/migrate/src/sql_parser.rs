//! Statement splitter for annotated SQL migration scripts
//!
//! A script is split line by line. Plain lines accumulate into a buffer that
//! is flushed as one statement when a line ends with `;`. Lines starting with
//! `-- +goose ` are directives and never reach the buffer:
//!
//! ```sql
//! -- +goose Up
//! CREATE TABLE post (id int, title text);
//!
//! -- +goose StatementBegin
//! CREATE FUNCTION touch() RETURNS trigger AS $$
//! BEGIN
//!   NEW.updated_at = now();
//!   RETURN NEW;
//! END;
//! $$ LANGUAGE plpgsql;
//! -- +goose StatementEnd
//!
//! -- +goose Down
//! DROP FUNCTION touch();
//! DROP TABLE post;
//! ```
//!
//! Semicolon detection looks at the last whitespace-delimited token before
//! any `--` comment. Semicolons inside string literals are not recognised as
//! such; wrap those statements in `StatementBegin`/`StatementEnd`.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::error::{MigrateError, MigrateResult};
use crate::migrations::Direction;

/// Prefix identifying a directive line
pub const SQL_CMD_PREFIX: &str = "-- +goose ";

/// Longest accepted script line, in bytes
pub const MAX_LINE_BYTES: usize = 4 * 1024 * 1024;

/// Placeholder used in [`MigrateError::NoDirectives`] when the script has no path
const ANONYMOUS_SOURCE: &str = "<input>";

/// In-script directive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Up,
    Down,
    StatementBegin,
    StatementEnd,
    NoTransaction,
}

impl Directive {
    fn from_command(cmd: &str) -> Option<Self> {
        match cmd {
            "Up" => Some(Directive::Up),
            "Down" => Some(Directive::Down),
            "StatementBegin" => Some(Directive::StatementBegin),
            "StatementEnd" => Some(Directive::StatementEnd),
            "NO TRANSACTION" => Some(Directive::NoTransaction),
            _ => None,
        }
    }
}

enum Line<'a> {
    Directive(Directive),
    UnknownDirective(&'a str),
    Sql,
}

impl<'a> Line<'a> {
    fn classify(line: &'a str) -> Self {
        match line.strip_prefix(SQL_CMD_PREFIX) {
            Some(rest) => {
                let cmd = rest.trim();
                Directive::from_command(cmd)
                    .map(Line::Directive)
                    .unwrap_or(Line::UnknownDirective(cmd))
            }
            None => Line::Sql,
        }
    }
}

/// Non-fatal problems found while splitting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseWarning {
    /// `StatementBegin` without a matching `StatementEnd`
    UnterminatedBlock,
    /// Non-whitespace text left after the last complete statement
    UnfinishedStatement(String),
    /// `-- +goose` line whose command is not recognised; kept as a comment
    UnknownDirective { line: usize, command: String },
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseWarning::UnterminatedBlock => write!(
                f,
                "saw '-- +goose StatementBegin' with no matching '-- +goose StatementEnd'"
            ),
            ParseWarning::UnfinishedStatement(sql) => {
                write!(f, "unexpected unfinished SQL query: {}. Missing a semicolon?", sql)
            }
            ParseWarning::UnknownDirective { line, command } => {
                write!(f, "line {}: unknown directive '{}' treated as a comment", line, command)
            }
        }
    }
}

/// Output of [`split_sql_statements`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedScript {
    /// Statements in the order they complete in the source
    pub statements: Vec<String>,
    /// False when the script contains `-- +goose NO TRANSACTION`
    pub use_transaction: bool,
    pub warnings: Vec<ParseWarning>,
    pub up_sections: usize,
    pub down_sections: usize,
}

#[derive(Debug)]
struct SplitState {
    direction: Direction,
    direction_is_active: bool,
    ignore_semicolons: bool,
    statement_ended: bool,
    up_sections: usize,
    down_sections: usize,
    use_transaction: bool,
    buffer: String,
    statements: Vec<String>,
    warnings: Vec<ParseWarning>,
}

impl SplitState {
    fn new(direction: Direction) -> Self {
        Self {
            direction,
            direction_is_active: false,
            ignore_semicolons: false,
            statement_ended: false,
            up_sections: 0,
            down_sections: 0,
            use_transaction: true,
            buffer: String::new(),
            statements: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn apply(&mut self, directive: Directive) {
        match directive {
            Directive::Up => {
                self.direction_is_active = self.direction == Direction::Up;
                self.up_sections += 1;
            }
            Directive::Down => {
                self.direction_is_active = self.direction == Direction::Down;
                self.down_sections += 1;
            }
            Directive::StatementBegin => {
                if self.direction_is_active {
                    self.ignore_semicolons = true;
                }
            }
            Directive::StatementEnd => {
                if self.direction_is_active {
                    self.statement_ended = self.ignore_semicolons;
                    self.ignore_semicolons = false;
                }
            }
            Directive::NoTransaction => self.use_transaction = false,
        }
    }

    fn push_line(&mut self, line: &str) {
        if !self.direction_is_active {
            return;
        }
        self.buffer.push_str(line);
        self.buffer.push('\n');

        if !self.ignore_semicolons && ends_with_semicolon(line) {
            self.flush();
        }
    }

    fn process(&mut self, line: &str, line_no: usize) {
        match Line::classify(line) {
            Line::Directive(directive) => {
                self.apply(directive);
                if self.statement_ended {
                    self.statement_ended = false;
                    self.flush();
                }
            }
            Line::UnknownDirective(command) => {
                self.warnings.push(ParseWarning::UnknownDirective {
                    line: line_no,
                    command: command.to_string(),
                });
                self.push_line(line);
            }
            Line::Sql => self.push_line(line),
        }
    }

    fn flush(&mut self) {
        let statement = std::mem::take(&mut self.buffer);
        if !statement.trim().is_empty() {
            self.statements.push(statement);
        }
    }

    fn finish(mut self) -> MigrateResult<ParsedScript> {
        if self.ignore_semicolons {
            self.warnings.push(ParseWarning::UnterminatedBlock);
        }

        let remaining = self.buffer.trim();
        if !remaining.is_empty() {
            self.warnings
                .push(ParseWarning::UnfinishedStatement(remaining.to_string()));
        }

        if self.up_sections == 0 && self.down_sections == 0 {
            return Err(MigrateError::NoDirectives {
                path: ANONYMOUS_SOURCE.to_string(),
            });
        }

        for warning in &self.warnings {
            tracing::warn!("{}", warning);
        }

        Ok(ParsedScript {
            statements: self.statements,
            use_transaction: self.use_transaction,
            warnings: self.warnings,
            up_sections: self.up_sections,
            down_sections: self.down_sections,
        })
    }
}

/// Whether `line` terminates a statement, ignoring a trailing `--` comment
pub fn ends_with_semicolon(line: &str) -> bool {
    line.split_whitespace()
        .take_while(|word| !word.starts_with("--"))
        .last()
        .map_or(false, |word| word.ends_with(';'))
}

/// Split a script into the statements of one direction.
///
/// Fails when a line exceeds [`MAX_LINE_BYTES`], is not UTF-8, or when the
/// script has no `Up`/`Down` directive at all.
pub fn split_sql_statements<R: BufRead>(
    mut reader: R,
    direction: Direction,
) -> MigrateResult<ParsedScript> {
    let mut state = SplitState::new(direction);
    let mut raw = Vec::new();
    let mut line_no = 0;

    loop {
        raw.clear();
        let read = (&mut reader)
            // room for a full-length line plus its "\r\n"
            .take(MAX_LINE_BYTES as u64 + 2)
            .read_until(b'\n', &mut raw)?;
        if read == 0 {
            break;
        }
        line_no += 1;

        if raw.last() == Some(&b'\n') {
            raw.pop();
            if raw.last() == Some(&b'\r') {
                raw.pop();
            }
        }
        if raw.len() > MAX_LINE_BYTES {
            return Err(MigrateError::LineTooLong {
                line: line_no,
                limit: MAX_LINE_BYTES,
            });
        }

        let line = std::str::from_utf8(&raw)
            .map_err(|_| MigrateError::InvalidUtf8 { line: line_no })?;
        state.process(line, line_no);
    }

    state.finish()
}

/// Open `path` and split it for `direction`
pub fn parse_script_file(path: &Path, direction: Direction) -> MigrateResult<ParsedScript> {
    let file = File::open(path).map_err(|source| MigrateError::ReadScript {
        path: path.to_path_buf(),
        source,
    })?;

    split_sql_statements(BufReader::new(file), direction).map_err(|err| match err {
        MigrateError::NoDirectives { .. } => MigrateError::NoDirectives {
            path: path.display().to_string(),
        },
        MigrateError::Io(source) => MigrateError::ReadScript {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })
}
