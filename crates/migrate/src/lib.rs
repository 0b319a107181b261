//! # goose-migrate: Versioned SQL migrations
//!
//! Splits annotated `.sql` scripts into statements, runs them inside a
//! transaction (unless the script opts out), and records every applied or
//! reverted version in the `goose_db_version` table. PostgreSQL, Redshift,
//! MySQL and TiDB are supported through sqlx.

pub mod admin;
pub mod backends;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod migrations;
pub mod sql_parser;

#[cfg(test)]
mod testing;

pub use admin::{create_database, drop_database};
pub use backends::{BackendKind, DatabaseConnection, DatabaseRow, DatabaseTransaction, DatabaseValue};
pub use dialect::{dialect_by_name, DialectKind, SqlDialect, VERSION_TABLE};
pub use error::{MigrateError, MigrateResult};
pub use executor::run_sql_migration;
pub use migrations::*;
pub use sql_parser::{parse_script_file, split_sql_statements, ParseWarning, ParsedScript};
