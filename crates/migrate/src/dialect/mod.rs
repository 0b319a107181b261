//! SQL dialects
//!
//! A dialect owns the handful of engine-specific SQL strings the engine
//! needs (bookkeeping table DDL, version insert with the right placeholder
//! style, status queries, database create/drop) and knows how to pull the
//! database name out of a connection string.
//!
//! Dialects are selected once by name through [`dialect_by_name`] and then
//! passed explicitly to the executor and runner.

pub mod mysql;
pub mod postgres;

pub use self::mysql::{MySqlDialect, TiDbDialect};
pub use self::postgres::{PostgresDialect, RedshiftDialect};

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

use crate::backends::{self, BackendKind, DatabaseConnection};
use crate::error::{MigrateError, MigrateResult};

/// Bookkeeping table name
pub const VERSION_TABLE: &str = "goose_db_version";

const VERSION_ROWS_SQL: &str =
    "SELECT version_id, is_applied FROM goose_db_version ORDER BY id DESC";

/// Engine-specific SQL and connection-string handling
#[async_trait]
pub trait SqlDialect: Send + Sync + fmt::Debug {
    /// Canonical dialect name
    fn name(&self) -> &'static str;

    /// Connection family spoken by this engine
    fn backend(&self) -> BackendKind;

    /// DDL creating the bookkeeping table
    fn create_version_table_sql(&self) -> &'static str;

    /// Insert of one version row; parameters are `(version_id, is_applied)`
    fn insert_version_sql(&self) -> &'static str;

    /// All version rows, most recent first; columns `version_id, is_applied`
    fn version_rows_sql(&self) -> &'static str {
        VERSION_ROWS_SQL
    }

    /// Latest row for one version; parameter is the version, columns
    /// `tstamp, is_applied`
    fn migration_status_sql(&self) -> &'static str;

    /// Name of the database a connection string points at
    fn db_name(&self, dbstring: &str) -> MigrateResult<String>;

    /// Connection string reaching the server rather than the database
    fn server_dbstring(&self, dbstring: &str) -> MigrateResult<String>;

    fn create_database_sql(&self, name: &str, soft: bool) -> String;

    fn drop_database_sql(&self, name: &str, soft: bool) -> String {
        if soft {
            format!("DROP DATABASE IF EXISTS {}", name)
        } else {
            format!("DROP DATABASE {}", name)
        }
    }

    /// Existence check used by a soft create when the engine has no
    /// `CREATE DATABASE IF NOT EXISTS`; parameter is the database name
    fn database_exists_sql(&self) -> Option<&'static str> {
        None
    }

    /// Open a connection to the database itself
    async fn connect(&self, dbstring: &str) -> MigrateResult<Box<dyn DatabaseConnection>> {
        backends::connect(self.backend(), dbstring).await
    }

    /// Open a connection to the server, ignoring the database in `dbstring`
    async fn connect_to_server(&self, dbstring: &str) -> MigrateResult<Box<dyn DatabaseConnection>> {
        let server = self.server_dbstring(dbstring)?;
        backends::connect(self.backend(), &server).await
    }
}

/// Supported dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialectKind {
    Postgres,
    MySql,
    Redshift,
    TiDb,
}

/// Accepted names, including driver aliases
const DIALECT_NAMES: &[(&str, DialectKind)] = &[
    ("postgres", DialectKind::Postgres),
    ("postgresql", DialectKind::Postgres),
    ("pgx", DialectKind::Postgres),
    ("mysql", DialectKind::MySql),
    ("mymysql", DialectKind::MySql),
    ("redshift", DialectKind::Redshift),
    ("tidb", DialectKind::TiDb),
];

impl DialectKind {
    /// The dialect implementation for this kind
    pub fn dialect(self) -> &'static dyn SqlDialect {
        match self {
            DialectKind::Postgres => &PostgresDialect,
            DialectKind::MySql => &MySqlDialect,
            DialectKind::Redshift => &RedshiftDialect,
            DialectKind::TiDb => &TiDbDialect,
        }
    }

    /// Every accepted dialect name
    pub fn names() -> impl Iterator<Item = &'static str> {
        DIALECT_NAMES.iter().map(|(name, _)| *name)
    }
}

impl FromStr for DialectKind {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DIALECT_NAMES
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| MigrateError::UnknownDialect(s.to_string()))
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}

/// Select a dialect by driver or dialect name
pub fn dialect_by_name(name: &str) -> MigrateResult<&'static dyn SqlDialect> {
    name.parse::<DialectKind>().map(DialectKind::dialect)
}
