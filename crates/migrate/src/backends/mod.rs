//! Database Backend Abstractions
//!
//! Each engine family gets one sqlx-backed implementation of the core
//! connection traits. Wire-compatible engines (Redshift, TiDB) reuse the
//! family they speak.

pub mod core;
pub mod mysql;
pub mod postgres;

pub use self::core::*;
pub use self::mysql::{MySqlConnection, MySqlDsn};
pub use self::postgres::PostgresConnection;

use crate::error::MigrateResult;

/// Connection family used to reach a database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Postgres,
    MySql,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Postgres => write!(f, "postgres"),
            BackendKind::MySql => write!(f, "mysql"),
        }
    }
}

/// Open one exclusive connection for `kind`
pub async fn connect(kind: BackendKind, dbstring: &str) -> MigrateResult<Box<dyn DatabaseConnection>> {
    tracing::debug!("connecting to {} database", kind);
    match kind {
        BackendKind::Postgres => Ok(Box::new(PostgresConnection::connect(dbstring).await?)),
        BackendKind::MySql => Ok(Box::new(MySqlConnection::connect(dbstring).await?)),
    }
}
