//! PostgreSQL Backend Implementation
//!
//! Accepts both URL (`postgres://user@host/db`) and libpq key/value
//! (`host=localhost dbname=app sslmode=disable`) connection strings.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::postgres::{PgArguments, PgConnectOptions, PgRow, PgSslMode, Postgres};
use sqlx::query::Query;
use sqlx::{Column, ConnectOptions, Connection, Executor, PgConnection, Row, TypeInfo, ValueRef};
use std::str::FromStr;

use super::core::*;
use crate::error::{MigrateError, MigrateResult};

/// Build sqlx connect options from a URL or key/value connection string
pub fn connect_options(dbstring: &str) -> MigrateResult<PgConnectOptions> {
    if dbstring.starts_with("postgres://") || dbstring.starts_with("postgresql://") {
        return Ok(PgConnectOptions::from_str(dbstring)?);
    }

    let mut options = PgConnectOptions::new();
    let mut recognised = false;
    for pair in dbstring.split_whitespace() {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| MigrateError::UnsupportedDbString(dbstring.to_string()))?;
        let value = value.trim_matches('\'');
        recognised = true;

        options = match key {
            "host" => options.host(value),
            "port" => options.port(
                value
                    .parse()
                    .map_err(|_| MigrateError::UnsupportedDbString(dbstring.to_string()))?,
            ),
            "user" => options.username(value),
            "password" => options.password(value),
            "dbname" => options.database(value),
            "sslmode" => options.ssl_mode(PgSslMode::from_str(value)?),
            "application_name" => options.application_name(value),
            other => {
                tracing::debug!("ignoring connection parameter '{}'", other);
                options
            }
        };
    }

    if !recognised {
        return Err(MigrateError::UnsupportedDbString(dbstring.to_string()));
    }
    Ok(options)
}

/// PostgreSQL connection implementation
pub struct PostgresConnection {
    conn: PgConnection,
}

impl PostgresConnection {
    pub fn new(conn: PgConnection) -> Self {
        Self { conn }
    }

    /// Open a single connection
    pub async fn connect(dbstring: &str) -> MigrateResult<Self> {
        let conn = connect_options(dbstring)?.connect().await?;
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl DatabaseConnection for PostgresConnection {
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<u64> {
        let result = match Statement::new(sql, params) {
            Statement::Simple(sql) => Executor::execute(&mut self.conn, sql).await?,
            Statement::Prepared(sql, params) => {
                bind_all(sqlx::query(sql), params).execute(&mut self.conn).await?
            }
        };
        Ok(result.rows_affected())
    }

    async fn fetch_all(&mut self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<Vec<DatabaseRow>> {
        let rows = bind_all(sqlx::query(sql), params)
            .fetch_all(&mut self.conn)
            .await?;
        rows.iter().map(decode_row).collect()
    }

    async fn begin_transaction<'c>(&'c mut self) -> MigrateResult<Box<dyn DatabaseTransaction + 'c>> {
        let tx = self.conn.begin().await?;
        Ok(Box::new(PostgresTransaction { tx }))
    }

    async fn close(self: Box<Self>) -> MigrateResult<()> {
        self.conn.close().await?;
        Ok(())
    }
}

/// PostgreSQL transaction implementation
pub struct PostgresTransaction<'c> {
    tx: sqlx::Transaction<'c, Postgres>,
}

#[async_trait]
impl<'c> DatabaseTransaction for PostgresTransaction<'c> {
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<u64> {
        let result = match Statement::new(sql, params) {
            Statement::Simple(sql) => Executor::execute(&mut *self.tx, sql).await?,
            Statement::Prepared(sql, params) => {
                bind_all(sqlx::query(sql), params).execute(&mut *self.tx).await?
            }
        };
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> MigrateResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> MigrateResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &[DatabaseValue],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            DatabaseValue::Null => query.bind(Option::<String>::None),
            DatabaseValue::Bool(b) => query.bind(*b),
            DatabaseValue::Int64(i) => query.bind(*i),
            DatabaseValue::Text(s) => query.bind(s.clone()),
            DatabaseValue::Timestamp(ts) => query.bind(*ts),
        };
    }
    query
}

/// Convert a PostgreSQL row to a DatabaseRow
fn decode_row(row: &PgRow) -> MigrateResult<DatabaseRow> {
    let mut decoded = DatabaseRow::new();

    for (index, column) in row.columns().iter().enumerate() {
        if row.try_get_raw(index)?.is_null() {
            decoded.push(column.name(), DatabaseValue::Null);
            continue;
        }

        let value = match column.type_info().name() {
            "BOOL" => DatabaseValue::Bool(row.try_get(index)?),
            "INT2" => DatabaseValue::Int64(row.try_get::<i16, _>(index)?.into()),
            "INT4" => DatabaseValue::Int64(row.try_get::<i32, _>(index)?.into()),
            "INT8" => DatabaseValue::Int64(row.try_get(index)?),
            "TIMESTAMP" => DatabaseValue::Timestamp(row.try_get::<NaiveDateTime, _>(index)?),
            "TIMESTAMPTZ" => {
                DatabaseValue::Timestamp(row.try_get::<DateTime<Utc>, _>(index)?.naive_utc())
            }
            _ => DatabaseValue::Text(row.try_get(index)?),
        };
        decoded.push(column.name(), value);
    }

    Ok(decoded)
}
