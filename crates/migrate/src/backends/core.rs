//! Core Database Backend Traits
//!
//! The executor and runner talk to the database only through these traits,
//! so one code path serves every engine family. A connection is used by a
//! single caller at a time; there is no pooling.

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::error::{MigrateError, MigrateResult};

/// Single exclusive database connection
#[async_trait]
pub trait DatabaseConnection: Send {
    /// Execute a statement and return affected rows count
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<u64>;

    /// Execute a query and return the result rows
    async fn fetch_all(&mut self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<Vec<DatabaseRow>>;

    /// Begin a transaction borrowing this connection until commit or rollback
    async fn begin_transaction<'c>(&'c mut self) -> MigrateResult<Box<dyn DatabaseTransaction + 'c>>;

    /// Close the connection
    async fn close(self: Box<Self>) -> MigrateResult<()>;
}

/// Open transaction on a [`DatabaseConnection`]
#[async_trait]
pub trait DatabaseTransaction: Send {
    /// Execute a statement within the transaction
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<u64>;

    /// Commit the transaction
    async fn commit(self: Box<Self>) -> MigrateResult<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> MigrateResult<()>;
}

/// How a statement is sent to the server
///
/// Migration statements carry no parameters and go over the simple (text)
/// protocol, so a `StatementBegin` block holding several commands, or a
/// `CREATE PROCEDURE` that MySQL refuses to prepare, reaches the server as
/// written. Only the parameterised bookkeeping queries are prepared.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Statement<'q> {
    Simple(&'q str),
    Prepared(&'q str, &'q [DatabaseValue]),
}

impl<'q> Statement<'q> {
    pub fn new(sql: &'q str, params: &'q [DatabaseValue]) -> Self {
        if params.is_empty() {
            Statement::Simple(sql)
        } else {
            Statement::Prepared(sql, params)
        }
    }

    pub fn is_prepared(&self) -> bool {
        matches!(self, Statement::Prepared(..))
    }
}

/// Parameter and column values used by the bookkeeping queries
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseValue {
    Null,
    Bool(bool),
    Int64(i64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl DatabaseValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DatabaseValue::Int64(i) => Some(*i),
            _ => None,
        }
    }

    /// Booleans, plus the 0/1 integers MySQL returns for `boolean` columns
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DatabaseValue::Bool(b) => Some(*b),
            DatabaseValue::Int64(i) => Some(*i != 0),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            DatabaseValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

impl From<bool> for DatabaseValue {
    fn from(value: bool) -> Self {
        DatabaseValue::Bool(value)
    }
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        DatabaseValue::Int64(value)
    }
}

impl From<String> for DatabaseValue {
    fn from(value: String) -> Self {
        DatabaseValue::Text(value)
    }
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        DatabaseValue::Text(value.to_string())
    }
}

impl From<NaiveDateTime> for DatabaseValue {
    fn from(value: NaiveDateTime) -> Self {
        DatabaseValue::Timestamp(value)
    }
}

impl<T> From<Option<T>> for DatabaseValue
where
    T: Into<DatabaseValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => DatabaseValue::Null,
        }
    }
}

/// Result row decoded into [`DatabaseValue`]s
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatabaseRow {
    columns: Vec<String>,
    values: Vec<DatabaseValue>,
}

impl DatabaseRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column, builder style
    pub fn with(mut self, column: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        self.push(column, value);
        self
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<DatabaseValue>) {
        self.columns.push(column.into());
        self.values.push(value.into());
    }

    /// Get column count
    pub fn column_count(&self) -> usize {
        self.values.len()
    }

    /// Get a column value by index
    pub fn get_by_index(&self, index: usize) -> Option<&DatabaseValue> {
        self.values.get(index)
    }

    /// Get a column value by name
    pub fn get_by_name(&self, name: &str) -> MigrateResult<&DatabaseValue> {
        self.columns
            .iter()
            .position(|c| c == name)
            .and_then(|i| self.values.get(i))
            .ok_or_else(|| MigrateError::row_decode(name, "column not found"))
    }

    pub fn get_i64(&self, name: &str) -> MigrateResult<i64> {
        let value = self.get_by_name(name)?;
        value
            .as_i64()
            .ok_or_else(|| MigrateError::row_decode(name, format!("expected integer, got {:?}", value)))
    }

    pub fn get_bool(&self, name: &str) -> MigrateResult<bool> {
        let value = self.get_by_name(name)?;
        value
            .as_bool()
            .ok_or_else(|| MigrateError::row_decode(name, format!("expected boolean, got {:?}", value)))
    }

    /// Timestamp column; `None` when the value is NULL
    pub fn get_timestamp(&self, name: &str) -> MigrateResult<Option<NaiveDateTime>> {
        match self.get_by_name(name)? {
            DatabaseValue::Null => Ok(None),
            DatabaseValue::Timestamp(ts) => Ok(Some(*ts)),
            other => Err(MigrateError::row_decode(
                name,
                format!("expected timestamp, got {:?}", other),
            )),
        }
    }
}
