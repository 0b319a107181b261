//! In-memory connection used by the unit tests
//!
//! Understands just enough of the bookkeeping SQL to behave like a real
//! server: the version table can be created, rows inserted and read back,
//! and transactions buffer their effects until commit.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::backends::{DatabaseConnection, DatabaseRow, DatabaseTransaction, DatabaseValue};
use crate::dialect::VERSION_TABLE;
use crate::error::MigrateResult;

#[derive(Debug, Clone)]
struct VersionRow {
    version_id: i64,
    is_applied: bool,
    tstamp: NaiveDateTime,
}

/// State a rollback restores
#[derive(Debug, Clone, Default)]
struct Effects {
    applied: Vec<String>,
    table: Option<Vec<VersionRow>>,
}

#[derive(Debug, Default)]
pub struct ScriptedConnection {
    /// Statements whose effects are visible (committed or run outside a transaction)
    pub applied: Vec<String>,
    /// Every non-bookkeeping statement attempted, including failed ones
    pub executed: Vec<String>,
    pub commits: usize,
    pub rollbacks: usize,
    pub transactions_begun: usize,
    table: Option<Vec<VersionRow>>,
    databases: Vec<String>,
    fail_on: Option<String>,
    fail_commit: bool,
    ticks: i64,
}

impl ScriptedConnection {
    /// A database without the bookkeeping table
    pub fn new() -> Self {
        Self::default()
    }

    /// A database with an empty bookkeeping table
    pub fn with_version_table() -> Self {
        Self {
            table: Some(Vec::new()),
            ..Self::default()
        }
    }

    /// Seed the bookkeeping table, oldest row first
    pub fn with_versions(mut self, rows: &[(i64, bool)]) -> Self {
        for (version_id, is_applied) in rows {
            self.record_version(*version_id, *is_applied);
        }
        self
    }

    /// A database that already exists on the server
    pub fn with_database(mut self, name: &str) -> Self {
        self.databases.push(name.to_string());
        self
    }

    /// Fail every statement containing `needle`
    pub fn fail_on(mut self, needle: &str) -> Self {
        self.fail_on = Some(needle.to_string());
        self
    }

    pub fn fail_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    /// Bookkeeping rows, oldest first
    pub fn version_rows(&self) -> Vec<(i64, bool)> {
        self.table
            .iter()
            .flatten()
            .map(|row| (row.version_id, row.is_applied))
            .collect()
    }

    pub fn has_version_table(&self) -> bool {
        self.table.is_some()
    }

    fn record_version(&mut self, version_id: i64, is_applied: bool) {
        self.ticks += 1;
        let tstamp = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap()
            + Duration::seconds(self.ticks);
        self.table.get_or_insert_with(Vec::new).push(VersionRow {
            version_id,
            is_applied,
            tstamp,
        });
    }

    fn snapshot(&self) -> Effects {
        Effects {
            applied: self.applied.clone(),
            table: self.table.clone(),
        }
    }

    fn restore(&mut self, effects: Effects) {
        self.applied = effects.applied;
        self.table = effects.table;
    }

    fn run(&mut self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<u64> {
        if sql.starts_with(&format!("CREATE TABLE {}", VERSION_TABLE)) {
            if self.table.is_some() {
                return Err(protocol_error(&format!(
                    "relation \"{}\" already exists",
                    VERSION_TABLE
                )));
            }
            self.table = Some(Vec::new());
            return Ok(0);
        }

        if sql.starts_with(&format!("INSERT INTO {}", VERSION_TABLE)) {
            if self.table.is_none() {
                return Err(no_table());
            }
            let version_id = params.first().and_then(DatabaseValue::as_i64).unwrap();
            let is_applied = params.get(1).and_then(DatabaseValue::as_bool).unwrap();
            self.record_version(version_id, is_applied);
            return Ok(1);
        }

        self.executed.push(sql.to_string());
        if let Some(needle) = &self.fail_on {
            if sql.contains(needle.as_str()) {
                return Err(protocol_error(&format!("statement failed: {}", sql.trim_end())));
            }
        }
        self.applied.push(sql.to_string());
        Ok(0)
    }

    fn query(&self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<Vec<DatabaseRow>> {
        if sql.contains("pg_database") {
            let name = match params.first() {
                Some(DatabaseValue::Text(name)) => name.clone(),
                _ => String::new(),
            };
            return Ok(self
                .databases
                .iter()
                .filter(|db| **db == name)
                .map(|_| DatabaseRow::new().with("?column?", 1_i64))
                .collect());
        }

        if !sql.contains(VERSION_TABLE) {
            return Ok(Vec::new());
        }
        let table = self.table.as_ref().ok_or_else(no_table)?;

        if sql.contains("WHERE version_id") {
            let version = params.first().and_then(DatabaseValue::as_i64).unwrap();
            return Ok(table
                .iter()
                .rev()
                .filter(|row| row.version_id == version)
                .take(1)
                .map(|row| {
                    DatabaseRow::new()
                        .with("tstamp", row.tstamp)
                        .with("is_applied", row.is_applied)
                })
                .collect());
        }

        Ok(table
            .iter()
            .rev()
            .map(|row| {
                DatabaseRow::new()
                    .with("version_id", row.version_id)
                    .with("is_applied", row.is_applied)
            })
            .collect())
    }
}

fn no_table() -> crate::error::MigrateError {
    protocol_error(&format!("relation \"{}\" does not exist", VERSION_TABLE))
}

fn protocol_error(message: &str) -> crate::error::MigrateError {
    sqlx::Error::Protocol(message.to_string()).into()
}

#[async_trait]
impl DatabaseConnection for ScriptedConnection {
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<u64> {
        self.run(sql, params)
    }

    async fn fetch_all(&mut self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<Vec<DatabaseRow>> {
        self.query(sql, params)
    }

    async fn begin_transaction<'c>(&'c mut self) -> MigrateResult<Box<dyn DatabaseTransaction + 'c>> {
        self.transactions_begun += 1;
        let snapshot = Some(self.snapshot());
        Ok(Box::new(ScriptedTransaction {
            conn: self,
            snapshot,
        }))
    }

    async fn close(self: Box<Self>) -> MigrateResult<()> {
        Ok(())
    }
}

/// Runs statements against the connection and undoes them unless committed
pub struct ScriptedTransaction<'c> {
    conn: &'c mut ScriptedConnection,
    snapshot: Option<Effects>,
}

#[async_trait]
impl<'c> DatabaseTransaction for ScriptedTransaction<'c> {
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<u64> {
        self.conn.run(sql, params)
    }

    async fn commit(self: Box<Self>) -> MigrateResult<()> {
        let mut tx = self;
        if tx.conn.fail_commit {
            return Err(protocol_error("commit failed: connection reset"));
        }
        tx.snapshot = None;
        tx.conn.commits += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> MigrateResult<()> {
        let mut tx = self;
        if let Some(snapshot) = tx.snapshot.take() {
            tx.conn.restore(snapshot);
        }
        tx.conn.rollbacks += 1;
        Ok(())
    }
}

impl Drop for ScriptedTransaction<'_> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.conn.restore(snapshot);
        }
    }
}
