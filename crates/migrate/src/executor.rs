//! Migration Executor - applies or reverts one migration script
//!
//! Transactional scripts are atomic: every statement and the version row
//! are committed together or not at all. Scripts marked
//! `-- +goose NO TRANSACTION` run statement by statement on the bare
//! connection; a failure there leaves earlier statements applied.

use std::path::Path;

use crate::backends::{DatabaseConnection, DatabaseTransaction, DatabaseValue};
use crate::dialect::SqlDialect;
use crate::error::MigrateResult;
use crate::migrations::Direction;
use crate::sql_parser::{parse_script_file, ParsedScript};

/// Apply (`Up`) or revert (`Down`) the script at `script` and record
/// `version` in the bookkeeping table.
///
/// Database errors are returned exactly as the driver reported them.
pub async fn run_sql_migration(
    conn: &mut dyn DatabaseConnection,
    dialect: &dyn SqlDialect,
    script: &Path,
    version: i64,
    direction: Direction,
) -> MigrateResult<()> {
    let parsed = parse_script_file(script, direction)?;
    tracing::debug!(
        "{}: {} statement(s) for {}, transaction={}",
        script.display(),
        parsed.statements.len(),
        direction,
        parsed.use_transaction
    );
    execute_parsed(conn, dialect, &parsed, version, direction).await
}

/// Execute already-split statements followed by the version insert
pub async fn execute_parsed(
    conn: &mut dyn DatabaseConnection,
    dialect: &dyn SqlDialect,
    parsed: &ParsedScript,
    version: i64,
    direction: Direction,
) -> MigrateResult<()> {
    let params = version_params(version, direction);

    if parsed.use_transaction {
        let mut tx = conn.begin_transaction().await?;

        for statement in &parsed.statements {
            tracing::debug!("executing: {}", statement.trim_end());
            if let Err(err) = tx.execute(statement, &[]).await {
                rollback_quietly(tx).await;
                return Err(err);
            }
        }

        if let Err(err) = tx.execute(dialect.insert_version_sql(), &params).await {
            rollback_quietly(tx).await;
            return Err(err);
        }

        return tx.commit().await;
    }

    // Statements already run stay applied if a later one fails.
    for statement in &parsed.statements {
        tracing::debug!("executing without transaction: {}", statement.trim_end());
        conn.execute(statement, &[]).await?;
    }
    conn.execute(dialect.insert_version_sql(), &params).await?;

    Ok(())
}

fn version_params(version: i64, direction: Direction) -> [DatabaseValue; 2] {
    [version.into(), direction.is_applied().into()]
}

/// Roll back after a failure; the original failure is what the caller sees.
pub(crate) async fn rollback_quietly(tx: Box<dyn DatabaseTransaction + '_>) {
    if let Err(err) = tx.rollback().await {
        tracing::warn!("rollback failed: {}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MySqlDialect, PostgresDialect};
    use crate::error::MigrateError;
    use crate::testing::ScriptedConnection;
    use std::fs;
    use tempfile::TempDir;

    const FIVE_STATEMENTS: &str = "-- +goose Up
CREATE TABLE a (id int);
CREATE TABLE b (id int);
CREATE TABLE broken (id int);
CREATE TABLE d (id int);
CREATE TABLE e (id int);
-- +goose Down
DROP TABLE e;
DROP TABLE d;
";

    fn write_script(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn with_no_transaction(script: &str) -> String {
        format!("-- +goose NO TRANSACTION\n{}", script)
    }

    #[tokio::test]
    async fn test_transactional_success_records_version() {
        let dir = TempDir::new().unwrap();
        let path = write_script(&dir, "00001_five.sql", FIVE_STATEMENTS);
        let mut conn = ScriptedConnection::with_version_table();

        run_sql_migration(&mut conn, &PostgresDialect, &path, 1, Direction::Up)
            .await
            .unwrap();

        assert_eq!(conn.applied.len(), 5);
        assert_eq!(conn.applied[0], "CREATE TABLE a (id int);\n");
        assert_eq!(conn.version_rows(), vec![(1, true)]);
        assert_eq!(conn.commits, 1);
        assert_eq!(conn.rollbacks, 0);
    }

    #[tokio::test]
    async fn test_transactional_failure_rolls_back_everything() {
        let dir = TempDir::new().unwrap();
        let path = write_script(&dir, "00002_five.sql", FIVE_STATEMENTS);
        let mut conn = ScriptedConnection::with_version_table().fail_on("broken");

        let err = run_sql_migration(&mut conn, &PostgresDialect, &path, 2, Direction::Up)
            .await
            .unwrap_err();

        let db_err = err.as_database_error().expect("database error");
        assert!(db_err.to_string().contains("CREATE TABLE broken"));
        assert_eq!(conn.executed.len(), 3);
        assert!(conn.applied.is_empty());
        assert!(conn.version_rows().is_empty());
        assert_eq!(conn.rollbacks, 1);
        assert_eq!(conn.commits, 0);
    }

    #[tokio::test]
    async fn test_no_transaction_failure_keeps_earlier_statements() {
        let dir = TempDir::new().unwrap();
        let path = write_script(&dir, "00003_five.sql", &with_no_transaction(FIVE_STATEMENTS));
        let mut conn = ScriptedConnection::with_version_table().fail_on("broken");

        let err = run_sql_migration(&mut conn, &MySqlDialect, &path, 3, Direction::Up)
            .await
            .unwrap_err();

        assert!(matches!(err, MigrateError::Database(_)));
        assert_eq!(
            conn.applied,
            vec!["CREATE TABLE a (id int);\n", "CREATE TABLE b (id int);\n"]
        );
        assert_eq!(conn.executed.len(), 3);
        assert!(conn.version_rows().is_empty());
        assert_eq!(conn.transactions_begun, 0);
    }

    #[tokio::test]
    async fn test_no_transaction_success() {
        let dir = TempDir::new().unwrap();
        let script = "-- +goose NO TRANSACTION
-- +goose Up
CREATE INDEX CONCURRENTLY idx_a ON a (id);
-- +goose Down
DROP INDEX CONCURRENTLY idx_a;
";
        let path = write_script(&dir, "00004_index.sql", script);
        let mut conn = ScriptedConnection::with_version_table();

        run_sql_migration(&mut conn, &PostgresDialect, &path, 4, Direction::Down)
            .await
            .unwrap();

        assert_eq!(conn.applied, vec!["DROP INDEX CONCURRENTLY idx_a;\n"]);
        assert_eq!(conn.version_rows(), vec![(4, false)]);
        assert_eq!(conn.transactions_begun, 0);
    }

    #[tokio::test]
    async fn test_bookkeeping_failure_rolls_back() {
        let dir = TempDir::new().unwrap();
        let path = write_script(&dir, "00005_t.sql", "-- +goose Up\nCREATE TABLE t (id int);\n");
        let mut conn = ScriptedConnection::new();

        let err = run_sql_migration(&mut conn, &PostgresDialect, &path, 5, Direction::Up)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("goose_db_version"));
        assert!(conn.applied.is_empty());
        assert_eq!(conn.rollbacks, 1);
    }

    #[tokio::test]
    async fn test_commit_failure_propagates() {
        let dir = TempDir::new().unwrap();
        let path = write_script(&dir, "00006_t.sql", "-- +goose Up\nCREATE TABLE t (id int);\n");
        let mut conn = ScriptedConnection::with_version_table().fail_commit();

        let err = run_sql_migration(&mut conn, &PostgresDialect, &path, 6, Direction::Up)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("commit"));
        assert!(conn.applied.is_empty());
        assert!(conn.version_rows().is_empty());
    }

    #[tokio::test]
    async fn test_script_without_directives_executes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = write_script(&dir, "00007_bare.sql", "CREATE TABLE t (id int);\n");
        let mut conn = ScriptedConnection::with_version_table();

        let err = run_sql_migration(&mut conn, &PostgresDialect, &path, 7, Direction::Up)
            .await
            .unwrap_err();

        match err {
            MigrateError::NoDirectives { path: reported } => {
                assert!(reported.ends_with("00007_bare.sql"))
            }
            other => panic!("expected NoDirectives, got {:?}", other),
        }
        assert!(conn.executed.is_empty());
        assert_eq!(conn.transactions_begun, 0);
    }

    #[tokio::test]
    async fn test_missing_script_is_io_error() {
        let dir = TempDir::new().unwrap();
        let mut conn = ScriptedConnection::with_version_table();

        let err = run_sql_migration(
            &mut conn,
            &PostgresDialect,
            &dir.path().join("00008_missing.sql"),
            8,
            Direction::Up,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, MigrateError::ReadScript { .. }));
        assert!(conn.executed.is_empty());
    }

    #[tokio::test]
    async fn test_empty_direction_still_records_version() {
        let dir = TempDir::new().unwrap();
        let path = write_script(&dir, "00009_up_only.sql", "-- +goose Up\nSELECT 1;\n-- +goose Down\n");
        let mut conn = ScriptedConnection::with_version_table();

        run_sql_migration(&mut conn, &PostgresDialect, &path, 9, Direction::Down)
            .await
            .unwrap();

        assert!(conn.applied.is_empty());
        assert_eq!(conn.version_rows(), vec![(9, false)]);
    }
}
