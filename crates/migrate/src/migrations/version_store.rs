//! Version Store - reads and initialises the bookkeeping table
//!
//! The table is append-only: applying a migration inserts `(version, true)`
//! and reverting it inserts `(version, false)`. The current version is the
//! newest version whose latest row says applied.

use chrono::NaiveDateTime;
use std::collections::HashSet;

use super::definitions::VersionRecord;
use crate::backends::{DatabaseConnection, DatabaseValue};
use crate::dialect::SqlDialect;
use crate::error::MigrateResult;
use crate::executor::rollback_quietly;

/// Return the current version, creating the bookkeeping table (with the
/// initial version 0 row) when it cannot be read.
pub async fn ensure_version_table(
    conn: &mut dyn DatabaseConnection,
    dialect: &dyn SqlDialect,
) -> MigrateResult<i64> {
    match version_records(conn, dialect).await {
        Ok(records) => Ok(current_version(&records)),
        Err(err) => {
            tracing::debug!("version table not readable ({}), creating it", err);
            create_version_table(conn, dialect).await?;
            Ok(0)
        }
    }
}

/// Current version without creating anything
pub async fn get_db_version(
    conn: &mut dyn DatabaseConnection,
    dialect: &dyn SqlDialect,
) -> MigrateResult<i64> {
    let records = version_records(conn, dialect).await?;
    Ok(current_version(&records))
}

/// All bookkeeping rows, most recent first
pub async fn version_records(
    conn: &mut dyn DatabaseConnection,
    dialect: &dyn SqlDialect,
) -> MigrateResult<Vec<VersionRecord>> {
    conn.fetch_all(dialect.version_rows_sql(), &[])
        .await?
        .iter()
        .map(|row| -> MigrateResult<VersionRecord> {
            Ok(VersionRecord {
                version_id: row.get_i64("version_id")?,
                is_applied: row.get_bool("is_applied")?,
            })
        })
        .collect()
}

/// Derive the current version from rows ordered most recent first.
///
/// A version whose latest row is a revert is skipped even if older rows
/// show it applied.
pub fn current_version(records: &[VersionRecord]) -> i64 {
    let mut reverted = HashSet::new();

    for record in records {
        if reverted.contains(&record.version_id) {
            continue;
        }
        if record.is_applied {
            return record.version_id;
        }
        reverted.insert(record.version_id);
    }

    0
}

/// Latest bookkeeping entry for `version`: when it was written and whether
/// it marks the migration applied. `None` if the version was never run.
pub async fn migration_status(
    conn: &mut dyn DatabaseConnection,
    dialect: &dyn SqlDialect,
    version: i64,
) -> MigrateResult<Option<(Option<NaiveDateTime>, bool)>> {
    let rows = conn
        .fetch_all(dialect.migration_status_sql(), &[DatabaseValue::from(version)])
        .await?;

    match rows.first() {
        Some(row) => Ok(Some((row.get_timestamp("tstamp")?, row.get_bool("is_applied")?))),
        None => Ok(None),
    }
}

async fn create_version_table(
    conn: &mut dyn DatabaseConnection,
    dialect: &dyn SqlDialect,
) -> MigrateResult<()> {
    let mut tx = conn.begin_transaction().await?;

    if let Err(err) = tx.execute(dialect.create_version_table_sql(), &[]).await {
        rollback_quietly(tx).await;
        return Err(err);
    }
    if let Err(err) = tx
        .execute(dialect.insert_version_sql(), &[DatabaseValue::from(0_i64), DatabaseValue::from(true)])
        .await
    {
        rollback_quietly(tx).await;
        return Err(err);
    }

    tx.commit().await?;
    tracing::info!("created version table {}", crate::dialect::VERSION_TABLE);
    Ok(())
}
