//! Migration Runner - Executes migrations against the database
//!
//! Every command first makes sure the bookkeeping table exists, then works
//! out what to run from the current version and the files on disk.
//! Migrations are executed one at a time, in version order going up and in
//! reverse going down.

use std::path::PathBuf;
use std::time::Instant;

use super::definitions::{Direction, Migration, MigrationRunResult, MigrationState, MigrationStatus};
use super::manager::MigrationManager;
use super::version_store::{ensure_version_table, migration_status};
use crate::backends::DatabaseConnection;
use crate::dialect::SqlDialect;
use crate::error::{MigrateError, MigrateResult};
use crate::executor::run_sql_migration;

/// Runs migration commands for one dialect and migrations directory
#[derive(Debug, Clone)]
pub struct Migrator {
    dialect: &'static dyn SqlDialect,
    manager: MigrationManager,
}

impl Migrator {
    pub fn new(dialect: &'static dyn SqlDialect, migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            dialect,
            manager: MigrationManager::new(migrations_dir),
        }
    }

    pub fn dialect(&self) -> &'static dyn SqlDialect {
        self.dialect
    }

    /// Get the migration manager
    pub fn manager(&self) -> &MigrationManager {
        &self.manager
    }

    /// Apply every pending migration
    pub async fn up(&self, conn: &mut dyn DatabaseConnection) -> MigrateResult<MigrationRunResult> {
        self.up_to(conn, i64::MAX).await
    }

    /// Apply pending migrations up to and including `target`
    pub async fn up_to(
        &self,
        conn: &mut dyn DatabaseConnection,
        target: i64,
    ) -> MigrateResult<MigrationRunResult> {
        let start_time = Instant::now();
        let mut current = ensure_version_table(conn, self.dialect).await?;
        let pending = self.manager.collect_migrations(current, target)?;

        let mut versions = Vec::new();
        for migration in &pending {
            self.run(conn, migration, Direction::Up).await?;
            versions.push(migration.version);
            current = migration.version;
        }

        if versions.is_empty() {
            tracing::info!("no migrations to run. current version: {}", current);
        }

        Ok(MigrationRunResult {
            versions,
            current_version: current,
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }

    /// Revert the migration matching the current version
    pub async fn down(&self, conn: &mut dyn DatabaseConnection) -> MigrateResult<MigrationRunResult> {
        let start_time = Instant::now();
        let current = ensure_version_table(conn, self.dialect).await?;
        let migration = self.find(current)?;

        self.run(conn, &migration, Direction::Down).await?;

        Ok(MigrationRunResult {
            versions: vec![migration.version],
            current_version: ensure_version_table(conn, self.dialect).await?,
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }

    /// Revert migrations while the current version is above `target`
    pub async fn down_to(
        &self,
        conn: &mut dyn DatabaseConnection,
        target: i64,
    ) -> MigrateResult<MigrationRunResult> {
        let start_time = Instant::now();
        let mut versions = Vec::new();

        let current = loop {
            let current = ensure_version_table(conn, self.dialect).await?;
            if current <= target {
                break current;
            }
            let migration = self.find(current)?;
            self.run(conn, &migration, Direction::Down).await?;
            versions.push(migration.version);
        };

        if versions.is_empty() {
            tracing::info!("no migrations to run. current version: {}", current);
        }

        Ok(MigrationRunResult {
            versions,
            current_version: current,
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }

    /// Revert and re-apply the current migration
    pub async fn redo(&self, conn: &mut dyn DatabaseConnection) -> MigrateResult<MigrationRunResult> {
        let start_time = Instant::now();
        let current = ensure_version_table(conn, self.dialect).await?;
        let migration = self.find(current)?;

        self.run(conn, &migration, Direction::Down).await?;
        self.run(conn, &migration, Direction::Up).await?;

        Ok(MigrationRunResult {
            versions: vec![migration.version],
            current_version: current,
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }

    /// Revert every applied migration, newest first
    pub async fn reset(&self, conn: &mut dyn DatabaseConnection) -> MigrateResult<MigrationRunResult> {
        let start_time = Instant::now();
        ensure_version_table(conn, self.dialect).await?;

        let mut versions = Vec::new();
        for migration in self.manager.load_migrations()?.iter().rev() {
            let applied = matches!(
                migration_status(conn, self.dialect, migration.version).await?,
                Some((_, true))
            );
            if !applied {
                continue;
            }
            self.run(conn, migration, Direction::Down).await?;
            versions.push(migration.version);
        }

        Ok(MigrationRunResult {
            versions,
            current_version: ensure_version_table(conn, self.dialect).await?,
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }

    /// State of every migration on disk, in version order
    pub async fn status(&self, conn: &mut dyn DatabaseConnection) -> MigrateResult<Vec<MigrationStatus>> {
        ensure_version_table(conn, self.dialect).await?;

        let mut statuses = Vec::new();
        for migration in self.manager.load_migrations()? {
            let state = match migration_status(conn, self.dialect, migration.version).await? {
                Some((applied_at, true)) => MigrationState::Applied { applied_at },
                _ => MigrationState::Pending,
            };
            statuses.push(MigrationStatus {
                version: migration.version,
                file: migration.file_name(),
                state,
            });
        }

        Ok(statuses)
    }

    /// Current database version
    pub async fn version(&self, conn: &mut dyn DatabaseConnection) -> MigrateResult<i64> {
        ensure_version_table(conn, self.dialect).await
    }

    fn find(&self, version: i64) -> MigrateResult<Migration> {
        self.manager
            .load_migrations()?
            .into_iter()
            .find(|m| m.version == version)
            .ok_or(MigrateError::MigrationNotFound(version))
    }

    async fn run(
        &self,
        conn: &mut dyn DatabaseConnection,
        migration: &Migration,
        direction: Direction,
    ) -> MigrateResult<()> {
        let started = Instant::now();
        run_sql_migration(conn, self.dialect, &migration.path, migration.version, direction).await?;
        tracing::info!(
            "OK   {} ({}, {}ms)",
            migration.file_name(),
            direction,
            started.elapsed().as_millis()
        );
        Ok(())
    }
}
