//! Migration Manager - File system operations for migrations
//!
//! Migrations are plain files named `<version>_<description>.sql`. Anything
//! without the `.sql` extension is ignored.

use chrono::{NaiveDateTime, Utc};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::definitions::Migration;
use crate::error::{MigrateError, MigrateResult};

/// Directory used when `--dir` is not given
pub const DEFAULT_MIGRATIONS_DIR: &str = "db/migrations";

const MIGRATION_EXTENSION: &str = "sql";

/// Version format of newly created migrations
const VERSION_FORMAT: &str = "%Y%m%d%H%M%S";

const SQL_MIGRATION_TEMPLATE: &str = "-- +goose Up
-- SQL in section 'Up' is executed when this migration is applied


-- +goose Down
-- SQL section 'Down' is executed when this migration is rolled back

";

/// Migration manager for creating and loading migrations
#[derive(Debug, Clone)]
pub struct MigrationManager {
    migrations_dir: PathBuf,
}

impl Default for MigrationManager {
    fn default() -> Self {
        Self::new(DEFAULT_MIGRATIONS_DIR)
    }
}

impl MigrationManager {
    pub fn new(migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            migrations_dir: migrations_dir.into(),
        }
    }

    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// Every migration in the directory, sorted by version
    pub fn load_migrations(&self) -> MigrateResult<Vec<Migration>> {
        self.collect_migrations(i64::MIN, i64::MAX)
    }

    /// Migrations with `current < version <= target`, sorted by version.
    ///
    /// A missing directory holds no migrations.
    pub fn collect_migrations(&self, current: i64, target: i64) -> MigrateResult<Vec<Migration>> {
        if !self.migrations_dir.is_dir() {
            tracing::debug!(
                "migrations directory {} does not exist",
                self.migrations_dir.display()
            );
            return Ok(Vec::new());
        }

        let mut by_version = BTreeMap::new();
        for entry in fs::read_dir(&self.migrations_dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().map_or(true, |ext| ext != MIGRATION_EXTENSION) {
                continue;
            }

            let migration = parse_migration_path(&path)?;
            if migration.version <= current || migration.version > target {
                continue;
            }
            if by_version.contains_key(&migration.version) {
                return Err(MigrateError::DuplicateVersion(migration.version));
            }
            by_version.insert(migration.version, migration);
        }

        Ok(by_version.into_values().collect())
    }

    /// Create a new migration file versioned with the current UTC time
    pub fn create_migration(&self, name: &str) -> MigrateResult<PathBuf> {
        self.create_migration_at(name, Utc::now().naive_utc())
    }

    /// Create a new migration file versioned with `time`
    pub fn create_migration_at(&self, name: &str, time: NaiveDateTime) -> MigrateResult<PathBuf> {
        let description = name.trim().replace(' ', "_").to_lowercase();
        if description.is_empty() {
            return Err(MigrateError::InvalidMigrationName(name.to_string()));
        }

        fs::create_dir_all(&self.migrations_dir)?;

        let filename = format!(
            "{}_{}.{}",
            time.format(VERSION_FORMAT),
            description,
            MIGRATION_EXTENSION
        );
        let path = self.migrations_dir.join(filename);

        let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        file.write_all(SQL_MIGRATION_TEMPLATE.as_bytes())?;

        tracing::info!("created new migration {}", path.display());
        Ok(path)
    }
}

/// Split a migration file name into version and description
pub fn parse_migration_path(path: &Path) -> MigrateResult<Migration> {
    let invalid = || MigrateError::InvalidMigrationName(path.display().to_string());

    let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(invalid)?;
    let (version, name) = stem.split_once('_').ok_or_else(invalid)?;
    let version: i64 = version.parse().map_err(|_| invalid())?;
    if version <= 0 {
        return Err(invalid());
    }

    Ok(Migration {
        version,
        name: name.to_string(),
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str) {
        fs::write(dir.path().join(name), "-- +goose Up\n").unwrap();
    }

    #[test]
    fn test_parse_migration_path() {
        let migration = parse_migration_path(Path::new("db/migrations/00012_add_users.sql")).unwrap();
        assert_eq!(migration.version, 12);
        assert_eq!(migration.name, "add_users");
        assert_eq!(migration.file_name(), "00012_add_users.sql");

        assert!(parse_migration_path(Path::new("add_users.sql")).is_err());
        assert!(parse_migration_path(Path::new("v1_add_users.sql")).is_err());
        assert!(parse_migration_path(Path::new("0_zero.sql")).is_err());
    }

    #[test]
    fn test_collect_range_and_order() {
        let dir = TempDir::new().unwrap();
        for name in ["003_c.sql", "001_a.sql", "002_b.sql", "010_j.sql", "README.md"] {
            touch(&dir, name);
        }
        let manager = MigrationManager::new(dir.path());

        let versions: Vec<i64> = manager
            .collect_migrations(1, 3)
            .unwrap()
            .iter()
            .map(|m| m.version)
            .collect();
        assert_eq!(versions, vec![2, 3]);

        assert_eq!(manager.load_migrations().unwrap().len(), 4);
    }

    #[test]
    fn test_duplicate_version_rejected() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "001_a.sql");
        touch(&dir, "1_again.sql");

        let err = MigrationManager::new(dir.path()).load_migrations().unwrap_err();
        assert!(matches!(err, MigrateError::DuplicateVersion(1)));
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let manager = MigrationManager::new(dir.path().join("nope"));
        assert!(manager.load_migrations().unwrap().is_empty());
    }

    #[test]
    fn test_create_migration() {
        let dir = TempDir::new().unwrap();
        let manager = MigrationManager::new(dir.path().join("db/migrations"));
        let time = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 30)
            .unwrap();

        let path = manager.create_migration_at("Add Users", time).unwrap();

        assert!(path.ends_with("20240309140530_add_users.sql"));
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("-- +goose Up\n"));
        assert!(content.contains("-- +goose Down\n"));

        let loaded = manager.load_migrations().unwrap();
        assert_eq!(loaded[0].version, 20240309140530);

        // same second, same name
        assert!(manager.create_migration_at("add users", time).is_err());
        assert!(manager.create_migration_at("  ", time).is_err());
    }
}
