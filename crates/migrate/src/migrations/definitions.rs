//! Migration Definitions - Core types shared by discovery, execution and status

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Migration direction for execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Apply the migration (run Up statements)
    Up,
    /// Revert the migration (run Down statements)
    Down,
}

impl Direction {
    /// Value recorded in the `is_applied` column for this direction
    pub fn is_applied(self) -> bool {
        matches!(self, Direction::Up)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// A migration script discovered on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Migration {
    pub version: i64,
    /// Description part of the file name, without version and extension
    pub name: String,
    pub path: PathBuf,
}

impl Migration {
    /// File name as shown in logs and status output
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.clone())
    }
}

/// One row of the bookkeeping table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRecord {
    pub version_id: i64,
    pub is_applied: bool,
}

/// Migration status in the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MigrationState {
    /// Not applied, or most recently reverted
    Pending,
    Applied {
        /// When it was applied, if the database recorded it
        applied_at: Option<NaiveDateTime>,
    },
}

/// Status line for one migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub version: i64,
    pub file: String,
    #[serde(flatten)]
    pub state: MigrationState,
}

impl MigrationStatus {
    pub fn is_applied(&self) -> bool {
        matches!(self.state, MigrationState::Applied { .. })
    }
}

/// Result of running a batch of migrations in one direction
#[derive(Debug, Default)]
pub struct MigrationRunResult {
    /// Versions executed, in execution order
    pub versions: Vec<i64>,
    /// Database version once the run stopped
    pub current_version: i64,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

impl MigrationRunResult {
    pub fn count(&self) -> usize {
        self.versions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_flag() {
        assert!(Direction::Up.is_applied());
        assert!(!Direction::Down.is_applied());
        assert_eq!(Direction::Down.to_string(), "down");
    }

    #[test]
    fn test_status_serialization() {
        let status = MigrationStatus {
            version: 3,
            file: "00003_add_index.sql".to_string(),
            state: MigrationState::Pending,
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["state"], "pending");
        assert_eq!(value["version"], 3);
        assert!(!status.is_applied());
    }
}
