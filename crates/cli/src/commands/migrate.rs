use chrono::NaiveDateTime;

use super::{connect, resolve_conf, select_dialect, GlobalArgs};
use goose_migrate::{
    DatabaseConnection, MigrateResult, MigrationManager, MigrationRunResult, MigrationState, MigrationStatus, Migrator,
};

/// An open connection plus the migrator for it
struct Session {
    conn: Box<dyn DatabaseConnection>,
    migrator: Migrator,
}

impl Session {
    async fn open(args: &GlobalArgs) -> anyhow::Result<Self> {
        let conf = resolve_conf(args)?;
        let dialect = select_dialect(&conf)?;
        let conn = connect(&conf, dialect).await?;
        Ok(Self {
            conn,
            migrator: Migrator::new(dialect, &args.dir),
        })
    }

    /// Close the connection; a command failure wins over a close failure
    async fn finish<T>(self, result: MigrateResult<T>) -> anyhow::Result<T> {
        let closed = self.conn.close().await;
        let value = result?;
        closed?;
        Ok(value)
    }
}

pub async fn up(args: &GlobalArgs, target: Option<i64>) -> anyhow::Result<()> {
    let mut session = Session::open(args).await?;
    let result = match target {
        Some(version) => session.migrator.up_to(&mut *session.conn, version).await,
        None => session.migrator.up(&mut *session.conn).await,
    };
    let result = session.finish(result).await?;

    report("applied", &result);
    Ok(())
}

pub async fn down(args: &GlobalArgs, target: Option<i64>) -> anyhow::Result<()> {
    let mut session = Session::open(args).await?;
    let result = match target {
        Some(version) => session.migrator.down_to(&mut *session.conn, version).await,
        None => session.migrator.down(&mut *session.conn).await,
    };
    let result = session.finish(result).await?;

    report("reverted", &result);
    Ok(())
}

pub async fn redo(args: &GlobalArgs) -> anyhow::Result<()> {
    let mut session = Session::open(args).await?;
    let result = session.migrator.redo(&mut *session.conn).await;
    let result = session.finish(result).await?;

    report("redone", &result);
    Ok(())
}

pub async fn reset(args: &GlobalArgs) -> anyhow::Result<()> {
    let mut session = Session::open(args).await?;
    let result = session.migrator.reset(&mut *session.conn).await;
    let result = session.finish(result).await?;

    report("reverted", &result);
    Ok(())
}

pub async fn status(args: &GlobalArgs, json: bool) -> anyhow::Result<()> {
    let mut session = Session::open(args).await?;
    let result = session.migrator.status(&mut *session.conn).await;
    let statuses = session.finish(result).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
    } else {
        print!("{}", format_status_table(&statuses));
    }
    Ok(())
}

pub async fn version(args: &GlobalArgs) -> anyhow::Result<()> {
    let mut session = Session::open(args).await?;
    let result = session.migrator.version(&mut *session.conn).await;
    let current = session.finish(result).await?;

    println!("goose: version {}", current);
    Ok(())
}

/// Creating a file needs no database connection
pub fn create(args: &GlobalArgs, name: &str) -> anyhow::Result<()> {
    let path = MigrationManager::new(&args.dir).create_migration(name)?;

    println!("Created new file: {}", path.display());
    Ok(())
}

fn report(verb: &str, result: &MigrationRunResult) {
    if result.count() > 0 {
        println!(
            "goose: {} {} migration(s) in {}ms, current version: {}",
            verb,
            result.count(),
            result.execution_time_ms,
            result.current_version
        );
    }
}

fn format_status_table(statuses: &[MigrationStatus]) -> String {
    let mut out = String::from("    Applied At                  Migration\n");
    out.push_str("    =======================================\n");

    for status in statuses {
        let applied = match &status.state {
            MigrationState::Applied { applied_at: Some(at) } => format_timestamp(at),
            MigrationState::Applied { applied_at: None } => "Applied".to_string(),
            MigrationState::Pending => "Pending".to_string(),
        };
        out.push_str(&format!("    {:<24} -- {}\n", applied, status.file));
    }

    out
}

fn format_timestamp(at: &NaiveDateTime) -> String {
    at.format("%a %b %e %H:%M:%S %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_status_table() {
        let applied_at = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(15, 4, 5)
            .unwrap();
        let statuses = vec![
            MigrationStatus {
                version: 1,
                file: "001_users.sql".to_string(),
                state: MigrationState::Applied {
                    applied_at: Some(applied_at),
                },
            },
            MigrationStatus {
                version: 2,
                file: "002_posts.sql".to_string(),
                state: MigrationState::Pending,
            },
        ];

        let table = format_status_table(&statuses);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], "    Tue Jan  2 15:04:05 2024 -- 001_users.sql");
        assert_eq!(lines[3], "    Pending                  -- 002_posts.sql");
    }
}
