//! Database creation and removal
//!
//! Both operations connect to the server rather than the database named in
//! the connection string, since that database may not exist yet (or is
//! about to disappear).

use crate::backends::{DatabaseConnection, DatabaseValue};
use crate::dialect::SqlDialect;
use crate::error::MigrateResult;

/// Create the database `dbstring` points at. Returns `false` when a soft
/// create found it already present.
pub async fn create_database(dialect: &dyn SqlDialect, dbstring: &str, soft: bool) -> MigrateResult<bool> {
    let name = dialect.db_name(dbstring)?;
    let mut conn = dialect.connect_to_server(dbstring).await?;

    let result = create_database_on(&mut *conn, dialect, &name, soft).await;
    let closed = conn.close().await;
    let created = result?;
    closed?;
    Ok(created)
}

/// Drop the database `dbstring` points at
pub async fn drop_database(dialect: &dyn SqlDialect, dbstring: &str, soft: bool) -> MigrateResult<()> {
    let name = dialect.db_name(dbstring)?;
    let mut conn = dialect.connect_to_server(dbstring).await?;

    let result = drop_database_on(&mut *conn, dialect, &name, soft).await;
    let closed = conn.close().await;
    result?;
    closed
}

/// Create `name` over an existing server connection
pub async fn create_database_on(
    conn: &mut dyn DatabaseConnection,
    dialect: &dyn SqlDialect,
    name: &str,
    soft: bool,
) -> MigrateResult<bool> {
    if soft {
        if let Some(exists_sql) = dialect.database_exists_sql() {
            let rows = conn.fetch_all(exists_sql, &[DatabaseValue::from(name)]).await?;
            if !rows.is_empty() {
                tracing::info!("database {} already exists", name);
                return Ok(false);
            }
        }
    }

    conn.execute(&dialect.create_database_sql(name, soft), &[]).await?;
    tracing::info!("created database {}", name);
    Ok(true)
}

/// Drop `name` over an existing server connection
pub async fn drop_database_on(
    conn: &mut dyn DatabaseConnection,
    dialect: &dyn SqlDialect,
    name: &str,
    soft: bool,
) -> MigrateResult<()> {
    conn.execute(&dialect.drop_database_sql(name, soft), &[]).await?;
    tracing::info!("dropped database {}", name);
    Ok(())
}
