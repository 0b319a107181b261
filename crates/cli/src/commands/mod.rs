pub mod database;
pub mod migrate;

use anyhow::Context;
use clap::Args;
use std::path::PathBuf;

use goose_core::{DbConf, LogFormat, DEFAULT_ENV};
use goose_migrate::{
    dialect_by_name, BackendKind, DatabaseConnection, SqlDialect, DEFAULT_MIGRATIONS_DIR,
};

/// Options shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Directory holding the migration files
    #[arg(long, global = true, default_value = DEFAULT_MIGRATIONS_DIR)]
    pub dir: PathBuf,

    /// Database configuration file, read when --driver/--dbstring are absent
    #[arg(long, global = true, default_value = "etc/config.yaml")]
    pub conf: PathBuf,

    /// Environment section of an environment-keyed configuration file
    #[arg(long, global = true, default_value = DEFAULT_ENV)]
    pub env: String,

    /// Database driver (postgres, pgx, mysql, mymysql, redshift, tidb)
    #[arg(long, global = true)]
    pub driver: Option<String>,

    /// Connection string; must be given together with --driver
    #[arg(long, global = true)]
    pub dbstring: Option<String>,

    /// Postgres schema to set as search_path after connecting
    #[arg(long, global = true)]
    pub pgschema: Option<String>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Log output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    pub log_format: LogFormat,
}

/// Database settings from flags or the configuration file
pub fn resolve_conf(args: &GlobalArgs) -> anyhow::Result<DbConf> {
    let conf = DbConf::resolve(
        args.driver.as_deref(),
        args.dbstring.as_deref(),
        &args.conf,
        &args.env,
    )?;
    tracing::debug!("database settings from {}", conf.source);
    Ok(conf.with_pg_schema(args.pgschema.clone()))
}

/// Dialect for the resolved settings
pub fn select_dialect(conf: &DbConf) -> anyhow::Result<&'static dyn SqlDialect> {
    Ok(dialect_by_name(conf.dialect_name())?)
}

/// Connect to the configured database and apply the Postgres schema
pub async fn connect(
    conf: &DbConf,
    dialect: &'static dyn SqlDialect,
) -> anyhow::Result<Box<dyn DatabaseConnection>> {
    tracing::debug!(
        "connecting with dialect {} to {}",
        dialect.name(),
        database::mask_dbstring(&conf.dbstring)
    );
    let mut conn = dialect
        .connect(&conf.dbstring)
        .await
        .with_context(|| format!("failed to open {} database", dialect.name()))?;

    if let Some(schema) = &conf.pg_schema {
        if dialect.backend() == BackendKind::Postgres {
            conn.execute(&format!("SET search_path TO {}", schema), &[])
                .await
                .with_context(|| format!("failed to set search_path to {}", schema))?;
        } else {
            tracing::warn!("--pgschema ignored for dialect {}", dialect.name());
        }
    }

    Ok(conn)
}
