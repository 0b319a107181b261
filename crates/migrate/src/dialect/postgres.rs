//! Postgres-family dialects: PostgreSQL itself and Redshift

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

use super::SqlDialect;
use crate::backends::BackendKind;
use crate::error::{MigrateError, MigrateResult};

/// Database every PostgreSQL server has, used for administrative connections
const SERVER_DATABASE: &str = "postgres";

fn dbname_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(^|\s)dbname=(\S*)").expect("dbname pattern is valid"))
}

/// Parse `dbstring` as a URL when it carries a postgres scheme. Host-less
/// socket URLs (`postgres:///app?host=/run/postgresql`) count too.
fn parse_url(dbstring: &str) -> Option<Url> {
    if !(dbstring.starts_with("postgres://") || dbstring.starts_with("postgresql://")) {
        return None;
    }
    Url::parse(dbstring).ok()
}

fn pg_db_name(dbstring: &str) -> MigrateResult<String> {
    let name = match parse_url(dbstring) {
        Some(url) => url.path().replace('/', ""),
        None => dbname_pattern()
            .captures(dbstring)
            .and_then(|caps| caps.get(2))
            .map(|m| m.as_str().trim_matches('\'').to_string())
            .ok_or_else(|| MigrateError::UnsupportedDbString(dbstring.to_string()))?,
    };

    if name.is_empty() {
        return Err(MigrateError::UnsupportedDbString(dbstring.to_string()));
    }
    Ok(name)
}

fn pg_server_dbstring(dbstring: &str) -> MigrateResult<String> {
    if let Some(mut url) = parse_url(dbstring) {
        url.set_path(&format!("/{}", SERVER_DATABASE));
        return Ok(url.to_string());
    }

    let pattern = dbname_pattern();
    if !pattern.is_match(dbstring) {
        return Err(MigrateError::UnsupportedDbString(dbstring.to_string()));
    }
    Ok(pattern
        .replace(dbstring, format!("${{1}}dbname={}", SERVER_DATABASE))
        .into_owned())
}

fn pg_create_database_sql(name: &str) -> String {
    format!("CREATE DATABASE {}", name)
}

const PG_INSERT_VERSION_SQL: &str =
    "INSERT INTO goose_db_version (version_id, is_applied) VALUES ($1, $2);";

const PG_MIGRATION_STATUS_SQL: &str =
    "SELECT tstamp, is_applied FROM goose_db_version WHERE version_id = $1 ORDER BY id DESC LIMIT 1";

const PG_DATABASE_EXISTS_SQL: &str = "SELECT 1 FROM pg_database WHERE datname = $1";

/// PostgreSQL dialect, also selected by `pgx`
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Postgres
    }

    fn create_version_table_sql(&self) -> &'static str {
        "CREATE TABLE goose_db_version (
            id serial NOT NULL,
            version_id bigint NOT NULL,
            is_applied boolean NOT NULL,
            tstamp timestamp NULL default now(),
            PRIMARY KEY(id)
        );"
    }

    fn insert_version_sql(&self) -> &'static str {
        PG_INSERT_VERSION_SQL
    }

    fn migration_status_sql(&self) -> &'static str {
        PG_MIGRATION_STATUS_SQL
    }

    fn db_name(&self, dbstring: &str) -> MigrateResult<String> {
        pg_db_name(dbstring)
    }

    fn server_dbstring(&self, dbstring: &str) -> MigrateResult<String> {
        pg_server_dbstring(dbstring)
    }

    fn create_database_sql(&self, name: &str, _soft: bool) -> String {
        pg_create_database_sql(name)
    }

    fn database_exists_sql(&self) -> Option<&'static str> {
        Some(PG_DATABASE_EXISTS_SQL)
    }
}

/// Amazon Redshift: Postgres wire protocol, different identity and clock syntax
#[derive(Debug, Clone, Copy, Default)]
pub struct RedshiftDialect;

impl SqlDialect for RedshiftDialect {
    fn name(&self) -> &'static str {
        "redshift"
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Postgres
    }

    fn create_version_table_sql(&self) -> &'static str {
        "CREATE TABLE goose_db_version (
            id integer NOT NULL identity(1, 1),
            version_id bigint NOT NULL,
            is_applied boolean NOT NULL,
            tstamp timestamp NULL default sysdate,
            PRIMARY KEY(id)
        );"
    }

    fn insert_version_sql(&self) -> &'static str {
        PG_INSERT_VERSION_SQL
    }

    fn migration_status_sql(&self) -> &'static str {
        PG_MIGRATION_STATUS_SQL
    }

    fn db_name(&self, dbstring: &str) -> MigrateResult<String> {
        pg_db_name(dbstring)
    }

    fn server_dbstring(&self, dbstring: &str) -> MigrateResult<String> {
        pg_server_dbstring(dbstring)
    }

    fn create_database_sql(&self, name: &str, _soft: bool) -> String {
        pg_create_database_sql(name)
    }

    fn database_exists_sql(&self) -> Option<&'static str> {
        Some(PG_DATABASE_EXISTS_SQL)
    }
}
