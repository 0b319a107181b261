//! MySQL-family dialects: MySQL itself and TiDB

use url::Url;

use super::SqlDialect;
use crate::backends::mysql::{is_url, MySqlDsn};
use crate::backends::BackendKind;
use crate::error::{MigrateError, MigrateResult};

const MYSQL_INSERT_VERSION_SQL: &str =
    "INSERT INTO goose_db_version (version_id, is_applied) VALUES (?, ?);";

const MYSQL_MIGRATION_STATUS_SQL: &str =
    "SELECT tstamp, is_applied FROM goose_db_version WHERE version_id = ? ORDER BY id DESC LIMIT 1";

fn mysql_db_name(dbstring: &str) -> MigrateResult<String> {
    let name = if is_url(dbstring) {
        let url = Url::parse(dbstring)
            .map_err(|_| MigrateError::UnsupportedDbString(dbstring.to_string()))?;
        url.path().replace('/', "")
    } else {
        MySqlDsn::parse(dbstring)?.database
    };

    if name.is_empty() {
        return Err(MigrateError::UnsupportedDbString(dbstring.to_string()));
    }
    Ok(name)
}

fn mysql_server_dbstring(dbstring: &str) -> MigrateResult<String> {
    if is_url(dbstring) {
        let mut url = Url::parse(dbstring)
            .map_err(|_| MigrateError::UnsupportedDbString(dbstring.to_string()))?;
        url.set_path("");
        return Ok(url.to_string());
    }
    Ok(MySqlDsn::parse(dbstring)?.with_database("").to_string())
}

fn mysql_create_database_sql(name: &str, soft: bool) -> String {
    let if_not_exists = if soft { "IF NOT EXISTS " } else { "" };
    format!(
        "CREATE DATABASE {}{} CHARACTER SET utf8 COLLATE utf8_general_ci",
        if_not_exists, name
    )
}

/// MySQL dialect, also selected by `mymysql`
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl SqlDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn backend(&self) -> BackendKind {
        BackendKind::MySql
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
        MYSQL_INSERT_VERSION_SQL
    }

    fn migration_status_sql(&self) -> &'static str {
        MYSQL_MIGRATION_STATUS_SQL
    }

    fn db_name(&self, dbstring: &str) -> MigrateResult<String> {
        mysql_db_name(dbstring)
    }

    fn server_dbstring(&self, dbstring: &str) -> MigrateResult<String> {
        mysql_server_dbstring(dbstring)
    }

    fn create_database_sql(&self, name: &str, soft: bool) -> String {
        mysql_create_database_sql(name, soft)
    }
}

/// TiDB: MySQL wire protocol with an explicit auto-increment id
#[derive(Debug, Clone, Copy, Default)]
pub struct TiDbDialect;

impl SqlDialect for TiDbDialect {
    fn name(&self) -> &'static str {
        "tidb"
    }

    fn backend(&self) -> BackendKind {
        BackendKind::MySql
    }

    fn create_version_table_sql(&self) -> &'static str {
        "CREATE TABLE goose_db_version (
            id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT UNIQUE,
            version_id bigint NOT NULL,
            is_applied boolean NOT NULL,
            tstamp timestamp NULL default now(),
            PRIMARY KEY(id)
        );"
    }

    fn insert_version_sql(&self) -> &'static str {
        MYSQL_INSERT_VERSION_SQL
    }

    fn migration_status_sql(&self) -> &'static str {
        MYSQL_MIGRATION_STATUS_SQL
    }

    fn db_name(&self, dbstring: &str) -> MigrateResult<String> {
        mysql_db_name(dbstring)
    }

    fn server_dbstring(&self, dbstring: &str) -> MigrateResult<String> {
        mysql_server_dbstring(dbstring)
    }

    fn create_database_sql(&self, name: &str, soft: bool) -> String {
        mysql_create_database_sql(name, soft)
    }
}
