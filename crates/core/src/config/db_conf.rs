use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::env::expand_env;
use super::sources::ConfigSource;
use crate::errors::{CoreError, CoreResult};

/// Environment used when a `dbconf.yml` style file is read without `--env`
pub const DEFAULT_ENV: &str = "development";

/// Key of the flat configuration layout
const FLAT_SECTION: &str = "DBX";

#[derive(Debug, Deserialize)]
struct FlatSection {
    #[serde(rename = "Driver")]
    driver: String,
    #[serde(rename = "Connstring")]
    connstring: String,
}

#[derive(Debug, Deserialize)]
struct EnvSection {
    driver: String,
    open: String,
    #[serde(default)]
    dialect: Option<String>,
    #[serde(default)]
    pgschema: Option<String>,
}

/// Resolved database settings for one run
#[derive(Debug, Clone)]
pub struct DbConf {
    /// Driver name as written by the user (`postgres`, `pgx`, `mysql`, ...)
    pub driver: String,
    /// Connection string, already environment-expanded
    pub dbstring: String,
    /// Dialect override; the driver name is used when absent
    pub dialect: Option<String>,
    /// Postgres `search_path` applied after connecting
    pub pg_schema: Option<String>,
    pub source: ConfigSource,
}

impl DbConf {
    /// Build a configuration from `--driver` / `--dbstring`
    pub fn from_flags(driver: &str, dbstring: &str) -> CoreResult<Self> {
        let conf = Self {
            driver: driver.to_string(),
            dbstring: dbstring.to_string(),
            dialect: None,
            pg_schema: None,
            source: ConfigSource::Flags,
        };
        conf.validate()?;
        Ok(conf)
    }

    /// Read a configuration file, using `env` for environment-keyed layouts
    pub fn from_file(path: &Path, env: &str) -> CoreResult<Self> {
        tracing::debug!("reading database configuration from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content, env, &path.display().to_string())
    }

    /// Parse configuration content.
    ///
    /// A top-level `DBX` section wins; otherwise the section named `env`
    /// must exist.
    pub fn from_yaml_str(content: &str, env: &str, origin: &str) -> CoreResult<Self> {
        let mut sections: HashMap<String, serde_yaml::Value> = serde_yaml::from_str(content)?;

        let conf = if let Some(flat) = sections.remove(FLAT_SECTION) {
            let flat: FlatSection = serde_yaml::from_value(flat)?;
            Self {
                driver: expand_env(&flat.driver),
                dbstring: expand_env(&flat.connstring),
                dialect: None,
                pg_schema: None,
                source: ConfigSource::File(origin.to_string()),
            }
        } else {
            let section = sections.remove(env).ok_or_else(|| {
                CoreError::configuration(format!(
                    "environment '{}' not found in {}",
                    env, origin
                ))
            })?;
            let section: EnvSection = serde_yaml::from_value(section)?;
            Self {
                driver: expand_env(&section.driver),
                dbstring: expand_env(&section.open),
                dialect: section.dialect.map(|d| expand_env(&d)),
                pg_schema: section
                    .pgschema
                    .map(|s| expand_env(&s))
                    .filter(|s| !s.is_empty()),
                source: ConfigSource::FileEnvironment {
                    path: origin.to_string(),
                    env: env.to_string(),
                },
            }
        };

        conf.validate()?;
        Ok(conf)
    }

    /// Resolve settings the way the command line does: flags must be given
    /// together or not at all, in which case the file is read.
    pub fn resolve(
        driver: Option<&str>,
        dbstring: Option<&str>,
        conf_path: &Path,
        env: &str,
    ) -> CoreResult<Self> {
        match (driver, dbstring) {
            (Some(driver), Some(dbstring)) => Self::from_flags(driver, dbstring),
            (None, None) => Self::from_file(conf_path, env),
            _ => Err(CoreError::configuration(
                "--dbstring and --driver must be either both present or absent",
            )),
        }
    }

    /// Name used to select the SQL dialect
    pub fn dialect_name(&self) -> &str {
        self.dialect.as_deref().unwrap_or(&self.driver)
    }

    pub fn with_pg_schema(mut self, schema: Option<String>) -> Self {
        if schema.is_some() {
            self.pg_schema = schema;
        }
        self
    }

    fn validate(&self) -> CoreResult<()> {
        if self.driver.trim().is_empty() {
            return Err(CoreError::configuration(format!(
                "driver is empty ({})",
                self.source
            )));
        }
        if self.dbstring.trim().is_empty() {
            return Err(CoreError::configuration(format!(
                "dbstring={:?} not supported ({})",
                self.dbstring, self.source
            )));
        }
        Ok(())
    }
}
