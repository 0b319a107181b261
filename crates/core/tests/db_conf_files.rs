//! Configuration files read from disk

use std::fs;

use goose_core::{ConfigSource, DbConf, DEFAULT_ENV};
use tempfile::TempDir;

#[test]
fn test_resolve_reads_environment_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dbconf.yml");
    fs::write(
        &path,
        "development:\n  driver: postgres\n  open: user=goose dbname=app_dev sslmode=disable\n  pgschema: tenant\n",
    )
    .unwrap();

    let conf = DbConf::resolve(None, None, &path, DEFAULT_ENV).unwrap();

    assert_eq!(conf.dbstring, "user=goose dbname=app_dev sslmode=disable");
    assert_eq!(conf.pg_schema.as_deref(), Some("tenant"));
    assert_eq!(
        conf.source,
        ConfigSource::FileEnvironment {
            path: path.display().to_string(),
            env: DEFAULT_ENV.to_string(),
        }
    );
}

#[test]
fn test_flags_win_over_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(&path, "DBX:\n  Driver: mysql\n  Connstring: root@tcp(db:3306)/app\n").unwrap();

    let conf = DbConf::resolve(Some("tidb"), Some("root@tcp(tidb:4000)/app"), &path, DEFAULT_ENV)
        .unwrap()
        .with_pg_schema(None);

    assert_eq!(conf.driver, "tidb");
    assert!(conf.source.is_flags());
}

#[test]
fn test_malformed_file_is_configuration_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(&path, "DBX: [not, a, mapping]\n").unwrap();

    let err = DbConf::resolve(None, None, &path, DEFAULT_ENV).unwrap_err();
    assert!(err.is_configuration());
}
