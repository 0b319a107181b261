use url::Url;

use super::{resolve_conf, select_dialect, GlobalArgs};

const MASK: &str = "****";

pub async fn create_db(args: &GlobalArgs, soft: bool) -> anyhow::Result<()> {
    let conf = resolve_conf(args)?;
    let dialect = select_dialect(&conf)?;
    let name = dialect.db_name(&conf.dbstring)?;

    if goose_migrate::create_database(dialect, &conf.dbstring, soft).await? {
        println!("goose: created database {}", name);
    } else {
        println!("goose: database {} already exists", name);
    }
    Ok(())
}

pub async fn drop_db(args: &GlobalArgs, soft: bool) -> anyhow::Result<()> {
    let conf = resolve_conf(args)?;
    let dialect = select_dialect(&conf)?;
    let name = dialect.db_name(&conf.dbstring)?;

    goose_migrate::drop_database(dialect, &conf.dbstring, soft).await?;
    println!("goose: dropped database {}", name);
    Ok(())
}

/// Connection string safe for logs, with the password replaced
pub fn mask_dbstring(dbstring: &str) -> String {
    if let Ok(mut url) = Url::parse(dbstring) {
        if url.has_host() {
            if url.password().is_some() && url.set_password(Some(MASK)).is_err() {
                return MASK.to_string();
            }
            return url.to_string();
        }
    }

    if dbstring.contains("password=") {
        // key/value form: host=... password=secret dbname=...
        return dbstring
            .split_whitespace()
            .map(|pair| {
                if pair.starts_with("password=") {
                    format!("password={}", MASK)
                } else {
                    pair.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
    }

    // Go DSN: user:password@tcp(host)/db
    match dbstring.rfind('@') {
        Some(at) => match dbstring[..at].split_once(':') {
            Some((user, _)) => format!("{}:{}{}", user, MASK, &dbstring[at..]),
            None => dbstring.to_string(),
        },
        None => dbstring.to_string(),
    }
}
