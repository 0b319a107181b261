use regex::{Captures, Regex};
use std::env;
use std::sync::OnceLock;

fn env_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([^}]*)\}|\$([A-Za-z0-9_]+)").expect("env expansion pattern is valid")
    })
}

/// Replace `$VAR` and `${VAR}` with the value of the environment variable.
///
/// Unset variables expand to the empty string.
pub fn expand_env(input: &str) -> String {
    env_pattern()
        .replace_all(input, |caps: &Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            env::var(name).unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_expands_braced_and_bare_variables() {
        env::set_var("GOOSE_TEST_HOST", "db.internal");
        env::set_var("GOOSE_TEST_DB", "orders");

        let expanded = expand_env("postgres://${GOOSE_TEST_HOST}/$GOOSE_TEST_DB?sslmode=disable");
        assert_eq!(expanded, "postgres://db.internal/orders?sslmode=disable");

        env::remove_var("GOOSE_TEST_HOST");
        env::remove_var("GOOSE_TEST_DB");
    }

    #[test]
    #[serial]
    fn test_unset_variable_expands_to_empty() {
        env::remove_var("GOOSE_TEST_MISSING");
        assert_eq!(expand_env("user=$GOOSE_TEST_MISSING dbname=x"), "user= dbname=x");
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(expand_env("host=localhost dbname=app"), "host=localhost dbname=app");
    }
}
