//! # goose-core
//!
//! Shared plumbing for the goose migration tool: database configuration
//! resolution, `$VAR` expansion and structured logging setup.

pub mod config;
pub mod errors;
pub mod logging;

pub use config::{expand_env, ConfigSource, DbConf, DEFAULT_ENV};
pub use errors::{CoreError, CoreResult};
pub use logging::{init_logging, LogFormat, LoggingConfig};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get tool version
pub fn version() -> &'static str {
    VERSION
}
