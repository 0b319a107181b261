pub mod db_conf;
pub mod env;
pub mod sources;

pub use db_conf::*;
pub use env::expand_env;
pub use sources::*;
