//! Migration System
//!
//! Discovery of migration files on disk, the version bookkeeping table and
//! the runner commands built on top of the executor.

pub mod definitions;
pub mod manager;
pub mod runner;
pub mod version_store;

pub use definitions::*;
pub use manager::*;
pub use runner::*;
pub use version_store::*;
