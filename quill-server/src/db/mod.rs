//! Database layer - connection pool, bootstrap DDL and repositories
//!
//! - Connection pool, never a global handle
//! - Reads skip soft-deleted rows
//! - Rely on DB constraints and map violations, no check-then-insert

pub mod migrations;
pub mod pool;
pub mod repos;

pub use migrations::run as run_migrations;
pub use pool::{create_pool, create_pool_with_options};
pub use repos::*;
