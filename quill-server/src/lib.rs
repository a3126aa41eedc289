//! quill-server: HTTP API over users and posts
//!
//! Post authors are resolved through a request-scoped batched loader,
//! so rendering N posts costs one author query instead of N.

pub mod db;
pub mod http;
pub mod loaders;

pub use db::{create_pool, run_migrations, DbError};
pub use http::{run_server, ServerConfig};
pub use loaders::{RequestLoaders, UserFetcher, UserLoader};
pub use sqlx::PgPool;
