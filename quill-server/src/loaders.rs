//! Postgres-backed loaders
//!
//! `RequestLoaders` is built fresh for every request by its extractor (see
//! `http::extractors`) and handed to handlers as a parameter. Loaders cache
//! without expiry, so they must never live in `AppState`.

use async_trait::async_trait;
use sqlx::PgPool;

use quill_core::models::{User, UserId};
use quill_core::{BatchFetch, BatchLoader};

use crate::db::{DbError, UserRepo};

/// Batch user lookups against the `users` table
#[derive(Clone)]
pub struct UserFetcher {
    pool: PgPool,
}

impl UserFetcher {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BatchFetch for UserFetcher {
    type Value = User;
    type Error = DbError;

    async fn fetch_many(&self, keys: &[UserId]) -> Result<Vec<User>, DbError> {
        UserRepo::new(&self.pool).fetch_many(keys).await
    }
}

/// Memoizing, batching user loader for one request
pub type UserLoader = BatchLoader<UserFetcher>;

/// Loaders scoped to a single request
pub struct RequestLoaders {
    pub users: UserLoader,
}

impl RequestLoaders {
    /// Build empty loaders over a shared pool. Cloning a `PgPool` is cheap.
    pub fn new(pool: &PgPool) -> Self {
        Self {
            users: UserLoader::new(UserFetcher::new(pool.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sqlx::postgres::PgPoolOptions;

    fn lazy_pool() -> PgPool {
        PgPoolOptions::new()
            .connect_lazy("postgres://localhost/quill_test")
            .expect("valid url")
    }

    fn user(id: i64) -> User {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        User {
            id: UserId(id),
            name: format!("user-{}", id),
            email: format!("user-{}@example.com", id),
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn primed_users_resolve_without_database() {
        let loaders = RequestLoaders::new(&lazy_pool());
        assert!(loaders.users.prime(user(1)).await);

        let found = loaders.users.load(&[UserId(1), UserId(1)]).await.unwrap();
        assert_eq!(found, vec![Some(user(1)), Some(user(1))]);
        assert_eq!(loaders.users.resolved_count().await, 1);
    }

    #[tokio::test]
    async fn each_request_gets_an_empty_cache() {
        let pool = lazy_pool();
        let first = RequestLoaders::new(&pool);
        first.users.prime(user(1)).await;

        let second = RequestLoaders::new(&pool);
        assert_eq!(first.users.resolved_count().await, 1);
        assert_eq!(second.users.resolved_count().await, 0);
    }
}
