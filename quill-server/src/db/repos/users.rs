//! User repository
//!
//! CRUD plus `fetch_many`, the batched lookup behind the author loader.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use quill_core::models::{NewUser, User, UserChanges, UserId};

use super::{conflict_on_unique, DbError};

const EMAIL_TAKEN: &str = "email already in use";

/// User record from database
#[derive(Debug, Clone, FromRow)]
struct UserRecord {
    id: i64,
    name: String,
    email: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRecord> for User {
    fn from(r: UserRecord) -> Self {
        Self {
            id: UserId(r.id),
            name: r.name,
            email: r.email,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// User repository
pub struct UserRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a user. A live user with the same email is a conflict.
    pub async fn create(&self, new: NewUser) -> Result<User, DbError> {
        let record: UserRecord = sqlx::query_as(
            r#"
            INSERT INTO users (name, email)
            VALUES ($1, $2)
            RETURNING id, name, email, created_at, updated_at
            "#,
        )
        .bind(&new.name)
        .bind(&new.email)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "user", EMAIL_TAKEN))?;

        Ok(record.into())
    }

    /// List live users in id order, optionally capped at `limit`.
    pub async fn list(&self, limit: Option<u32>) -> Result<Vec<User>, DbError> {
        let records: Vec<UserRecord> = sqlx::query_as(
            r#"
            SELECT id, name, email, created_at, updated_at
            FROM users
            WHERE deleted_at IS NULL
            ORDER BY id
            LIMIT $1
            "#,
        )
        .bind(limit.map(i64::from))
        .fetch_all(self.pool)
        .await?;

        Ok(records.into_iter().map(User::from).collect())
    }

    /// Get a single live user.
    pub async fn get(&self, id: UserId) -> Result<User, DbError> {
        let record: UserRecord = sqlx::query_as(
            r#"
            SELECT id, name, email, created_at, updated_at
            FROM users
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id.get())
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("user", id))?;

        Ok(record.into())
    }

    /// Apply a partial update; unset fields keep their value.
    pub async fn update(&self, id: UserId, changes: UserChanges) -> Result<User, DbError> {
        let record: UserRecord = sqlx::query_as(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING id, name, email, created_at, updated_at
            "#,
        )
        .bind(id.get())
        .bind(changes.name.as_deref())
        .bind(changes.email.as_deref())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "user", EMAIL_TAKEN))?
        .ok_or_else(|| DbError::not_found("user", id))?;

        Ok(record.into())
    }

    /// Soft-delete a user. Their posts stay, but resolve to no author.
    pub async fn delete(&self, id: UserId) -> Result<(), DbError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET deleted_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id.get())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("user", id));
        }
        Ok(())
    }

    /// Fetch every live user among `ids` in one query.
    ///
    /// Missing or deleted ids are simply absent from the result, and rows
    /// come back in no particular order.
    pub async fn fetch_many(&self, ids: &[UserId]) -> Result<Vec<User>, DbError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let raw: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let records: Vec<UserRecord> = sqlx::query_as(
            r#"
            SELECT id, name, email, created_at, updated_at
            FROM users
            WHERE id = ANY($1) AND deleted_at IS NULL
            "#,
        )
        .bind(raw)
        .fetch_all(self.pool)
        .await?;

        tracing::debug!(requested = ids.len(), found = records.len(), "fetched users");
        Ok(records.into_iter().map(User::from).collect())
    }
}
