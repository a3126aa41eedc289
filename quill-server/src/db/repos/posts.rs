//! Post repository
//!
//! Posts reference their author by id only; callers resolve authors through
//! the request's user loader rather than a join.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use quill_core::models::{NewPost, Post, PostChanges, PostId, PostStatus, UserId};

use super::DbError;

/// Post record from database
#[derive(Debug, Clone, FromRow)]
struct PostRecord {
    id: i64,
    title: String,
    subtitle: String,
    image: String,
    content: String,
    status: String,
    created_by: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PostRecord> for Post {
    type Error = DbError;

    fn try_from(r: PostRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: PostId(r.id),
            title: r.title,
            subtitle: r.subtitle,
            image: r.image,
            content: r.content,
            status: r.status.parse()?,
            created_by: UserId(r.created_by),
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

fn into_posts(records: Vec<PostRecord>) -> Result<Vec<Post>, DbError> {
    records.into_iter().map(Post::try_from).collect()
}

/// Filters for listing posts; `None` means "any"
#[derive(Debug, Clone, Copy, Default)]
pub struct PostFilter {
    pub status: Option<PostStatus>,
    pub author: Option<UserId>,
    pub limit: Option<u32>,
}

/// Post repository
pub struct PostRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> PostRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a post for a live author.
    ///
    /// The author check and insert are one statement: if the author does not
    /// exist (or is deleted) nothing is inserted and `NotFound` is returned.
    pub async fn create(&self, new: NewPost) -> Result<Post, DbError> {
        let record: PostRecord = sqlx::query_as(
            r#"
            INSERT INTO posts (title, subtitle, image, content, status, created_by)
            SELECT $1, $2, $3, $4, $5, u.id
            FROM users u
            WHERE u.id = $6 AND u.deleted_at IS NULL
            RETURNING id, title, subtitle, image, content, status, created_by,
                      created_at, updated_at
            "#,
        )
        .bind(&new.title)
        .bind(&new.subtitle)
        .bind(&new.image)
        .bind(&new.content)
        .bind(new.status.as_str())
        .bind(new.created_by.get())
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("user", new.created_by))?;

        record.try_into()
    }

    /// List live posts matching `filter`, newest id last.
    pub async fn list(&self, filter: PostFilter) -> Result<Vec<Post>, DbError> {
        let records: Vec<PostRecord> = sqlx::query_as(
            r#"
            SELECT id, title, subtitle, image, content, status, created_by,
                   created_at, updated_at
            FROM posts
            WHERE deleted_at IS NULL
              AND ($1::text IS NULL OR status = $1)
              AND ($2::bigint IS NULL OR created_by = $2)
            ORDER BY id
            LIMIT $3
            "#,
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.author.map(UserId::get))
        .bind(filter.limit.map(i64::from))
        .fetch_all(self.pool)
        .await?;

        into_posts(records)
    }

    /// Get a single live post.
    pub async fn get(&self, id: PostId) -> Result<Post, DbError> {
        let record: PostRecord = sqlx::query_as(
            r#"
            SELECT id, title, subtitle, image, content, status, created_by,
                   created_at, updated_at
            FROM posts
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id.get())
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("post", id))?;

        record.try_into()
    }

    /// Apply a partial update; unset fields keep their value.
    pub async fn update(&self, id: PostId, changes: PostChanges) -> Result<Post, DbError> {
        let record: PostRecord = sqlx::query_as(
            r#"
            UPDATE posts
            SET title = COALESCE($2, title),
                subtitle = COALESCE($3, subtitle),
                image = COALESCE($4, image),
                content = COALESCE($5, content),
                status = COALESCE($6, status),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING id, title, subtitle, image, content, status, created_by,
                      created_at, updated_at
            "#,
        )
        .bind(id.get())
        .bind(changes.title.as_deref())
        .bind(changes.subtitle.as_deref())
        .bind(changes.image.as_deref())
        .bind(changes.content.as_deref())
        .bind(changes.status.map(|s| s.as_str()))
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("post", id))?;

        record.try_into()
    }

    /// Soft-delete a post.
    pub async fn delete(&self, id: PostId) -> Result<(), DbError> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET deleted_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id.get())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("post", id));
        }
        Ok(())
    }
}
