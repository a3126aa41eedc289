//! Repository implementations for database access
//!
//! Each repository follows these patterns:
//! - Single statement per operation where possible
//! - Soft-deleted rows are invisible to every read
//! - Unique and foreign-key violations map to typed errors

pub mod posts;
pub mod users;

pub use posts::{PostFilter, PostRepo};
pub use users::UserRepo;

use quill_core::ValidationError;

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },

    #[error("conflict: {resource} {reason}")]
    Conflict {
        resource: &'static str,
        reason: &'static str,
    },

    /// A stored value no longer parses into its domain type
    #[error("invalid stored value: {0}")]
    InvalidRow(#[from] ValidationError),
}

impl DbError {
    pub(crate) fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }
}

/// Map a unique violation to `Conflict`, anything else to `Sqlx`.
pub(crate) fn conflict_on_unique(
    err: sqlx::Error,
    resource: &'static str,
    reason: &'static str,
) -> DbError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return DbError::Conflict { resource, reason };
        }
    }
    DbError::Sqlx(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = DbError::not_found("user", 12);
        assert_eq!(err.to_string(), "not found: user '12'");
    }

    #[test]
    fn non_database_errors_are_not_conflicts() {
        let err = conflict_on_unique(sqlx::Error::RowNotFound, "user", "email already in use");
        assert!(matches!(err, DbError::Sqlx(sqlx::Error::RowNotFound)));
    }
}
