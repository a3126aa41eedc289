//! Custom Axum extractors

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;

use quill_core::ValidationError;

use super::error::ApiError;
use super::server::AppState;
use crate::loaders::RequestLoaders;

/// Extract a positive integer id from the path into a typed id
pub struct PathId<T>(pub T);

impl<S, T> FromRequestParts<S> for PathId<T>
where
    S: Send + Sync,
    T: From<i64>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw): Path<String> = Path::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::Validation(invalid_id()))?;

        let id = parse_id(&raw)?;
        Ok(Self(T::from(id)))
    }
}

fn invalid_id() -> ValidationError {
    ValidationError::InvalidFormat {
        field: "id",
        reason: "expected a positive integer",
    }
}

fn parse_id(raw: &str) -> Result<i64, ValidationError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(invalid_id()),
    }
}

/// Fresh loaders for every request; never fails
impl FromRequestParts<Arc<AppState>> for RequestLoaders {
    type Rejection = Infallible;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(RequestLoaders::new(&state.pool))
    }
}
