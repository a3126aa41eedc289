//! User endpoints

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use quill_core::models::{NewUser, User, UserChanges, UserId};

use super::posts::{with_authors, PostResponse};
use super::LimitParams;
use crate::db::{PostFilter, PostRepo, UserRepo};
use crate::http::error::ApiError;
use crate::http::extractors::PathId;
use crate::http::response::Envelope;
use crate::http::server::AppState;
use crate::loaders::RequestLoaders;

/// Create user request
#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
}

/// Update user request; omitted fields are left unchanged
#[derive(Deserialize, Default)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// User response
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            created_at: u.created_at.to_rfc3339(),
            updated_at: u.updated_at.to_rfc3339(),
        }
    }
}

/// GET /users - list users
async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitParams>,
) -> Result<Envelope<Vec<UserResponse>>, ApiError> {
    let users = UserRepo::new(&state.pool).list(params.limit).await?;

    Ok(Envelope::ok(
        "Users retrieved successfully",
        users.into_iter().map(UserResponse::from).collect(),
    ))
}

/// POST /users - create a user
async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<Envelope<UserResponse>, ApiError> {
    let user = UserRepo::new(&state.pool)
        .create(NewUser {
            name: req.name,
            email: req.email,
        })
        .await?;

    tracing::info!(user_id = %user.id, "user created");
    Ok(Envelope::created("User created successfully", user.into()))
}

/// GET /users/{id} - get a single user
async fn get_user(
    State(state): State<Arc<AppState>>,
    PathId(id): PathId<UserId>,
) -> Result<Envelope<UserResponse>, ApiError> {
    let user = UserRepo::new(&state.pool).get(id).await?;
    Ok(Envelope::ok("User retrieved successfully", user.into()))
}

/// PUT /users/{id} - update a user
async fn update_user(
    State(state): State<Arc<AppState>>,
    PathId(id): PathId<UserId>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Envelope<UserResponse>, ApiError> {
    let changes = UserChanges {
        name: req.name,
        email: req.email,
    };

    let repo = UserRepo::new(&state.pool);
    let user = if changes.is_empty() {
        repo.get(id).await?
    } else {
        repo.update(id, changes).await?
    };

    Ok(Envelope::ok("User updated successfully", user.into()))
}

/// DELETE /users/{id} - soft-delete a user
async fn delete_user(
    State(state): State<Arc<AppState>>,
    PathId(id): PathId<UserId>,
) -> Result<Envelope<()>, ApiError> {
    UserRepo::new(&state.pool).delete(id).await?;

    tracing::info!(user_id = %id, "user deleted");
    Ok(Envelope::empty("User deleted successfully"))
}

/// GET /users/{id}/posts - posts written by a user
async fn list_user_posts(
    State(state): State<Arc<AppState>>,
    PathId(id): PathId<UserId>,
    Query(params): Query<LimitParams>,
    loaders: RequestLoaders,
) -> Result<Envelope<Vec<PostResponse>>, ApiError> {
    let user = UserRepo::new(&state.pool).get(id).await?;
    // Every post shares this author; prime so rendering costs no extra query
    loaders.users.prime(user).await;

    let posts = PostRepo::new(&state.pool)
        .list(PostFilter {
            author: Some(id),
            limit: params.limit,
            ..PostFilter::default()
        })
        .await?;

    Ok(Envelope::ok(
        "Posts retrieved successfully",
        with_authors(posts, &loaders.users).await?,
    ))
}

/// User routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/users/{id}/posts", get(list_user_posts))
}
