//! Post endpoints
//!
//! Every post is rendered with its author, resolved through the request's
//! `UserLoader`: one batched query per request however many posts there are.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use quill_core::models::{NewPost, Post, PostChanges, PostId, PostStatus, User, UserId};
use quill_core::{BatchFetch, BatchLoader};

use super::users::UserResponse;
use crate::db::{DbError, PostFilter, PostRepo};
use crate::http::error::ApiError;
use crate::http::extractors::PathId;
use crate::http::response::Envelope;
use crate::http::server::AppState;
use crate::loaders::{RequestLoaders, UserLoader};

/// Create post request
#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub image: String,
    pub content: String,
    pub status: Option<String>,
    pub created_by: UserId,
}

/// Update post request; omitted fields are left unchanged
#[derive(Deserialize, Default)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub image: Option<String>,
    pub content: Option<String>,
    pub status: Option<String>,
}

/// Query parameters for GET /posts
#[derive(Debug, Default, Deserialize)]
pub struct ListPostsParams {
    pub status: Option<String>,
    pub author_id: Option<i64>,
    pub limit: Option<u32>,
}

/// Post response with its author embedded
#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: PostId,
    pub title: String,
    pub subtitle: String,
    pub image: String,
    pub content: String,
    pub status: PostStatus,
    pub created_by: UserId,
    pub created_at: String,
    pub updated_at: String,
    /// `null` when the author has been deleted
    pub author: Option<UserResponse>,
}

impl PostResponse {
    fn new(p: Post, author: Option<UserResponse>) -> Self {
        Self {
            id: p.id,
            title: p.title,
            subtitle: p.subtitle,
            image: p.image,
            content: p.content,
            status: p.status,
            created_by: p.created_by,
            created_at: p.created_at.to_rfc3339(),
            updated_at: p.updated_at.to_rfc3339(),
            author,
        }
    }
}

/// Attach authors to posts with a single loader call.
pub(crate) async fn with_authors<F>(
    posts: Vec<Post>,
    users: &BatchLoader<F>,
) -> Result<Vec<PostResponse>, ApiError>
where
    F: BatchFetch<Value = User, Error = DbError>,
{
    let author_ids: Vec<UserId> = posts.iter().map(|p| p.created_by).collect();
    let authors = users.load(&author_ids).await?;

    Ok(posts
        .into_iter()
        .zip(authors)
        .map(|(post, author)| PostResponse::new(post, author.map(UserResponse::from)))
        .collect())
}

async fn with_author(post: Post, users: &UserLoader) -> Result<PostResponse, ApiError> {
    let author = users.load_one(post.created_by).await?;
    Ok(PostResponse::new(post, author.map(UserResponse::from)))
}

fn parse_status(raw: Option<&str>) -> Result<Option<PostStatus>, ApiError> {
    Ok(raw.map(|s| s.parse::<PostStatus>()).transpose()?)
}

/// GET /posts - list posts, filtered by status and author
async fn list_posts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListPostsParams>,
    loaders: RequestLoaders,
) -> Result<Envelope<Vec<PostResponse>>, ApiError> {
    let filter = PostFilter {
        status: parse_status(params.status.as_deref())?,
        author: params.author_id.map(UserId),
        limit: params.limit,
    };

    let posts = PostRepo::new(&state.pool).list(filter).await?;

    Ok(Envelope::ok(
        "Posts retrieved successfully",
        with_authors(posts, &loaders.users).await?,
    ))
}

/// POST /posts - create a post
async fn create_post(
    State(state): State<Arc<AppState>>,
    loaders: RequestLoaders,
    Json(req): Json<CreatePostRequest>,
) -> Result<Envelope<PostResponse>, ApiError> {
    let status = parse_status(req.status.as_deref())?.unwrap_or_default();

    let post = PostRepo::new(&state.pool)
        .create(NewPost {
            title: req.title,
            subtitle: req.subtitle,
            image: req.image,
            content: req.content,
            status,
            created_by: req.created_by,
        })
        .await?;

    tracing::info!(post_id = %post.id, author = %post.created_by, "post created");
    Ok(Envelope::created(
        "Post created successfully",
        with_author(post, &loaders.users).await?,
    ))
}

/// GET /posts/{id} - get a single post
async fn get_post(
    State(state): State<Arc<AppState>>,
    PathId(id): PathId<PostId>,
    loaders: RequestLoaders,
) -> Result<Envelope<PostResponse>, ApiError> {
    let post = PostRepo::new(&state.pool).get(id).await?;

    Ok(Envelope::ok(
        "Post retrieved successfully",
        with_author(post, &loaders.users).await?,
    ))
}

/// PUT /posts/{id} - update a post
async fn update_post(
    State(state): State<Arc<AppState>>,
    PathId(id): PathId<PostId>,
    loaders: RequestLoaders,
    Json(req): Json<UpdatePostRequest>,
) -> Result<Envelope<PostResponse>, ApiError> {
    let changes = PostChanges {
        title: req.title,
        subtitle: req.subtitle,
        image: req.image,
        content: req.content,
        status: parse_status(req.status.as_deref())?,
    };

    let post = PostRepo::new(&state.pool).update(id, changes).await?;

    Ok(Envelope::ok(
        "Post updated successfully",
        with_author(post, &loaders.users).await?,
    ))
}

/// DELETE /posts/{id} - soft-delete a post
async fn delete_post(
    State(state): State<Arc<AppState>>,
    PathId(id): PathId<PostId>,
) -> Result<Envelope<()>, ApiError> {
    PostRepo::new(&state.pool).delete(id).await?;

    tracing::info!(post_id = %id, "post deleted");
    Ok(Envelope::empty("Post deleted successfully"))
}

/// Post routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route(
            "/posts/{id}",
            get(get_post).put(update_post).delete(delete_post),
        )
}
