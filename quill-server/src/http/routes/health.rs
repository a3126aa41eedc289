//! Liveness and database reachability

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use sqlx::PgPool;

use crate::http::server::AppState;

/// Upper bound on the database round trip; health never waits on pool acquire.
const DB_CHECK_TIMEOUT: Duration = Duration::from_millis(500);

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    /// `"ok"` or `"unavailable"`
    pub database: &'static str,
}

async fn database_status(pool: &PgPool) -> &'static str {
    match tokio::time::timeout(DB_CHECK_TIMEOUT, sqlx::query("SELECT 1").execute(pool)).await {
        Ok(Ok(_)) => "ok",
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "health check query failed");
            "unavailable"
        }
        Err(_) => {
            tracing::warn!("health check query timed out");
            "unavailable"
        }
    }
}

/// GET /health - the process answers even when Postgres does not
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "quill",
        version: env!("CARGO_PKG_VERSION"),
        database: database_status(&state.pool).await,
    })
}

/// Health routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}
