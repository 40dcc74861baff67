//! Following endpoints.

use axum::{Json, Router, extract::State, routing::post};
use rapport_common::AppResult;
use rapport_db::repositories::EdgeCounts;
use serde::Deserialize;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(follow))
        .route("/delete", post(unfollow))
}

/// Follow request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowRequest {
    pub user_id: String,
}

/// Follow a user.
async fn follow(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<FollowRequest>,
) -> AppResult<ApiResponse<EdgeCounts>> {
    let counts = state
        .relationship_service
        .follow(&actor, &req.user_id)
        .await?;
    Ok(ApiResponse::ok(counts))
}

/// Unfollow a user.
async fn unfollow(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<FollowRequest>,
) -> AppResult<ApiResponse<EdgeCounts>> {
    let counts = state
        .relationship_service
        .unfollow(&actor, &req.user_id)
        .await?;
    Ok(ApiResponse::ok(counts))
}
