//! Users endpoints.

use axum::{
    Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use rapport_common::{AppError, AppResult};
use rapport_core::{AccountSummary, Page, Relation, clamp_limit};
use rapport_db::{
    entities::user,
    repositories::{FollowCounts, HardDeleteReport},
};
use serde::{Deserialize, Serialize};

use super::PageQuery;
use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/search", get(search))
        .route("/{id}", get(show).delete(purge))
        .route("/{id}/followers", get(followers))
        .route("/{id}/following", get(following))
        .route("/{id}/relation", get(relation))
        .route("/{id}/repair-counts", post(repair_counts))
}

/// Public profile response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub created_at: String,
    pub username: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub state: Option<String>,
    pub job: Option<String>,
    pub district: Option<String>,
    pub office: Option<String>,
    pub office_place: Option<String>,
    pub is_verified: bool,
    pub followers_count: i32,
    pub following_count: i32,
}

impl From<user::Model> for UserResponse {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            created_at: user.created_at.to_rfc3339(),
            username: user.username,
            name: user.name,
            avatar_url: user.avatar_url,
            state: user.state,
            job: user.job,
            district: user.district,
            office: user.office,
            office_place: user.office_place,
            is_verified: user.is_verified,
            followers_count: user.followers_count,
            following_count: user.following_count,
        }
    }
}

/// Show a live account's profile.
async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<UserResponse>> {
    let user = state.account_service.profile(&id).await?;
    Ok(ApiResponse::ok(user.into()))
}

/// Search query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: u64,
}

/// Search accounts by handle or display name.
async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<ApiResponse<Vec<AccountSummary>>> {
    let users = state
        .account_service
        .search(&query.query, clamp_limit(query.limit), query.offset)
        .await?;
    Ok(ApiResponse::ok(users))
}

/// Accounts following a user.
async fn followers(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<ApiResponse<Page<AccountSummary>>> {
    let page = state
        .relationship_service
        .list_followers(&id, clamp_limit(query.limit), query.until_id.as_deref())
        .await?;
    Ok(ApiResponse::ok(page))
}

/// Accounts a user follows.
async fn following(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<ApiResponse<Page<AccountSummary>>> {
    let page = state
        .relationship_service
        .list_following(&id, clamp_limit(query.limit), query.until_id.as_deref())
        .await?;
    Ok(ApiResponse::ok(page))
}

/// How the caller relates to a user.
async fn relation(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Relation>> {
    let relation = state.relationship_service.relationship(&actor, &id).await?;
    Ok(ApiResponse::ok(relation))
}

/// Recompute a user's follow counters from the edge set.
async fn repair_counts(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<FollowCounts>> {
    if !actor.role.is_admin() {
        return Err(AppError::Forbidden(
            "Only administrators can repair counters".to_string(),
        ));
    }

    let counts = state.relationship_service.repair_counts(&id).await?;
    Ok(ApiResponse::ok(counts))
}

/// Hard-delete an account and everything it owns.
async fn purge(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<HardDeleteReport>> {
    let report = state.account_service.purge(&actor, &id).await?;
    Ok(ApiResponse::ok(report))
}
