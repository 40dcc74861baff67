//! Profile review endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
};
use rapport_common::AppResult;
use rapport_core::{Page, ReviewInput, ReviewView, clamp_limit};
use rapport_db::{entities::profile_review, repositories::RatingSummary};
use serde::{Deserialize, Serialize};

use super::PageQuery;
use crate::{extractors::AuthUser, middleware::AppState, response, response::ApiResponse};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(add))
        .route("/{id}", put(edit).delete(remove))
        .route("/user/{id}", get(list))
}

/// Review response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    pub id: String,
    pub reviewer_id: String,
    pub subject_id: String,
    pub rating: i16,
    pub comment: String,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<profile_review::Model> for ReviewResponse {
    fn from(r: profile_review::Model) -> Self {
        Self {
            id: r.id,
            reviewer_id: r.reviewer_id,
            subject_id: r.subject_id,
            rating: r.rating,
            comment: r.comment,
            created_at: r.created_at.to_rfc3339(),
            updated_at: r.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// New review body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddReviewRequest {
    pub user_id: String,
    pub rating: i16,
    pub comment: String,
}

async fn add(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<AddReviewRequest>,
) -> AppResult<ApiResponse<ReviewResponse>> {
    let input = ReviewInput {
        rating: req.rating,
        comment: req.comment,
    };
    let review = state
        .review_service
        .add(&actor, &req.user_id, input)
        .await?;
    Ok(ApiResponse::created(review.into()))
}

async fn edit(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<ReviewInput>,
) -> AppResult<ApiResponse<ReviewResponse>> {
    let review = state.review_service.edit(&id, &actor, input).await?;
    Ok(ApiResponse::ok(review.into()))
}

async fn remove(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    state.review_service.delete(&id, &actor).await?;
    Ok(response::ok())
}

/// Reviews of a profile with their rating summary.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewListResponse {
    pub summary: RatingSummary,
    #[serde(flatten)]
    pub page: Page<ReviewView>,
}

async fn list(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<ApiResponse<ReviewListResponse>> {
    let page = state
        .review_service
        .list(&id, clamp_limit(query.limit), query.until_id.as_deref())
        .await?;
    let summary = state.review_service.summary(&id).await?;
    Ok(ApiResponse::ok(ReviewListResponse { summary, page }))
}
