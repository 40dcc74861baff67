//! Comment endpoints.

use axum::{
    Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::delete,
};
use rapport_common::AppResult;

use crate::{extractors::AuthUser, middleware::AppState, response};

pub fn router() -> Router<AppState> {
    Router::new().route("/{id}", delete(delete_comment))
}

/// Delete a comment as its author or an administrator.
async fn delete_comment(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    state.engagement_service.delete_comment(&id, &actor).await?;
    Ok(response::ok())
}
