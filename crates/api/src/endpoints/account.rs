//! Account endpoints: sign-up, sign-in and the caller's own profile.

use axum::{
    Json, Router,
    extract::{Multipart, State},
    response::IntoResponse,
    routing::{get, post},
};
use rapport_common::{AppError, AppResult};
use rapport_core::{RegisterInput, SignInInput, UpdateProfileInput};
use serde::{Deserialize, Serialize};

use super::{media_from_field, users::UserResponse};
use crate::{extractors::AuthUser, middleware::AppState, response, response::ApiResponse};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/signin", post(signin))
        .route("/i", get(me).patch(update_me).delete(deactivate))
        .route("/i/avatar", post(upload_avatar).delete(delete_avatar))
}

/// Session response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: UserResponse,
    pub token: String,
}

/// Sign-in response.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

async fn signup(
    State(state): State<AppState>,
    Json(input): Json<RegisterInput>,
) -> AppResult<ApiResponse<SessionResponse>> {
    let registered = state.account_service.register(input).await?;
    Ok(ApiResponse::created(SessionResponse {
        user: registered.user.into(),
        token: registered.token,
    }))
}

async fn signin(
    State(state): State<AppState>,
    Json(input): Json<SignInInput>,
) -> AppResult<ApiResponse<TokenResponse>> {
    let token = state.account_service.sign_in(input).await?;
    Ok(ApiResponse::ok(TokenResponse { token }))
}

/// Get the caller's profile.
async fn me(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<UserResponse>> {
    let user = state.account_service.profile(&actor.id).await?;
    Ok(ApiResponse::ok(user.into()))
}

async fn update_me(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Json(input): Json<UpdateProfileInput>,
) -> AppResult<ApiResponse<UserResponse>> {
    let user = state.account_service.update_profile(&actor, input).await?;
    Ok(ApiResponse::ok(user.into()))
}

/// Replace the caller's profile photo with the multipart `file` part.
async fn upload_avatar(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<ApiResponse<UserResponse>> {
    let mut media = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() == Some("file") {
            media = Some(media_from_field(field).await?);
        }
    }

    let media = media.ok_or_else(|| AppError::BadRequest("No file provided".to_string()))?;
    let user = state.account_service.upload_avatar(&actor, media).await?;
    Ok(ApiResponse::ok(user.into()))
}

async fn delete_avatar(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<UserResponse>> {
    let user = state.account_service.delete_avatar(&actor).await?;
    Ok(ApiResponse::ok(user.into()))
}

/// Account deletion body.
#[derive(Debug, Deserialize)]
pub struct DeactivateRequest {
    pub password: String,
}

/// Soft-delete the caller's account after re-checking the password.
async fn deactivate(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<DeactivateRequest>,
) -> AppResult<impl IntoResponse> {
    state
        .account_service
        .deactivate(&actor, &req.password)
        .await?;
    Ok(response::ok())
}
