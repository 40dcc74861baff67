//! API endpoints.

#![allow(missing_docs)]

mod account;
mod comments;
mod following;
mod posts;
mod reviews;
mod users;

use axum::{Router, extract::multipart::Field};
use rapport_common::{AppError, AppResult};
use rapport_core::MediaUpload;
use serde::Deserialize;

use crate::middleware::AppState;

/// Cursor pagination parameters shared by the listing endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub limit: Option<u64>,
    pub until_id: Option<String>,
}

/// Read a multipart file part into an upload.
async fn media_from_field(field: Field<'_>) -> AppResult<MediaUpload> {
    let file_name = field.file_name().unwrap_or("unnamed").to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = field
        .bytes()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
        .to_vec();

    Ok(MediaUpload {
        file_name,
        content_type,
        data,
    })
}

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(account::router())
        .nest("/following", following::router())
        .nest("/users", users::router())
        .nest("/posts", posts::router())
        .nest("/comments", comments::router())
        .nest("/reviews", reviews::router())
}
