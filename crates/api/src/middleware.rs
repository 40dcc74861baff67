//! API middleware.

#![allow(missing_docs)]

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use rapport_common::AppError;
use rapport_core::{
    AccountService, Authenticator, ContentService, EngagementService, RelationshipService,
    ReviewService,
};
use tracing::debug;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub relationship_service: RelationshipService,
    pub engagement_service: EngagementService,
    pub review_service: ReviewService,
    pub content_service: ContentService,
    pub account_service: AccountService,
    pub authenticator: Arc<dyn Authenticator>,
}

/// Resolve the bearer token, if any, to an [`rapport_core::Actor`].
///
/// A missing or rejected token leaves the request anonymous; handlers that
/// need a caller reject it through [`crate::extractors::AuthUser`]. Any other
/// failure (a store error) becomes the response.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string);

    if let Some(token) = token {
        match state.authenticator.authenticate(&token).await {
            Ok(actor) => {
                req.extensions_mut().insert(actor);
            }
            Err(AppError::Unauthenticated) => debug!("Rejected bearer token"),
            Err(e) => return e.into_response(),
        }
    }

    next.run(req).await
}
