//! Request extractors.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use rapport_common::AppError;
use rapport_core::Actor;

/// Authenticated caller extractor.
///
/// The actor is placed in the request extensions by
/// [`crate::middleware::auth_middleware`]; without one the request is
/// rejected with [`AppError::Unauthenticated`].
#[derive(Debug, Clone)]
pub struct AuthUser(pub Actor);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Actor>()
            .cloned()
            .map(AuthUser)
            .ok_or(AppError::Unauthenticated)
    }
}

/// Optional caller extractor for routes anonymous readers may also use.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<Actor>);

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Actor>().cloned()))
    }
}
