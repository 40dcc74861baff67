//! HTTP API layer for rapport.
//!
//! Thin axum handlers over the engagement and relationship services:
//!
//! - **Endpoints**: following, posts, likes, comments, reviews and accounts
//! - **Extractors**: the authenticated [`extractors::AuthUser`]
//! - **Middleware**: bearer-token resolution via the auth collaborator
//!
//! Every failure is an [`rapport_common::AppError`], rendered with its
//! status code and stable error code.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
pub use middleware::{AppState, auth_middleware};
