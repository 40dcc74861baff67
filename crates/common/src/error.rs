//! Error types for rapport.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // === Engagement & relationship errors ===
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Already following this user")]
    AlreadyRelated,

    #[error("Not following this user")]
    NotRelated,

    #[error("Cannot target yourself: {0}")]
    SelfReference(String),

    #[error("Comment cannot be empty")]
    EmptyText,

    #[error("You have already reviewed this user")]
    DuplicateReview,

    /// A write hit a unique index some other row already occupies.
    #[error("Already exists: {0}")]
    Duplicate(String),

    /// A conditional write lost a race; the write did not take effect.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthenticated")]
    Unauthenticated,

    // === Other client errors ===
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Upload rejected: {0}")]
    UploadRejected(String),

    // === Server Errors ===
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            // 4xx Client Errors
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::AlreadyRelated
            | Self::NotRelated
            | Self::DuplicateReview
            | Self::Duplicate(_)
            | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::SelfReference(_)
            | Self::EmptyText
            | Self::BadRequest(_)
            | Self::Validation(_)
            | Self::UploadRejected(_) => StatusCode::BAD_REQUEST,

            // 5xx Server Errors
            Self::Database(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::AlreadyRelated => "ALREADY_RELATED",
            Self::NotRelated => "NOT_RELATED",
            Self::SelfReference(_) => "SELF_REFERENCE",
            Self::EmptyText => "EMPTY_TEXT",
            Self::DuplicateReview => "DUPLICATE_REVIEW",
            Self::Duplicate(_) => "DUPLICATE",
            Self::Conflict(_) => "CONFLICT",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::UploadRejected(_) => "UPLOAD_REJECTED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Returns whether the operation may be retried as-is.
    ///
    /// Only [`AppError::Conflict`] qualifies: it is raised when the write was
    /// rejected before taking effect.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        if self.is_server_error() {
            tracing::error!(error = %self, code = code, "Server error occurred");
        } else {
            tracing::debug!(error = %self, code = code, "Client error occurred");
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

// === From implementations ===

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
