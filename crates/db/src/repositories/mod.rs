//! Repositories.
//!
//! Every write that guards an invariant (edge symmetry, like counters,
//! review uniqueness) runs as a single transaction or a single conditional
//! statement, so a caller that is cancelled mid-operation leaves the row set
//! either untouched or fully updated.

mod comment;
mod content;
mod content_like;
mod following;
mod profile_review;
mod user;

pub use comment::CommentRepository;
pub use content::{ContentQuery, ContentRepository};
pub use content_like::{ContentLikeRepository, LikeToggle};
pub use following::{EdgeCounts, FollowCounts, FollowingRepository};
pub use profile_review::{ProfileReviewRepository, RatingSummary};
pub use user::{HardDeleteReport, UserRepository};

use rapport_common::AppError;
use sea_orm::{DbErr, SqlErr};

/// `PostgreSQL` SQLSTATE codes for write races the caller may retry.
const RETRYABLE_SQLSTATES: &[&str] = &["40001", "40P01"];

/// Map a database error onto the application error space.
///
/// Unique index violations become [`AppError::Duplicate`]. Serialization
/// failures and deadlocks mean the transaction was rolled back before taking
/// effect, so they surface as [`AppError::Conflict`].
pub(crate) fn map_db_err(err: DbErr) -> AppError {
    if let Some(SqlErr::UniqueConstraintViolation(message)) = err.sql_err() {
        return AppError::Duplicate(message);
    }

    let message = err.to_string();
    if message.contains("23505") || message.contains("duplicate key value violates unique constraint")
    {
        return AppError::Duplicate(message);
    }
    if RETRYABLE_SQLSTATES.iter().any(|code| message.contains(code))
        || message.contains("could not serialize access")
        || message.contains("deadlock detected")
    {
        AppError::Conflict(message)
    } else {
        AppError::Database(message)
    }
}
