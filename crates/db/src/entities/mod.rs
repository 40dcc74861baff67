//! Database entities.

#![allow(missing_docs)]

pub mod comment;
pub mod content;
pub mod content_like;
pub mod following;
pub mod profile_review;
pub mod user;

pub use comment::Entity as Comment;
pub use content::Entity as Content;
pub use content_like::Entity as ContentLike;
pub use following::Entity as Following;
pub use profile_review::Entity as ProfileReview;
pub use user::Entity as User;
