//! Business logic services.

#![allow(missing_docs)]

pub mod account;
pub mod auth;
pub mod content;
pub mod engagement;
pub mod relationship;
pub mod retry;
pub mod review;
pub mod view;

pub use account::{AccountService, RegisterInput, RegisteredAccount, SignInInput, UpdateProfileInput};
pub use auth::{Actor, Authenticator, TokenAuthenticator};
pub use content::{ContentService, CreateContentInput, MediaUpload, UpdateContentInput};
pub use engagement::{CommentView, ContentEngagement, EngagementService};
pub use relationship::{Direction, Relation, RelationshipService};
pub use retry::retry_on_conflict;
pub use review::{ReviewInput, ReviewService, ReviewView};
pub use view::{AccountSummary, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT, Page, clamp_limit};

#[cfg(test)]
pub(crate) mod test_support;
