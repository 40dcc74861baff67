//! Request authentication.
//!
//! The HTTP layer only ever sees an [`Actor`]. How a bearer token maps to an
//! account is up to the [`Authenticator`] in use.

use async_trait::async_trait;
use rapport_common::{AppError, AppResult};
use rapport_db::{entities::user::Role, repositories::UserRepository};
use serde::Serialize;

/// The authenticated caller of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    /// Whether this actor may act on resources owned by `owner_id`.
    #[must_use]
    pub fn can_moderate(&self, owner_id: &str) -> bool {
        self.id == owner_id || self.role.is_admin()
    }
}

/// Resolves bearer tokens to actors.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Resolve a token, or fail with [`AppError::Unauthenticated`].
    async fn authenticate(&self, token: &str) -> AppResult<Actor>;
}

/// Looks tokens up in the account table.
#[derive(Clone)]
pub struct TokenAuthenticator {
    user_repo: UserRepository,
}

impl TokenAuthenticator {
    #[must_use]
    pub const fn new(user_repo: UserRepository) -> Self {
        Self { user_repo }
    }
}

#[async_trait]
impl Authenticator for TokenAuthenticator {
    async fn authenticate(&self, token: &str) -> AppResult<Actor> {
        if token.is_empty() {
            return Err(AppError::Unauthenticated);
        }

        match self.user_repo.find_by_token(token).await? {
            Some(user) if !user.is_deleted() => Ok(Actor {
                id: user.id,
                role: user.role,
            }),
            _ => Err(AppError::Unauthenticated),
        }
    }
}
