//! Relationship service: follow edges between accounts.

use std::collections::HashMap;

use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use rapport_common::{AppError, AppResult, ConsistencyConfig, IdGenerator};
use rapport_db::{
    entities::user::{self, Role},
    repositories::{EdgeCounts, FollowCounts, FollowingRepository, UserRepository},
};
use serde::Serialize;
use tracing::info;

use crate::services::auth::Actor;
use crate::services::retry::retry_on_conflict;
use crate::services::view::{AccountSummary, Page, next_cursor};

/// Which side of the edge set a listing walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Accounts following the subject.
    Followers,
    /// Accounts the subject follows.
    Following,
}

/// How two accounts relate, seen from the first one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub following: bool,
    pub followed_by: bool,
}

/// Relationship service for business logic.
#[derive(Clone)]
pub struct RelationshipService {
    following_repo: FollowingRepository,
    user_repo: UserRepository,
    config: ConsistencyConfig,
    id_gen: IdGenerator,
}

impl RelationshipService {
    /// Create a new relationship service.
    #[must_use]
    pub const fn new(
        following_repo: FollowingRepository,
        user_repo: UserRepository,
        config: ConsistencyConfig,
    ) -> Self {
        Self {
            following_repo,
            user_repo,
            config,
            id_gen: IdGenerator::new(),
        }
    }

    /// Make `actor` follow `target_id`.
    pub async fn follow(&self, actor: &Actor, target_id: &str) -> AppResult<EdgeCounts> {
        let target = self.user_repo.get_active_by_id(target_id).await?;

        if actor.id == target.id {
            return Err(AppError::SelfReference("Cannot follow yourself".to_string()));
        }
        self.check_policy(actor, &target)?;

        let edge_id = self.id_gen.generate();
        let counts = retry_on_conflict(self.config.conflict_retries, "follow", || {
            self.following_repo
                .create_edge(&edge_id, &actor.id, &target.id)
        })
        .await?;

        info!(follower = %actor.id, followee = %target.id, "Followed");
        Ok(counts)
    }

    /// Remove the edge from `actor` to `target_id`.
    ///
    /// A soft-deleted target is still resolved, so the edge stays removable.
    pub async fn unfollow(&self, actor: &Actor, target_id: &str) -> AppResult<EdgeCounts> {
        let target = self.user_repo.get_by_id(target_id).await?;

        if actor.id == target.id {
            return Err(AppError::SelfReference("Cannot unfollow yourself".to_string()));
        }

        let counts = retry_on_conflict(self.config.conflict_retries, "unfollow", || {
            self.following_repo.delete_edge(&actor.id, &target.id)
        })
        .await?;

        info!(follower = %actor.id, followee = %target.id, "Unfollowed");
        Ok(counts)
    }

    /// Accounts following `account_id`, newest edge first.
    pub async fn list_followers(
        &self,
        account_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Page<AccountSummary>> {
        self.list(Direction::Followers, account_id, limit, until_id)
            .await
    }

    /// Accounts `account_id` follows, newest edge first.
    pub async fn list_following(
        &self,
        account_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Page<AccountSummary>> {
        self.list(Direction::Following, account_id, limit, until_id)
            .await
    }

    /// One page of either listing.
    ///
    /// The cursor is the id of the last edge read, so a page stays
    /// restartable even when some of its accounts were skipped.
    pub async fn list(
        &self,
        direction: Direction,
        account_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Page<AccountSummary>> {
        self.user_repo.get_active_by_id(account_id).await?;

        let edges = match direction {
            Direction::Followers => {
                self.following_repo
                    .find_followers(account_id, limit, until_id)
                    .await?
            }
            Direction::Following => {
                self.following_repo
                    .find_following(account_id, limit, until_id)
                    .await?
            }
        };

        let other_ids: Vec<String> = edges
            .iter()
            .map(|e| match direction {
                Direction::Followers => e.follower_id.clone(),
                Direction::Following => e.followee_id.clone(),
            })
            .collect();

        let users: HashMap<String, user::Model> = self
            .user_repo
            .find_active_by_ids(&other_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        let items = other_ids
            .iter()
            .filter_map(|id| users.get(id))
            .map(AccountSummary::from)
            .collect();

        Ok(Page {
            items,
            next_until_id: next_cursor(edges.len(), edges.last().map(|e| e.id.as_str()), limit),
        })
    }

    /// Lazily walk a whole listing, one page per database round trip.
    pub fn walk(
        &self,
        direction: Direction,
        account_id: String,
        page_size: u64,
    ) -> impl Stream<Item = AppResult<AccountSummary>> + '_ {
        // State: `None` once the listing is exhausted, else the next cursor
        stream::try_unfold(Some(None::<String>), move |cursor| {
            let account_id = account_id.clone();
            async move {
                let Some(until_id) = cursor else {
                    return Ok::<_, AppError>(None);
                };
                let page = self
                    .list(direction, &account_id, page_size, until_id.as_deref())
                    .await?;
                let next = page.next_until_id.map(Some);
                Ok(Some((page.items, next)))
            }
        })
        .map_ok(|items| stream::iter(items.into_iter().map(Ok::<_, AppError>)))
        .try_flatten()
        .boxed_local()
    }

    /// How `actor` and `target_id` relate.
    pub async fn relationship(&self, actor: &Actor, target_id: &str) -> AppResult<Relation> {
        self.user_repo.get_active_by_id(target_id).await?;

        Ok(Relation {
            following: self
                .following_repo
                .is_following(&actor.id, target_id)
                .await?,
            followed_by: self
                .following_repo
                .is_following(target_id, &actor.id)
                .await?,
        })
    }

    /// Recompute an account's follow counters from its edges.
    pub async fn repair_counts(&self, account_id: &str) -> AppResult<FollowCounts> {
        self.user_repo.get_by_id(account_id).await?;

        let counts = self.following_repo.repair_counts(account_id).await?;
        info!(
            user_id = %account_id,
            followers = counts.followers_count,
            following = counts.following_count,
            "Repaired follow counters"
        );
        Ok(counts)
    }

    fn check_policy(&self, actor: &Actor, target: &user::Model) -> AppResult<()> {
        if self.config.restricted_can_follow {
            return Ok(());
        }
        if actor.role == Role::Restricted {
            return Err(AppError::Forbidden(
                "Restricted accounts cannot follow".to_string(),
            ));
        }
        if target.role == Role::Restricted {
            return Err(AppError::Forbidden(
                "Restricted accounts cannot be followed".to_string(),
            ));
        }
        Ok(())
    }
}
