//! Engagement service: likes and comments on content items.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, FixedOffset};
use rapport_common::{AppError, AppResult, ConsistencyConfig, IdGenerator};
use rapport_db::{
    entities::{comment, user},
    repositories::{
        CommentRepository, ContentLikeRepository, ContentRepository, LikeToggle, UserRepository,
    },
};
use sea_orm::Set;
use serde::Serialize;
use tracing::{debug, info};

use crate::services::auth::Actor;
use crate::services::retry::retry_on_conflict;
use crate::services::view::{AccountSummary, Page, next_cursor};

/// A comment with its author resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: String,
    pub content_id: String,
    pub text: String,
    pub created_at: DateTime<FixedOffset>,
    pub author: AccountSummary,
}

/// Engagement figures shown alongside a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentEngagement {
    pub comments_count: u64,
    /// Only known when the request is authenticated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liked_by_me: Option<bool>,
}

/// Engagement service for business logic.
#[derive(Clone)]
pub struct EngagementService {
    content_repo: ContentRepository,
    like_repo: ContentLikeRepository,
    comment_repo: CommentRepository,
    user_repo: UserRepository,
    config: ConsistencyConfig,
    id_gen: IdGenerator,
}

impl EngagementService {
    /// Create a new engagement service.
    #[must_use]
    pub const fn new(
        content_repo: ContentRepository,
        like_repo: ContentLikeRepository,
        comment_repo: CommentRepository,
        user_repo: UserRepository,
        config: ConsistencyConfig,
    ) -> Self {
        Self {
            content_repo,
            like_repo,
            comment_repo,
            user_repo,
            config,
            id_gen: IdGenerator::new(),
        }
    }

    /// Like the item if `actor` does not like it yet, otherwise take the like back.
    pub async fn toggle_like(&self, content_id: &str, actor: &Actor) -> AppResult<LikeToggle> {
        let like_id = self.id_gen.generate();
        let toggle = retry_on_conflict(self.config.conflict_retries, "toggle_like", || {
            self.like_repo.toggle(&like_id, content_id, &actor.id)
        })
        .await?;

        debug!(
            content_id = %content_id,
            user_id = %actor.id,
            liked = toggle.liked,
            likes_count = toggle.likes_count,
            "Toggled like"
        );
        Ok(toggle)
    }

    /// Comment count of an item and whether `viewer` likes it.
    pub async fn engagement(
        &self,
        content_id: &str,
        viewer: Option<&Actor>,
    ) -> AppResult<ContentEngagement> {
        let comments_count = self.comment_repo.count_by_content(content_id).await?;
        let liked_by_me = match viewer {
            Some(actor) => Some(self.like_repo.has_liked(content_id, &actor.id).await?),
            None => None,
        };

        Ok(ContentEngagement {
            comments_count,
            liked_by_me,
        })
    }

    /// Recompute an item's `likes_count` from its like set. Administrators only.
    pub async fn repair_likes(&self, content_id: &str, actor: &Actor) -> AppResult<i32> {
        if !actor.role.is_admin() {
            return Err(AppError::Forbidden(
                "Only administrators can repair counters".to_string(),
            ));
        }

        let before = self.content_repo.get_by_id(content_id).await?.likes_count;
        let likes_count = self.like_repo.repair_count(content_id).await?;
        if before != likes_count {
            info!(
                content_id = %content_id,
                before,
                after = likes_count,
                "Repaired likes count"
            );
        }
        Ok(likes_count)
    }

    /// Accounts that like an item, most recent like first.
    pub async fn likers(
        &self,
        content_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Page<AccountSummary>> {
        self.content_repo.get_by_id(content_id).await?;

        let likes = self
            .like_repo
            .find_by_content(content_id, limit, until_id)
            .await?;
        let user_ids: Vec<String> = likes.iter().map(|l| l.user_id.clone()).collect();
        let users = self.resolve(&user_ids).await?;

        Ok(Page {
            items: user_ids
                .iter()
                .filter_map(|id| users.get(id))
                .map(AccountSummary::from)
                .collect(),
            next_until_id: next_cursor(likes.len(), likes.last().map(|l| l.id.as_str()), limit),
        })
    }

    /// Append a comment and return the item's whole comment sequence.
    pub async fn add_comment(
        &self,
        content_id: &str,
        actor: &Actor,
        text: &str,
    ) -> AppResult<Vec<CommentView>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::EmptyText);
        }

        self.content_repo.get_by_id(content_id).await?;

        let model = comment::ActiveModel {
            id: Set(self.id_gen.generate()),
            content_id: Set(content_id.to_string()),
            user_id: Set(actor.id.clone()),
            text: Set(text.to_string()),
            created_at: Set(chrono::Utc::now().into()),
        };

        let created = match self.comment_repo.create(model).await {
            Ok(created) => created,
            Err(err) => {
                // The item may have been deleted between the check and the insert
                if self.content_repo.find_by_id(content_id).await?.is_none() {
                    return Err(AppError::NotFound(format!("Content not found: {content_id}")));
                }
                return Err(err);
            }
        };

        info!(
            comment_id = %created.id,
            content_id = %content_id,
            user_id = %actor.id,
            "Added comment"
        );

        self.get_comments(content_id).await
    }

    /// Delete a comment as its author or an administrator.
    pub async fn delete_comment(&self, comment_id: &str, actor: &Actor) -> AppResult<()> {
        let comment = self
            .comment_repo
            .find_by_id(comment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Comment not found: {comment_id}")))?;

        if !actor.can_moderate(&comment.user_id) {
            return Err(AppError::Forbidden(
                "Only the author or an administrator can delete this comment".to_string(),
            ));
        }

        self.comment_repo.delete_by_id(comment_id).await?;

        info!(
            comment_id = %comment_id,
            content_id = %comment.content_id,
            user_id = %actor.id,
            "Deleted comment"
        );
        Ok(())
    }

    /// Comments of an item in insertion order.
    ///
    /// A comment whose author is soft-deleted keeps its place under a placeholder author.
    pub async fn get_comments(&self, content_id: &str) -> AppResult<Vec<CommentView>> {
        self.content_repo.get_by_id(content_id).await?;

        let comments = self.comment_repo.find_by_content(content_id).await?;
        let author_ids: Vec<String> = comments
            .iter()
            .map(|c| c.user_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let authors = self.resolve(&author_ids).await?;

        Ok(comments
            .into_iter()
            .map(|c| {
                let author = authors
                    .get(&c.user_id)
                    .map_or_else(|| AccountSummary::deleted(&c.user_id), AccountSummary::from);
                CommentView {
                    id: c.id,
                    content_id: c.content_id,
                    text: c.text,
                    created_at: c.created_at,
                    author,
                }
            })
            .collect())
    }

    async fn resolve(&self, ids: &[String]) -> AppResult<HashMap<String, user::Model>> {
        Ok(self
            .user_repo
            .find_active_by_ids(ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect())
    }
}
