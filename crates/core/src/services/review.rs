//! Review service: one rated review per (reviewer, profile) pair.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use rapport_common::{AppError, AppResult, ConsistencyConfig, IdGenerator};
use rapport_db::{
    entities::profile_review,
    repositories::{ProfileReviewRepository, RatingSummary, UserRepository},
};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::services::auth::Actor;
use crate::services::view::{AccountSummary, Page, next_cursor};

/// Rating and text of a review.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReviewInput {
    #[validate(range(min = 1, max = 5))]
    pub rating: i16,

    #[validate(length(min = 1, max = 2000))]
    pub comment: String,
}

impl ReviewInput {
    fn check(&self) -> AppResult<()> {
        self.validate()?;
        if self.comment.trim().is_empty() {
            return Err(AppError::Validation("Comment cannot be blank".to_string()));
        }
        Ok(())
    }
}

/// A review with its author resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    pub id: String,
    pub subject_id: String,
    pub rating: i16,
    pub comment: String,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: Option<DateTime<FixedOffset>>,
    pub reviewer: AccountSummary,
}

/// Review service for business logic.
#[derive(Clone)]
pub struct ReviewService {
    review_repo: ProfileReviewRepository,
    user_repo: UserRepository,
    config: ConsistencyConfig,
    id_gen: IdGenerator,
}

impl ReviewService {
    /// Create a new review service.
    #[must_use]
    pub const fn new(
        review_repo: ProfileReviewRepository,
        user_repo: UserRepository,
        config: ConsistencyConfig,
    ) -> Self {
        Self {
            review_repo,
            user_repo,
            config,
            id_gen: IdGenerator::new(),
        }
    }

    /// Review `subject_id` as `actor`.
    pub async fn add(
        &self,
        actor: &Actor,
        subject_id: &str,
        input: ReviewInput,
    ) -> AppResult<profile_review::Model> {
        input.check()?;

        let subject = self.user_repo.get_active_by_id(subject_id).await?;
        if subject.id == actor.id && !self.config.allow_self_review {
            return Err(AppError::SelfReference(
                "Cannot review your own profile".to_string(),
            ));
        }

        let model = profile_review::ActiveModel {
            id: Set(self.id_gen.generate()),
            reviewer_id: Set(actor.id.clone()),
            subject_id: Set(subject.id.clone()),
            rating: Set(input.rating),
            comment: Set(input.comment.trim().to_string()),
            created_at: Set(chrono::Utc::now().into()),
            updated_at: Set(None),
        };

        let review = self.review_repo.insert_unique(model).await?;

        info!(
            review_id = %review.id,
            reviewer = %actor.id,
            subject = %subject.id,
            rating = review.rating,
            "Added review"
        );
        Ok(review)
    }

    /// Rewrite a review. Only its author may.
    pub async fn edit(
        &self,
        review_id: &str,
        actor: &Actor,
        input: ReviewInput,
    ) -> AppResult<profile_review::Model> {
        input.check()?;

        let review = self.review_repo.get_by_id(review_id).await?;
        if review.reviewer_id != actor.id {
            return Err(AppError::Forbidden(
                "Only the reviewer can edit this review".to_string(),
            ));
        }

        let updated = self
            .review_repo
            .update_conditional(review_id, &actor.id, input.rating, input.comment.trim())
            .await?;

        info!(review_id = %review_id, reviewer = %actor.id, "Edited review");
        Ok(updated)
    }

    /// Delete a review as its author or an administrator.
    pub async fn delete(&self, review_id: &str, actor: &Actor) -> AppResult<()> {
        let review = self.review_repo.get_by_id(review_id).await?;
        if !actor.can_moderate(&review.reviewer_id) {
            return Err(AppError::Forbidden(
                "Only the reviewer or an administrator can delete this review".to_string(),
            ));
        }

        self.review_repo.delete(review_id).await?;

        info!(review_id = %review_id, user_id = %actor.id, "Deleted review");
        Ok(())
    }

    /// Reviews a profile received, newest first.
    ///
    /// A review by a soft-deleted account is listed under a placeholder reviewer.
    pub async fn list(
        &self,
        subject_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Page<ReviewView>> {
        self.user_repo.get_active_by_id(subject_id).await?;

        let reviews = self
            .review_repo
            .find_by_subject(subject_id, limit, until_id)
            .await?;
        let next_until_id =
            next_cursor(reviews.len(), reviews.last().map(|r| r.id.as_str()), limit);

        let reviewer_ids: Vec<String> = reviews.iter().map(|r| r.reviewer_id.clone()).collect();
        let reviewers: HashMap<_, _> = self
            .user_repo
            .find_active_by_ids(&reviewer_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        let items = reviews
            .into_iter()
            .map(|r| {
                let reviewer = reviewers
                    .get(&r.reviewer_id)
                    .map_or_else(|| AccountSummary::deleted(&r.reviewer_id), AccountSummary::from);
                ReviewView {
                    id: r.id,
                    subject_id: r.subject_id,
                    rating: r.rating,
                    comment: r.comment,
                    created_at: r.created_at,
                    updated_at: r.updated_at,
                    reviewer,
                }
            })
            .collect();

        Ok(Page {
            items,
            next_until_id,
        })
    }

    /// Count and mean rating of a profile's reviews.
    pub async fn summary(&self, subject_id: &str) -> AppResult<RatingSummary> {
        self.user_repo.get_active_by_id(subject_id).await?;
        self.review_repo.summary(subject_id).await
    }
}
