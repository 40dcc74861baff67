//! Profile review repository.

use std::sync::Arc;

use crate::entities::{ProfileReview, profile_review};
use crate::repositories::map_db_err;
use rapport_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, QueryFilter, QueryOrder,
    QuerySelect, Select,
    sea_query::{Expr, OnConflict},
};
use serde::Serialize;

/// Aggregate of the reviews a profile received.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    pub count: u64,
    pub average: f64,
}

#[derive(Debug, FromQueryResult)]
struct RatingRow {
    count: i64,
    average: f64,
}

/// Profile review repository for database operations.
#[derive(Clone)]
pub struct ProfileReviewRepository {
    db: Arc<DatabaseConnection>,
}

impl ProfileReviewRepository {
    /// Create a new profile review repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a review by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<profile_review::Model>> {
        ProfileReview::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// Find a review by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<profile_review::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Review not found: {id}")))
    }

    /// Insert a review unless the reviewer already reviewed the subject.
    ///
    /// The unique `(reviewer_id, subject_id)` index decides the race: of two
    /// concurrent inserts exactly one affects a row, the other gets
    /// [`AppError::DuplicateReview`].
    pub async fn insert_unique(
        &self,
        model: profile_review::ActiveModel,
    ) -> AppResult<profile_review::Model> {
        let id = match &model.id {
            sea_orm::ActiveValue::Set(id) | sea_orm::ActiveValue::Unchanged(id) => id.clone(),
            sea_orm::ActiveValue::NotSet => {
                return Err(AppError::Internal("review id not set".to_string()));
            }
        };

        let inserted = ProfileReview::insert(model)
            .on_conflict(
                OnConflict::columns([
                    profile_review::Column::ReviewerId,
                    profile_review::Column::SubjectId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(map_db_err)?;

        if inserted == 0 {
            return Err(AppError::DuplicateReview);
        }

        self.get_by_id(&id).await
    }

    /// Rewrite rating and comment, guarded on the original reviewer.
    pub async fn update_conditional(
        &self,
        id: &str,
        reviewer_id: &str,
        rating: i16,
        comment: &str,
    ) -> AppResult<profile_review::Model> {
        let result = ProfileReview::update_many()
            .col_expr(profile_review::Column::Rating, Expr::value(rating))
            .col_expr(profile_review::Column::Comment, Expr::value(comment))
            .col_expr(
                profile_review::Column::UpdatedAt,
                Expr::value(chrono::Utc::now().fixed_offset()),
            )
            .filter(profile_review::Column::Id.eq(id))
            .filter(profile_review::Column::ReviewerId.eq(reviewer_id))
            .exec(self.db.as_ref())
            .await
            .map_err(map_db_err)?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Review not found: {id}")));
        }

        self.get_by_id(id).await
    }

    /// Delete a review by ID.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let result = ProfileReview::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(map_db_err)?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Review not found: {id}")));
        }
        Ok(())
    }

    /// Reviews a profile received (paginated, newest first).
    pub async fn find_by_subject(
        &self,
        subject_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<profile_review::Model>> {
        subject_page_query(subject_id, until_id)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// Count and mean rating of the reviews a profile received.
    pub async fn summary(&self, subject_id: &str) -> AppResult<RatingSummary> {
        let row = ProfileReview::find()
            .select_only()
            .column_as(Expr::cust("COUNT(*)"), "count")
            .column_as(
                Expr::cust("COALESCE(AVG(\"rating\"), 0)::float8"),
                "average",
            )
            .filter(profile_review::Column::SubjectId.eq(subject_id))
            .into_model::<RatingRow>()
            .one(self.db.as_ref())
            .await
            .map_err(map_db_err)?;

        Ok(row.map_or(
            RatingSummary {
                count: 0,
                average: 0.0,
            },
            |r| RatingSummary {
                count: r.count.max(0) as u64,
                average: r.average,
            },
        ))
    }
}

/// Reviews of a subject below the `until_id` cursor, newest first.
///
/// Ids are monotonic, so id order is creation order and the cursor column is
/// the sort column.
fn subject_page_query(subject_id: &str, until_id: Option<&str>) -> Select<ProfileReview> {
    let mut query = ProfileReview::find()
        .filter(profile_review::Column::SubjectId.eq(subject_id))
        .order_by_desc(profile_review::Column::Id);

    if let Some(id) = until_id {
        query = query.filter(profile_review::Column::Id.lt(id));
    }
    query
}
