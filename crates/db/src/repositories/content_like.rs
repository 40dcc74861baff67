//! Content like repository.

use std::sync::Arc;

use crate::entities::{Content, ContentLike, content, content_like};
use crate::repositories::map_db_err;
use rapport_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
    sea_query::{Expr, OnConflict},
};
use serde::Serialize;

/// Outcome of a like toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeToggle {
    /// Whether the actor likes the item after the toggle.
    pub liked: bool,
    /// `|likes|` after the toggle.
    pub likes_count: i32,
}

/// Content like repository for database operations.
#[derive(Clone)]
pub struct ContentLikeRepository {
    db: Arc<DatabaseConnection>,
}

impl ContentLikeRepository {
    /// Create a new content like repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Flip membership of `user_id` in the like set of `content_id`.
    ///
    /// The content row is locked for the whole transaction, so two toggles on
    /// the same item apply one after the other and `likes_count` always
    /// equals the size of the like set at commit.
    pub async fn toggle(&self, id: &str, content_id: &str, user_id: &str) -> AppResult<LikeToggle> {
        let txn = self.db.begin().await.map_err(map_db_err)?;

        let locked = Content::find_by_id(content_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(map_db_err)?;
        if locked.is_none() {
            return Err(AppError::NotFound(format!("Content not found: {content_id}")));
        }

        let removed = ContentLike::delete_many()
            .filter(content_like::Column::ContentId.eq(content_id))
            .filter(content_like::Column::UserId.eq(user_id))
            .exec(&txn)
            .await
            .map_err(map_db_err)?;

        let liked = if removed.rows_affected > 0 {
            false
        } else {
            let model = content_like::ActiveModel {
                id: Set(id.to_string()),
                content_id: Set(content_id.to_string()),
                user_id: Set(user_id.to_string()),
                created_at: Set(chrono::Utc::now().into()),
            };

            let inserted = ContentLike::insert(model)
                .on_conflict(
                    OnConflict::columns([
                        content_like::Column::ContentId,
                        content_like::Column::UserId,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(&txn)
                .await
                .map_err(map_db_err)?;

            if inserted == 0 {
                return Err(AppError::Conflict(format!(
                    "Like on {content_id} changed concurrently"
                )));
            }
            true
        };

        let likes_count = recompute_likes_count(&txn, content_id)
            .await
            .map_err(map_db_err)?;

        txn.commit().await.map_err(map_db_err)?;

        Ok(LikeToggle { liked, likes_count })
    }

    /// Check whether a user likes a content item.
    pub async fn has_liked(&self, content_id: &str, user_id: &str) -> AppResult<bool> {
        let found = ContentLike::find()
            .filter(content_like::Column::ContentId.eq(content_id))
            .filter(content_like::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await
            .map_err(map_db_err)?;
        Ok(found.is_some())
    }

    /// Likes on a content item (paginated, newest first).
    pub async fn find_by_content(
        &self,
        content_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<content_like::Model>> {
        let mut query = ContentLike::find()
            .filter(content_like::Column::ContentId.eq(content_id))
            .order_by_desc(content_like::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(content_like::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// Recompute `likes_count` of a content item from its like set.
    pub async fn repair_count(&self, content_id: &str) -> AppResult<i32> {
        recompute_likes_count(self.db.as_ref(), content_id)
            .await
            .map_err(map_db_err)
    }
}

/// Set `likes_count` from the like table.
pub(crate) async fn recompute_likes_count<C: ConnectionTrait>(
    conn: &C,
    content_id: &str,
) -> Result<i32, DbErr> {
    let count = ContentLike::find()
        .filter(content_like::Column::ContentId.eq(content_id))
        .count(conn)
        .await? as i32;

    Content::update_many()
        .col_expr(content::Column::LikesCount, Expr::value(count))
        .filter(content::Column::Id.eq(content_id))
        .exec(conn)
        .await?;

    Ok(count)
}
