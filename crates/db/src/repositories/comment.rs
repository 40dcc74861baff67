//! Comment repository.

use std::sync::Arc;

use crate::entities::{Comment, comment};
use crate::repositories::map_db_err;
use rapport_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};

/// Comment repository for database operations.
#[derive(Clone)]
pub struct CommentRepository {
    db: Arc<DatabaseConnection>,
}

impl CommentRepository {
    /// Create a new comment repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a comment by ID. The row carries its parent `content_id`.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<comment::Model>> {
        Comment::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// Append a comment.
    ///
    /// A content item deleted in the meantime fails the foreign key and
    /// surfaces as a database error, never as an orphan row.
    pub async fn create(&self, model: comment::ActiveModel) -> AppResult<comment::Model> {
        model.insert(self.db.as_ref()).await.map_err(map_db_err)
    }

    /// All comments of a content item in insertion order.
    pub async fn find_by_content(&self, content_id: &str) -> AppResult<Vec<comment::Model>> {
        Comment::find()
            .filter(comment::Column::ContentId.eq(content_id))
            .order_by_asc(comment::Column::CreatedAt)
            .order_by_asc(comment::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// Delete a comment by ID.
    ///
    /// Returns [`AppError::NotFound`] when no row was removed, which is also
    /// what a caller that lost a race against another delete sees.
    pub async fn delete_by_id(&self, id: &str) -> AppResult<()> {
        let result = Comment::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(map_db_err)?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Comment not found: {id}")));
        }
        Ok(())
    }

    /// Count comments on a content item.
    pub async fn count_by_content(&self, content_id: &str) -> AppResult<u64> {
        Comment::find()
            .filter(comment::Column::ContentId.eq(content_id))
            .count(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }
}
