//! Content repository.

use std::sync::Arc;

use crate::entities::{Content, content, content::ContentKind};
use crate::repositories::map_db_err;
use rapport_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect,
};

/// Filter for content listings.
#[derive(Debug, Clone, Default)]
pub struct ContentQuery {
    pub kind: Option<ContentKind>,
    pub user_id: Option<String>,
    pub limit: u64,
    pub offset: u64,
}

/// Content repository for database operations.
#[derive(Clone)]
pub struct ContentRepository {
    db: Arc<DatabaseConnection>,
}

impl ContentRepository {
    /// Create a new content repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a content item by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<content::Model>> {
        Content::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// Find a content item by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<content::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Content not found: {id}")))
    }

    /// Create a new content item.
    pub async fn create(&self, model: content::ActiveModel) -> AppResult<content::Model> {
        model.insert(self.db.as_ref()).await.map_err(map_db_err)
    }

    /// Update a content item.
    pub async fn update(&self, model: content::ActiveModel) -> AppResult<content::Model> {
        model.update(self.db.as_ref()).await.map_err(map_db_err)
    }

    /// Delete a content item. Its likes and comments go with it.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let result = Content::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(map_db_err)?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Content not found: {id}")));
        }
        Ok(())
    }

    /// Newest content first, optionally narrowed by kind and owner.
    pub async fn find_recent(&self, query: &ContentQuery) -> AppResult<Vec<content::Model>> {
        let mut condition = Condition::all();
        if let Some(kind) = query.kind {
            condition = condition.add(content::Column::Kind.eq(kind));
        }
        if let Some(user_id) = &query.user_id {
            condition = condition.add(content::Column::UserId.eq(user_id.as_str()));
        }

        Content::find()
            .filter(condition)
            .order_by_desc(content::Column::CreatedAt)
            .order_by_desc(content::Column::Id)
            .offset(query.offset)
            .limit(query.limit)
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }
}
