//! Following repository.

use std::sync::Arc;

use crate::entities::{Following, User, following, user};
use crate::repositories::map_db_err;
use rapport_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
    sea_query::{Expr, OnConflict},
};
use serde::Serialize;

/// Follow counters of one account, as recomputed from the edge set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowCounts {
    pub followers_count: i32,
    pub following_count: i32,
}

/// Counters of both endpoints after an edge mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeCounts {
    pub follower: FollowCounts,
    pub followee: FollowCounts,
}

/// Following repository for database operations.
#[derive(Clone)]
pub struct FollowingRepository {
    db: Arc<DatabaseConnection>,
}

impl FollowingRepository {
    /// Create a new following repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a following relationship by follower and followee.
    pub async fn find_by_pair(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<Option<following::Model>> {
        Following::find()
            .filter(following::Column::FollowerId.eq(follower_id))
            .filter(following::Column::FolloweeId.eq(followee_id))
            .one(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// Check if a user is following another user.
    pub async fn is_following(&self, follower_id: &str, followee_id: &str) -> AppResult<bool> {
        Ok(self.find_by_pair(follower_id, followee_id).await?.is_some())
    }

    /// Insert the edge `follower -> followee` and refresh both counters.
    ///
    /// Runs in one transaction: both account rows are locked in id order,
    /// the edge is inserted with `ON CONFLICT DO NOTHING` against the unique
    /// pair index, and the counters are recomputed from the edge table.
    /// Returns [`AppError::AlreadyRelated`] when the edge already exists and
    /// [`AppError::NotFound`] when either account is gone.
    pub async fn create_edge(
        &self,
        id: &str,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<EdgeCounts> {
        let txn = self.db.begin().await.map_err(map_db_err)?;

        lock_pair(&txn, follower_id, followee_id, false).await?;

        let model = following::ActiveModel {
            id: Set(id.to_string()),
            follower_id: Set(follower_id.to_string()),
            followee_id: Set(followee_id.to_string()),
            created_at: Set(chrono::Utc::now().into()),
        };

        let inserted = Following::insert(model)
            .on_conflict(
                OnConflict::columns([
                    following::Column::FollowerId,
                    following::Column::FolloweeId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&txn)
            .await
            .map_err(map_db_err)?;

        if inserted == 0 {
            // Dropping the transaction rolls it back
            return Err(AppError::AlreadyRelated);
        }

        let counts = EdgeCounts {
            follower: recompute_follow_counts(&txn, follower_id)
                .await
                .map_err(map_db_err)?,
            followee: recompute_follow_counts(&txn, followee_id)
                .await
                .map_err(map_db_err)?,
        };

        txn.commit().await.map_err(map_db_err)?;

        Ok(counts)
    }

    /// Remove the edge `follower -> followee` and refresh both counters.
    ///
    /// Soft-deleted accounts still count as endpoints here, so an edge to a
    /// deactivated account can always be removed. Returns
    /// [`AppError::NotRelated`] when no edge was removed.
    pub async fn delete_edge(&self, follower_id: &str, followee_id: &str) -> AppResult<EdgeCounts> {
        let txn = self.db.begin().await.map_err(map_db_err)?;

        lock_pair(&txn, follower_id, followee_id, true).await?;

        let deleted = Following::delete_many()
            .filter(following::Column::FollowerId.eq(follower_id))
            .filter(following::Column::FolloweeId.eq(followee_id))
            .exec(&txn)
            .await
            .map_err(map_db_err)?;

        if deleted.rows_affected == 0 {
            return Err(AppError::NotRelated);
        }

        let counts = EdgeCounts {
            follower: recompute_follow_counts(&txn, follower_id)
                .await
                .map_err(map_db_err)?,
            followee: recompute_follow_counts(&txn, followee_id)
                .await
                .map_err(map_db_err)?,
        };

        txn.commit().await.map_err(map_db_err)?;

        Ok(counts)
    }

    /// Recompute a user's counters from the edge table.
    pub async fn repair_counts(&self, user_id: &str) -> AppResult<FollowCounts> {
        let txn = self.db.begin().await.map_err(map_db_err)?;
        let counts = recompute_follow_counts(&txn, user_id)
            .await
            .map_err(map_db_err)?;
        txn.commit().await.map_err(map_db_err)?;
        Ok(counts)
    }

    /// Get edges from a user to the users they follow (paginated, newest first).
    pub async fn find_following(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<following::Model>> {
        let mut query = Following::find()
            .filter(following::Column::FollowerId.eq(user_id))
            .order_by_desc(following::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(following::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// Get edges from followers to a user (paginated, newest first).
    pub async fn find_followers(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<following::Model>> {
        let mut query = Following::find()
            .filter(following::Column::FolloweeId.eq(user_id))
            .order_by_desc(following::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(following::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }
}

/// Lock both account rows (`SELECT ... FOR UPDATE`) in a stable order.
///
/// Concurrent follow/unfollow calls on the same pair queue behind each other
/// here instead of interleaving their counter refreshes. Soft-deleted rows
/// are locked too and only accepted when `include_deleted` is set.
async fn lock_pair<C: ConnectionTrait>(
    conn: &C,
    a: &str,
    b: &str,
    include_deleted: bool,
) -> AppResult<()> {
    let locked = User::find()
        .filter(user::Column::Id.is_in([a.to_string(), b.to_string()]))
        .order_by_asc(user::Column::Id)
        .lock_exclusive()
        .all(conn)
        .await
        .map_err(map_db_err)?;

    for id in [a, b] {
        let usable = locked
            .iter()
            .any(|u| u.id == id && (include_deleted || !u.is_deleted()));
        if !usable {
            return Err(AppError::NotFound(format!("User not found: {id}")));
        }
    }
    Ok(())
}

/// Set `followers_count` / `following_count` from the edge table.
pub(crate) async fn recompute_follow_counts<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
) -> Result<FollowCounts, DbErr> {
    let followers = Following::find()
        .filter(following::Column::FolloweeId.eq(user_id))
        .count(conn)
        .await?;
    let following = Following::find()
        .filter(following::Column::FollowerId.eq(user_id))
        .count(conn)
        .await?;

    let counts = FollowCounts {
        followers_count: followers as i32,
        following_count: following as i32,
    };

    User::update_many()
        .col_expr(
            user::Column::FollowersCount,
            Expr::value(counts.followers_count),
        )
        .col_expr(
            user::Column::FollowingCount,
            Expr::value(counts.following_count),
        )
        .filter(user::Column::Id.eq(user_id))
        .exec(conn)
        .await?;

    Ok(counts)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::user::Role;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_following(id: &str, follower_id: &str, followee_id: &str) -> following::Model {
        following::Model {
            id: id.to_string(),
            follower_id: follower_id.to_string(),
            followee_id: followee_id.to_string(),
            created_at: Utc::now().into(),
        }
    }

    fn create_test_user(id: &str) -> user::Model {
        user::Model {
            id: id.to_string(),
            username: id.to_string(),
            username_lower: id.to_string(),
            email: format!("{id}@example.com"),
            mobile: None,
            password_hash: "hash".to_string(),
            token: None,
            role: Role::Normal,
            is_verified: true,
            name: id.to_string(),
            avatar_url: None,
            state: None,
            job: None,
            district: None,
            office: None,
            office_place: None,
            followers_count: 0,
            following_count: 0,
            deleted_at: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn count_row(n: i64) -> std::collections::BTreeMap<&'static str, sea_orm::Value> {
        maplit::btreemap! { "num_items" => sea_orm::Value::BigInt(Some(n)) }
    }

    fn exec(rows: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: rows,
        }
    }

    #[tokio::test]
    async fn test_find_by_pair_found() {
        let following = create_test_following("f1", "user1", "user2");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[following.clone()]])
                .into_connection(),
        );

        let repo = FollowingRepository::new(db);
        let result = repo.find_by_pair("user1", "user2").await.unwrap();

        assert_eq!(result.unwrap().followee_id, "user2");
    }

    #[tokio::test]
    async fn test_is_following_false() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<following::Model>::new()])
                .into_connection(),
        );

        let repo = FollowingRepository::new(db);
        assert!(!repo.is_following("user1", "user3").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_edge_recomputes_both_counters() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![create_test_user("user1"), create_test_user("user2")]])
                .append_exec_results([exec(1)])
                // follower: followers, following
                .append_query_results([[count_row(0)], [count_row(1)]])
                .append_exec_results([exec(1)])
                // followee: followers, following
                .append_query_results([[count_row(1)], [count_row(0)]])
                .append_exec_results([exec(1)])
                .into_connection(),
        );

        let repo = FollowingRepository::new(db);
        let counts = repo.create_edge("f1", "user1", "user2").await.unwrap();

        assert_eq!(counts.follower.following_count, 1);
        assert_eq!(counts.follower.followers_count, 0);
        assert_eq!(counts.followee.followers_count, 1);
        assert_eq!(counts.followee.following_count, 0);
    }

    #[tokio::test]
    async fn test_create_edge_existing_pair_is_already_related() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![create_test_user("user1"), create_test_user("user2")]])
                .append_exec_results([exec(0)])
                .into_connection(),
        );

        let repo = FollowingRepository::new(db);
        let result = repo.create_edge("f1", "user1", "user2").await;

        assert!(matches!(result, Err(AppError::AlreadyRelated)));
    }

    #[tokio::test]
    async fn test_create_edge_missing_followee_is_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![create_test_user("user1")]])
                .into_connection(),
        );

        let repo = FollowingRepository::new(db);
        let result = repo.create_edge("f1", "user1", "gone").await;

        match result {
            Err(AppError::NotFound(msg)) => assert!(msg.contains("gone")),
            other => panic!("Expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_edge_soft_deleted_followee_is_not_found() {
        let mut gone = create_test_user("user2");
        gone.deleted_at = Some(Utc::now().into());
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![create_test_user("user1"), gone]])
                .into_connection(),
        );

        let repo = FollowingRepository::new(db);
        let result = repo.create_edge("f1", "user1", "user2").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_edge_to_soft_deleted_followee() {
        let mut gone = create_test_user("user2");
        gone.deleted_at = Some(Utc::now().into());
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![create_test_user("user1"), gone]])
                .append_exec_results([exec(1)])
                .append_query_results([[count_row(0)], [count_row(0)]])
                .append_exec_results([exec(1)])
                .append_query_results([[count_row(0)], [count_row(0)]])
                .append_exec_results([exec(1)])
                .into_connection(),
        );

        let repo = FollowingRepository::new(db);
        let counts = repo.delete_edge("user1", "user2").await.unwrap();

        assert_eq!(counts.follower.following_count, 0);
    }

    #[tokio::test]
    async fn test_delete_edge_without_edge_is_not_related() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![create_test_user("user1"), create_test_user("user2")]])
                .append_exec_results([exec(0)])
                .into_connection(),
        );

        let repo = FollowingRepository::new(db);
        let result = repo.delete_edge("user1", "user2").await;

        assert!(matches!(result, Err(AppError::NotRelated)));
    }

    #[tokio::test]
    async fn test_delete_edge_recomputes_counters() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![create_test_user("user1"), create_test_user("user2")]])
                .append_exec_results([exec(1)])
                .append_query_results([[count_row(0)], [count_row(0)]])
                .append_exec_results([exec(1)])
                .append_query_results([[count_row(0)], [count_row(0)]])
                .append_exec_results([exec(1)])
                .into_connection(),
        );

        let repo = FollowingRepository::new(db);
        let counts = repo.delete_edge("user1", "user2").await.unwrap();

        assert_eq!(counts.follower.following_count, 0);
        assert_eq!(counts.followee.followers_count, 0);
    }

    #[tokio::test]
    async fn test_find_followers() {
        let f1 = create_test_following("f2", "user2", "user1");
        let f2 = create_test_following("f1", "user3", "user1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[f1, f2]])
                .into_connection(),
        );

        let repo = FollowingRepository::new(db);
        let result = repo.find_followers("user1", 10, None).await.unwrap();

        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|f| f.followee_id == "user1"));
    }
}
