//! User repository.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::entities::{ContentLike, Following, User, content_like, following, user};
use crate::repositories::content_like::recompute_likes_count;
use crate::repositories::following::recompute_follow_counts;
use crate::repositories::map_db_err;
use rapport_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Select, TransactionTrait,
    sea_query::{Expr, Func},
};
use serde::Serialize;
use tracing::debug;

/// What a hard delete cleaned up besides the account row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HardDeleteReport {
    pub user_id: String,
    /// Accounts whose follow counters were recomputed
    pub neighbours_repaired: usize,
    /// Content items whose like counters were recomputed
    pub contents_repaired: usize,
}

/// User repository for database operations.
#[derive(Clone)]
pub struct UserRepository {
    db: Arc<DatabaseConnection>,
}

impl UserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a user by ID, soft-deleted accounts included.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<user::Model>> {
        User::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// Find a user by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<user::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User not found: {id}")))
    }

    /// Find a live user by ID. Soft-deleted accounts are reported as missing.
    pub async fn get_active_by_id(&self, id: &str) -> AppResult<user::Model> {
        match self.find_by_id(id).await? {
            Some(u) if !u.is_deleted() => Ok(u),
            _ => Err(AppError::NotFound(format!("User not found: {id}"))),
        }
    }

    /// Find live users by IDs. Order is unspecified.
    pub async fn find_active_by_ids(&self, ids: &[String]) -> AppResult<Vec<user::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        User::find()
            .filter(user::Column::Id.is_in(ids.to_vec()))
            .filter(user::Column::DeletedAt.is_null())
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// Find a user by handle (case-insensitive).
    pub async fn find_by_username(&self, username: &str) -> AppResult<Option<user::Model>> {
        User::find()
            .filter(user::Column::UsernameLower.eq(username.to_lowercase()))
            .one(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// Find a user by contact address (case-insensitive).
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<user::Model>> {
        User::find()
            .filter(user::Column::Email.eq(email.to_lowercase()))
            .one(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// Find a user by mobile number.
    pub async fn find_by_mobile(&self, mobile: &str) -> AppResult<Option<user::Model>> {
        User::find()
            .filter(user::Column::Mobile.eq(mobile))
            .one(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// Find a user by token.
    pub async fn find_by_token(&self, token: &str) -> AppResult<Option<user::Model>> {
        User::find()
            .filter(user::Column::Token.eq(token))
            .one(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// Create a new user.
    pub async fn create(&self, model: user::ActiveModel) -> AppResult<user::Model> {
        model.insert(self.db.as_ref()).await.map_err(map_db_err)
    }

    /// Update a user.
    pub async fn update(&self, model: user::ActiveModel) -> AppResult<user::Model> {
        model.update(self.db.as_ref()).await.map_err(map_db_err)
    }

    /// Search live users by handle, display name, job or location.
    pub async fn search(&self, query: &str, limit: u64, offset: u64) -> AppResult<Vec<user::Model>> {
        search_query(query)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// Mark an account as deleted and revoke its token.
    ///
    /// Edges, likes and reviews stay in place; readers skip the account.
    pub async fn soft_delete(&self, id: &str) -> AppResult<()> {
        let now = chrono::Utc::now().fixed_offset();
        let result = User::update_many()
            .col_expr(user::Column::DeletedAt, Expr::value(now))
            .col_expr(user::Column::Token, Expr::value(Option::<String>::None))
            .col_expr(user::Column::UpdatedAt, Expr::value(now))
            .filter(user::Column::Id.eq(id))
            .filter(user::Column::DeletedAt.is_null())
            .exec(self.db.as_ref())
            .await
            .map_err(map_db_err)?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("User not found: {id}")));
        }
        Ok(())
    }

    /// Remove an account and everything it owns.
    ///
    /// Foreign keys cascade the row removal to content, likes, comments,
    /// edges and reviews. The same transaction then recomputes the counters
    /// of every former neighbour and every item the account had liked.
    pub async fn hard_delete(&self, id: &str) -> AppResult<HardDeleteReport> {
        let txn = self.db.begin().await.map_err(map_db_err)?;

        let locked = User::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(map_db_err)?;
        if locked.is_none() {
            return Err(AppError::NotFound(format!("User not found: {id}")));
        }

        let edges = Following::find()
            .filter(
                Condition::any()
                    .add(following::Column::FollowerId.eq(id))
                    .add(following::Column::FolloweeId.eq(id)),
            )
            .all(&txn)
            .await
            .map_err(map_db_err)?;
        let neighbours: BTreeSet<String> = edges
            .into_iter()
            .map(|e| {
                if e.follower_id == id {
                    e.followee_id
                } else {
                    e.follower_id
                }
            })
            .collect();

        let liked: BTreeSet<String> = ContentLike::find()
            .filter(content_like::Column::UserId.eq(id))
            .all(&txn)
            .await
            .map_err(map_db_err)?
            .into_iter()
            .map(|l| l.content_id)
            .collect();

        let deleted = User::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(map_db_err)?;
        if deleted.rows_affected == 0 {
            return Err(AppError::NotFound(format!("User not found: {id}")));
        }

        for neighbour in &neighbours {
            recompute_follow_counts(&txn, neighbour)
                .await
                .map_err(map_db_err)?;
        }
        for content_id in &liked {
            recompute_likes_count(&txn, content_id)
                .await
                .map_err(map_db_err)?;
        }

        txn.commit().await.map_err(map_db_err)?;

        debug!(
            user_id = %id,
            neighbours = neighbours.len(),
            contents = liked.len(),
            "Hard-deleted account"
        );

        Ok(HardDeleteReport {
            user_id: id.to_string(),
            neighbours_repaired: neighbours.len(),
            contents_repaired: liked.len(),
        })
    }
}

/// Case-insensitive substring match over the searchable profile fields.
fn search_query(query: &str) -> Select<User> {
    let pattern = format!(
        "%{}%",
        query
            .to_lowercase()
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_")
    );

    let mut any = Condition::any().add(user::Column::UsernameLower.like(pattern.as_str()));
    for column in [
        user::Column::Name,
        user::Column::Job,
        user::Column::District,
        user::Column::State,
        user::Column::OfficePlace,
    ] {
        any = any.add(Expr::expr(Func::lower(Expr::col(column))).like(pattern.as_str()));
    }

    User::find()
        .filter(user::Column::DeletedAt.is_null())
        .filter(any)
        .order_by_desc(user::Column::FollowersCount)
        .order_by_asc(user::Column::Id)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::user::Role;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, QueryTrait};

    fn create_test_user(id: &str, username: &str) -> user::Model {
        user::Model {
            id: id.to_string(),
            username: username.to_string(),
            username_lower: username.to_lowercase(),
            email: format!("{}@example.com", username.to_lowercase()),
            mobile: Some("9876543210".to_string()),
            password_hash: "hash".to_string(),
            token: Some("test_token".to_string()),
            role: Role::Normal,
            is_verified: true,
            name: "Test User".to_string(),
            avatar_url: None,
            state: Some("Kerala".to_string()),
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

    fn exec(rows: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: rows,
        }
    }

    fn count_row(n: i64) -> std::collections::BTreeMap<&'static str, sea_orm::Value> {
        maplit::btreemap! { "num_items" => sea_orm::Value::BigInt(Some(n)) }
    }

    #[tokio::test]
    async fn test_find_by_id_found() {
        let user = create_test_user("user1", "testuser");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[user.clone()]])
                .into_connection(),
        );

        let repo = UserRepository::new(db);
        let result = repo.find_by_id("user1").await.unwrap();

        assert!(result.is_some());
        let found_user = result.unwrap();
        assert_eq!(found_user.id, "user1");
        assert_eq!(found_user.username, "testuser");
    }

    #[tokio::test]
    async fn test_get_by_id_not_found_returns_error() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user::Model>::new()])
                .into_connection(),
        );

        let repo = UserRepository::new(db);
        let result = repo.get_by_id("nonexistent").await;

        match result {
            Err(AppError::NotFound(msg)) => assert!(msg.contains("nonexistent")),
            _ => panic!("Expected NotFound error"),
        }
    }

    #[tokio::test]
    async fn test_get_active_by_id_hides_soft_deleted() {
        let mut user = create_test_user("user1", "gone");
        user.deleted_at = Some(Utc::now().into());

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[user]])
                .into_connection(),
        );

        let repo = UserRepository::new(db);
        assert!(matches!(
            repo.get_active_by_id("user1").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_find_active_by_ids_empty_skips_query() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let repo = UserRepository::new(db);
        assert!(repo.find_active_by_ids(&[]).await.unwrap().is_empty());
    }

    #[test]
    fn test_search_covers_job_and_location_fields() {
        let sql = search_query("Kochi")
            .build(DatabaseBackend::Postgres)
            .to_string();

        for column in [
            "\"username_lower\"",
            "\"name\"",
            "\"job\"",
            "\"district\"",
            "\"state\"",
            "\"office_place\"",
        ] {
            assert!(sql.contains(column), "{column} missing from {sql}");
        }
        assert!(sql.contains("\"deleted_at\" IS NULL"));
        assert!(sql.contains("%kochi%"));
    }

    #[tokio::test]
    async fn test_search() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_user("user1", "Anitha")]])
                .into_connection(),
        );

        let repo = UserRepository::new(db);
        let result = repo.search("ANI", 10, 0).await.unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].username_lower, "anitha");
    }

    #[tokio::test]
    async fn test_soft_delete_twice_is_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([exec(1), exec(0)])
                .into_connection(),
        );

        let repo = UserRepository::new(db);
        assert!(repo.soft_delete("user1").await.is_ok());
        assert!(matches!(
            repo.soft_delete("user1").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_hard_delete_repairs_neighbours_and_likes() {
        let edge_out = following::Model {
            id: "f1".to_string(),
            follower_id: "user1".to_string(),
            followee_id: "user2".to_string(),
            created_at: Utc::now().into(),
        };
        let edge_in = following::Model {
            id: "f2".to_string(),
            follower_id: "user2".to_string(),
            followee_id: "user1".to_string(),
            created_at: Utc::now().into(),
        };
        let like = content_like::Model {
            id: "l1".to_string(),
            content_id: "c7".to_string(),
            user_id: "user1".to_string(),
            created_at: Utc::now().into(),
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_user("user1", "leaving")]])
                .append_query_results([[edge_out, edge_in]])
                .append_query_results([[like]])
                .append_exec_results([exec(1)])
                // user2 counters
                .append_query_results([[count_row(0)], [count_row(0)]])
                .append_exec_results([exec(1)])
                // c7 likes
                .append_query_results([[count_row(2)]])
                .append_exec_results([exec(1)])
                .into_connection(),
        );

        let repo = UserRepository::new(db);
        let report = repo.hard_delete("user1").await.unwrap();

        assert_eq!(report.neighbours_repaired, 1);
        assert_eq!(report.contents_repaired, 1);
    }

    #[tokio::test]
    async fn test_hard_delete_missing_user() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user::Model>::new()])
                .into_connection(),
        );

        let repo = UserRepository::new(db);
        assert!(matches!(
            repo.hard_delete("ghost").await,
            Err(AppError::NotFound(_))
        ));
    }
}
